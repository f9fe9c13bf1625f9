//! User repository.

use std::sync::Arc;

use crate::entities::user::UserRole;
use crate::entities::{User, user};
use aiponge_common::{AppError, AppResult};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};

/// User repository for database operations.
#[derive(Clone)]
pub struct UserRepository {
    db: Arc<DatabaseConnection>,
}

impl UserRepository {
    /// Create a new user repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// IDs of every user that has not been deleted.
    pub async fn find_all_ids(&self) -> AppResult<Vec<String>> {
        User::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Id)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// IDs of every librarian that has not been deleted.
    pub async fn find_librarian_ids(&self) -> AppResult<Vec<String>> {
        User::find()
            .select_only()
            .column(user::Column::Id)
            .filter(user::Column::Role.eq(UserRole::Librarian))
            .filter(user::Column::DeletedAt.is_null())
            .order_by_asc(user::Column::Id)
            .into_tuple::<String>()
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
