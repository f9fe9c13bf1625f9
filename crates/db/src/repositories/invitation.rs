//! Invitation repository.

use std::sync::Arc;

use crate::entities::{Invitation, invitation};
use aiponge_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};

/// Invitation repository for database operations.
#[derive(Clone)]
pub struct InvitationRepository {
    db: Arc<DatabaseConnection>,
}

impl InvitationRepository {
    /// Create a new invitation repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find a non-revoked invitation by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<invitation::Model>> {
        Invitation::find_by_id(id)
            .filter(invitation::Column::DeletedAt.is_null())
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a non-revoked invitation by token.
    pub async fn find_by_token(&self, token: &str) -> AppResult<Option<invitation::Model>> {
        Self::find_by_token_on(self.db.as_ref(), token)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a non-revoked invitation by token on the given connection.
    pub async fn find_by_token_on<C: ConnectionTrait>(
        conn: &C,
        token: &str,
    ) -> Result<Option<invitation::Model>, DbErr> {
        Invitation::find()
            .filter(invitation::Column::Token.eq(token))
            .filter(invitation::Column::DeletedAt.is_null())
            .one(conn)
            .await
    }

    /// List a creator's non-revoked invitations, newest first.
    pub async fn find_by_creator(&self, creator_id: &str) -> AppResult<Vec<invitation::Model>> {
        Invitation::find()
            .filter(invitation::Column::CreatorId.eq(creator_id))
            .filter(invitation::Column::DeletedAt.is_null())
            .order_by_desc(invitation::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create a new invitation.
    pub async fn create(&self, model: invitation::ActiveModel) -> AppResult<invitation::Model> {
        model
            .insert(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Revoke an invitation (soft delete).
    pub async fn soft_delete(&self, id: &str) -> AppResult<()> {
        Invitation::update_many()
            .col_expr(invitation::Column::DeletedAt, Expr::value(Utc::now().fixed_offset()))
            .filter(invitation::Column::Id.eq(id))
            .filter(invitation::Column::DeletedAt.is_null())
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Increment `use_count` by one, in the store.
    ///
    /// When a use limit is set the update only matches while
    /// `use_count < max_uses`, so the returned row count is 0 if another
    /// transaction consumed the last use first.
    pub async fn increment_use_count_on<C: ConnectionTrait>(
        conn: &C,
        id: &str,
        max_uses: Option<i32>,
    ) -> Result<u64, DbErr> {
        let mut update = Invitation::update_many()
            .col_expr(
                invitation::Column::UseCount,
                Expr::col(invitation::Column::UseCount).add(1),
            )
            .filter(invitation::Column::Id.eq(id));

        if let Some(max) = max_uses {
            update = update.filter(invitation::Column::UseCount.lt(max));
        }

        Ok(update.exec(conn).await?.rows_affected)
    }
}
