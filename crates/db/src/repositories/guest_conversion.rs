//! Guest conversion repository (state rows and policy rows).

use std::sync::Arc;

use crate::entities::{
    GuestConversionPolicy, GuestConversionState, guest_conversion_policy, guest_conversion_state,
};
use aiponge_common::{AppError, AppResult};
use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};

/// Guest conversion repository for database operations.
#[derive(Clone)]
pub struct GuestConversionRepository {
    db: Arc<DatabaseConnection>,
}

impl GuestConversionRepository {
    /// Create a new guest conversion repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Get reference to the database connection.
    #[must_use]
    pub fn db(&self) -> &DatabaseConnection {
        self.db.as_ref()
    }

    /// Find the state row for a user.
    pub async fn find_by_user_id(
        &self,
        user_id: &str,
    ) -> AppResult<Option<guest_conversion_state::Model>> {
        Self::find_by_user_id_on(self.db.as_ref(), user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the state row for a user on the given connection.
    pub async fn find_by_user_id_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
    ) -> Result<Option<guest_conversion_state::Model>, DbErr> {
        GuestConversionState::find_by_id(user_id).one(conn).await
    }

    /// Most recently created active policy, if any.
    pub async fn find_active_policy(&self) -> AppResult<Option<guest_conversion_policy::Model>> {
        GuestConversionPolicy::find()
            .filter(guest_conversion_policy::Column::IsActive.eq(true))
            .order_by_desc(guest_conversion_policy::Column::CreatedAt)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Insert a zeroed state row unless one already exists.
    pub async fn ensure_exists_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let model = guest_conversion_state::ActiveModel {
            user_id: Set(user_id.to_string()),
            songs_generated: Set(0),
            tracks_played: Set(0),
            entries_saved: Set(0),
            last_prompt_shown: Set(None),
            prompt_count: Set(0),
            is_converted: Set(false),
            converted_at: Set(None),
            created_at: Set(now.fixed_offset()),
            updated_at: Set(None),
        };

        GuestConversionState::insert(model)
            .on_conflict(
                OnConflict::column(guest_conversion_state::Column::UserId)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(conn)
            .await
    }

    /// Add one to a counter column in the store (`counter = counter + 1`).
    pub async fn increment_counter_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        counter: guest_conversion_state::Column,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = GuestConversionState::update_many()
            .col_expr(counter, Expr::col(counter).add(1))
            .col_expr(
                guest_conversion_state::Column::UpdatedAt,
                Expr::value(now.fixed_offset()),
            )
            .filter(guest_conversion_state::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Record that a conversion prompt was shown.
    pub async fn record_prompt_on<C: ConnectionTrait>(
        conn: &C,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<u64, DbErr> {
        let result = GuestConversionState::update_many()
            .col_expr(
                guest_conversion_state::Column::LastPromptShown,
                Expr::value(now.fixed_offset()),
            )
            .col_expr(
                guest_conversion_state::Column::PromptCount,
                Expr::col(guest_conversion_state::Column::PromptCount).add(1),
            )
            .filter(guest_conversion_state::Column::UserId.eq(user_id))
            .exec(conn)
            .await?;

        Ok(result.rows_affected)
    }

    /// Set the converted flag and timestamp, creating the row if needed.
    pub async fn mark_converted(&self, user_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        Self::ensure_exists_on(self.db.as_ref(), user_id, now)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        GuestConversionState::update_many()
            .col_expr(guest_conversion_state::Column::IsConverted, Expr::value(true))
            .col_expr(
                guest_conversion_state::Column::ConvertedAt,
                Expr::value(now.fixed_offset()),
            )
            .col_expr(
                guest_conversion_state::Column::UpdatedAt,
                Expr::value(now.fixed_offset()),
            )
            .filter(guest_conversion_state::Column::UserId.eq(user_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }
}
