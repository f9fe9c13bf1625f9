//! Creator-member relationship repository.

use std::sync::Arc;

use crate::entities::creator_member::MemberStatus;
use crate::entities::{CreatorMember, creator_member};
use aiponge_common::{AppError, AppResult};
use chrono::Utc;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

/// Rows per statement for bulk inserts.
const INSERT_BATCH_SIZE: usize = 500;

/// Creator-member repository for database operations.
#[derive(Clone)]
pub struct CreatorMemberRepository {
    db: Arc<DatabaseConnection>,
}

impl CreatorMemberRepository {
    /// Create a new creator-member repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the relationship row for a pair, whatever its status.
    pub async fn find_by_pair(
        &self,
        creator_id: &str,
        member_id: &str,
    ) -> AppResult<Option<creator_member::Model>> {
        Self::find_by_pair_on(self.db.as_ref(), creator_id, member_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find the relationship row for a pair on the given connection.
    pub async fn find_by_pair_on<C: ConnectionTrait>(
        conn: &C,
        creator_id: &str,
        member_id: &str,
    ) -> Result<Option<creator_member::Model>, DbErr> {
        CreatorMember::find()
            .filter(creator_member::Column::CreatorId.eq(creator_id))
            .filter(creator_member::Column::MemberId.eq(member_id))
            .one(conn)
            .await
    }

    /// Find the active, non-deleted relationship for a pair.
    pub async fn find_active_by_pair(
        &self,
        creator_id: &str,
        member_id: &str,
    ) -> AppResult<Option<creator_member::Model>> {
        Ok(self
            .find_by_pair(creator_id, member_id)
            .await?
            .filter(creator_member::Model::is_active))
    }

    /// Insert a relationship on the given connection.
    pub async fn create_on<C: ConnectionTrait>(
        conn: &C,
        model: creator_member::ActiveModel,
    ) -> Result<creator_member::Model, DbErr> {
        model.insert(conn).await
    }

    /// Bring a revoked or soft-deleted row back to active.
    pub async fn reactivate_on<C: ConnectionTrait>(
        conn: &C,
        existing: creator_member::Model,
    ) -> Result<creator_member::Model, DbErr> {
        let mut active: creator_member::ActiveModel = existing.into();
        active.status = Set(MemberStatus::Active);
        active.deleted_at = Set(None);
        active.update(conn).await
    }

    /// Insert relationships, skipping pairs that already have a row.
    ///
    /// Returns the number of rows actually inserted.
    pub async fn insert_ignoring_conflicts(
        &self,
        models: Vec<creator_member::ActiveModel>,
    ) -> AppResult<u64> {
        let mut inserted = 0;
        let mut models = models.into_iter().peekable();

        while models.peek().is_some() {
            let batch: Vec<_> = models.by_ref().take(INSERT_BATCH_SIZE).collect();

            inserted += CreatorMember::insert_many(batch)
                .on_conflict(
                    OnConflict::columns([
                        creator_member::Column::CreatorId,
                        creator_member::Column::MemberId,
                    ])
                    .do_nothing()
                    .to_owned(),
                )
                .exec_without_returning(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }

        Ok(inserted)
    }

    /// Mark a relationship revoked. The row itself is kept.
    pub async fn revoke(&self, id: &str) -> AppResult<()> {
        CreatorMember::update_many()
            .col_expr(
                creator_member::Column::Status,
                Expr::value(MemberStatus::Revoked),
            )
            .filter(creator_member::Column::Id.eq(id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Active members of a creator, oldest first.
    pub async fn find_members(&self, creator_id: &str) -> AppResult<Vec<creator_member::Model>> {
        CreatorMember::find()
            .filter(creator_member::Column::CreatorId.eq(creator_id))
            .filter(creator_member::Column::Status.eq(MemberStatus::Active))
            .filter(creator_member::Column::DeletedAt.is_null())
            .order_by_asc(creator_member::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Active relationships where the user is the member, oldest first.
    pub async fn find_following(&self, member_id: &str) -> AppResult<Vec<creator_member::Model>> {
        CreatorMember::find()
            .filter(creator_member::Column::MemberId.eq(member_id))
            .filter(creator_member::Column::Status.eq(MemberStatus::Active))
            .filter(creator_member::Column::DeletedAt.is_null())
            .order_by_asc(creator_member::Column::CreatedAt)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

/// Build an active relationship row.
#[must_use]
pub fn new_active(id: String, creator_id: &str, member_id: &str) -> creator_member::ActiveModel {
    creator_member::ActiveModel {
        id: Set(id),
        creator_id: Set(creator_id.to_string()),
        member_id: Set(member_id.to_string()),
        status: Set(MemberStatus::Active),
        created_at: Set(Utc::now().into()),
        deleted_at: Set(None),
    }
}
