//! Creator-member relationship entity.
//!
//! A directed edge: `member_id` follows (has access to) `creator_id`'s content.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Status of a relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
#[derive(Default)]
pub enum MemberStatus {
    /// Member currently has access.
    #[sea_orm(string_value = "active")]
    #[default]
    Active,
    /// Member unfollowed or was removed.
    #[sea_orm(string_value = "revoked")]
    Revoked,
}

/// A member following a creator. At most one row exists per
/// `(creator_id, member_id)` pair.
///
/// The schema must carry a unique index on `(creator_id, member_id)`.
/// `CreatorMemberRepository::insert_ignoring_conflicts` targets it with
/// `ON CONFLICT (creator_id, member_id) DO NOTHING`, and `PostgreSQL` rejects
/// that clause when no matching unique index exists.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "creator_member")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// The user whose content is shared
    #[sea_orm(indexed)]
    pub creator_id: String,

    /// The user who follows
    #[sea_orm(indexed)]
    pub member_id: String,

    pub status: MemberStatus,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Active and not soft-deleted.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == MemberStatus::Active && self.deleted_at.is_none()
    }

    /// Whether this is the "own content visible to self" edge.
    #[must_use]
    pub fn is_self(&self) -> bool {
        self.creator_id == self.member_id
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Creator,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::MemberId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    Member,
}

impl ActiveModelBehavior for ActiveModel {}
