//! Invitation entity (an open offer to follow a creator).

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle state of an invitation, derived from its fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationState {
    /// Never used, still usable.
    Pending,
    /// Used at least once and still usable.
    Accepted,
    /// All uses consumed.
    Exhausted,
    /// Past its expiry time.
    Expired,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitation")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    #[sea_orm(indexed)]
    pub creator_id: String,

    /// Shareable code
    #[sea_orm(unique)]
    pub token: String,

    /// NULL = unlimited
    #[sea_orm(nullable)]
    pub max_uses: Option<i32>,

    pub use_count: i32,

    /// NULL = never expires
    #[sea_orm(nullable)]
    pub expires_at: Option<DateTimeWithTimeZone>,

    /// Optional address the invitation was sent to
    #[sea_orm(nullable)]
    pub email: Option<String>,

    pub created_at: DateTimeWithTimeZone,

    /// Set when the creator revokes the invitation
    #[sea_orm(nullable)]
    pub deleted_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    /// Whether `expires_at` lies before `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Whether every allowed use has been consumed.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.max_uses.is_some_and(|max| self.use_count >= max)
    }

    /// Derive the lifecycle state. Expiry takes precedence over exhaustion.
    #[must_use]
    pub fn state_at(&self, now: DateTime<Utc>) -> InvitationState {
        if self.is_expired_at(now) {
            InvitationState::Expired
        } else if self.is_exhausted() {
            InvitationState::Exhausted
        } else if self.use_count > 0 {
            InvitationState::Accepted
        } else {
            InvitationState::Pending
        }
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
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
