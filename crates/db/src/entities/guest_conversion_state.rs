//! Guest conversion state entity (per-guest engagement counters).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guest_conversion_state")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// One row per user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,

    pub songs_generated: i32,

    pub tracks_played: i32,

    pub entries_saved: i32,

    #[sea_orm(nullable)]
    pub last_prompt_shown: Option<DateTimeWithTimeZone>,

    pub prompt_count: i32,

    pub is_converted: bool,

    #[sea_orm(nullable)]
    pub converted_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
