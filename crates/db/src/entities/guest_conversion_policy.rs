//! Guest conversion policy entity (admin-configured prompt thresholds).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "guest_conversion_policy")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub songs_threshold: i32,

    pub tracks_threshold: i32,

    pub entries_created_threshold: i32,

    pub cooldown_hours: i32,

    /// At most one row is expected to be active
    #[sea_orm(indexed)]
    pub is_active: bool,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
