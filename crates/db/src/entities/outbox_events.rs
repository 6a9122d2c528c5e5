//! `SeaORM` Entity for outbox_events table.
//!
//! An event row commits in the exact same transaction as the ledger write
//! it describes, so it becomes visible to the relay if and only if the
//! financial write actually committed.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::OutboxStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "outbox_events")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub event_type: String,
    pub payload: Json,
    pub status: OutboxStatus,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub entry_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub published_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
