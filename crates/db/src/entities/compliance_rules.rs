//! `SeaORM` Entity for compliance_rules table.
//!
//! Versioned by effective date; a rule change is a new row, never an
//! in-place update. `state`/`city` null-ness encodes scope: both null is a
//! federal default, city null is state-wide.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::RuleCategory;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "compliance_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub category: RuleCategory,
    pub state: Option<String>,
    pub city: Option<String>,
    pub parameters: Json,
    pub effective_from: Date,
    pub effective_to: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
