//! `SeaORM` Entity for properties table.
//!
//! Carries the distribution configuration: which ledger accounts hold the
//! property's operating cash, unsettled inflows, and trust-restricted
//! liabilities, plus the configured reserve minimum.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "properties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub state: String,
    pub city: String,
    pub cash_account_id: Uuid,
    pub clearing_account_id: Uuid,
    pub deposit_account_id: Uuid,
    pub prepaid_rent_account_id: Uuid,
    pub reserve_minimum: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organizations::Entity",
        from = "Column::OrganizationId",
        to = "super::organizations::Column::Id"
    )]
    Organizations,
}

impl Related<super::organizations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organizations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
