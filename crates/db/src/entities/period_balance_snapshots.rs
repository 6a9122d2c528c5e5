//! `SeaORM` Entity for period_balance_snapshots table.
//!
//! Written when a period closes: the balance of each account as of the
//! period's end date. As-of balance reads inside closed periods consult
//! these rows instead of summing postings. Reopening a period deletes its
//! snapshots; they are regenerated at the next close.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "period_balance_snapshots")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub period_id: Uuid,
    pub account_id: Uuid,
    pub balance: Decimal,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounting_periods::Entity",
        from = "Column::PeriodId",
        to = "super::accounting_periods::Column::Id"
    )]
    AccountingPeriods,
}

impl Related<super::accounting_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::AccountingPeriods.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
