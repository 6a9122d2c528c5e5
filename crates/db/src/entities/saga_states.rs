//! `SeaORM` Entity for saga_states table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::SagaStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "saga_states")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub organization_id: Uuid,
    pub kind: String,
    pub status: SagaStatus,
    pub current_step: i32,
    pub input: Json,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::saga_step_logs::Entity")]
    SagaStepLogs,
}

impl Related<super::saga_step_logs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SagaStepLogs.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
