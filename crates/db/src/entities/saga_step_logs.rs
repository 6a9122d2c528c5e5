//! `SeaORM` Entity for saga_step_logs table (append-only).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{StepOutcome, StepPhase};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "saga_step_logs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub saga_id: Uuid,
    pub step_index: i32,
    pub step_name: String,
    pub attempt: i32,
    pub phase: StepPhase,
    pub outcome: StepOutcome,
    pub output: Option<Json>,
    pub error: Option<String>,
    pub logged_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::saga_states::Entity",
        from = "Column::SagaId",
        to = "super::saga_states::Column::Id"
    )]
    SagaStates,
}

impl Related<super::saga_states::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SagaStates.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
