//! SeaORM-backed saga store.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use trellis_core::saga::{
    SagaError, SagaState, SagaStatus, SagaStepLog, SagaStore, StepOutcome, StepPhase,
};
use trellis_shared::types::{OrganizationId, SagaId};
use uuid::Uuid;

use crate::entities::{saga_states, saga_step_logs, sea_orm_active_enums};

fn to_db_status(status: SagaStatus) -> sea_orm_active_enums::SagaStatus {
    match status {
        SagaStatus::Running => sea_orm_active_enums::SagaStatus::Running,
        SagaStatus::Compensating => sea_orm_active_enums::SagaStatus::Compensating,
        SagaStatus::Completed => sea_orm_active_enums::SagaStatus::Completed,
        SagaStatus::Failed => sea_orm_active_enums::SagaStatus::Failed,
        SagaStatus::CompensationFailed => sea_orm_active_enums::SagaStatus::CompensationFailed,
    }
}

fn to_core_status(status: &sea_orm_active_enums::SagaStatus) -> SagaStatus {
    match status {
        sea_orm_active_enums::SagaStatus::Running => SagaStatus::Running,
        sea_orm_active_enums::SagaStatus::Compensating => SagaStatus::Compensating,
        sea_orm_active_enums::SagaStatus::Completed => SagaStatus::Completed,
        sea_orm_active_enums::SagaStatus::Failed => SagaStatus::Failed,
        sea_orm_active_enums::SagaStatus::CompensationFailed => SagaStatus::CompensationFailed,
    }
}

fn to_db_phase(phase: StepPhase) -> sea_orm_active_enums::StepPhase {
    match phase {
        StepPhase::Forward => sea_orm_active_enums::StepPhase::Forward,
        StepPhase::Compensation => sea_orm_active_enums::StepPhase::Compensation,
    }
}

fn to_core_phase(phase: &sea_orm_active_enums::StepPhase) -> StepPhase {
    match phase {
        sea_orm_active_enums::StepPhase::Forward => StepPhase::Forward,
        sea_orm_active_enums::StepPhase::Compensation => StepPhase::Compensation,
    }
}

fn to_db_outcome(outcome: StepOutcome) -> sea_orm_active_enums::StepOutcome {
    match outcome {
        StepOutcome::Started => sea_orm_active_enums::StepOutcome::Started,
        StepOutcome::Succeeded => sea_orm_active_enums::StepOutcome::Succeeded,
        StepOutcome::Failed => sea_orm_active_enums::StepOutcome::Failed,
    }
}

fn to_core_outcome(outcome: &sea_orm_active_enums::StepOutcome) -> StepOutcome {
    match outcome {
        sea_orm_active_enums::StepOutcome::Started => StepOutcome::Started,
        sea_orm_active_enums::StepOutcome::Succeeded => StepOutcome::Succeeded,
        sea_orm_active_enums::StepOutcome::Failed => StepOutcome::Failed,
    }
}

fn store_err(e: DbErr) -> SagaError {
    SagaError::Store(e.to_string())
}

fn to_core_state(model: &saga_states::Model) -> SagaState {
    SagaState {
        id: SagaId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        kind: model.kind.clone(),
        status: to_core_status(&model.status),
        current_step: u32::try_from(model.current_step).unwrap_or(0),
        input: model.input.clone(),
        created_at: model.created_at.into(),
        updated_at: model.updated_at.into(),
    }
}

/// The SeaORM-backed saga store used in production.
#[derive(Debug, Clone)]
pub struct SeaOrmSagaStore {
    db: DatabaseConnection,
}

impl SeaOrmSagaStore {
    /// Creates a new store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Finds non-terminal sagas that have not made progress recently.
    /// The worker resumes these ("resurrection") on its sweep interval.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_stalled(
        &self,
        stalled_after: Duration,
    ) -> Result<Vec<SagaState>, SagaError> {
        let cutoff = Utc::now() - stalled_after;
        let rows = saga_states::Entity::find()
            .filter(
                saga_states::Column::Status.is_in([
                    sea_orm_active_enums::SagaStatus::Running,
                    sea_orm_active_enums::SagaStatus::Compensating,
                ]),
            )
            .filter(saga_states::Column::UpdatedAt.lt(cutoff))
            .all(&self.db)
            .await
            .map_err(store_err)?;
        Ok(rows.iter().map(to_core_state).collect())
    }
}

#[async_trait]
impl SagaStore for SeaOrmSagaStore {
    async fn create(&self, state: &SagaState) -> Result<(), SagaError> {
        let model = saga_states::ActiveModel {
            id: Set(state.id.into_inner()),
            organization_id: Set(state.organization_id.into_inner()),
            kind: Set(state.kind.clone()),
            status: Set(to_db_status(state.status)),
            current_step: Set(i32::try_from(state.current_step).unwrap_or(i32::MAX)),
            input: Set(state.input.clone()),
            created_at: Set(state.created_at.into()),
            updated_at: Set(state.updated_at.into()),
        };
        model.insert(&self.db).await.map_err(store_err)?;
        Ok(())
    }

    async fn load(&self, id: SagaId) -> Result<Option<SagaState>, SagaError> {
        let row = saga_states::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?;
        Ok(row.as_ref().map(to_core_state))
    }

    async fn set_status(&self, id: SagaId, status: SagaStatus) -> Result<(), SagaError> {
        let row = saga_states::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .ok_or(SagaError::NotFound(id))?;
        let mut active: saga_states::ActiveModel = row.into();
        active.status = Set(to_db_status(status));
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await.map_err(store_err)?;
        Ok(())
    }

    async fn set_current_step(&self, id: SagaId, step: u32) -> Result<(), SagaError> {
        let row = saga_states::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await
            .map_err(store_err)?
            .ok_or(SagaError::NotFound(id))?;
        let mut active: saga_states::ActiveModel = row.into();
        active.current_step = Set(i32::try_from(step).unwrap_or(i32::MAX));
        active.updated_at = Set(Utc::now().into());
        active.update(&self.db).await.map_err(store_err)?;
        Ok(())
    }

    async fn append_log(&self, log: &SagaStepLog) -> Result<(), SagaError> {
        let model = saga_step_logs::ActiveModel {
            id: Set(Uuid::now_v7()),
            saga_id: Set(log.saga_id.into_inner()),
            step_index: Set(i32::try_from(log.step_index).unwrap_or(i32::MAX)),
            step_name: Set(log.step_name.clone()),
            attempt: Set(i32::try_from(log.attempt).unwrap_or(i32::MAX)),
            phase: Set(to_db_phase(log.phase)),
            outcome: Set(to_db_outcome(log.outcome)),
            output: Set(log.output.clone()),
            error: Set(log.error.clone()),
            logged_at: Set(log.logged_at.into()),
        };
        model.insert(&self.db).await.map_err(store_err)?;
        Ok(())
    }

    async fn load_logs(&self, id: SagaId) -> Result<Vec<SagaStepLog>, SagaError> {
        let rows = saga_step_logs::Entity::find()
            .filter(saga_step_logs::Column::SagaId.eq(id.into_inner()))
            .order_by_asc(saga_step_logs::Column::LoggedAt)
            .all(&self.db)
            .await
            .map_err(store_err)?;

        Ok(rows
            .iter()
            .map(|row| SagaStepLog {
                saga_id: SagaId::from_uuid(row.saga_id),
                step_index: u32::try_from(row.step_index).unwrap_or(0),
                step_name: row.step_name.clone(),
                attempt: u32::try_from(row.attempt).unwrap_or(0),
                phase: to_core_phase(&row.phase),
                outcome: to_core_outcome(&row.outcome),
                output: row.output.clone(),
                error: row.error.clone(),
                logged_at: row.logged_at.into(),
            })
            .collect())
    }
}
