//! The month-end close saga.
//!
//! Steps: close the period (snapshotting balances) → emit the period-closed
//! event that triggers downstream report regeneration. Compensation for the
//! close is an audited reopen.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use trellis_core::period::PeriodError;
use trellis_core::saga::{SagaMemory, SagaStep, StepError};
use trellis_shared::types::{AccountingPeriodId, OrganizationId, UserId};

use crate::repositories::period::PeriodRepository;
use crate::saga::payment::OutboxPort;

/// Saga kind string persisted on month-end close instances.
pub const MONTH_END_SAGA_KIND: &str = "month_end_close";

/// The input a month-end close saga instance runs on. Serialized into the
/// saga state's `input` for resurrection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonthEndRequest {
    /// Organization whose period is closing.
    pub organization_id: OrganizationId,
    /// The period to close.
    pub period_id: AccountingPeriodId,
    /// Actor recorded on the close.
    pub actor: UserId,
}

/// The period manager as seen by saga steps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PeriodPort: Send + Sync {
    /// Closes a period, snapshotting balances.
    async fn close_period(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
        actor: UserId,
    ) -> Result<(), StepError>;

    /// Reopens a period with an audit reason.
    async fn reopen_period(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
        reason: String,
        actor: UserId,
    ) -> Result<(), StepError>;
}

fn classify(e: &PeriodError) -> StepError {
    match e {
        PeriodError::Database(msg) => StepError::Transient(msg.clone()),
        other => StepError::Fatal(other.to_string()),
    }
}

#[async_trait]
impl PeriodPort for PeriodRepository {
    async fn close_period(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
        actor: UserId,
    ) -> Result<(), StepError> {
        match self.close(organization_id, period_id, actor).await {
            Ok(()) => Ok(()),
            // A retried close after a crash finds the period already
            // closed; that is this step's own prior success.
            Err(PeriodError::AlreadyClosed(_)) => Ok(()),
            Err(e) => Err(classify(&e)),
        }
    }

    async fn reopen_period(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
        reason: String,
        actor: UserId,
    ) -> Result<(), StepError> {
        match self.reopen(organization_id, period_id, &reason, actor).await {
            Ok(()) => Ok(()),
            Err(PeriodError::AlreadyOpen(_)) => Ok(()),
            Err(e) => Err(classify(&e)),
        }
    }
}

const CLOSE_PERIOD: &str = "close_period";
const EMIT_PERIOD_CLOSED: &str = "emit_period_closed";

struct ClosePeriodStep {
    periods: Arc<dyn PeriodPort>,
    organization_id: OrganizationId,
    period_id: AccountingPeriodId,
    actor: UserId,
}

#[async_trait]
impl SagaStep for ClosePeriodStep {
    fn name(&self) -> &'static str {
        CLOSE_PERIOD
    }

    async fn execute(&self, _memory: &SagaMemory) -> Result<Value, StepError> {
        self.periods
            .close_period(self.organization_id, self.period_id, self.actor)
            .await?;
        Ok(json!({ "period_id": self.period_id }))
    }

    async fn compensate(&self, _memory: &SagaMemory) -> Result<(), StepError> {
        self.periods
            .reopen_period(
                self.organization_id,
                self.period_id,
                "month-end close saga compensated".to_string(),
                self.actor,
            )
            .await
    }
}

struct EmitPeriodClosedStep {
    outbox: Arc<dyn OutboxPort>,
    organization_id: OrganizationId,
    period_id: AccountingPeriodId,
}

#[async_trait]
impl SagaStep for EmitPeriodClosedStep {
    fn name(&self) -> &'static str {
        EMIT_PERIOD_CLOSED
    }

    async fn execute(&self, _memory: &SagaMemory) -> Result<Value, StepError> {
        self.outbox
            .emit(
                self.organization_id,
                "period_closed".to_string(),
                json!({ "period_id": self.period_id }),
            )
            .await?;
        Ok(json!({}))
    }
}

/// Builds the month-end close saga's step list.
#[must_use]
pub fn month_end_saga_steps(
    periods: Arc<dyn PeriodPort>,
    outbox: Arc<dyn OutboxPort>,
    organization_id: OrganizationId,
    period_id: AccountingPeriodId,
    actor: UserId,
) -> Vec<Arc<dyn SagaStep>> {
    vec![
        Arc::new(ClosePeriodStep {
            periods,
            organization_id,
            period_id,
            actor,
        }),
        Arc::new(EmitPeriodClosedStep {
            outbox,
            organization_id,
            period_id,
        }),
    ]
}
