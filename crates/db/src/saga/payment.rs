//! The rent payment processing saga.
//!
//! Steps: reserve funds → charge processor → post ledger entry → emit
//! receipt event. Compensations: release the hold, refund the charge,
//! reverse the entry. Every side effect carries an idempotency key derived
//! from the payment intent, so a step retried after a crash collides with
//! its own prior attempt instead of double-charging.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use trellis_core::ledger::{DimensionTags, EntryType, PostEntryInput, PostingInput};
use trellis_core::saga::{SagaMemory, SagaStep, StepError};
use trellis_shared::types::money::Currency;
use trellis_shared::types::{
    AccountId, JournalEntryId, OrganizationId, PropertyId, TenantId, UnitId, UserId,
};

use crate::repositories::journal::JournalRepository;
use crate::repositories::outbox::OutboxRepository;

/// Saga kind string persisted on payment saga instances.
pub const PAYMENT_SAGA_KIND: &str = "payment_processing";

/// Errors from the payment processor collaborator.
///
/// A timeout is treated identically to a processor outage for retry and
/// compensation purposes; there is no mid-call cancellation of a submitted
/// instruction, only refund.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The call did not complete within the caller-enforced timeout.
    #[error("gateway call timed out")]
    Timeout,
    /// The processor rejected the instruction.
    #[error("charge declined: {0}")]
    Declined(String),
    /// The processor is unreachable or erroring.
    #[error("gateway unavailable: {0}")]
    Unavailable(String),
}

impl From<GatewayError> for StepError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::Timeout | GatewayError::Unavailable(_) => {
                Self::Transient(err.to_string())
            }
            GatewayError::Declined(_) => Self::Fatal(err.to_string()),
        }
    }
}

/// A charge instruction for the processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChargeRequest {
    /// The stable business identity of this payment.
    pub payment_intent_id: String,
    /// The paying tenant.
    pub tenant_id: TenantId,
    /// Amount to charge.
    pub amount: Decimal,
    /// Currency.
    pub currency: Currency,
}

/// The payment processor collaborator.
///
/// Calls are synchronous with clear success/failure/timeout signaling and
/// support idempotent retries via the idempotency key arguments.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Places a hold on the funds. Returns an authorization id.
    async fn authorize(&self, request: &ChargeRequest) -> Result<String, GatewayError>;

    /// Captures a previously authorized hold. Returns a charge id.
    async fn capture(
        &self,
        authorization_id: &str,
        idempotency_key: &str,
    ) -> Result<String, GatewayError>;

    /// Refunds a captured charge.
    async fn refund(&self, charge_id: &str, idempotency_key: &str) -> Result<(), GatewayError>;

    /// Releases an uncaptured hold.
    async fn release(&self, authorization_id: &str) -> Result<(), GatewayError>;
}

/// The ledger as seen by saga steps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerPort: Send + Sync {
    /// Posts an entry, returning its id. Idempotent under the input's key.
    async fn post_entry(&self, input: PostEntryInput) -> Result<JournalEntryId, StepError>;

    /// Reverses an entry, returning the reversal's id.
    async fn reverse_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        reason: String,
        requested_by: UserId,
        today: NaiveDate,
    ) -> Result<JournalEntryId, StepError>;
}

#[async_trait]
impl LedgerPort for JournalRepository {
    async fn post_entry(&self, input: PostEntryInput) -> Result<JournalEntryId, StepError> {
        let posted = self.post(input).await.map_err(|e| {
            if e.is_retryable() {
                StepError::Transient(e.to_string())
            } else {
                StepError::Fatal(e.to_string())
            }
        })?;
        Ok(JournalEntryId::from_uuid(posted.entry.id))
    }

    async fn reverse_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        reason: String,
        requested_by: UserId,
        today: NaiveDate,
    ) -> Result<JournalEntryId, StepError> {
        let posted = self
            .reverse(organization_id, entry_id, &reason, requested_by, today)
            .await
            .map_err(|e| {
                if e.is_retryable() {
                    StepError::Transient(e.to_string())
                } else {
                    StepError::Fatal(e.to_string())
                }
            })?;
        Ok(JournalEntryId::from_uuid(posted.entry.id))
    }
}

/// The outbox as seen by saga steps.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OutboxPort: Send + Sync {
    /// Enqueues an event for asynchronous delivery.
    async fn emit(
        &self,
        organization_id: OrganizationId,
        event_type: String,
        payload: Value,
    ) -> Result<(), StepError>;
}

#[async_trait]
impl OutboxPort for OutboxRepository {
    async fn emit(
        &self,
        organization_id: OrganizationId,
        event_type: String,
        payload: Value,
    ) -> Result<(), StepError> {
        self.enqueue_standalone(organization_id, &event_type, payload)
            .await
            .map_err(|e| StepError::Transient(e.to_string()))?;
        Ok(())
    }
}

/// Everything a payment saga instance needs to know.
///
/// Serialized into the saga state's `input` so a resurrecting worker can
/// rebuild the step definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Organization collecting the payment.
    pub organization_id: OrganizationId,
    /// Property the payment is for.
    pub property_id: PropertyId,
    /// Unit, when known.
    pub unit_id: Option<UnitId>,
    /// The paying tenant.
    pub tenant_id: TenantId,
    /// Stable business identity of the payment. All idempotency keys
    /// derive from it.
    pub payment_intent_id: String,
    /// Rent amount.
    pub amount: Decimal,
    /// Currency.
    pub currency: Currency,
    /// Ledger date for the entry.
    pub entry_date: NaiveDate,
    /// The property's operating cash account.
    pub cash_account_id: AccountId,
    /// The rent revenue account.
    pub rent_revenue_account_id: AccountId,
    /// Actor recorded on the entry.
    pub requested_by: UserId,
}

impl PaymentRequest {
    fn charge_request(&self) -> ChargeRequest {
        ChargeRequest {
            payment_intent_id: self.payment_intent_id.clone(),
            tenant_id: self.tenant_id,
            amount: self.amount,
            currency: self.currency,
        }
    }

    fn tags(&self) -> DimensionTags {
        DimensionTags {
            property_id: Some(self.property_id),
            unit_id: self.unit_id,
            tenant_id: Some(self.tenant_id),
        }
    }
}

const RESERVE_FUNDS: &str = "reserve_funds";
const CHARGE_PROCESSOR: &str = "charge_processor";
const POST_LEDGER_ENTRY: &str = "post_ledger_entry";
const EMIT_RECEIPT: &str = "emit_receipt";

fn memory_str(memory: &SagaMemory, step: &str, field: &str) -> Result<String, StepError> {
    memory
        .get(step)
        .and_then(|v| v[field].as_str())
        .map(ToString::to_string)
        .ok_or_else(|| StepError::Fatal(format!("missing '{field}' output from step '{step}'")))
}

struct ReserveFundsStep {
    gateway: Arc<dyn PaymentGateway>,
    request: PaymentRequest,
}

#[async_trait]
impl SagaStep for ReserveFundsStep {
    fn name(&self) -> &'static str {
        RESERVE_FUNDS
    }

    async fn execute(&self, _memory: &SagaMemory) -> Result<Value, StepError> {
        let authorization_id = self.gateway.authorize(&self.request.charge_request()).await?;
        Ok(json!({ "authorization_id": authorization_id }))
    }

    async fn compensate(&self, memory: &SagaMemory) -> Result<(), StepError> {
        let authorization_id = memory_str(memory, RESERVE_FUNDS, "authorization_id")?;
        self.gateway.release(&authorization_id).await?;
        Ok(())
    }
}

struct ChargeProcessorStep {
    gateway: Arc<dyn PaymentGateway>,
    request: PaymentRequest,
}

#[async_trait]
impl SagaStep for ChargeProcessorStep {
    fn name(&self) -> &'static str {
        CHARGE_PROCESSOR
    }

    async fn execute(&self, memory: &SagaMemory) -> Result<Value, StepError> {
        let authorization_id = memory_str(memory, RESERVE_FUNDS, "authorization_id")?;
        let idempotency_key = format!("charge:{}", self.request.payment_intent_id);
        let charge_id = self
            .gateway
            .capture(&authorization_id, &idempotency_key)
            .await?;
        Ok(json!({ "charge_id": charge_id }))
    }

    async fn compensate(&self, memory: &SagaMemory) -> Result<(), StepError> {
        // A submitted charge cannot be cancelled, only refunded.
        let charge_id = memory_str(memory, CHARGE_PROCESSOR, "charge_id")?;
        let idempotency_key = format!("refund:{}", self.request.payment_intent_id);
        self.gateway.refund(&charge_id, &idempotency_key).await?;
        Ok(())
    }
}

struct PostLedgerEntryStep {
    ledger: Arc<dyn LedgerPort>,
    request: PaymentRequest,
}

impl PostLedgerEntryStep {
    fn entry_input(&self) -> PostEntryInput {
        let r = &self.request;
        PostEntryInput {
            organization_id: r.organization_id,
            entry_date: r.entry_date,
            description: format!("Rent payment {}", r.payment_intent_id),
            idempotency_key: format!("payment:{}", r.payment_intent_id),
            postings: vec![
                PostingInput {
                    account_id: r.cash_account_id,
                    entry_type: EntryType::Debit,
                    amount: r.amount,
                    memo: None,
                    tags: r.tags(),
                },
                PostingInput {
                    account_id: r.rent_revenue_account_id,
                    entry_type: EntryType::Credit,
                    amount: r.amount,
                    memo: None,
                    tags: r.tags(),
                },
            ],
            created_by: r.requested_by,
        }
    }
}

#[async_trait]
impl SagaStep for PostLedgerEntryStep {
    fn name(&self) -> &'static str {
        POST_LEDGER_ENTRY
    }

    async fn execute(&self, _memory: &SagaMemory) -> Result<Value, StepError> {
        let entry_id = self.ledger.post_entry(self.entry_input()).await?;
        Ok(json!({ "entry_id": entry_id }))
    }

    async fn compensate(&self, memory: &SagaMemory) -> Result<(), StepError> {
        let entry_id = memory_str(memory, POST_LEDGER_ENTRY, "entry_id")?;
        let entry_id: JournalEntryId = entry_id
            .parse()
            .map_err(|_| StepError::Fatal(format!("malformed entry id '{entry_id}'")))?;
        self.ledger
            .reverse_entry(
                self.request.organization_id,
                entry_id,
                format!(
                    "payment saga compensation for {}",
                    self.request.payment_intent_id
                ),
                self.request.requested_by,
                Utc::now().date_naive(),
            )
            .await?;
        Ok(())
    }
}

struct EmitReceiptStep {
    outbox: Arc<dyn OutboxPort>,
    request: PaymentRequest,
}

#[async_trait]
impl SagaStep for EmitReceiptStep {
    fn name(&self) -> &'static str {
        EMIT_RECEIPT
    }

    async fn execute(&self, memory: &SagaMemory) -> Result<Value, StepError> {
        let entry_id = memory_str(memory, POST_LEDGER_ENTRY, "entry_id")?;
        self.outbox
            .emit(
                self.request.organization_id,
                "payment_receipt".to_string(),
                json!({
                    "payment_intent_id": self.request.payment_intent_id,
                    "tenant_id": self.request.tenant_id,
                    "amount": self.request.amount,
                    "entry_id": entry_id,
                }),
            )
            .await?;
        Ok(json!({}))
    }
}

/// Builds the payment saga's step list.
#[must_use]
pub fn payment_saga_steps(
    gateway: Arc<dyn PaymentGateway>,
    ledger: Arc<dyn LedgerPort>,
    outbox: Arc<dyn OutboxPort>,
    request: &PaymentRequest,
) -> Vec<Arc<dyn SagaStep>> {
    vec![
        Arc::new(ReserveFundsStep {
            gateway: gateway.clone(),
            request: request.clone(),
        }),
        Arc::new(ChargeProcessorStep {
            gateway,
            request: request.clone(),
        }),
        Arc::new(PostLedgerEntryStep {
            ledger,
            request: request.clone(),
        }),
        Arc::new(EmitReceiptStep {
            outbox,
            request: request.clone(),
        }),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use rust_decimal_macros::dec;
    use std::time::Duration;
    use trellis_core::saga::{
        InMemorySagaStore, RetryPolicy, SagaOutcome, SagaRunner, SagaState, SagaStatus,
        SagaStepLog, SagaStore, StepOutcome, StepPhase,
    };

    fn request() -> PaymentRequest {
        PaymentRequest {
            organization_id: OrganizationId::new(),
            property_id: PropertyId::new(),
            unit_id: None,
            tenant_id: TenantId::new(),
            payment_intent_id: "pi_123".to_string(),
            amount: dec!(1000),
            currency: Currency::Usd,
            entry_date: chrono::NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            cash_account_id: AccountId::new(),
            rent_revenue_account_id: AccountId::new(),
            requested_by: UserId::new(),
        }
    }

    fn fast_runner(store: &Arc<InMemorySagaStore>) -> SagaRunner<InMemorySagaStore> {
        SagaRunner::new(
            store.clone(),
            RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
        )
    }

    #[tokio::test]
    async fn test_happy_path_charges_posts_and_emits() {
        let req = request();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_authorize()
            .times(1)
            .returning(|_| Ok("auth_1".to_string()));
        gateway
            .expect_capture()
            .with(eq("auth_1"), eq("charge:pi_123"))
            .times(1)
            .returning(|_, _| Ok("ch_1".to_string()));
        gateway.expect_refund().times(0);
        gateway.expect_release().times(0);

        let entry_id = JournalEntryId::new();
        let mut ledger = MockLedgerPort::new();
        ledger
            .expect_post_entry()
            .times(1)
            .returning(move |input| {
                assert_eq!(input.idempotency_key, "payment:pi_123");
                assert_eq!(input.postings.len(), 2);
                Ok(entry_id)
            });
        ledger.expect_reverse_entry().times(0);

        let mut outbox = MockOutboxPort::new();
        outbox
            .expect_emit()
            .times(1)
            .returning(|_, event_type, payload| {
                assert_eq!(event_type, "payment_receipt");
                assert_eq!(payload["payment_intent_id"], "pi_123");
                Ok(())
            });

        let steps = payment_saga_steps(
            Arc::new(gateway),
            Arc::new(ledger),
            Arc::new(outbox),
            &req,
        );

        let store = Arc::new(InMemorySagaStore::new());
        let state = SagaState::new(req.organization_id, PAYMENT_SAGA_KIND);
        let outcome = fast_runner(&store).start(state, &steps).await.unwrap();
        assert_eq!(outcome, SagaOutcome::Completed);
    }

    #[tokio::test]
    async fn test_post_failure_refunds_and_releases() {
        let req = request();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_authorize()
            .times(1)
            .returning(|_| Ok("auth_9".to_string()));
        gateway
            .expect_capture()
            .times(1)
            .returning(|_, _| Ok("ch_9".to_string()));
        gateway
            .expect_refund()
            .with(eq("ch_9"), eq("refund:pi_123"))
            .times(1)
            .returning(|_, _| Ok(()));
        gateway
            .expect_release()
            .with(eq("auth_9"))
            .times(1)
            .returning(|_| Ok(()));

        let mut ledger = MockLedgerPort::new();
        ledger
            .expect_post_entry()
            .times(1)
            .returning(|_| Err(StepError::Fatal("period closed".to_string())));
        ledger.expect_reverse_entry().times(0);

        let mut outbox = MockOutboxPort::new();
        outbox.expect_emit().times(0);

        let steps = payment_saga_steps(
            Arc::new(gateway),
            Arc::new(ledger),
            Arc::new(outbox),
            &req,
        );

        let store = Arc::new(InMemorySagaStore::new());
        let state = SagaState::new(req.organization_id, PAYMENT_SAGA_KIND);
        let saga_id = state.id;
        let outcome = fast_runner(&store).start(state, &steps).await.unwrap();

        assert_eq!(outcome, SagaOutcome::Failed);
        assert_eq!(
            store.load(saga_id).await.unwrap().unwrap().status,
            SagaStatus::Failed
        );
    }

    #[tokio::test]
    async fn test_transient_gateway_outage_retried() {
        let req = request();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_authorize()
            .times(1)
            .returning(|_| Ok("auth_2".to_string()));
        let mut captures = 0u32;
        gateway.expect_capture().times(3).returning(move |_, _| {
            captures += 1;
            if captures < 3 {
                Err(GatewayError::Timeout)
            } else {
                Ok("ch_2".to_string())
            }
        });
        gateway.expect_refund().times(0);
        gateway.expect_release().times(0);

        let mut ledger = MockLedgerPort::new();
        ledger
            .expect_post_entry()
            .times(1)
            .returning(|_| Ok(JournalEntryId::new()));

        let mut outbox = MockOutboxPort::new();
        outbox.expect_emit().times(1).returning(|_, _, _| Ok(()));

        let steps = payment_saga_steps(
            Arc::new(gateway),
            Arc::new(ledger),
            Arc::new(outbox),
            &req,
        );

        let store = Arc::new(InMemorySagaStore::new());
        let state = SagaState::new(req.organization_id, PAYMENT_SAGA_KIND);
        let outcome = fast_runner(&store).start(state, &steps).await.unwrap();
        assert_eq!(outcome, SagaOutcome::Completed);
    }

    #[tokio::test]
    async fn test_resurrection_does_not_recharge() {
        let req = request();

        // Killed after charge committed: neither authorize nor capture may
        // run again.
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_authorize().times(0);
        gateway.expect_capture().times(0);
        gateway.expect_refund().times(0);
        gateway.expect_release().times(0);

        let mut ledger = MockLedgerPort::new();
        ledger
            .expect_post_entry()
            .times(1)
            .returning(|_| Ok(JournalEntryId::new()));

        let mut outbox = MockOutboxPort::new();
        outbox.expect_emit().times(1).returning(|_, _, _| Ok(()));

        let store = Arc::new(InMemorySagaStore::new());
        let mut state = SagaState::new(req.organization_id, PAYMENT_SAGA_KIND);
        state.current_step = 2;
        let saga_id = state.id;
        store.create(&state).await.unwrap();
        for (idx, name, output) in [
            (0, RESERVE_FUNDS, json!({ "authorization_id": "auth_5" })),
            (1, CHARGE_PROCESSOR, json!({ "charge_id": "ch_5" })),
        ] {
            store
                .append_log(&SagaStepLog {
                    saga_id,
                    step_index: idx,
                    step_name: name.to_string(),
                    attempt: 1,
                    phase: StepPhase::Forward,
                    outcome: StepOutcome::Succeeded,
                    output: Some(output),
                    error: None,
                    logged_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let steps = payment_saga_steps(
            Arc::new(gateway),
            Arc::new(ledger),
            Arc::new(outbox),
            &req,
        );

        let outcome = fast_runner(&store).resume(saga_id, &steps).await.unwrap();
        assert_eq!(outcome, SagaOutcome::Completed);
    }

    #[test]
    fn test_gateway_error_classification() {
        assert!(StepError::from(GatewayError::Timeout).is_transient());
        assert!(StepError::from(GatewayError::Unavailable("503".into())).is_transient());
        assert!(!StepError::from(GatewayError::Declined("card".into())).is_transient());
    }
}
