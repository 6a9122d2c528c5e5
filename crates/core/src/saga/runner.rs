//! The saga runner: forward execution, retries, and compensation.
//!
//! The runner persists progress through a [`SagaStore`] before and after
//! every attempt. Steps perform their side effects through idempotent
//! operations (the ledger's idempotent post, gateway calls carrying
//! idempotency keys), so re-executing a step after a crash is safe even if
//! the prior attempt's side effect already landed.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tracing::{error, info, warn};
use trellis_shared::types::SagaId;

use super::error::{SagaError, StepError};
use super::machine;
use super::retry::RetryPolicy;
use super::store::SagaStore;
use super::types::{SagaMemory, SagaState, SagaStatus, SagaStepLog, StepOutcome, StepPhase};

/// A named saga step with a forward action and a compensating action.
///
/// `execute` returns a JSON value recorded in the step log; later steps and
/// compensations read it through [`SagaMemory`], including across a crash.
#[async_trait]
pub trait SagaStep: Send + Sync {
    /// Stable step name, used as the memory key and in the step log.
    fn name(&self) -> &'static str;

    /// The forward action.
    async fn execute(&self, memory: &SagaMemory) -> Result<Value, StepError>;

    /// The compensating action. Default is a no-op for steps with no side
    /// effects to undo (e.g. event emission).
    async fn compensate(&self, _memory: &SagaMemory) -> Result<(), StepError> {
        Ok(())
    }
}

/// How a saga run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SagaOutcome {
    /// All forward steps completed.
    Completed,
    /// A step failed and every compensation succeeded.
    Failed,
    /// A compensation failed. Manual intervention required.
    CompensationFailed,
}

/// Drives saga instances against a [`SagaStore`].
pub struct SagaRunner<S: SagaStore> {
    store: Arc<S>,
    policy: RetryPolicy,
}

impl<S: SagaStore> SagaRunner<S> {
    /// Creates a runner.
    pub fn new(store: Arc<S>, policy: RetryPolicy) -> Self {
        Self { store, policy }
    }

    /// Starts a new saga instance and drives it to an outcome.
    ///
    /// # Errors
    ///
    /// Returns `SagaError` only for engine/store failures; business failures
    /// surface as `SagaOutcome::Failed` / `CompensationFailed`.
    pub async fn start(
        &self,
        state: SagaState,
        steps: &[Arc<dyn SagaStep>],
    ) -> Result<SagaOutcome, SagaError> {
        self.store.create(&state).await?;
        info!(saga_id = %state.id, kind = %state.kind, "saga started");
        self.drive(state, steps).await
    }

    /// Resumes a saga from its persisted state ("resurrection").
    ///
    /// A saga killed after step N committed resumes at step N+1 without
    /// re-executing step N's side effect; a saga killed mid-compensation
    /// continues compensating the steps not yet compensated.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::NotFound` for unknown ids and
    /// `SagaError::AlreadyTerminal` for sagas that already reached an
    /// outcome.
    pub async fn resume(
        &self,
        id: SagaId,
        steps: &[Arc<dyn SagaStep>],
    ) -> Result<SagaOutcome, SagaError> {
        let state = self.store.load(id).await?.ok_or(SagaError::NotFound(id))?;
        if state.status.is_terminal() {
            return Err(SagaError::AlreadyTerminal {
                saga_id: id,
                status: state.status,
            });
        }
        info!(saga_id = %id, kind = %state.kind, status = %state.status, "saga resumed");
        self.drive(state, steps).await
    }

    async fn drive(
        &self,
        state: SagaState,
        steps: &[Arc<dyn SagaStep>],
    ) -> Result<SagaOutcome, SagaError> {
        let logs = self.store.load_logs(state.id).await?;
        let memory = SagaMemory::from_logs(&logs);

        match state.status {
            SagaStatus::Running => self.run_forward(&state, steps, memory).await,
            SagaStatus::Compensating => {
                let already = compensated_indices(&logs);
                self.compensate(state.id, steps, state.current_step, &memory, &already)
                    .await
            }
            terminal => Err(SagaError::AlreadyTerminal {
                saga_id: state.id,
                status: terminal,
            }),
        }
    }

    async fn run_forward(
        &self,
        state: &SagaState,
        steps: &[Arc<dyn SagaStep>],
        mut memory: SagaMemory,
    ) -> Result<SagaOutcome, SagaError> {
        let total = u32::try_from(steps.len()).map_err(|_| {
            SagaError::Store("saga has more steps than the engine supports".to_string())
        })?;

        let mut idx = state.current_step;
        while idx < total {
            let step = &steps[idx as usize];
            match self.attempt_forward(state.id, idx, step.as_ref(), &memory).await? {
                Ok(output) => {
                    memory.insert(step.name(), output);
                    idx += 1;
                    self.store.set_current_step(state.id, idx).await?;
                }
                Err(last_error) => {
                    warn!(
                        saga_id = %state.id,
                        step = step.name(),
                        error = %last_error,
                        "saga step failed, compensating"
                    );
                    machine::transition(SagaStatus::Running, SagaStatus::Compensating)?;
                    self.store
                        .set_status(state.id, SagaStatus::Compensating)
                        .await?;
                    return self
                        .compensate(state.id, steps, idx, &memory, &HashSet::new())
                        .await;
                }
            }
        }

        machine::transition(SagaStatus::Running, SagaStatus::Completed)?;
        self.store.set_status(state.id, SagaStatus::Completed).await?;
        info!(saga_id = %state.id, kind = %state.kind, "saga completed");
        Ok(SagaOutcome::Completed)
    }

    /// Executes one forward step under the retry policy.
    ///
    /// Returns `Ok(Ok(output))` on success and `Ok(Err(message))` once the
    /// step has failed fatally or exhausted its attempts.
    async fn attempt_forward(
        &self,
        saga_id: SagaId,
        step_index: u32,
        step: &dyn SagaStep,
        memory: &SagaMemory,
    ) -> Result<Result<Value, String>, SagaError> {
        for attempt in 1..=self.policy.max_attempts {
            self.log(saga_id, step_index, step.name(), attempt, StepPhase::Forward, StepOutcome::Started, None, None)
                .await?;

            match step.execute(memory).await {
                Ok(output) => {
                    self.log(
                        saga_id,
                        step_index,
                        step.name(),
                        attempt,
                        StepPhase::Forward,
                        StepOutcome::Succeeded,
                        Some(output.clone()),
                        None,
                    )
                    .await?;
                    return Ok(Ok(output));
                }
                Err(err) => {
                    self.log(
                        saga_id,
                        step_index,
                        step.name(),
                        attempt,
                        StepPhase::Forward,
                        StepOutcome::Failed,
                        None,
                        Some(err.to_string()),
                    )
                    .await?;

                    if err.is_transient() && self.policy.allows_retry(attempt) {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                        continue;
                    }
                    return Ok(Err(err.to_string()));
                }
            }
        }
        Ok(Err("retry attempts exhausted".to_string()))
    }

    /// Runs compensations for completed steps in reverse order.
    ///
    /// `upto` is the index of the failed step; steps `0..upto` completed and
    /// get compensated, skipping any already compensated before a crash.
    async fn compensate(
        &self,
        saga_id: SagaId,
        steps: &[Arc<dyn SagaStep>],
        upto: u32,
        memory: &SagaMemory,
        already_compensated: &HashSet<u32>,
    ) -> Result<SagaOutcome, SagaError> {
        for idx in (0..upto).rev() {
            if already_compensated.contains(&idx) {
                continue;
            }
            let step = &steps[idx as usize];
            if !self
                .attempt_compensation(saga_id, idx, step.as_ref(), memory)
                .await?
            {
                machine::transition(SagaStatus::Compensating, SagaStatus::CompensationFailed)?;
                self.store
                    .set_status(saga_id, SagaStatus::CompensationFailed)
                    .await?;
                self.log_compensation_failure(saga_id, step.name()).await?;
                return Ok(SagaOutcome::CompensationFailed);
            }
        }

        machine::transition(SagaStatus::Compensating, SagaStatus::Failed)?;
        self.store.set_status(saga_id, SagaStatus::Failed).await?;
        warn!(saga_id = %saga_id, "saga failed; all compensations applied");
        Ok(SagaOutcome::Failed)
    }

    async fn attempt_compensation(
        &self,
        saga_id: SagaId,
        step_index: u32,
        step: &dyn SagaStep,
        memory: &SagaMemory,
    ) -> Result<bool, SagaError> {
        for attempt in 1..=self.policy.max_attempts {
            self.log(saga_id, step_index, step.name(), attempt, StepPhase::Compensation, StepOutcome::Started, None, None)
                .await?;

            match step.compensate(memory).await {
                Ok(()) => {
                    self.log(
                        saga_id,
                        step_index,
                        step.name(),
                        attempt,
                        StepPhase::Compensation,
                        StepOutcome::Succeeded,
                        None,
                        None,
                    )
                    .await?;
                    return Ok(true);
                }
                Err(err) => {
                    self.log(
                        saga_id,
                        step_index,
                        step.name(),
                        attempt,
                        StepPhase::Compensation,
                        StepOutcome::Failed,
                        None,
                        Some(err.to_string()),
                    )
                    .await?;

                    if err.is_transient() && self.policy.allows_retry(attempt) {
                        tokio::time::sleep(self.policy.delay_for(attempt)).await;
                        continue;
                    }
                    return Ok(false);
                }
            }
        }
        Ok(false)
    }

    /// Highest-severity report with the full step history for the operator.
    async fn log_compensation_failure(
        &self,
        saga_id: SagaId,
        failed_step: &str,
    ) -> Result<(), SagaError> {
        let history = self.store.load_logs(saga_id).await?;
        error!(
            saga_id = %saga_id,
            step = failed_step,
            "SAGA_COMPENSATION_FAILED: manual intervention required"
        );
        for log in &history {
            error!(
                saga_id = %saga_id,
                step = %log.step_name,
                attempt = log.attempt,
                phase = ?log.phase,
                outcome = ?log.outcome,
                error = log.error.as_deref().unwrap_or(""),
                "saga step history"
            );
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn log(
        &self,
        saga_id: SagaId,
        step_index: u32,
        step_name: &str,
        attempt: u32,
        phase: StepPhase,
        outcome: StepOutcome,
        output: Option<Value>,
        error: Option<String>,
    ) -> Result<(), SagaError> {
        self.store
            .append_log(&SagaStepLog {
                saga_id,
                step_index,
                step_name: step_name.to_string(),
                attempt,
                phase,
                outcome,
                output,
                error,
                logged_at: Utc::now(),
            })
            .await
    }
}

/// Step indices whose compensation already succeeded, from persisted logs.
fn compensated_indices(logs: &[SagaStepLog]) -> HashSet<u32> {
    logs.iter()
        .filter(|l| l.phase == StepPhase::Compensation && l.outcome == StepOutcome::Succeeded)
        .map(|l| l.step_index)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::saga::store::InMemorySagaStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;
    use trellis_shared::types::OrganizationId;

    struct TestStep {
        name: &'static str,
        exec_count: Arc<AtomicU32>,
        comp_order: Arc<StdMutex<Vec<String>>>,
        transient_failures: u32,
        fatal: bool,
        compensation_fails: bool,
    }

    impl TestStep {
        fn base(name: &'static str, comp_order: &Arc<StdMutex<Vec<String>>>) -> Self {
            Self {
                name,
                exec_count: Arc::new(AtomicU32::new(0)),
                comp_order: comp_order.clone(),
                transient_failures: 0,
                fatal: false,
                compensation_fails: false,
            }
        }

        fn ok(name: &'static str, comp_order: &Arc<StdMutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self::base(name, comp_order))
        }

        fn flaky(
            name: &'static str,
            failures: u32,
            comp_order: &Arc<StdMutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                transient_failures: failures,
                ..Self::base(name, comp_order)
            })
        }

        fn fatal(name: &'static str, comp_order: &Arc<StdMutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self {
                fatal: true,
                ..Self::base(name, comp_order)
            })
        }

        fn with_bad_compensation(
            name: &'static str,
            comp_order: &Arc<StdMutex<Vec<String>>>,
        ) -> Arc<Self> {
            Arc::new(Self {
                compensation_fails: true,
                ..Self::base(name, comp_order)
            })
        }

        fn executions(&self) -> u32 {
            self.exec_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SagaStep for TestStep {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn execute(&self, _memory: &SagaMemory) -> Result<Value, StepError> {
            let attempt = self.exec_count.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fatal {
                return Err(StepError::Fatal(format!("{} refused", self.name)));
            }
            if attempt <= self.transient_failures {
                return Err(StepError::Transient(format!("{} timed out", self.name)));
            }
            Ok(json!({ "step": self.name, "attempt": attempt }))
        }

        async fn compensate(&self, _memory: &SagaMemory) -> Result<(), StepError> {
            self.comp_order.lock().unwrap().push(self.name.to_string());
            if self.compensation_fails {
                return Err(StepError::Fatal(format!("{} cannot undo", self.name)));
            }
            Ok(())
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(2),
        }
    }

    fn runner(store: &Arc<InMemorySagaStore>) -> SagaRunner<InMemorySagaStore> {
        SagaRunner::new(store.clone(), fast_policy())
    }

    fn as_steps(steps: &[Arc<TestStep>]) -> Vec<Arc<dyn SagaStep>> {
        steps.iter().map(|s| s.clone() as Arc<dyn SagaStep>).collect()
    }

    #[tokio::test]
    async fn test_happy_path_completes() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::ok("reserve_funds", &comp_order),
            TestStep::ok("charge_processor", &comp_order),
            TestStep::ok("post_ledger_entry", &comp_order),
        ];
        let state = SagaState::new(OrganizationId::new(), "payment_processing");
        let saga_id = state.id;

        let outcome = runner(&store)
            .start(state, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::Completed);
        let final_state = store.load(saga_id).await.unwrap().unwrap();
        assert_eq!(final_state.status, SagaStatus::Completed);
        assert_eq!(final_state.current_step, 3);
        assert!(comp_order.lock().unwrap().is_empty());
        for step in &steps {
            assert_eq!(step.executions(), 1);
        }
    }

    #[tokio::test]
    async fn test_transient_failures_retried() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::ok("reserve_funds", &comp_order),
            TestStep::flaky("charge_processor", 2, &comp_order),
        ];
        let state = SagaState::new(OrganizationId::new(), "payment_processing");
        let saga_id = state.id;

        let outcome = runner(&store)
            .start(state, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::Completed);
        assert_eq!(steps[1].executions(), 3);

        let logs = store.load_logs(saga_id).await.unwrap();
        let charge_failures = logs
            .iter()
            .filter(|l| l.step_name == "charge_processor" && l.outcome == StepOutcome::Failed)
            .count();
        assert_eq!(charge_failures, 2);
    }

    #[tokio::test]
    async fn test_fatal_failure_compensates_in_reverse_order() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::ok("reserve_funds", &comp_order),
            TestStep::ok("charge_processor", &comp_order),
            TestStep::fatal("post_ledger_entry", &comp_order),
        ];
        let state = SagaState::new(OrganizationId::new(), "payment_processing");
        let saga_id = state.id;

        let outcome = runner(&store)
            .start(state, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::Failed);
        assert_eq!(
            store.load(saga_id).await.unwrap().unwrap().status,
            SagaStatus::Failed
        );
        // Fatal errors are not retried.
        assert_eq!(steps[2].executions(), 1);
        // Completed steps compensated in reverse order; failed step is not.
        assert_eq!(
            *comp_order.lock().unwrap(),
            vec!["charge_processor".to_string(), "reserve_funds".to_string()]
        );
    }

    #[tokio::test]
    async fn test_exhausted_retries_trigger_compensation() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::ok("reserve_funds", &comp_order),
            TestStep::flaky("charge_processor", 99, &comp_order),
        ];
        let state = SagaState::new(OrganizationId::new(), "payment_processing");

        let outcome = runner(&store)
            .start(state, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::Failed);
        assert_eq!(steps[1].executions(), 3);
        assert_eq!(*comp_order.lock().unwrap(), vec!["reserve_funds".to_string()]);
    }

    #[tokio::test]
    async fn test_compensation_failure_is_terminal() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::with_bad_compensation("charge_processor", &comp_order),
            TestStep::fatal("post_ledger_entry", &comp_order),
        ];
        let state = SagaState::new(OrganizationId::new(), "payment_processing");
        let saga_id = state.id;

        let outcome = runner(&store)
            .start(state, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::CompensationFailed);
        assert_eq!(
            store.load(saga_id).await.unwrap().unwrap().status,
            SagaStatus::CompensationFailed
        );
    }

    #[tokio::test]
    async fn test_resurrection_skips_committed_steps() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::ok("reserve_funds", &comp_order),
            TestStep::ok("charge_processor", &comp_order),
        ];

        // Simulate a process killed after step 0 committed: state advanced
        // to step 1 with step 0's success in the log.
        let mut state = SagaState::new(OrganizationId::new(), "payment_processing");
        state.current_step = 1;
        store.create(&state).await.unwrap();
        store
            .append_log(&SagaStepLog {
                saga_id: state.id,
                step_index: 0,
                step_name: "reserve_funds".to_string(),
                attempt: 1,
                phase: StepPhase::Forward,
                outcome: StepOutcome::Succeeded,
                output: Some(json!({ "hold": "auth_7" })),
                error: None,
                logged_at: Utc::now(),
            })
            .await
            .unwrap();

        let outcome = runner(&store)
            .resume(state.id, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::Completed);
        // Step 0's side effect is not re-executed.
        assert_eq!(steps[0].executions(), 0);
        assert_eq!(steps[1].executions(), 1);
    }

    #[tokio::test]
    async fn test_memory_survives_resurrection() {
        struct ReadingStep {
            seen: Arc<StdMutex<Option<String>>>,
        }

        #[async_trait]
        impl SagaStep for ReadingStep {
            fn name(&self) -> &'static str {
                "emit_receipt"
            }

            async fn execute(&self, memory: &SagaMemory) -> Result<Value, StepError> {
                let hold = memory
                    .get("reserve_funds")
                    .and_then(|v| v["hold"].as_str())
                    .map(ToString::to_string);
                *self.seen.lock().unwrap() = hold;
                Ok(json!({}))
            }
        }

        let store = Arc::new(InMemorySagaStore::new());
        let mut state = SagaState::new(OrganizationId::new(), "payment_processing");
        state.current_step = 1;
        store.create(&state).await.unwrap();
        store
            .append_log(&SagaStepLog {
                saga_id: state.id,
                step_index: 0,
                step_name: "reserve_funds".to_string(),
                attempt: 1,
                phase: StepPhase::Forward,
                outcome: StepOutcome::Succeeded,
                output: Some(json!({ "hold": "auth_42" })),
                error: None,
                logged_at: Utc::now(),
            })
            .await
            .unwrap();

        let seen = Arc::new(StdMutex::new(None));
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps: Vec<Arc<dyn SagaStep>> = vec![
            TestStep::ok("reserve_funds", &comp_order),
            Arc::new(ReadingStep { seen: seen.clone() }),
        ];

        runner(&store).resume(state.id, &steps).await.unwrap();
        assert_eq!(seen.lock().unwrap().as_deref(), Some("auth_42"));
    }

    #[tokio::test]
    async fn test_resume_mid_compensation_skips_compensated() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [
            TestStep::ok("reserve_funds", &comp_order),
            TestStep::ok("charge_processor", &comp_order),
        ];

        // Killed mid-compensation: steps 0 and 1 completed, failure at
        // step 2 moved the saga to compensating, step 1 already undone.
        let mut state = SagaState::new(OrganizationId::new(), "payment_processing");
        state.status = SagaStatus::Compensating;
        state.current_step = 2;
        store.create(&state).await.unwrap();
        store
            .append_log(&SagaStepLog {
                saga_id: state.id,
                step_index: 1,
                step_name: "charge_processor".to_string(),
                attempt: 1,
                phase: StepPhase::Compensation,
                outcome: StepOutcome::Succeeded,
                output: None,
                error: None,
                logged_at: Utc::now(),
            })
            .await
            .unwrap();

        let outcome = runner(&store)
            .resume(state.id, &as_steps(&steps))
            .await
            .unwrap();

        assert_eq!(outcome, SagaOutcome::Failed);
        assert_eq!(*comp_order.lock().unwrap(), vec!["reserve_funds".to_string()]);
    }

    #[tokio::test]
    async fn test_resume_terminal_saga_rejected() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let mut state = SagaState::new(OrganizationId::new(), "payment_processing");
        state.status = SagaStatus::Completed;
        store.create(&state).await.unwrap();

        let steps = [TestStep::ok("reserve_funds", &comp_order)];
        let result = runner(&store).resume(state.id, &as_steps(&steps)).await;
        assert!(matches!(result, Err(SagaError::AlreadyTerminal { .. })));
    }

    #[tokio::test]
    async fn test_resume_unknown_saga_rejected() {
        let store = Arc::new(InMemorySagaStore::new());
        let comp_order = Arc::new(StdMutex::new(Vec::new()));
        let steps = [TestStep::ok("reserve_funds", &comp_order)];

        let result = runner(&store)
            .resume(trellis_shared::types::SagaId::new(), &as_steps(&steps))
            .await;
        assert!(matches!(result, Err(SagaError::NotFound(_))));
    }
}
