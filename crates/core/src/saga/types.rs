//! Saga state and step log types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use trellis_shared::types::{OrganizationId, SagaId};

/// Status of a saga instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Forward steps are executing.
    Running,
    /// A step failed; compensations are running in reverse order.
    Compensating,
    /// All forward steps completed.
    Completed,
    /// All compensations completed after a failure.
    Failed,
    /// A compensation itself failed. Terminal; requires manual intervention.
    CompensationFailed,
}

impl SagaStatus {
    /// Returns the string representation of the status.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Compensating => "compensating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::CompensationFailed => "compensation_failed",
        }
    }

    /// Parses a status from a string.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "compensating" => Some(Self::Compensating),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "compensation_failed" => Some(Self::CompensationFailed),
            _ => None,
        }
    }

    /// Returns true if no further work will ever happen on this saga.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::CompensationFailed)
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A saga instance's persisted state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaState {
    /// Unique identifier.
    pub id: SagaId,
    /// Organization the saga operates on behalf of.
    pub organization_id: OrganizationId,
    /// Saga kind (e.g. "payment_processing"), matched to step definitions
    /// on resurrection.
    pub kind: String,
    /// Current status.
    pub status: SagaStatus,
    /// Index of the next forward step to execute.
    pub current_step: u32,
    /// The saga's input, persisted so a resurrecting worker can rebuild
    /// the step definitions without the original request in memory.
    pub input: serde_json::Value,
    /// When the saga was created.
    pub created_at: DateTime<Utc>,
    /// When the saga state last changed.
    pub updated_at: DateTime<Utc>,
}

impl SagaState {
    /// Creates a new running saga at step zero.
    #[must_use]
    pub fn new(organization_id: OrganizationId, kind: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: SagaId::new(),
            organization_id,
            kind: kind.into(),
            status: SagaStatus::Running,
            current_step: 0,
            input: serde_json::Value::Null,
            created_at: now,
            updated_at: now,
        }
    }

    /// Attaches the saga's input payload.
    #[must_use]
    pub fn with_input(mut self, input: serde_json::Value) -> Self {
        self.input = input;
        self
    }
}

/// Which direction a step attempt ran in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// The step's forward action.
    Forward,
    /// The step's compensating action.
    Compensation,
}

/// Outcome of a step attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Attempt recorded before execution.
    Started,
    /// Attempt finished successfully.
    Succeeded,
    /// Attempt failed.
    Failed,
}

/// One row of the append-only step log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStepLog {
    /// The saga this attempt belongs to.
    pub saga_id: SagaId,
    /// Zero-based step index.
    pub step_index: u32,
    /// Step name.
    pub step_name: String,
    /// Attempt number, starting at 1.
    pub attempt: u32,
    /// Forward or compensation.
    pub phase: StepPhase,
    /// Started / succeeded / failed.
    pub outcome: StepOutcome,
    /// The step's output value, recorded on forward success.
    pub output: Option<serde_json::Value>,
    /// The error message, recorded on failure.
    pub error: Option<String>,
    /// When the row was logged.
    pub logged_at: DateTime<Utc>,
}

/// Outputs of successfully completed forward steps, keyed by step name.
///
/// Rebuilt from the step log on resurrection so later steps (and
/// compensations) see what earlier steps produced even across a crash.
#[derive(Debug, Clone, Default)]
pub struct SagaMemory {
    outputs: HashMap<String, serde_json::Value>,
}

impl SagaMemory {
    /// Rebuilds memory from persisted step logs.
    #[must_use]
    pub fn from_logs(logs: &[SagaStepLog]) -> Self {
        let mut outputs = HashMap::new();
        for log in logs {
            if log.phase == StepPhase::Forward && log.outcome == StepOutcome::Succeeded {
                if let Some(output) = &log.output {
                    outputs.insert(log.step_name.clone(), output.clone());
                }
            }
        }
        Self { outputs }
    }

    /// Records a step's output.
    pub fn insert(&mut self, step_name: impl Into<String>, output: serde_json::Value) {
        self.outputs.insert(step_name.into(), output);
    }

    /// Returns a step's raw output.
    #[must_use]
    pub fn get(&self, step_name: &str) -> Option<&serde_json::Value> {
        self.outputs.get(step_name)
    }

    /// Deserializes a step's output into a typed value.
    #[must_use]
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, step_name: &str) -> Option<T> {
        self.outputs
            .get(step_name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            SagaStatus::Running,
            SagaStatus::Compensating,
            SagaStatus::Completed,
            SagaStatus::Failed,
            SagaStatus::CompensationFailed,
        ] {
            assert_eq!(SagaStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(SagaStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!SagaStatus::Running.is_terminal());
        assert!(!SagaStatus::Compensating.is_terminal());
        assert!(SagaStatus::Completed.is_terminal());
        assert!(SagaStatus::Failed.is_terminal());
        assert!(SagaStatus::CompensationFailed.is_terminal());
    }

    #[test]
    fn test_memory_from_logs_takes_succeeded_forward_only() {
        let saga_id = SagaId::new();
        let log = |name: &str, phase, outcome, output: Option<serde_json::Value>| SagaStepLog {
            saga_id,
            step_index: 0,
            step_name: name.to_string(),
            attempt: 1,
            phase,
            outcome,
            output,
            error: None,
            logged_at: Utc::now(),
        };

        let logs = vec![
            log("charge", StepPhase::Forward, StepOutcome::Started, None),
            log(
                "charge",
                StepPhase::Forward,
                StepOutcome::Succeeded,
                Some(json!({"charge_id": "ch_1"})),
            ),
            log("post", StepPhase::Forward, StepOutcome::Failed, None),
            log("charge", StepPhase::Compensation, StepOutcome::Succeeded, None),
        ];

        let memory = SagaMemory::from_logs(&logs);
        assert_eq!(
            memory.get("charge").unwrap()["charge_id"],
            json!("ch_1")
        );
        assert!(memory.get("post").is_none());
    }

    #[test]
    fn test_memory_typed_read() {
        let mut memory = SagaMemory::default();
        memory.insert("reserve", json!({"hold": "auth_9"}));

        #[derive(serde::Deserialize)]
        struct Hold {
            hold: String,
        }
        let hold: Hold = memory.get_as("reserve").unwrap();
        assert_eq!(hold.hold, "auth_9");
        assert!(memory.get_as::<Hold>("missing").is_none());
    }
}
