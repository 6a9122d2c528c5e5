//! The saga persistence seam.
//!
//! The runner talks to storage through [`SagaStore`] so the engine logic is
//! identical against Postgres and the in-memory store used in tests.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use trellis_shared::types::SagaId;

use super::error::SagaError;
use super::types::{SagaState, SagaStatus, SagaStepLog};

/// Persistence operations the saga runner needs.
#[async_trait]
pub trait SagaStore: Send + Sync {
    /// Persists a new saga instance.
    async fn create(&self, state: &SagaState) -> Result<(), SagaError>;

    /// Loads a saga instance.
    async fn load(&self, id: SagaId) -> Result<Option<SagaState>, SagaError>;

    /// Updates a saga's status.
    async fn set_status(&self, id: SagaId, status: SagaStatus) -> Result<(), SagaError>;

    /// Advances the next-step cursor. Persisted after every successful
    /// forward step so resurrection resumes exactly past it.
    async fn set_current_step(&self, id: SagaId, step: u32) -> Result<(), SagaError>;

    /// Appends to the step log. The log is append-only.
    async fn append_log(&self, log: &SagaStepLog) -> Result<(), SagaError>;

    /// Loads a saga's full step log in append order.
    async fn load_logs(&self, id: SagaId) -> Result<Vec<SagaStepLog>, SagaError>;
}

/// In-memory saga store for tests and examples.
#[derive(Debug, Default, Clone)]
pub struct InMemorySagaStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    states: HashMap<SagaId, SagaState>,
    logs: Vec<SagaStepLog>,
}

impl InMemorySagaStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SagaStore for InMemorySagaStore {
    async fn create(&self, state: &SagaState) -> Result<(), SagaError> {
        let mut inner = self.inner.lock().await;
        inner.states.insert(state.id, state.clone());
        Ok(())
    }

    async fn load(&self, id: SagaId) -> Result<Option<SagaState>, SagaError> {
        let inner = self.inner.lock().await;
        Ok(inner.states.get(&id).cloned())
    }

    async fn set_status(&self, id: SagaId, status: SagaStatus) -> Result<(), SagaError> {
        let mut inner = self.inner.lock().await;
        let state = inner
            .states
            .get_mut(&id)
            .ok_or(SagaError::NotFound(id))?;
        state.status = status;
        state.updated_at = Utc::now();
        Ok(())
    }

    async fn set_current_step(&self, id: SagaId, step: u32) -> Result<(), SagaError> {
        let mut inner = self.inner.lock().await;
        let state = inner
            .states
            .get_mut(&id)
            .ok_or(SagaError::NotFound(id))?;
        state.current_step = step;
        state.updated_at = Utc::now();
        Ok(())
    }

    async fn append_log(&self, log: &SagaStepLog) -> Result<(), SagaError> {
        let mut inner = self.inner.lock().await;
        inner.logs.push(log.clone());
        Ok(())
    }

    async fn load_logs(&self, id: SagaId) -> Result<Vec<SagaStepLog>, SagaError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .logs
            .iter()
            .filter(|l| l.saga_id == id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trellis_shared::types::OrganizationId;

    #[tokio::test]
    async fn test_state_roundtrip() {
        let store = InMemorySagaStore::new();
        let state = SagaState::new(OrganizationId::new(), "payment_processing");
        store.create(&state).await.unwrap();

        let loaded = store.load(state.id).await.unwrap().unwrap();
        assert_eq!(loaded.kind, "payment_processing");
        assert_eq!(loaded.status, SagaStatus::Running);
        assert_eq!(loaded.current_step, 0);

        store.set_current_step(state.id, 2).await.unwrap();
        store
            .set_status(state.id, SagaStatus::Compensating)
            .await
            .unwrap();

        let loaded = store.load(state.id).await.unwrap().unwrap();
        assert_eq!(loaded.current_step, 2);
        assert_eq!(loaded.status, SagaStatus::Compensating);
    }

    #[tokio::test]
    async fn test_missing_saga_errors() {
        let store = InMemorySagaStore::new();
        let result = store.set_status(SagaId::new(), SagaStatus::Completed).await;
        assert!(matches!(result, Err(SagaError::NotFound(_))));
    }
}
