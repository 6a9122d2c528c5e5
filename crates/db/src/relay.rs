//! Outbox relay (read side).
//!
//! Drains unpublished events and delivers them to every registered
//! subscriber. Delivery is at-least-once: subscribers must process events
//! idempotently. A poison event moves to the dead letter queue after the
//! configured attempt ceiling instead of blocking the relay indefinitely.

use std::sync::Arc;

use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use tracing::{error, info, warn};
use trellis_shared::config::OutboxConfig;

use crate::entities::outbox_events;
use crate::repositories::outbox::{FailureDisposition, OutboxRepository};

/// Error returned by a subscriber for one event.
#[derive(Debug, Error)]
#[error("subscriber '{subscriber}' failed: {message}")]
pub struct SubscriberError {
    /// The failing subscriber.
    pub subscriber: &'static str,
    /// What went wrong.
    pub message: String,
}

/// A downstream consumer of outbox events.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscriber name, for logs and failure attribution.
    fn name(&self) -> &'static str;

    /// Handles one event. Must be idempotent: the same event may be
    /// delivered more than once.
    async fn handle(&self, event: &outbox_events::Model) -> Result<(), SubscriberError>;
}

/// Counters from one drain pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainStats {
    /// Events delivered to all subscribers and marked published.
    pub published: u64,
    /// Events that failed and stay pending.
    pub retried: u64,
    /// Events moved to the dead letter queue this pass.
    pub dead_lettered: u64,
}

/// The outbox relay.
pub struct OutboxRelay {
    repo: OutboxRepository,
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    config: OutboxConfig,
}

impl OutboxRelay {
    /// Creates a relay over the given subscribers.
    #[must_use]
    pub fn new(
        repo: OutboxRepository,
        subscribers: Vec<Arc<dyn EventSubscriber>>,
        config: OutboxConfig,
    ) -> Self {
        Self {
            repo,
            subscribers,
            config,
        }
    }

    /// Drains one batch of pending events.
    ///
    /// # Errors
    ///
    /// Returns an error only for repository failures; per-event subscriber
    /// failures are recorded on the event and reflected in the stats.
    pub async fn drain_once(&self) -> Result<DrainStats, DbErr> {
        let batch = self.repo.fetch_pending(self.config.batch_size).await?;
        let mut stats = DrainStats::default();

        for event in batch {
            match self.deliver(&event).await {
                Ok(()) => {
                    info!(
                        event_id = %event.id,
                        event_type = %event.event_type,
                        "outbox event published"
                    );
                    self.repo.mark_published(event).await?;
                    stats.published += 1;
                }
                Err(e) => {
                    let event_id = event.id;
                    let disposition = self
                        .repo
                        .record_failure(event, &e.to_string(), self.config.max_publish_attempts)
                        .await?;
                    match disposition {
                        FailureDisposition::Retry => {
                            warn!(event_id = %event_id, error = %e, "outbox publish failed, will retry");
                            stats.retried += 1;
                        }
                        FailureDisposition::DeadLetter => {
                            error!(
                                event_id = %event_id,
                                error = %e,
                                "outbox event dead-lettered after {} attempts",
                                self.config.max_publish_attempts
                            );
                            stats.dead_lettered += 1;
                        }
                    }
                }
            }
        }
        Ok(stats)
    }

    async fn deliver(&self, event: &outbox_events::Model) -> Result<(), SubscriberError> {
        for subscriber in &self.subscribers {
            subscriber.handle(event).await?;
        }
        Ok(())
    }
}

/// Appends every event to the structured audit log.
///
/// The simplest subscriber: downstream consumers like notification
/// dispatch and report regeneration follow the same contract.
pub struct AuditLogSubscriber;

#[async_trait]
impl EventSubscriber for AuditLogSubscriber {
    fn name(&self) -> &'static str {
        "audit_log"
    }

    async fn handle(&self, event: &outbox_events::Model) -> Result<(), SubscriberError> {
        info!(
            event_id = %event.id,
            organization_id = %event.organization_id,
            event_type = %event.event_type,
            payload = %event.payload,
            "audit"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::sea_orm_active_enums::OutboxStatus;
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn event() -> outbox_events::Model {
        outbox_events::Model {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            event_type: "journal_entry_posted".to_string(),
            payload: json!({ "entry_id": Uuid::now_v7() }),
            status: OutboxStatus::Pending,
            attempts: 0,
            last_error: None,
            entry_id: None,
            created_at: Utc::now().into(),
            published_at: None,
        }
    }

    #[tokio::test]
    async fn test_audit_subscriber_accepts_events() {
        let subscriber = AuditLogSubscriber;
        assert_eq!(subscriber.name(), "audit_log");
        assert!(subscriber.handle(&event()).await.is_ok());
    }

    #[test]
    fn test_subscriber_error_display() {
        let err = SubscriberError {
            subscriber: "notifications",
            message: "smtp down".to_string(),
        };
        assert_eq!(err.to_string(), "subscriber 'notifications' failed: smtp down");
    }
}
