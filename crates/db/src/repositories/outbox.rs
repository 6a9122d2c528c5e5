//! Outbox repository (write side).
//!
//! Events are enqueued inside the same transaction as the state change
//! they describe; the relay in [`crate::relay`] drains and publishes them
//! asynchronously with at-least-once semantics.

use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use trellis_shared::types::{JournalEntryId, OrganizationId, OutboxEventId};

use crate::entities::{outbox_events, sea_orm_active_enums::OutboxStatus};

/// Where a failed publish attempt leaves an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureDisposition {
    /// Stays pending for another drain pass.
    Retry,
    /// Exceeded the attempt ceiling; parked so it cannot block the relay.
    DeadLetter,
}

/// Pure decision: retry or dead-letter after a failure.
#[must_use]
pub fn disposition_after_failure(attempts_so_far: i32, max_attempts: i32) -> FailureDisposition {
    if attempts_so_far + 1 >= max_attempts {
        FailureDisposition::DeadLetter
    } else {
        FailureDisposition::Retry
    }
}

/// Enqueues an event inside the caller's unit of work.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub async fn enqueue<C: ConnectionTrait>(
    conn: &C,
    organization_id: OrganizationId,
    event_type: &str,
    payload: serde_json::Value,
    entry_id: Option<JournalEntryId>,
) -> Result<outbox_events::Model, DbErr> {
    let event = outbox_events::ActiveModel {
        id: Set(OutboxEventId::new().into_inner()),
        organization_id: Set(organization_id.into_inner()),
        event_type: Set(event_type.to_string()),
        payload: Set(payload),
        status: Set(OutboxStatus::Pending),
        attempts: Set(0),
        last_error: Set(None),
        entry_id: Set(entry_id.map(JournalEntryId::into_inner)),
        created_at: Set(Utc::now().into()),
        published_at: Set(None),
    };
    event.insert(conn).await
}

/// Outbox repository (read side, used by the relay).
#[derive(Debug, Clone)]
pub struct OutboxRepository {
    db: DatabaseConnection,
}

impl OutboxRepository {
    /// Creates a new outbox repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Enqueues an event in its own transaction (for callers outside the
    /// posting unit of work, e.g. saga receipt events).
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn enqueue_standalone(
        &self,
        organization_id: OrganizationId,
        event_type: &str,
        payload: serde_json::Value,
    ) -> Result<outbox_events::Model, DbErr> {
        enqueue(&self.db, organization_id, event_type, payload, None).await
    }

    /// Fetches the oldest unpublished events.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn fetch_pending(&self, limit: u64) -> Result<Vec<outbox_events::Model>, DbErr> {
        outbox_events::Entity::find()
            .filter(outbox_events::Column::Status.eq(OutboxStatus::Pending))
            .order_by_asc(outbox_events::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await
    }

    /// Marks an event delivered.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn mark_published(&self, event: outbox_events::Model) -> Result<(), DbErr> {
        let mut active: outbox_events::ActiveModel = event.into();
        active.status = Set(OutboxStatus::Published);
        active.published_at = Set(Some(Utc::now().into()));
        active.update(&self.db).await?;
        Ok(())
    }

    /// Records a failed publish attempt, dead-lettering past the ceiling.
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn record_failure(
        &self,
        event: outbox_events::Model,
        error: &str,
        max_attempts: i32,
    ) -> Result<FailureDisposition, DbErr> {
        let disposition = disposition_after_failure(event.attempts, max_attempts);
        let attempts = event.attempts + 1;
        let mut active: outbox_events::ActiveModel = event.into();
        active.attempts = Set(attempts);
        active.last_error = Set(Some(error.to_string()));
        if disposition == FailureDisposition::DeadLetter {
            active.status = Set(OutboxStatus::DeadLetter);
        }
        active.update(&self.db).await?;
        Ok(disposition)
    }

    /// Counts dead-lettered events, for operator visibility.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn dead_letter_count(&self) -> Result<u64, DbErr> {
        use sea_orm::PaginatorTrait;
        outbox_events::Entity::find()
            .filter(outbox_events::Column::Status.eq(OutboxStatus::DeadLetter))
            .count(&self.db)
            .await
    }
}
