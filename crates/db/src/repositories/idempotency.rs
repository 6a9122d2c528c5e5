//! Idempotency registry.
//!
//! Deduplicates logically-identical write requests by a caller-supplied
//! key. The unique constraint on (organization, key) is the arbiter under
//! concurrency: the first insert to commit wins, later inserts collide and
//! are served the original outcome. Records are never updated.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use serde::Serialize;
use sha2::{Digest, Sha256};
use trellis_shared::types::{IdempotencyRecordId, JournalEntryId, OrganizationId};

use crate::entities::idempotency_records;

/// SHA-256 hex fingerprint of a request payload.
///
/// Stored with the record so a retry carrying the same key but a different
/// payload is detected as a caller bug instead of silently replaying the
/// original outcome.
///
/// # Errors
///
/// Returns an error if the payload cannot be serialized.
pub fn request_fingerprint<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    let canonical = serde_json::to_vec(payload)?;
    let digest = Sha256::digest(&canonical);
    Ok(hex::encode(digest))
}

/// Looks up a prior outcome for the key.
///
/// # Errors
///
/// Returns an error if the query fails.
pub async fn find<C: ConnectionTrait>(
    conn: &C,
    organization_id: OrganizationId,
    idempotency_key: &str,
) -> Result<Option<idempotency_records::Model>, DbErr> {
    idempotency_records::Entity::find()
        .filter(idempotency_records::Column::OrganizationId.eq(organization_id.into_inner()))
        .filter(idempotency_records::Column::IdempotencyKey.eq(idempotency_key))
        .one(conn)
        .await
}

/// Records an outcome inside the caller's unit of work.
///
/// Committing the record atomically with the write it describes closes the
/// race between two concurrent requests both observing "not yet reserved":
/// exactly one commit carries the row, the other hits the unique
/// constraint.
///
/// # Errors
///
/// Returns the underlying database error; a unique-constraint violation
/// means another request won the race.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    organization_id: OrganizationId,
    idempotency_key: &str,
    fingerprint: &str,
    entry_id: JournalEntryId,
) -> Result<(), DbErr> {
    let record = idempotency_records::ActiveModel {
        id: Set(IdempotencyRecordId::new().into_inner()),
        organization_id: Set(organization_id.into_inner()),
        idempotency_key: Set(idempotency_key.to_string()),
        request_fingerprint: Set(fingerprint.to_string()),
        entry_id: Set(entry_id.into_inner()),
        created_at: Set(Utc::now().into()),
    };
    record.insert(conn).await?;
    Ok(())
}
