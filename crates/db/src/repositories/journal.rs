//! Journal repository: the atomic posting unit of work.
//!
//! A post commits the journal entry, its postings, the balance increments,
//! the idempotency record, and the outbox events in one database
//! transaction. A crash between any two leaves none of them applied.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, QueryFilter, QueryOrder, Set, SqlErr, Statement,
    TransactionTrait,
};
use serde_json::json;
use thiserror::Error;
use tracing::info;
use trellis_core::ledger::{
    account_deltas, build_reversal, dimensional_deltas, validate_entry, BalanceDelta,
    DimensionTags, LedgerError, PostEntryInput, Posting,
};
use trellis_core::period::{self, PeriodError};
use trellis_shared::types::{
    AccountId, JournalEntryId, OrganizationId, PostingId, PropertyId, TenantId, UnitId, UserId,
};
use uuid::Uuid;

use crate::entities::{account_balances, journal_entries, period_balance_snapshots, postings};
use crate::repositories::account::{to_account_info, AccountRepository};
use crate::repositories::period::to_core_period;
use crate::repositories::{idempotency, outbox};

/// Errors from journal repository operations.
#[derive(Debug, Error)]
pub enum JournalError {
    /// A ledger validation or state error.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A period gating error.
    #[error(transparent)]
    Period(#[from] PeriodError),

    /// Database error.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
}

impl JournalError {
    /// Returns the stable error code for structured reporting.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Ledger(e) => e.error_code(),
            Self::Period(e) => e.error_code(),
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns true if retrying the operation may succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Ledger(e) => e.is_retryable(),
            Self::Period(_) => false,
            Self::Database(_) => true,
        }
    }
}

/// A committed (or replayed) journal entry with its postings.
#[derive(Debug, Clone)]
pub struct PostedEntry {
    /// The entry header.
    pub entry: journal_entries::Model,
    /// The posting lines.
    pub postings: Vec<postings::Model>,
    /// True when the result was served from the idempotency registry
    /// without re-posting.
    pub replayed: bool,
}

/// Journal repository.
#[derive(Debug, Clone)]
pub struct JournalRepository {
    db: DatabaseConnection,
}

impl JournalRepository {
    /// Creates a new journal repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Posts a balanced journal entry.
    ///
    /// If the idempotency key has already succeeded, the original result is
    /// returned without re-posting; a same-key request with a different
    /// payload is rejected.
    ///
    /// # Errors
    ///
    /// Returns validation errors (`UNBALANCED_ENTRY`, account errors),
    /// period gating errors (`PERIOD_CLOSED`, `PERIOD_NOT_FOUND`), and
    /// database errors.
    pub async fn post(&self, input: PostEntryInput) -> Result<PostedEntry, JournalError> {
        self.post_internal(input, None).await
    }

    /// Reverses a posted entry with a new balancing entry.
    ///
    /// The reversal is dated per the period rule (original date while the
    /// period is open, `today` once closed) and the original is stamped
    /// `reversed_by_entry_id` in the same unit of work. The original is
    /// never edited or deleted beyond that stamp.
    ///
    /// # Errors
    ///
    /// Returns `ALREADY_REVERSED` for a second reversal and the posting
    /// errors of the reversing entry otherwise.
    pub async fn reverse(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        reason: &str,
        requested_by: UserId,
        today: NaiveDate,
    ) -> Result<PostedEntry, JournalError> {
        let entry = self.find_entry(organization_id, entry_id).await?;
        if let Some(reversed_by) = entry.reversed_by_entry_id {
            // Already stamped; surface the original reversal for idempotent
            // callers instead of failing a retried reverse.
            if let Ok(prior) = self
                .load_posted(organization_id, JournalEntryId::from_uuid(reversed_by), true)
                .await
            {
                return Ok(prior);
            }
            return Err(LedgerError::AlreadyReversed(entry_id).into());
        }

        let entry_postings = self.load_postings(entry_id).await?;
        let core_postings: Vec<Posting> = entry_postings.iter().map(to_core_posting).collect();

        let periods = self.load_periods(organization_id).await?;
        let original_period = period::find_period(&periods, entry.entry_date)?;
        let reversal_date =
            period::reversal_date(entry.entry_date, original_period.status, today);

        let input = build_reversal(
            entry_id,
            None,
            &core_postings,
            &entry.description,
            organization_id,
            reversal_date,
            reason,
            requested_by,
        )?;

        self.post_internal(input, Some(entry_id)).await
    }

    /// Reads an account's current balance from the materialized projection.
    /// Balances are never recomputed from postings at read time.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_balance(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
    ) -> Result<Decimal, JournalError> {
        let row = account_balances::Entity::find()
            .filter(account_balances::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(account_balances::Column::AccountId.eq(account_id.into_inner()))
            .one(&self.db)
            .await?;
        Ok(row.map_or(Decimal::ZERO, |r| r.balance))
    }

    /// Reads an account balance as of a date.
    ///
    /// Dates inside a closed period read that period's close snapshot, so
    /// the answer is identical regardless of when it is asked. Dates in an
    /// open period read the live projection.
    ///
    /// # Errors
    ///
    /// Returns `PERIOD_NOT_FOUND` if no period covers the date.
    pub async fn get_balance_as_of(
        &self,
        organization_id: OrganizationId,
        account_id: AccountId,
        as_of: NaiveDate,
    ) -> Result<Decimal, JournalError> {
        let periods = self.load_periods(organization_id).await?;
        let covering = period::find_period(&periods, as_of)?;

        if covering.is_open() {
            return self.get_balance(organization_id, account_id).await;
        }

        let snapshot = period_balance_snapshots::Entity::find()
            .filter(period_balance_snapshots::Column::PeriodId.eq(covering.id.into_inner()))
            .filter(period_balance_snapshots::Column::AccountId.eq(account_id.into_inner()))
            .one(&self.db)
            .await?;
        Ok(snapshot.map_or(Decimal::ZERO, |r| r.balance))
    }

    /// Loads a posted entry with its postings.
    ///
    /// # Errors
    ///
    /// Returns `ENTRY_NOT_FOUND` for unknown ids.
    pub async fn load_posted(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
        replayed: bool,
    ) -> Result<PostedEntry, JournalError> {
        let entry = self.find_entry(organization_id, entry_id).await?;
        let posting_rows = self.load_postings(entry_id).await?;
        Ok(PostedEntry {
            entry,
            postings: posting_rows,
            replayed,
        })
    }

    async fn post_internal(
        &self,
        input: PostEntryInput,
        reverses: Option<JournalEntryId>,
    ) -> Result<PostedEntry, JournalError> {
        let organization_id = input.organization_id;
        let fingerprint = idempotency::request_fingerprint(&input)
            .map_err(|e| LedgerError::Internal(e.to_string()))?;

        // Fast path: this logical operation already happened.
        if let Some(prior) = idempotency::find(&self.db, organization_id, &input.idempotency_key)
            .await?
        {
            return self.replay(organization_id, &prior, &fingerprint).await;
        }

        // Period gate: the single check through which immutable history
        // flows. The storage trigger mirrors it as a second line of defense.
        let periods = self.load_periods(organization_id).await?;
        let open_period = period::ensure_open(&periods, input.entry_date)?;
        let period_id = open_period.id;

        // Validate and resolve against the referenced accounts.
        let account_ids: Vec<AccountId> =
            input.postings.iter().map(|p| p.account_id).collect();
        let account_map =
            AccountRepository::load_for_validation(&self.db, organization_id, &account_ids)
                .await?;
        let (resolved, totals) = validate_entry(&input, |id| {
            account_map
                .get(&id.into_inner())
                .map(to_account_info)
                .ok_or(LedgerError::AccountNotFound(id))
        })?;

        let entry_id = JournalEntryId::new();
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let entry = journal_entries::ActiveModel {
            id: Set(entry_id.into_inner()),
            organization_id: Set(organization_id.into_inner()),
            period_id: Set(period_id.into_inner()),
            entry_date: Set(input.entry_date),
            description: Set(input.description.clone()),
            idempotency_key: Set(input.idempotency_key.clone()),
            reversed_by_entry_id: Set(None),
            reverses_entry_id: Set(reverses.map(JournalEntryId::into_inner)),
            created_by: Set(input.created_by.into_inner()),
            created_at: Set(now.into()),
        };
        let entry = entry.insert(&txn).await?;

        if let Some(original) = reverses {
            self.stamp_reversed(&txn, organization_id, original, entry_id)
                .await?;
        }

        let mut posting_rows = Vec::with_capacity(resolved.len());
        for line in &resolved {
            let posting = postings::ActiveModel {
                id: Set(PostingId::new().into_inner()),
                entry_id: Set(entry_id.into_inner()),
                organization_id: Set(organization_id.into_inner()),
                account_id: Set(line.account_id.into_inner()),
                signed_amount: Set(line.signed_amount),
                memo: Set(line.memo.clone()),
                property_id: Set(line.tags.property_id.map(PropertyId::into_inner)),
                unit_id: Set(line.tags.unit_id.map(UnitId::into_inner)),
                tenant_id: Set(line.tags.tenant_id.map(TenantId::into_inner)),
                created_at: Set(now.into()),
            };
            posting_rows.push(posting.insert(&txn).await?);
        }

        // Atomic increments; never read-modify-write at the application
        // layer, so concurrent posts to a hot account cannot lose updates.
        for delta in account_deltas(&resolved) {
            upsert_account_balance(&txn, organization_id, &delta).await?;
        }
        for delta in dimensional_deltas(&resolved) {
            upsert_dimensional_balance(&txn, organization_id, &delta).await?;
        }

        match idempotency::record(
            &txn,
            organization_id,
            &input.idempotency_key,
            &fingerprint,
            entry_id,
        )
        .await
        {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => {
                // A concurrent request with the same key won the race.
                txn.rollback().await?;
                let winner = idempotency::find(&self.db, organization_id, &input.idempotency_key)
                    .await?
                    .ok_or(LedgerError::PersistenceConflict)?;
                return self.replay(organization_id, &winner, &fingerprint).await;
            }
            Err(e) => return Err(e.into()),
        }

        outbox::enqueue(
            &txn,
            organization_id,
            "journal_entry_posted",
            json!({
                "entry_id": entry_id,
                "organization_id": organization_id,
                "entry_date": input.entry_date,
                "description": input.description,
                "total_debits": totals.debit,
            }),
            Some(entry_id),
        )
        .await?;

        match txn.commit().await {
            Ok(()) => {}
            Err(e) if is_unique_violation(&e) => {
                let winner = idempotency::find(&self.db, organization_id, &input.idempotency_key)
                    .await?
                    .ok_or(LedgerError::PersistenceConflict)?;
                return self.replay(organization_id, &winner, &fingerprint).await;
            }
            Err(e) => return Err(e.into()),
        }

        info!(
            entry_id = %entry_id,
            organization_id = %organization_id,
            entry_date = %input.entry_date,
            postings = posting_rows.len(),
            "journal entry posted"
        );

        Ok(PostedEntry {
            entry,
            postings: posting_rows,
            replayed: false,
        })
    }

    async fn replay(
        &self,
        organization_id: OrganizationId,
        prior: &crate::entities::idempotency_records::Model,
        fingerprint: &str,
    ) -> Result<PostedEntry, JournalError> {
        if prior.request_fingerprint != fingerprint {
            return Err(LedgerError::IdempotencyPayloadMismatch {
                key: prior.idempotency_key.clone(),
            }
            .into());
        }
        self.load_posted(
            organization_id,
            JournalEntryId::from_uuid(prior.entry_id),
            true,
        )
        .await
    }

    /// Stamps the original entry as reversed. The storage trigger permits
    /// exactly this column to change, exactly once.
    async fn stamp_reversed(
        &self,
        txn: &DatabaseTransaction,
        organization_id: OrganizationId,
        original: JournalEntryId,
        reversal: JournalEntryId,
    ) -> Result<(), JournalError> {
        let result = txn
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r"UPDATE journal_entries
                  SET reversed_by_entry_id = $1
                  WHERE id = $2 AND organization_id = $3 AND reversed_by_entry_id IS NULL",
                [
                    reversal.into_inner().into(),
                    original.into_inner().into(),
                    organization_id.into_inner().into(),
                ],
            ))
            .await?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::AlreadyReversed(original).into());
        }
        Ok(())
    }

    async fn find_entry(
        &self,
        organization_id: OrganizationId,
        entry_id: JournalEntryId,
    ) -> Result<journal_entries::Model, JournalError> {
        journal_entries::Entity::find_by_id(entry_id.into_inner())
            .filter(journal_entries::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await?
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id).into())
    }

    async fn load_postings(
        &self,
        entry_id: JournalEntryId,
    ) -> Result<Vec<postings::Model>, JournalError> {
        Ok(postings::Entity::find()
            .filter(postings::Column::EntryId.eq(entry_id.into_inner()))
            .order_by_asc(postings::Column::CreatedAt)
            .all(&self.db)
            .await?)
    }

    async fn load_periods(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<trellis_core::period::AccountingPeriod>, JournalError> {
        let rows = crate::entities::accounting_periods::Entity::find()
            .filter(
                crate::entities::accounting_periods::Column::OrganizationId
                    .eq(organization_id.into_inner()),
            )
            .all(&self.db)
            .await?;
        Ok(rows.iter().map(to_core_period).collect())
    }
}

fn to_core_posting(model: &postings::Model) -> Posting {
    Posting {
        id: PostingId::from_uuid(model.id),
        entry_id: JournalEntryId::from_uuid(model.entry_id),
        account_id: AccountId::from_uuid(model.account_id),
        signed_amount: model.signed_amount,
        memo: model.memo.clone(),
        tags: DimensionTags {
            property_id: model.property_id.map(PropertyId::from_uuid),
            unit_id: model.unit_id.map(UnitId::from_uuid),
            tenant_id: model.tenant_id.map(TenantId::from_uuid),
        },
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

async fn upsert_account_balance(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    delta: &BalanceDelta,
) -> Result<(), DbErr> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r"INSERT INTO account_balances (id, organization_id, account_id, balance, updated_at)
          VALUES ($1, $2, $3, $4, now())
          ON CONFLICT (organization_id, account_id)
          DO UPDATE SET balance = account_balances.balance + EXCLUDED.balance, updated_at = now()",
        [
            Uuid::now_v7().into(),
            organization_id.into_inner().into(),
            delta.account_id.into_inner().into(),
            delta.delta.into(),
        ],
    ))
    .await?;
    Ok(())
}

async fn upsert_dimensional_balance(
    txn: &DatabaseTransaction,
    organization_id: OrganizationId,
    delta: &BalanceDelta,
) -> Result<(), DbErr> {
    txn.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r"INSERT INTO dimensional_balances
              (id, organization_id, account_id, dimension_key,
               property_id, unit_id, tenant_id, balance, updated_at)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, now())
          ON CONFLICT (organization_id, account_id, dimension_key)
          DO UPDATE SET balance = dimensional_balances.balance + EXCLUDED.balance,
                        updated_at = now()",
        [
            Uuid::now_v7().into(),
            organization_id.into_inner().into(),
            delta.account_id.into_inner().into(),
            delta.tags.dimension_key().into(),
            delta.tags.property_id.map(PropertyId::into_inner).into(),
            delta.tags.unit_id.map(UnitId::into_inner).into(),
            delta.tags.tenant_id.map(TenantId::into_inner).into(),
            delta.delta.into(),
        ],
    ))
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_flow_through() {
        let err: JournalError = LedgerError::UnbalancedEntry {
            debit: Decimal::ONE,
            credit: Decimal::ZERO,
        }
        .into();
        assert_eq!(err.error_code(), "UNBALANCED_ENTRY");

        let err: JournalError = PeriodError::NotFound(
            NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        )
        .into();
        assert_eq!(err.error_code(), "PERIOD_NOT_FOUND");
    }

    #[test]
    fn test_retryable_split() {
        let validation: JournalError = LedgerError::InsufficientPostings.into();
        assert!(!validation.is_retryable());

        let conflict: JournalError = LedgerError::PersistenceConflict.into();
        assert!(conflict.is_retryable());

        let period: JournalError = PeriodError::Closed {
            period_id: trellis_shared::types::AccountingPeriodId::new(),
            date: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        }
        .into();
        assert!(!period.is_retryable());
    }

    #[test]
    fn test_core_posting_mapping() {
        let model = postings::Model {
            id: Uuid::now_v7(),
            entry_id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            account_id: Uuid::now_v7(),
            signed_amount: Decimal::new(-100_000, 2),
            memo: Some("rent".to_string()),
            property_id: Some(Uuid::now_v7()),
            unit_id: None,
            tenant_id: None,
            created_at: Utc::now().into(),
        };

        let core = to_core_posting(&model);
        assert_eq!(core.signed_amount, Decimal::new(-100_000, 2));
        assert!(!core.is_debit());
        assert_eq!(
            core.tags.property_id.map(PropertyId::into_inner),
            model.property_id
        );
        assert!(core.tags.unit_id.is_none());
    }
}
