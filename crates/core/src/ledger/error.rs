//! Ledger error types for validation and state errors.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;
use trellis_shared::types::{AccountId, JournalEntryId};

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    // ========== Validation Errors ==========
    /// Entry must have at least 2 postings.
    #[error("Entry must have at least 2 postings")]
    InsufficientPostings,

    /// Entry is not balanced (debits != credits under exact comparison).
    #[error("Entry is not balanced. Debit: {debit}, Credit: {credit}")]
    UnbalancedEntry {
        /// Total debit amount.
        debit: Decimal,
        /// Total credit amount.
        credit: Decimal,
    },

    /// Posting amount cannot be zero.
    #[error("Posting amount cannot be zero")]
    ZeroAmount,

    /// Posting amount cannot be negative.
    #[error("Posting amount cannot be negative")]
    NegativeAmount,

    // ========== Account Errors ==========
    /// Account not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// Account is inactive and cannot be posted to.
    #[error("Account {0} is inactive")]
    AccountInactive(AccountId),

    /// Account belongs to a different organization.
    #[error("Account {0} does not belong to the organization")]
    AccountOrganizationMismatch(AccountId),

    /// Account type cannot change once postings reference the account.
    #[error("Cannot change account type for account {0}: it has postings")]
    AccountTypeImmutable(AccountId),

    // ========== Period Errors ==========
    /// No accounting period covers the entry date.
    #[error("No accounting period found for date {0}")]
    PeriodNotFound(NaiveDate),

    /// The accounting period covering the entry date is closed.
    #[error("Accounting period for date {0} is closed")]
    PeriodClosed(NaiveDate),

    // ========== Idempotency Errors ==========
    /// The idempotency key was used before with a different payload.
    #[error("Idempotency key '{key}' was already used with a different payload")]
    IdempotencyPayloadMismatch {
        /// The conflicting key.
        key: String,
    },

    // ========== Reversal Errors ==========
    /// The entry has already been reversed.
    #[error("Entry {0} has already been reversed")]
    AlreadyReversed(JournalEntryId),

    /// The entry to reverse has no postings (corrupt read).
    #[error("Entry {0} has no postings to reverse")]
    EmptyReversal(JournalEntryId),

    /// Entry not found.
    #[error("Journal entry not found: {0}")]
    EntryNotFound(JournalEntryId),

    // ========== Concurrency Errors ==========
    /// Write conflicted with a concurrent transaction; retry may succeed.
    #[error("Persistence conflict, please retry")]
    PersistenceConflict,

    // ========== Database Errors ==========
    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LedgerError {
    /// Returns the stable error code for structured reporting.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InsufficientPostings => "INSUFFICIENT_POSTINGS",
            Self::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            Self::ZeroAmount => "ZERO_AMOUNT",
            Self::NegativeAmount => "NEGATIVE_AMOUNT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::AccountInactive(_) => "ACCOUNT_INACTIVE",
            Self::AccountOrganizationMismatch(_) => "ACCOUNT_ORGANIZATION_MISMATCH",
            Self::AccountTypeImmutable(_) => "ACCOUNT_TYPE_IMMUTABLE",
            Self::PeriodNotFound(_) => "PERIOD_NOT_FOUND",
            Self::PeriodClosed(_) => "PERIOD_CLOSED",
            Self::IdempotencyPayloadMismatch { .. } => "IDEMPOTENCY_PAYLOAD_MISMATCH",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::EmptyReversal(_) => "EMPTY_REVERSAL",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
            Self::PersistenceConflict => "PERSISTENCE_CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns true if this error is transient and retrying may succeed.
    ///
    /// Validation errors are never retryable: they indicate a caller bug or
    /// a genuine business block and must surface immediately.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::PersistenceConflict | Self::Database(_))
    }
}
