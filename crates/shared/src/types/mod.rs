//! Shared domain types.

pub mod id;
pub mod money;

pub use id::{
    AccountId, AccountingPeriodId, BillId, ComplianceRuleId, IdempotencyRecordId, JournalEntryId,
    OrganizationId, OutboxEventId, PostingId, PropertyId, SagaId, TenantId, UnitId, UserId,
};
pub use money::{Currency, Money};
