//! `SeaORM` entity definitions.

pub mod account_balances;
pub mod accounting_periods;
pub mod accounts;
pub mod bills;
pub mod compliance_rules;
pub mod dimensional_balances;
pub mod idempotency_records;
pub mod journal_entries;
pub mod organizations;
pub mod outbox_events;
pub mod period_balance_snapshots;
pub mod postings;
pub mod properties;
pub mod saga_states;
pub mod saga_step_logs;
pub mod sea_orm_active_enums;
