//! Active enums backing Postgres enum types.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account classification.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "account_type")]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    /// Asset account.
    #[sea_orm(string_value = "asset")]
    Asset,
    /// Liability account.
    #[sea_orm(string_value = "liability")]
    Liability,
    /// Equity account.
    #[sea_orm(string_value = "equity")]
    Equity,
    /// Revenue account.
    #[sea_orm(string_value = "revenue")]
    Revenue,
    /// Expense account.
    #[sea_orm(string_value = "expense")]
    Expense,
}

/// Accounting period status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "period_status")]
#[serde(rename_all = "lowercase")]
pub enum PeriodStatus {
    /// Open for postings.
    #[sea_orm(string_value = "open")]
    Open,
    /// Closed; no postings allowed.
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// Outbox event status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "outbox_status")]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Awaiting publication.
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Delivered to all subscribers.
    #[sea_orm(string_value = "published")]
    Published,
    /// Exceeded the publish attempt ceiling.
    #[sea_orm(string_value = "dead_letter")]
    DeadLetter,
}

/// Saga status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "saga_status")]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Forward steps executing.
    #[sea_orm(string_value = "running")]
    Running,
    /// Compensations executing.
    #[sea_orm(string_value = "compensating")]
    Compensating,
    /// Finished successfully.
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Compensated after failure.
    #[sea_orm(string_value = "failed")]
    Failed,
    /// A compensation failed; manual intervention required.
    #[sea_orm(string_value = "compensation_failed")]
    CompensationFailed,
}

/// Saga step phase.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "step_phase")]
#[serde(rename_all = "snake_case")]
pub enum StepPhase {
    /// Forward action.
    #[sea_orm(string_value = "forward")]
    Forward,
    /// Compensating action.
    #[sea_orm(string_value = "compensation")]
    Compensation,
}

/// Saga step attempt outcome.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "step_outcome")]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    /// Recorded before execution.
    #[sea_orm(string_value = "started")]
    Started,
    /// Finished successfully.
    #[sea_orm(string_value = "succeeded")]
    Succeeded,
    /// Failed.
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// Compliance rule category.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "rule_category")]
#[serde(rename_all = "snake_case")]
pub enum RuleCategory {
    /// Late fee rules.
    #[sea_orm(string_value = "late_fee")]
    LateFee,
    /// Security deposit rules.
    #[sea_orm(string_value = "security_deposit")]
    SecurityDeposit,
    /// Notice period rules.
    #[sea_orm(string_value = "notice_period")]
    NoticePeriod,
}

/// Bill status.
#[derive(Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "bill_status")]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    /// Unpaid and counted as a pending obligation.
    #[sea_orm(string_value = "open")]
    Open,
    /// Settled.
    #[sea_orm(string_value = "paid")]
    Paid,
    /// Cancelled.
    #[sea_orm(string_value = "void")]
    Void,
}
