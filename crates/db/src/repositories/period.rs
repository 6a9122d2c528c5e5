//! Period repository: creation, the close/reopen lifecycle, and the
//! period-end balance snapshots that back as-of reads.

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbBackend, EntityTrait, FromQueryResult,
    QueryFilter, Set, Statement, TransactionTrait,
};
use tracing::{info, warn};
use trellis_core::period::{
    self, AccountingPeriod, PeriodError, PeriodStatus,
};
use trellis_shared::types::{AccountingPeriodId, OrganizationId, UserId};
use uuid::Uuid;

use crate::entities::{accounting_periods, period_balance_snapshots, sea_orm_active_enums};

/// Maps a period row into the domain type the gating rules work on.
#[must_use]
pub fn to_core_period(model: &accounting_periods::Model) -> AccountingPeriod {
    AccountingPeriod {
        id: AccountingPeriodId::from_uuid(model.id),
        organization_id: OrganizationId::from_uuid(model.organization_id),
        name: model.name.clone(),
        start_date: model.start_date,
        end_date: model.end_date,
        status: match model.status {
            sea_orm_active_enums::PeriodStatus::Open => PeriodStatus::Open,
            sea_orm_active_enums::PeriodStatus::Closed => PeriodStatus::Closed,
        },
        closed_at: model.closed_at.map(Into::into),
        closed_by: model.closed_by.map(UserId::from_uuid),
        reopened_at: model.reopened_at.map(Into::into),
        reopened_by: model.reopened_by.map(UserId::from_uuid),
        reopen_reason: model.reopen_reason.clone(),
    }
}

#[derive(Debug, FromQueryResult)]
struct AccountSum {
    account_id: Uuid,
    total: Decimal,
}

/// Period repository.
#[derive(Debug, Clone)]
pub struct PeriodRepository {
    db: DatabaseConnection,
}

impl PeriodRepository {
    /// Creates a new period repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Lists an organization's periods, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn list(
        &self,
        organization_id: OrganizationId,
    ) -> Result<Vec<AccountingPeriod>, PeriodError> {
        let rows = accounting_periods::Entity::find()
            .filter(accounting_periods::Column::OrganizationId.eq(organization_id.into_inner()))
            .all(&self.db)
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;
        let mut periods: Vec<AccountingPeriod> = rows.iter().map(to_core_period).collect();
        periods.sort_by_key(|p| p.start_date);
        Ok(periods)
    }

    /// The posting gate: finds the open period covering `date`.
    ///
    /// # Errors
    ///
    /// Returns `PERIOD_NOT_FOUND` or `PERIOD_CLOSED`.
    pub async fn ensure_open(
        &self,
        organization_id: OrganizationId,
        date: NaiveDate,
    ) -> Result<AccountingPeriod, PeriodError> {
        let periods = self.list(organization_id).await?;
        period::ensure_open(&periods, date).cloned()
    }

    /// Creates a period after checking for overlap. The database exclusion
    /// constraint backs this check under concurrency.
    ///
    /// # Errors
    ///
    /// Returns `PERIOD_OVERLAP` / `PERIOD_INVALID_RANGE` on a bad range.
    pub async fn create(
        &self,
        organization_id: OrganizationId,
        name: String,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<AccountingPeriod, PeriodError> {
        let existing = self.list(organization_id).await?;
        period::validate_no_overlap(&existing, start_date, end_date)?;

        let now = Utc::now().into();
        let model = accounting_periods::ActiveModel {
            id: Set(AccountingPeriodId::new().into_inner()),
            organization_id: Set(organization_id.into_inner()),
            name: Set(name),
            start_date: Set(start_date),
            end_date: Set(end_date),
            status: Set(sea_orm_active_enums::PeriodStatus::Open),
            closed_at: Set(None),
            closed_by: Set(None),
            reopened_at: Set(None),
            reopened_by: Set(None),
            reopen_reason: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let inserted = model
            .insert(&self.db)
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;
        Ok(to_core_period(&inserted))
    }

    /// Generates twelve monthly periods for a calendar year.
    ///
    /// # Errors
    ///
    /// Returns an overlap error if any month collides with an existing
    /// period.
    pub async fn generate_year(
        &self,
        organization_id: OrganizationId,
        year: i32,
    ) -> Result<Vec<AccountingPeriod>, PeriodError> {
        let mut created = Vec::with_capacity(12);
        for draft in period::generate_monthly_periods(organization_id, year) {
            created.push(
                self.create(organization_id, draft.name, draft.start_date, draft.end_date)
                    .await?,
            );
        }
        Ok(created)
    }

    /// Closes a period, snapshotting every account's balance as of the
    /// period's end date in the same unit of work. Close is one-way under
    /// normal operation.
    ///
    /// # Errors
    ///
    /// Returns `PERIOD_ALREADY_CLOSED` for a second close.
    pub async fn close(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
        closed_by: UserId,
    ) -> Result<(), PeriodError> {
        let row = self.find_row(organization_id, period_id).await?;
        if row.status == sea_orm_active_enums::PeriodStatus::Closed {
            return Err(PeriodError::AlreadyClosed(period_id));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        // One-time aggregation at close; reads afterwards hit the snapshot,
        // never the postings.
        let sums = AccountSum::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r"SELECT p.account_id AS account_id,
                     COALESCE(SUM(p.signed_amount), 0) AS total
              FROM postings p
              JOIN journal_entries e ON e.id = p.entry_id
              WHERE e.organization_id = $1 AND e.entry_date <= $2
              GROUP BY p.account_id",
            [organization_id.into_inner().into(), row.end_date.into()],
        ))
        .all(&txn)
        .await
        .map_err(|e| PeriodError::Database(e.to_string()))?;

        let now = Utc::now();
        for sum in &sums {
            let snapshot = period_balance_snapshots::ActiveModel {
                id: Set(Uuid::now_v7()),
                organization_id: Set(organization_id.into_inner()),
                period_id: Set(period_id.into_inner()),
                account_id: Set(sum.account_id),
                balance: Set(sum.total),
                created_at: Set(now.into()),
            };
            snapshot
                .insert(&txn)
                .await
                .map_err(|e| PeriodError::Database(e.to_string()))?;
        }

        let mut active: accounting_periods::ActiveModel = row.into();
        active.status = Set(sea_orm_active_enums::PeriodStatus::Closed);
        active.closed_at = Set(Some(now.into()));
        active.closed_by = Set(Some(closed_by.into_inner()));
        active.updated_at = Set(now.into());
        active
            .update(&txn)
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        info!(
            period_id = %period_id,
            organization_id = %organization_id,
            closed_by = %closed_by,
            snapshots = sums.len(),
            "accounting period closed"
        );
        Ok(())
    }

    /// Reopens a closed period. Exceptional and auditable: requires a
    /// reason and actor, deletes the period's close snapshots (they are
    /// regenerated at the next close), and is logged.
    ///
    /// # Errors
    ///
    /// Returns `REOPEN_REASON_REQUIRED` for an empty reason and
    /// `PERIOD_ALREADY_OPEN` if the period is not closed.
    pub async fn reopen(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
        reason: &str,
        reopened_by: UserId,
    ) -> Result<(), PeriodError> {
        if reason.trim().is_empty() {
            return Err(PeriodError::ReopenReasonRequired);
        }

        let row = self.find_row(organization_id, period_id).await?;
        if row.status == sea_orm_active_enums::PeriodStatus::Open {
            return Err(PeriodError::AlreadyOpen(period_id));
        }

        let txn = self
            .db
            .begin()
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        period_balance_snapshots::Entity::delete_many()
            .filter(period_balance_snapshots::Column::PeriodId.eq(period_id.into_inner()))
            .exec(&txn)
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        let now = Utc::now();
        let mut active: accounting_periods::ActiveModel = row.into();
        active.status = Set(sea_orm_active_enums::PeriodStatus::Open);
        active.reopened_at = Set(Some(now.into()));
        active.reopened_by = Set(Some(reopened_by.into_inner()));
        active.reopen_reason = Set(Some(reason.to_string()));
        active.updated_at = Set(now.into());
        active
            .update(&txn)
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        txn.commit()
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?;

        warn!(
            period_id = %period_id,
            organization_id = %organization_id,
            reopened_by = %reopened_by,
            reason,
            "accounting period reopened; close artifacts invalidated"
        );
        Ok(())
    }

    async fn find_row(
        &self,
        organization_id: OrganizationId,
        period_id: AccountingPeriodId,
    ) -> Result<accounting_periods::Model, PeriodError> {
        accounting_periods::Entity::find_by_id(period_id.into_inner())
            .filter(accounting_periods::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await
            .map_err(|e| PeriodError::Database(e.to_string()))?
            .ok_or(PeriodError::PeriodMissing(period_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_core_period_maps_status() {
        let row = accounting_periods::Model {
            id: Uuid::now_v7(),
            organization_id: Uuid::now_v7(),
            name: "March 2026".to_string(),
            start_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2026, 3, 31).unwrap(),
            status: sea_orm_active_enums::PeriodStatus::Closed,
            closed_at: Some(Utc::now().into()),
            closed_by: Some(Uuid::now_v7()),
            reopened_at: None,
            reopened_by: None,
            reopen_reason: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let core = to_core_period(&row);
        assert_eq!(core.status, PeriodStatus::Closed);
        assert!(!core.is_open());
        assert!(core.closed_at.is_some());
        assert!(core.contains_date(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()));
    }
}
