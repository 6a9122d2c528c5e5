//! Distribution data assembly.
//!
//! Builds the per-property funds picture the safety calculator consumes.
//! Each input comes from its own ledger account or table: cash, unsettled
//! inflows, open bills, trust liabilities, never from a mixed "total
//! cash" figure.

use std::str::FromStr;

use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter};
use trellis_core::distribution::{
    compute_batch, compute_distributable, request_distribution, BatchDistribution,
    DistributionDecision, DistributionOutcome, PropertyFunds,
};
use trellis_core::ledger::{natural_balance, AccountType};
use trellis_shared::types::money::Currency;
use trellis_shared::types::{OrganizationId, PropertyId};
use uuid::Uuid;

use crate::entities::{account_balances, bills, organizations, properties, sea_orm_active_enums};

/// Distribution repository.
#[derive(Debug, Clone)]
pub struct DistributionRepository {
    db: DatabaseConnection,
}

impl DistributionRepository {
    /// Creates a new distribution repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Computes the distributable figure for one property.
    ///
    /// # Errors
    ///
    /// Returns an error if the property is missing or a query fails.
    pub async fn compute_distributable(
        &self,
        organization_id: OrganizationId,
        property_id: PropertyId,
    ) -> Result<DistributionOutcome, DbErr> {
        let funds = self.load_funds(organization_id, property_id).await?;
        Ok(compute_distributable(&funds))
    }

    /// Decides a concrete distribution request for one property.
    ///
    /// # Errors
    ///
    /// Returns an error if the property is missing or a query fails.
    pub async fn request_distribution(
        &self,
        organization_id: OrganizationId,
        property_id: PropertyId,
        requested: Decimal,
    ) -> Result<DistributionDecision, DbErr> {
        let funds = self.load_funds(organization_id, property_id).await?;
        Ok(request_distribution(&funds, requested))
    }

    /// Runs the batch calculation across all of an organization's
    /// properties. Blocked properties are named; the rest proceed.
    ///
    /// # Errors
    ///
    /// Returns an error if a query fails.
    pub async fn compute_batch(
        &self,
        organization_id: OrganizationId,
    ) -> Result<BatchDistribution, DbErr> {
        let rows = properties::Entity::find()
            .filter(properties::Column::OrganizationId.eq(organization_id.into_inner()))
            .all(&self.db)
            .await?;

        let mut all_funds = Vec::with_capacity(rows.len());
        for row in &rows {
            all_funds.push(self.assemble_funds(organization_id, row).await?);
        }
        Ok(compute_batch(&all_funds))
    }

    /// Loads and assembles the funds picture for one property.
    ///
    /// # Errors
    ///
    /// Returns an error if the property is missing or a query fails.
    pub async fn load_funds(
        &self,
        organization_id: OrganizationId,
        property_id: PropertyId,
    ) -> Result<PropertyFunds, DbErr> {
        let property = properties::Entity::find_by_id(property_id.into_inner())
            .filter(properties::Column::OrganizationId.eq(organization_id.into_inner()))
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("property {property_id}")))?;
        self.assemble_funds(organization_id, &property).await
    }

    async fn assemble_funds(
        &self,
        organization_id: OrganizationId,
        property: &properties::Model,
    ) -> Result<PropertyFunds, DbErr> {
        let currency = self.org_currency(organization_id).await?;

        let cash = self
            .balance_of(organization_id, property.cash_account_id)
            .await?;
        let clearing = self
            .balance_of(organization_id, property.clearing_account_id)
            .await?;
        // Liability accounts carry credit (negative) signed sums; the
        // calculator wants their magnitude.
        let deposits = natural_balance(
            AccountType::Liability,
            self.balance_of(organization_id, property.deposit_account_id)
                .await?,
        );
        let prepaid = natural_balance(
            AccountType::Liability,
            self.balance_of(organization_id, property.prepaid_rent_account_id)
                .await?,
        );

        let open_bills = self.open_bill_total(property.id).await?;

        Ok(PropertyFunds {
            property_id: PropertyId::from_uuid(property.id),
            currency,
            // Cash picture is operating cash plus in-flight inflows; the
            // clearing balance is then excluded as unsettled.
            cash_balance: cash + clearing,
            pending_inflows: clearing,
            reserve_minimum: property.reserve_minimum,
            pending_bills: open_bills,
            trust_liabilities: deposits + prepaid,
        })
    }

    async fn balance_of(
        &self,
        organization_id: OrganizationId,
        account_id: Uuid,
    ) -> Result<Decimal, DbErr> {
        let row = account_balances::Entity::find()
            .filter(account_balances::Column::OrganizationId.eq(organization_id.into_inner()))
            .filter(account_balances::Column::AccountId.eq(account_id))
            .one(&self.db)
            .await?;
        Ok(row.map_or(Decimal::ZERO, |r| r.balance))
    }

    async fn open_bill_total(&self, property_id: Uuid) -> Result<Decimal, DbErr> {
        let rows = bills::Entity::find()
            .filter(bills::Column::PropertyId.eq(property_id))
            .filter(bills::Column::Status.eq(sea_orm_active_enums::BillStatus::Open))
            .all(&self.db)
            .await?;
        Ok(rows.iter().map(|b| b.amount).sum())
    }

    async fn org_currency(&self, organization_id: OrganizationId) -> Result<Currency, DbErr> {
        let org = organizations::Entity::find_by_id(organization_id.into_inner())
            .one(&self.db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("organization {organization_id}")))?;
        Currency::from_str(&org.currency)
            .map_err(|e| DbErr::Custom(format!("organization {organization_id}: {e}")))
    }
}
