//! Database seeder for Trellis development and testing.
//!
//! Seeds a demo organization with a property chart of accounts, the
//! current year's accounting periods, one property, and the jurisdiction
//! compliance rule table (federal defaults plus North Carolina and
//! Charlotte overrides). Rule values live here as data, never as constants
//! in business logic.

use chrono::{Datelike, NaiveDate, Utc};
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trellis_core::compliance::{Jurisdiction, LateFeeType, RuleParameters};
use trellis_core::ledger::AccountType;
use trellis_db::entities::{bills, organizations, properties, sea_orm_active_enums};
use trellis_db::migration::{Migrator, MigratorTrait};
use trellis_db::repositories::account::CreateAccountInput;
use trellis_db::repositories::{AccountRepository, ComplianceRepository, PeriodRepository};
use trellis_shared::types::{BillId, OrganizationId, PropertyId};
use trellis_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let db = trellis_db::connect(&config.database.url).await?;
    Migrator::up(&db, None).await?;
    info!("Schema up to date");

    let now = Utc::now();
    let organization_id = OrganizationId::new();
    organizations::ActiveModel {
        id: Set(organization_id.into_inner()),
        name: Set("Bluebird Property Management".to_string()),
        currency: Set("USD".to_string()),
        created_at: Set(now.into()),
    }
    .insert(&db)
    .await?;
    info!(%organization_id, "Seeded organization");

    let accounts = AccountRepository::new(db.clone());
    let cash = seed_account(&accounts, organization_id, "1000", "Operating Cash", AccountType::Asset).await?;
    let clearing =
        seed_account(&accounts, organization_id, "1050", "Payments Clearing", AccountType::Asset)
            .await?;
    let deposits = seed_account(
        &accounts,
        organization_id,
        "2100",
        "Security Deposits Held",
        AccountType::Liability,
    )
    .await?;
    let prepaid =
        seed_account(&accounts, organization_id, "2200", "Prepaid Rent", AccountType::Liability)
            .await?;
    seed_account(&accounts, organization_id, "4000", "Rent Income", AccountType::Revenue).await?;
    seed_account(&accounts, organization_id, "4100", "Late Fee Income", AccountType::Revenue)
        .await?;
    seed_account(
        &accounts,
        organization_id,
        "6000",
        "Repairs & Maintenance",
        AccountType::Expense,
    )
    .await?;
    info!("Seeded chart of accounts");

    let periods = PeriodRepository::new(db.clone());
    let year = now.date_naive().year();
    periods.generate_year(organization_id, year).await?;
    info!(year, "Seeded accounting periods");

    let property_id = PropertyId::new();
    properties::ActiveModel {
        id: Set(property_id.into_inner()),
        organization_id: Set(organization_id.into_inner()),
        name: Set("Maple Court Apartments".to_string()),
        state: Set("NC".to_string()),
        city: Set("Charlotte".to_string()),
        cash_account_id: Set(cash.id),
        clearing_account_id: Set(clearing.id),
        deposit_account_id: Set(deposits.id),
        prepaid_rent_account_id: Set(prepaid.id),
        reserve_minimum: Set(dec!(500)),
        created_at: Set(now.into()),
    }
    .insert(&db)
    .await?;

    bills::ActiveModel {
        id: Set(BillId::new().into_inner()),
        organization_id: Set(organization_id.into_inner()),
        property_id: Set(property_id.into_inner()),
        description: Set("Quarterly landscaping".to_string()),
        amount: Set(dec!(240)),
        status: Set(sea_orm_active_enums::BillStatus::Open),
        due_date: Set(NaiveDate::from_ymd_opt(year, 12, 15).unwrap()),
        created_at: Set(now.into()),
    }
    .insert(&db)
    .await?;
    info!(%property_id, "Seeded property and open bill");

    seed_compliance_rules(&db).await?;
    info!("Seeded compliance rules");

    Ok(())
}

async fn seed_account(
    accounts: &AccountRepository,
    organization_id: OrganizationId,
    code: &str,
    name: &str,
    account_type: AccountType,
) -> anyhow::Result<trellis_db::entities::accounts::Model> {
    Ok(accounts
        .create(CreateAccountInput {
            organization_id,
            code: code.to_string(),
            name: name.to_string(),
            account_type,
            parent_account_id: None,
        })
        .await?)
}

async fn seed_compliance_rules(db: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    let rules = ComplianceRepository::new(db.clone());
    let from = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

    // Federal defaults
    rules
        .insert(
            Jurisdiction::federal(),
            RuleParameters::LateFee {
                fee_type: LateFeeType::Reasonable,
                max_percentage: Some(dec!(10)),
                max_flat_amount: None,
                grace_period_days: Some(3),
                stacking_allowed: false,
            },
            from,
            None,
        )
        .await?;
    rules
        .insert(
            Jurisdiction::federal(),
            RuleParameters::SecurityDeposit {
                max_months_rent: None,
                return_deadline_days: 30,
                interest_required: false,
            },
            from,
            None,
        )
        .await?;
    rules
        .insert(
            Jurisdiction::federal(),
            RuleParameters::NoticePeriod { days: 30 },
            from,
            None,
        )
        .await?;

    // North Carolina: late fees are the lesser of 5% and $15 after a
    // 5-day grace period.
    rules
        .insert(
            Jurisdiction::state("NC"),
            RuleParameters::LateFee {
                fee_type: LateFeeType::LesserOf,
                max_percentage: Some(dec!(5)),
                max_flat_amount: Some(dec!(15)),
                grace_period_days: Some(5),
                stacking_allowed: false,
            },
            from,
            None,
        )
        .await?;
    rules
        .insert(
            Jurisdiction::state("NC"),
            RuleParameters::SecurityDeposit {
                max_months_rent: Some(dec!(2)),
                return_deadline_days: 30,
                interest_required: false,
            },
            from,
            None,
        )
        .await?;

    // Charlotte tightens the deposit return deadline.
    rules
        .insert(
            Jurisdiction::city("NC", "Charlotte"),
            RuleParameters::SecurityDeposit {
                max_months_rent: Some(dec!(2)),
                return_deadline_days: 21,
                interest_required: false,
            },
            from,
            None,
        )
        .await?;

    Ok(())
}
