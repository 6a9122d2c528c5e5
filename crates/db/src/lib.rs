//! Database layer with `SeaORM` entities and repositories.
//!
//! This crate provides:
//! - `SeaORM` entity definitions
//! - Repository abstractions for data access, including the atomic posting
//!   unit of work (journal + postings + balances + idempotency + outbox)
//! - The outbox relay and its subscriber seam
//! - The saga store and concrete saga definitions
//! - Database migrations (tables, constraints, and the defense-in-depth
//!   triggers that back the application-level rules)

pub mod entities;
pub mod migration;
pub mod relay;
pub mod repositories;
pub mod rls;
pub mod saga;

pub use relay::{EventSubscriber, OutboxRelay};
pub use repositories::{
    AccountRepository, ComplianceRepository, DistributionRepository, JournalRepository,
    OutboxRepository, PeriodRepository,
};

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Establishes a connection to the database.
///
/// # Errors
///
/// Returns an error if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    Database::connect(database_url).await
}
