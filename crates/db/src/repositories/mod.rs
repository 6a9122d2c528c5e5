//! Repository abstractions for data access.

pub mod account;
pub mod compliance;
pub mod distribution;
pub mod idempotency;
pub mod journal;
pub mod outbox;
pub mod period;

pub use account::AccountRepository;
pub use compliance::ComplianceRepository;
pub use distribution::DistributionRepository;
pub use journal::{JournalError, JournalRepository, PostedEntry};
pub use outbox::OutboxRepository;
pub use period::PeriodRepository;
