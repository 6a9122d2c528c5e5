//! Saga persistence and concrete saga definitions.

pub mod month_end;
pub mod payment;
pub mod store;

pub use month_end::{month_end_saga_steps, MonthEndRequest, PeriodPort, MONTH_END_SAGA_KIND};
pub use payment::{
    payment_saga_steps, ChargeRequest, GatewayError, LedgerPort, OutboxPort, PaymentGateway,
    PaymentRequest, PAYMENT_SAGA_KIND,
};
pub use store::SeaOrmSagaStore;
