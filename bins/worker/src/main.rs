//! Trellis background worker.
//!
//! Runs the two asynchronous halves of the engine:
//! - the outbox relay, draining unpublished events to subscribers
//! - the saga sweep, resuming stalled sagas from their persisted state

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use trellis_core::saga::{RetryPolicy, SagaRunner, SagaState};
use trellis_db::relay::AuditLogSubscriber;
use trellis_db::repositories::PeriodRepository;
use trellis_db::saga::{
    month_end_saga_steps, MonthEndRequest, SeaOrmSagaStore, MONTH_END_SAGA_KIND,
    PAYMENT_SAGA_KIND,
};
use trellis_db::{connect, OutboxRelay, OutboxRepository};
use trellis_shared::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trellis=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load()?;
    let db = connect(&config.database.url).await?;
    info!("Connected to database");

    let relay = OutboxRelay::new(
        OutboxRepository::new(db.clone()),
        vec![Arc::new(AuditLogSubscriber)],
        config.outbox.clone(),
    );
    let store = Arc::new(SeaOrmSagaStore::new(db.clone()));
    let runner = SagaRunner::new(store.clone(), RetryPolicy::from_config(&config.saga));
    let periods = Arc::new(PeriodRepository::new(db.clone()));
    let outbox = Arc::new(OutboxRepository::new(db));

    let mut poll = tokio::time::interval(Duration::from_millis(config.outbox.poll_interval_ms));
    let mut sweep = tokio::time::interval(Duration::from_millis(config.saga.sweep_interval_ms));
    info!(
        poll_interval_ms = config.outbox.poll_interval_ms,
        sweep_interval_ms = config.saga.sweep_interval_ms,
        "worker started"
    );

    loop {
        tokio::select! {
            _ = poll.tick() => {
                match relay.drain_once().await {
                    Ok(stats) if stats.published + stats.retried + stats.dead_lettered > 0 => {
                        info!(
                            published = stats.published,
                            retried = stats.retried,
                            dead_lettered = stats.dead_lettered,
                            "outbox drain pass"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "outbox drain failed"),
                }
            }
            _ = sweep.tick() => {
                sweep_stalled_sagas(&store, &runner, &periods, &outbox, &config).await;
            }
            _ = signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Resumes sagas that stopped making progress, e.g. after a worker crash.
async fn sweep_stalled_sagas(
    store: &Arc<SeaOrmSagaStore>,
    runner: &SagaRunner<SeaOrmSagaStore>,
    periods: &Arc<PeriodRepository>,
    outbox: &Arc<OutboxRepository>,
    config: &AppConfig,
) {
    let threshold = chrono::Duration::milliseconds(
        i64::try_from(config.saga.sweep_interval_ms).unwrap_or(i64::MAX),
    );
    let stalled = match store.find_stalled(threshold).await {
        Ok(stalled) => stalled,
        Err(e) => {
            error!(error = %e, "stalled-saga query failed");
            return;
        }
    };

    for state in stalled {
        resume_saga(runner, periods, outbox, &state).await;
    }
}

async fn resume_saga(
    runner: &SagaRunner<SeaOrmSagaStore>,
    periods: &Arc<PeriodRepository>,
    outbox: &Arc<OutboxRepository>,
    state: &SagaState,
) {
    match state.kind.as_str() {
        MONTH_END_SAGA_KIND => {
            let request: MonthEndRequest = match serde_json::from_value(state.input.clone()) {
                Ok(request) => request,
                Err(e) => {
                    error!(saga_id = %state.id, error = %e, "malformed saga input");
                    return;
                }
            };
            let steps = month_end_saga_steps(
                periods.clone(),
                outbox.clone(),
                request.organization_id,
                request.period_id,
                request.actor,
            );
            match runner.resume(state.id, &steps).await {
                Ok(outcome) => info!(saga_id = %state.id, outcome = ?outcome, "saga resumed"),
                Err(e) => error!(saga_id = %state.id, error = %e, "saga resume failed"),
            }
        }
        PAYMENT_SAGA_KIND => {
            // Payment steps need the gateway the request-side process is
            // configured with; the sweep only reports these.
            warn!(
                saga_id = %state.id,
                "stalled payment saga needs a gateway-configured process to resume"
            );
        }
        other => {
            warn!(saga_id = %state.id, kind = other, "no saga definition registered for kind");
        }
    }
}
