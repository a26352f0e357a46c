//! Reconciler daemon entry point.
//!
//! Runs the scheduled sweeps (due plan changes, lapsed grace periods,
//! lapsed cancellations) against PostgreSQL and the PayPal API.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;

use fitstride::adapters::notifier::TracingNotifier;
use fitstride::adapters::paypal::{PaypalConfig, PaypalProcessorClient};
use fitstride::adapters::postgres::{PostgresFailureLedger, PostgresSubscriptionStore};
use fitstride::application::handlers::subscription::{
    ApplyScheduledChangeHandler, ExpireGracePeriodHandler, ExpireLapsedCancellationHandler,
};
use fitstride::application::Reconciler;
use fitstride::config::AppConfig;
use fitstride::ports::{FailureLedger, Notifier, ProcessorClient, SubscriptionStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fitstride=info,sqlx=warn".into()),
        )
        .init();

    let config = AppConfig::load()?;
    config.validate()?;
    tracing::info!(
        sandbox = config.payment.is_sandbox(),
        interval_secs = config.reconciler.interval_secs,
        "Starting fitstride reconciler"
    );

    let pool = PgPoolOptions::new()
        .min_connections(config.database.min_connections)
        .max_connections(config.database.max_connections)
        .acquire_timeout(config.database.acquire_timeout())
        .connect(&config.database.url)
        .await?;

    if config.database.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    let store: Arc<dyn SubscriptionStore> = Arc::new(PostgresSubscriptionStore::new(pool.clone()));
    let ledger: Arc<dyn FailureLedger> = Arc::new(PostgresFailureLedger::new(pool));

    let paypal_config = PaypalConfig::new(
        config.payment.paypal_client_id.clone(),
        config.payment.paypal_client_secret.clone(),
    )
    .with_base_url(config.payment.paypal_base_url.clone())
    .with_plan_ids(
        config.payment.paypal_monthly_plan_id.clone(),
        config.payment.paypal_yearly_plan_id.clone(),
    )
    .with_redirect_urls(
        config.payment.return_url.clone(),
        config.payment.cancel_url.clone(),
    )
    .with_retry_policy(
        config.policy.processor_max_retries,
        config.policy.processor_backoff_base_ms,
    );
    let processor: Arc<dyn ProcessorClient> = Arc::new(PaypalProcessorClient::new(paypal_config));

    let notifier: Arc<dyn Notifier> = Arc::new(TracingNotifier::new());

    let reconciler = Reconciler::new(
        store.clone(),
        ledger.clone(),
        ApplyScheduledChangeHandler::new(store.clone(), processor.clone(), notifier.clone()),
        ExpireGracePeriodHandler::new(
            store.clone(),
            ledger.clone(),
            processor.clone(),
            notifier.clone(),
        ),
        ExpireLapsedCancellationHandler::new(store, notifier),
        config.reconciler.clone(),
    );

    reconciler.run().await;
    Ok(())
}
