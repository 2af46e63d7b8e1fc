use anyhow::Context;
use ride_booking::MockPaymentGateway;
use ride_core::notify::{run_dispatcher, Notifier};
use ride_core::payment::SignatureVerifier;
use ride_engine::worker::{self, RetryPolicy};
use ride_engine::{Engine, EngineParts};
use ride_inventory::RideRules;
use ride_store::app_config::Config;
use ride_store::{
    DbClient, EventProducer, KafkaNotificationSink, PgBookingRepository, PgDirectoryRepository,
    PgRideRepository,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "ride_engine=debug,ride_booking=debug,ride_inventory=debug,ride_store=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    info!("Starting ride engine");

    let db = DbClient::new(&config.database)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // Kafka Connection
    let producer = EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?;
    let sink = Arc::new(KafkaNotificationSink::new(
        producer,
        config.kafka.notification_topic_prefix.clone(),
    ));
    let (notifier, rx) = Notifier::channel();
    let dispatcher = tokio::spawn(run_dispatcher(rx, sink));

    warn!(key_id = %config.payment.key_id, "Using the mock payment gateway");
    let engine = Engine::new(EngineParts {
        rides: Arc::new(PgRideRepository::new(db.pool.clone())),
        bookings: Arc::new(PgBookingRepository::new(db.pool.clone())),
        directory: Arc::new(PgDirectoryRepository::new(db.pool.clone())),
        gateway: Arc::new(MockPaymentGateway::new()),
        verifier: SignatureVerifier::new(config.payment.key_secret.reveal()),
        currency: config.payment.currency.clone(),
        rules: RideRules::from(&config.business_rules),
        notifier,
    });

    let mut payment_worker = tokio::spawn(worker::start_payment_worker(
        config.kafka.brokers.clone(),
        config.kafka.group_id.clone(),
        config.kafka.payment_topic.clone(),
        engine.clone(),
        RetryPolicy::default(),
    ));

    let worker_failure = tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            info!("Shutdown requested");
            None
        }
        outcome = &mut payment_worker => {
            let failure = match outcome {
                Ok(Ok(())) => anyhow::anyhow!("Payment worker stopped unexpectedly"),
                Ok(Err(e)) => anyhow::Error::new(e).context("Payment worker failed"),
                Err(e) => anyhow::Error::new(e).context("Payment worker panicked"),
            };
            error!("{:#}", failure);
            Some(failure)
        }
    };
    if worker_failure.is_none() {
        payment_worker.abort();
        let _ = payment_worker.await;
    }

    // The dispatcher drains pending notifications once the last notifier is gone.
    drop(engine);
    if let Err(e) = dispatcher.await {
        error!("Notification dispatcher panicked: {}", e);
    }

    // Exit non-zero so a supervisor restarts the consumer from its last commit.
    match worker_failure {
        Some(failure) => Err(failure),
        None => Ok(()),
    }
}
