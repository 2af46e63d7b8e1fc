use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Message};
use ride_core::payment::PaymentProof;
use ride_core::CoreError;
use ride_shared::Booking;
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::engine::Engine;

/// Provider callback as published on the payment topic.
#[derive(Debug, Deserialize)]
pub struct PaymentCallback {
    pub booking_id: Uuid,
    #[serde(flatten)]
    pub proof: PaymentProof,
}

#[derive(Debug, thiserror::Error)]
pub enum CallbackError {
    #[error("malformed payment callback: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Rejected(#[from] CoreError),
}

impl CallbackError {
    /// Only a transient failure leaves the callback worth redelivering.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CallbackError::Rejected(e) if e.is_retryable())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Kafka(#[from] KafkaError),

    #[error("payment callback still failing after {attempts} attempts")]
    RetriesExhausted {
        attempts: usize,
        #[source]
        source: CallbackError,
    },
}

/// Exponential backoff for callbacks that hit an infrastructure failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Doubles per retry, capped at `max_delay`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let factor = 1u32.checked_shl(attempt.min(16) as u32).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Decode and apply one callback. Confirmation is idempotent, so a transient
/// failure is simply retried under `retry`.
pub async fn handle_callback(
    engine: &Engine,
    payload: &str,
    retry: &RetryPolicy,
) -> Result<Booking, CallbackError> {
    let callback: PaymentCallback = serde_json::from_str(payload)?;

    let mut attempt = 0;
    loop {
        match engine
            .confirm_verified_payment(callback.booking_id, &callback.proof)
            .await
        {
            Ok(booking) => return Ok(booking),
            Err(e) if e.is_retryable() && attempt < retry.max_retries => {
                let delay = retry.delay_for_attempt(attempt);
                attempt += 1;
                warn!(
                    booking_id = %callback.booking_id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Payment callback hit a transient failure, retrying: {}",
                    e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Consumes payment callbacks until the task is dropped.
///
/// Offsets are committed only once a callback's outcome is final. A callback
/// that keeps failing on infrastructure stops the worker uncommitted, so it
/// is redelivered when the consumer group resumes.
pub async fn start_payment_worker(
    brokers: String,
    group_id: String,
    topic: String,
    engine: Engine,
    retry: RetryPolicy,
) -> Result<(), WorkerError> {
    let consumer: StreamConsumer = ClientConfig::new()
        .set("bootstrap.servers", &brokers)
        .set("group.id", &group_id)
        .set("enable.auto.commit", "false")
        .set("auto.offset.reset", "earliest")
        .create()?;

    consumer.subscribe(&[topic.as_str()])?;

    info!("Payment worker started, listening on {}", topic);

    loop {
        let m = match consumer.recv().await {
            Ok(m) => m,
            Err(e) => {
                error!("Kafka error: {}", e);
                continue;
            }
        };

        match m.payload_view::<str>() {
            None => warn!("Empty payment callback at offset {}", m.offset()),
            Some(Err(e)) => error!("Error reading payload: {}", e),
            Some(Ok(payload)) => match handle_callback(&engine, payload, &retry).await {
                Ok(booking) => {
                    info!(booking_id = %booking.id, "Payment callback applied");
                }
                Err(e) if e.is_retryable() => {
                    error!(offset = m.offset(), "Giving up on payment callback: {}", e);
                    return Err(WorkerError::RetriesExhausted {
                        attempts: retry.max_retries + 1,
                        source: e,
                    });
                }
                Err(CallbackError::Rejected(e)) => {
                    warn!(code = %e.code(), "Payment callback rejected: {}", e);
                }
                Err(e) => error!("Failed to apply payment callback: {}", e),
            },
        }
        commit(&consumer, &m);
    }
}

fn commit(consumer: &StreamConsumer, m: &BorrowedMessage<'_>) {
    if let Err(e) = consumer.commit_message(m, CommitMode::Async) {
        warn!(
            partition = m.partition(),
            offset = m.offset(),
            "Failed to commit offset, callback may be redelivered: {}",
            e
        );
    }
}
