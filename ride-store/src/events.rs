use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;
use ride_core::error::BoxError;
use ride_core::notify::NotificationSink;
use ride_shared::NotificationEvent;
use std::time::Duration;
use tracing::{error, info};

#[derive(Clone)]
pub struct EventProducer {
    producer: FutureProducer,
}

impl EventProducer {
    pub fn new(brokers: &str) -> Result<Self, rdkafka::error::KafkaError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self { producer })
    }

    pub async fn publish(&self, topic: &str, key: &str, payload: &str) -> Result<(), rdkafka::error::KafkaError> {
        let record = FutureRecord::to(topic)
            .key(key)
            .payload(payload);

        match self.producer.send(record, Timeout::After(Duration::from_secs(0))).await {
            Ok(delivery) => {
                info!("Sent message to {}/{}: partition {} offset {}", topic, key, delivery.partition, delivery.offset);
                Ok(())
            }
            Err((e, _msg)) => {
                error!("Failed to send message to {}: {}", topic, e);
                Err(e)
            }
        }
    }
}

/// Publishes notifications to `<prefix>.<kind>`, keyed by recipient so one
/// passenger's events stay ordered within a partition.
pub struct KafkaNotificationSink {
    producer: EventProducer,
    topic_prefix: String,
}

impl KafkaNotificationSink {
    pub fn new(producer: EventProducer, topic_prefix: impl Into<String>) -> Self {
        Self {
            producer,
            topic_prefix: topic_prefix.into(),
        }
    }

    pub fn topic_for(&self, event: &NotificationEvent) -> String {
        format!("{}.{}", self.topic_prefix, event.kind())
    }
}

#[async_trait]
impl NotificationSink for KafkaNotificationSink {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), BoxError> {
        let payload = serde_json::to_string(event)?;
        let key = event.recipient().to_string();
        self.producer
            .publish(&self.topic_for(event), &key, &payload)
            .await?;
        Ok(())
    }
}
