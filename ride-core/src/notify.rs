use async_trait::async_trait;
use ride_shared::NotificationEvent;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::BoxError;

/// Delivers notifications to the outside world (message bus, email relay, ...).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, event: &NotificationEvent) -> Result<(), BoxError>;
}

/// Fire-and-forget handle used by the state machines.
///
/// Sending never blocks and never fails the caller: a committed transition
/// stays committed whether or not its notification is delivered.
#[derive(Clone, Debug)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<NotificationEvent>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn notify(&self, event: NotificationEvent) {
        let Some(tx) = &self.tx else {
            debug!(kind = event.kind(), "Notifications disabled, dropping event");
            return;
        };
        if let Err(e) = tx.send(event) {
            warn!(
                kind = e.0.kind(),
                booking_id = %e.0.booking_id(),
                "Notification dispatcher gone, event dropped"
            );
        }
    }
}

/// Drains the channel into `sink` until every `Notifier` is dropped.
pub async fn run_dispatcher(
    mut rx: mpsc::UnboundedReceiver<NotificationEvent>,
    sink: Arc<dyn NotificationSink>,
) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = sink.deliver(&event).await {
            warn!(
                kind = event.kind(),
                recipient = %event.recipient(),
                error = %e,
                "Failed to deliver notification"
            );
        }
    }
    debug!("Notification dispatcher stopped");
}
