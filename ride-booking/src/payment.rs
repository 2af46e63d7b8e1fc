use async_trait::async_trait;
use chrono::Utc;
use ride_core::error::BoxError;
use ride_core::notify::Notifier;
use ride_core::payment::{GatewayOrder, PaymentGateway, PaymentProof, SignatureVerifier};
use ride_core::repository::BookingRepository;
use ride_core::{CoreError, CoreResult, StoreError};
use ride_shared::models::events::BookingPaidEvent;
use ride_shared::{Booking, BookingStatus, NotificationEvent};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::state_machine::PAY;

/// Turns verified provider payments into PAID bookings, idempotently.
pub struct PaymentReconciler {
    bookings: Arc<dyn BookingRepository>,
    gateway: Arc<dyn PaymentGateway>,
    verifier: SignatureVerifier,
    currency: String,
    notifier: Notifier,
}

impl PaymentReconciler {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        gateway: Arc<dyn PaymentGateway>,
        verifier: SignatureVerifier,
        currency: impl Into<String>,
        notifier: Notifier,
    ) -> Self {
        Self {
            bookings,
            gateway,
            verifier,
            currency: currency.into(),
            notifier,
        }
    }

    /// Open a provider order for the booking's fare. No lock is held while
    /// the gateway is called.
    pub async fn create_order(&self, booking_id: Uuid, passenger_id: Uuid) -> CoreResult<GatewayOrder> {
        let booking = self.load(booking_id).await?;
        if booking.passenger_id != passenger_id {
            return Err(CoreError::BookingNotFound(booking_id));
        }
        if !PAY.permits(booking.status) {
            return Err(CoreError::invalid_transition(booking.status, BookingStatus::Paid));
        }

        let receipt = format!("booking_{}", booking.id);
        let order = self
            .gateway
            .create_order(booking.total_fare, &self.currency, &receipt)
            .await
            .map_err(|e| {
                warn!(booking_id = %booking_id, error = %e, "Payment gateway rejected order");
                CoreError::Gateway(e.to_string())
            })?;

        info!(booking_id = %booking_id, order_id = %order.order_id, amount = order.amount, "Payment order created");
        Ok(order)
    }

    /// Mark a booking PAID with `payment_ref`. Repeating the call with the same
    /// reference returns the paid booking unchanged.
    pub async fn confirm(&self, booking_id: Uuid, payment_ref: &str) -> CoreResult<Booking> {
        let payment_ref = payment_ref.trim();
        if payment_ref.is_empty() {
            return Err(CoreError::InvalidRequest(
                "payment reference is required".to_string(),
            ));
        }

        let booking = self.load(booking_id).await?;
        if booking.status == BookingStatus::Paid {
            return settle_existing(booking, payment_ref);
        }
        if !PAY.permits(booking.status) {
            return Err(CoreError::invalid_transition(booking.status, BookingStatus::Paid));
        }

        let transition = PAY.with_payment(payment_ref);
        let paid = match self.bookings.apply_transition(booking_id, &transition).await {
            Ok(paid) => paid,
            // Lost a race with another confirmation.
            Err(StoreError::BookingStatusConflict {
                current: BookingStatus::Paid,
                ..
            }) => {
                let current = self.load(booking_id).await?;
                return settle_existing(current, payment_ref);
            }
            Err(e) => return Err(e.into()),
        };

        info!(booking_id = %booking_id, payment_id = %payment_ref, "Booking paid");
        self.notifier
            .notify(NotificationEvent::BookingPaid(BookingPaidEvent {
                booking_id: paid.id,
                ride_id: paid.ride_id,
                passenger_id: paid.passenger_id,
                payment_id: payment_ref.to_string(),
                amount: paid.total_fare,
                timestamp: Utc::now().timestamp(),
            }));
        Ok(paid)
    }

    /// Signature gate followed by [`PaymentReconciler::confirm`].
    pub async fn confirm_verified(&self, booking_id: Uuid, proof: &PaymentProof) -> CoreResult<Booking> {
        if !self.verifier.verify_proof(proof) {
            warn!(
                booking_id = %booking_id,
                order_id = %proof.order_id,
                "Payment signature verification failed"
            );
            return Err(CoreError::InvalidSignature);
        }
        self.confirm(booking_id, &proof.payment_id).await
    }

    async fn load(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or(CoreError::BookingNotFound(booking_id))
    }
}

fn settle_existing(booking: Booking, payment_ref: &str) -> CoreResult<Booking> {
    match booking.payment_id.as_deref() {
        Some(existing) if existing == payment_ref => {
            debug!(booking_id = %booking.id, "Payment already confirmed");
            Ok(booking)
        }
        existing => Err(CoreError::PaymentConflict {
            existing: existing.unwrap_or_default().to_string(),
            attempted: payment_ref.to_string(),
        }),
    }
}

/// In-process gateway for local runs and tests.
#[derive(Debug, Default)]
pub struct MockPaymentGateway {
    fail: bool,
}

impl MockPaymentGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway that refuses every order.
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayOrder, BoxError> {
        if self.fail {
            return Err("mock gateway unavailable".into());
        }
        Ok(GatewayOrder {
            order_id: format!("order_mock_{}", Uuid::new_v4().simple()),
            amount,
            currency: currency.to_string(),
            receipt: receipt.to_string(),
        })
    }
}
