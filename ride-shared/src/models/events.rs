use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationReason {
    PassengerRequest,
    RideCancelled,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingApprovedEvent {
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats_booked: i32,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingRejectedEvent {
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub seats_released: i32,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub reason: CancellationReason,
    /// Set when the booking had already been paid for.
    pub refund_due: bool,
    pub timestamp: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BookingPaidEvent {
    pub booking_id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub payment_id: String,
    pub amount: i64,
    pub timestamp: i64,
}

/// Passenger-facing notification emitted after a booking changes state.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationEvent {
    BookingApproved(BookingApprovedEvent),
    BookingRejected(BookingRejectedEvent),
    BookingCancelled(BookingCancelledEvent),
    BookingPaid(BookingPaidEvent),
}

impl NotificationEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            NotificationEvent::BookingApproved(_) => "booking.approved",
            NotificationEvent::BookingRejected(_) => "booking.rejected",
            NotificationEvent::BookingCancelled(_) => "booking.cancelled",
            NotificationEvent::BookingPaid(_) => "booking.paid",
        }
    }

    pub fn recipient(&self) -> Uuid {
        match self {
            NotificationEvent::BookingApproved(e) => e.passenger_id,
            NotificationEvent::BookingRejected(e) => e.passenger_id,
            NotificationEvent::BookingCancelled(e) => e.passenger_id,
            NotificationEvent::BookingPaid(e) => e.passenger_id,
        }
    }

    pub fn booking_id(&self) -> Uuid {
        match self {
            NotificationEvent::BookingApproved(e) => e.booking_id,
            NotificationEvent::BookingRejected(e) => e.booking_id,
            NotificationEvent::BookingCancelled(e) => e.booking_id,
            NotificationEvent::BookingPaid(e) => e.booking_id,
        }
    }
}
