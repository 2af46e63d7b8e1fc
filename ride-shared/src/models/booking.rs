use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownStatus;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
    Paid,
}

impl BookingStatus {
    /// No transition leaves a terminal status through the booking state machine.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Rejected | BookingStatus::Cancelled | BookingStatus::Paid
        )
    }

    /// Statuses whose seats are still debited from the ride.
    pub fn holds_reservation(self) -> bool {
        matches!(
            self,
            BookingStatus::Pending | BookingStatus::Approved | BookingStatus::Paid
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Approved => "APPROVED",
            BookingStatus::Rejected => "REJECTED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Paid => "PAID",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookingStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(BookingStatus::Pending),
            "APPROVED" => Ok(BookingStatus::Approved),
            "REJECTED" => Ok(BookingStatus::Rejected),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "PAID" => Ok(BookingStatus::Paid),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A passenger's claim on seats of a single ride.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Booking {
    pub id: Uuid,
    pub ride_id: Uuid,
    pub passenger_id: Uuid,
    pub pickup_location: String,
    pub drop_location: String,
    pub seats_booked: i32,
    /// Minor currency units.
    pub total_fare: i64,
    pub status: BookingStatus,
    pub payment_id: Option<String>,
    pub booked_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    pub fn new(passenger_id: Uuid, request: &BookingRequest) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            ride_id: request.ride_id,
            passenger_id,
            pickup_location: request.pickup_location.trim().to_string(),
            drop_location: request.drop_location.trim().to_string(),
            seats_booked: request.seats_booked,
            total_fare: request.total_fare,
            status: BookingStatus::Pending,
            payment_id: None,
            booked_at: now,
            updated_at: now,
        }
    }

    pub fn update_status(&mut self, new_status: BookingStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub ride_id: Uuid,
    pub pickup_location: String,
    pub drop_location: String,
    pub seats_booked: i32,
    pub total_fare: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reservation_holding_statuses() {
        assert!(BookingStatus::Pending.holds_reservation());
        assert!(BookingStatus::Approved.holds_reservation());
        assert!(BookingStatus::Paid.holds_reservation());
        assert!(!BookingStatus::Rejected.holds_reservation());
        assert!(!BookingStatus::Cancelled.holds_reservation());

        assert!(BookingStatus::Paid.is_terminal());
        assert!(!BookingStatus::Approved.is_terminal());
    }

    #[test]
    fn test_status_serializes_screaming_case() {
        let json = serde_json::to_string(&BookingStatus::Approved).unwrap();
        assert_eq!(json, "\"APPROVED\"");
        assert_eq!("PAID".parse::<BookingStatus>(), Ok(BookingStatus::Paid));
    }

    #[test]
    fn test_new_booking_is_pending_without_payment() {
        let request = BookingRequest {
            ride_id: Uuid::new_v4(),
            pickup_location: " Kothrud ".to_string(),
            drop_location: "Andheri".to_string(),
            seats_booked: 2,
            total_fare: 90_000,
        };
        let booking = Booking::new(Uuid::new_v4(), &request);
        assert_eq!(booking.status, BookingStatus::Pending);
        assert_eq!(booking.pickup_location, "Kothrud");
        assert!(booking.payment_id.is_none());
        assert_eq!(booking.ride_id, request.ride_id);
    }
}
