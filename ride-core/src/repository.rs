use async_trait::async_trait;
use chrono::NaiveDate;
use ride_shared::{Booking, BookingStatus, DriverProfile, Ride, RideStatus, RideUpdate, Vehicle};
use uuid::Uuid;

use crate::error::StoreResult;

/// A guarded booking status change, applied by the store as one atomic unit.
///
/// The store re-checks `allowed_from` under the booking's lock and releases
/// the booking's seats back to its ride in the same unit when `release_seats`
/// is set.
#[derive(Debug, Clone, PartialEq)]
pub struct BookingTransition {
    pub allowed_from: &'static [BookingStatus],
    pub to: BookingStatus,
    pub release_seats: bool,
    pub payment_id: Option<String>,
}

impl BookingTransition {
    pub fn with_payment(mut self, payment_id: impl Into<String>) -> Self {
        self.payment_id = Some(payment_id.into());
        self
    }

    pub fn permits(&self, from: BookingStatus) -> bool {
        self.allowed_from.contains(&from)
    }
}

/// A booking swept up by a ride cancellation, with the status it held before.
#[derive(Debug, Clone)]
pub struct CascadedBooking {
    pub booking: Booking,
    pub previous_status: BookingStatus,
}

#[derive(Debug, Clone)]
pub struct RideCancellation {
    pub ride: Ride,
    pub cancelled: Vec<CascadedBooking>,
}

/// Repository trait for ride data access
#[async_trait]
pub trait RideRepository: Send + Sync {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()>;

    async fn get_ride(&self, id: Uuid) -> StoreResult<Option<Ride>>;

    /// Newest travel date first.
    async fn list_rides_for_driver(&self, driver_id: Uuid) -> StoreResult<Vec<Ride>>;

    /// Scheduled rides with free seats; city match is case-insensitive.
    async fn search_rides(
        &self,
        from_city: &str,
        to_city: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Ride>>;

    /// Fails with `RideClosed` once the ride is terminal.
    async fn update_schedule(&self, id: Uuid, update: &RideUpdate) -> StoreResult<Ride>;

    async fn transition_ride(
        &self,
        id: Uuid,
        allowed_from: &'static [RideStatus],
        to: RideStatus,
    ) -> StoreResult<Ride>;

    /// Cancels every reservation-holding booking of the ride, then the ride
    /// itself, without crediting seats back.
    async fn cancel_ride_cascade(&self, id: Uuid) -> StoreResult<RideCancellation>;
}

/// Repository trait for booking data access
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Reserves the booking's seats and persists it in one unit. Returns the
    /// ride's remaining seat count.
    async fn create_booking(&self, booking: &Booking) -> StoreResult<i32>;

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &BookingTransition,
    ) -> StoreResult<Booking>;

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> StoreResult<Vec<Booking>>;

    /// Most recent first.
    async fn list_bookings_for_passenger(&self, passenger_id: Uuid) -> StoreResult<Vec<Booking>>;

    async fn list_pending_for_driver(&self, driver_id: Uuid) -> StoreResult<Vec<Booking>>;
}

/// Read-only view of the user and vehicle registries.
#[async_trait]
pub trait DirectoryRepository: Send + Sync {
    async fn get_driver(&self, id: Uuid) -> StoreResult<Option<DriverProfile>>;

    async fn get_vehicle(&self, id: Uuid) -> StoreResult<Option<Vehicle>>;
}
