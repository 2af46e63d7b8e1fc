use chrono::Utc;
use ride_core::notify::Notifier;
use ride_core::repository::{BookingRepository, BookingTransition, RideRepository};
use ride_core::{CoreError, CoreResult, StoreError};
use ride_shared::models::events::{
    BookingApprovedEvent, BookingCancelledEvent, BookingRejectedEvent,
};
use ride_shared::{
    Booking, BookingRequest, BookingStatus, CancellationReason, NotificationEvent, Ride,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

pub const APPROVE: BookingTransition = BookingTransition {
    allowed_from: &[BookingStatus::Pending],
    to: BookingStatus::Approved,
    release_seats: false,
    payment_id: None,
};

pub const REJECT: BookingTransition = BookingTransition {
    allowed_from: &[BookingStatus::Pending],
    to: BookingStatus::Rejected,
    release_seats: true,
    payment_id: None,
};

/// Passengers may withdraw until the booking is paid.
pub const CANCEL: BookingTransition = BookingTransition {
    allowed_from: &[BookingStatus::Pending, BookingStatus::Approved],
    to: BookingStatus::Cancelled,
    release_seats: true,
    payment_id: None,
};

/// Seats were committed at creation; payment never touches the ledger.
pub const PAY: BookingTransition = BookingTransition {
    allowed_from: &[BookingStatus::Pending, BookingStatus::Approved],
    to: BookingStatus::Paid,
    release_seats: false,
    payment_id: None,
};

/// Whether `from -> to` is an edge of the booking state machine.
pub fn is_legal(from: BookingStatus, to: BookingStatus) -> bool {
    [APPROVE, REJECT, CANCEL, PAY]
        .iter()
        .any(|t| t.to == to && t.permits(from))
}

/// Per-booking transitions and the seat-ledger side effects they carry.
pub struct BookingStateMachine {
    bookings: Arc<dyn BookingRepository>,
    rides: Arc<dyn RideRepository>,
    notifier: Notifier,
}

impl BookingStateMachine {
    pub fn new(
        bookings: Arc<dyn BookingRepository>,
        rides: Arc<dyn RideRepository>,
        notifier: Notifier,
    ) -> Self {
        Self {
            bookings,
            rides,
            notifier,
        }
    }

    /// Reserve seats and persist a PENDING booking as one unit.
    pub async fn create(&self, passenger_id: Uuid, request: BookingRequest) -> CoreResult<Booking> {
        if request.seats_booked < 1 {
            return Err(CoreError::InvalidRequest(format!(
                "at least one seat must be booked, got {}",
                request.seats_booked
            )));
        }
        if request.total_fare <= 0 {
            return Err(CoreError::InvalidRequest(
                "total fare must be positive".to_string(),
            ));
        }

        let booking = Booking::new(passenger_id, &request);
        let remaining = match self.bookings.create_booking(&booking).await {
            Ok(remaining) => remaining,
            // A closed ride has no seats to offer.
            Err(StoreError::RideClosed { status }) => {
                debug!(ride_id = %request.ride_id, status = %status, "Booking attempt on closed ride");
                return Err(CoreError::InsufficientSeats {
                    requested: request.seats_booked,
                    available: 0,
                });
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            booking_id = %booking.id,
            ride_id = %booking.ride_id,
            seats = booking.seats_booked,
            remaining,
            "Booking created"
        );
        Ok(booking)
    }

    pub async fn approve(&self, booking_id: Uuid, driver_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load_for_driver(booking_id, driver_id).await?;
        let booking = self.apply(booking, &APPROVE).await?;

        self.notifier
            .notify(NotificationEvent::BookingApproved(BookingApprovedEvent {
                booking_id: booking.id,
                ride_id: booking.ride_id,
                passenger_id: booking.passenger_id,
                seats_booked: booking.seats_booked,
                timestamp: Utc::now().timestamp(),
            }));
        Ok(booking)
    }

    pub async fn reject(&self, booking_id: Uuid, driver_id: Uuid) -> CoreResult<Booking> {
        let booking = self.load_for_driver(booking_id, driver_id).await?;
        let booking = self.apply(booking, &REJECT).await?;

        self.notifier
            .notify(NotificationEvent::BookingRejected(BookingRejectedEvent {
                booking_id: booking.id,
                ride_id: booking.ride_id,
                passenger_id: booking.passenger_id,
                seats_released: booking.seats_booked,
                timestamp: Utc::now().timestamp(),
            }));
        Ok(booking)
    }

    /// Passenger withdrawal. Another passenger's booking is reported as not found.
    pub async fn cancel(&self, booking_id: Uuid, passenger_id: Uuid) -> CoreResult<Booking> {
        let booking = self.get(booking_id).await?;
        if booking.passenger_id != passenger_id {
            debug!(booking_id = %booking_id, "Cancel attempted by non-owner");
            return Err(CoreError::BookingNotFound(booking_id));
        }
        let booking = self.apply(booking, &CANCEL).await?;

        self.notifier
            .notify(NotificationEvent::BookingCancelled(BookingCancelledEvent {
                booking_id: booking.id,
                ride_id: booking.ride_id,
                passenger_id: booking.passenger_id,
                reason: CancellationReason::PassengerRequest,
                refund_due: false,
                timestamp: Utc::now().timestamp(),
            }));
        Ok(booking)
    }

    pub async fn get(&self, booking_id: Uuid) -> CoreResult<Booking> {
        self.bookings
            .get_booking(booking_id)
            .await?
            .ok_or(CoreError::BookingNotFound(booking_id))
    }

    pub async fn bookings_for_passenger(&self, passenger_id: Uuid) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.list_bookings_for_passenger(passenger_id).await?)
    }

    pub async fn pending_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Booking>> {
        Ok(self.bookings.list_pending_for_driver(driver_id).await?)
    }

    /// All bookings of a ride, visible to its driver only.
    pub async fn bookings_for_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Vec<Booking>> {
        let ride = self.load_ride(ride_id).await?;
        if !ride.is_owned_by(driver_id) {
            return Err(CoreError::Unauthorized(format!(
                "ride {} belongs to another driver",
                ride_id
            )));
        }
        Ok(self.bookings.list_bookings_for_ride(ride_id).await?)
    }

    async fn load_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        self.rides
            .get_ride(ride_id)
            .await?
            .ok_or(CoreError::RideNotFound(ride_id))
    }

    /// Ownership never changes, so checking it outside the store's lock is sound.
    async fn load_for_driver(&self, booking_id: Uuid, driver_id: Uuid) -> CoreResult<Booking> {
        let booking = self.get(booking_id).await?;
        let ride = self.load_ride(booking.ride_id).await?;
        if !ride.is_owned_by(driver_id) {
            return Err(CoreError::Unauthorized(format!(
                "booking {} is on a ride owned by another driver",
                booking_id
            )));
        }
        Ok(booking)
    }

    async fn apply(&self, booking: Booking, transition: &BookingTransition) -> CoreResult<Booking> {
        if !transition.permits(booking.status) {
            debug!(
                booking_id = %booking.id,
                from = %booking.status,
                to = %transition.to,
                "Transition refused"
            );
            return Err(CoreError::invalid_transition(booking.status, transition.to));
        }

        let updated = self.bookings.apply_transition(booking.id, transition).await?;
        info!(
            booking_id = %updated.id,
            ride_id = %updated.ride_id,
            status = %updated.status,
            seats_released = if transition.release_seats { updated.seats_booked } else { 0 },
            "Booking status updated"
        );
        Ok(updated)
    }
}
