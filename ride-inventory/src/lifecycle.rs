use chrono::Utc;
use ride_core::notify::Notifier;
use ride_core::repository::{DirectoryRepository, RideRepository};
use ride_core::{CoreError, CoreResult};
use ride_shared::models::events::BookingCancelledEvent;
use ride_shared::{
    BookingStatus, CancellationReason, NotificationEvent, Ride, RideSpec, RideStatus, RideUpdate,
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const STARTABLE: &[RideStatus] = &[RideStatus::Scheduled];
const COMPLETABLE: &[RideStatus] = &[RideStatus::Active];

/// Limits applied when a driver posts a ride.
#[derive(Debug, Clone, PartialEq)]
pub struct RideRules {
    pub max_route_points: usize,
    pub min_seats: i32,
    pub max_seats: i32,
}

impl Default for RideRules {
    fn default() -> Self {
        Self {
            max_route_points: 4,
            min_seats: 1,
            max_seats: 10,
        }
    }
}

/// Ride-level transitions: post, reschedule, start, complete and the
/// cancellation cascade.
pub struct RideLifecycle {
    rides: Arc<dyn RideRepository>,
    directory: Arc<dyn DirectoryRepository>,
    notifier: Notifier,
    rules: RideRules,
}

impl RideLifecycle {
    pub fn new(
        rides: Arc<dyn RideRepository>,
        directory: Arc<dyn DirectoryRepository>,
        notifier: Notifier,
        rules: RideRules,
    ) -> Self {
        Self {
            rides,
            directory,
            notifier,
            rules,
        }
    }

    pub fn validate(&self, spec: &RideSpec) -> CoreResult<()> {
        if spec.from_city.trim().is_empty() || spec.to_city.trim().is_empty() {
            return Err(CoreError::InvalidRequest(
                "origin and destination cities are required".to_string(),
            ));
        }
        for (label, points) in [("pickup", &spec.pickup_points), ("drop", &spec.drop_points)] {
            if points.len() > self.rules.max_route_points {
                return Err(CoreError::InvalidRequest(format!(
                    "at most {} {} points allowed, got {}",
                    self.rules.max_route_points,
                    label,
                    points.len()
                )));
            }
            if points.iter().any(|p| p.trim().is_empty()) {
                return Err(CoreError::InvalidRequest(format!(
                    "{} points must not be blank",
                    label
                )));
            }
        }
        if spec.total_seats < self.rules.min_seats || spec.total_seats > self.rules.max_seats {
            return Err(CoreError::InvalidRequest(format!(
                "seats must be between {} and {}, got {}",
                self.rules.min_seats, self.rules.max_seats, spec.total_seats
            )));
        }
        if spec.base_fare <= 0 || spec.fare_per_km <= 0 {
            return Err(CoreError::InvalidRequest(
                "fares must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn post_ride(&self, driver_id: Uuid, spec: RideSpec) -> CoreResult<Ride> {
        self.validate(&spec)?;

        let vehicle = self
            .directory
            .get_vehicle(spec.vehicle_id)
            .await?
            .ok_or(CoreError::VehicleNotFound(spec.vehicle_id))?;
        if vehicle.driver_id != driver_id {
            return Err(CoreError::Unauthorized(format!(
                "vehicle {} is not registered to this driver",
                vehicle.id
            )));
        }
        if !vehicle.is_active {
            return Err(CoreError::InvalidRequest(format!(
                "vehicle {} is not active",
                vehicle.id
            )));
        }

        let ride = Ride::new(driver_id, spec);
        self.rides.insert_ride(&ride).await?;

        info!(
            ride_id = %ride.id,
            driver_id = %driver_id,
            seats = ride.total_seats,
            "Ride posted"
        );
        Ok(ride)
    }

    /// Reschedule a ride; seat counts stay as they are.
    pub async fn update_ride(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        update: RideUpdate,
    ) -> CoreResult<Ride> {
        if update.is_empty() {
            return Err(CoreError::InvalidRequest(
                "no editable fields supplied".to_string(),
            ));
        }
        let ride = self.load_owned(ride_id, driver_id).await?;
        if ride.status.is_terminal() {
            return Err(CoreError::invalid_transition(ride.status, "RESCHEDULED"));
        }

        let ride = self.rides.update_schedule(ride_id, &update).await?;
        info!(ride_id = %ride_id, "Ride rescheduled");
        Ok(ride)
    }

    pub async fn start_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        self.move_ride(ride_id, driver_id, STARTABLE, RideStatus::Active)
            .await
    }

    pub async fn complete_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        self.move_ride(ride_id, driver_id, COMPLETABLE, RideStatus::Completed)
            .await
    }

    /// Withdraw a ride. Every booking still holding seats is cancelled
    /// without crediting the seats back; paid ones are flagged for refund.
    pub async fn cancel_ride(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        let ride = self.load_owned(ride_id, driver_id).await?;
        if ride.status.is_terminal() {
            debug!(ride_id = %ride_id, status = %ride.status, "Ride already closed");
            return Err(CoreError::invalid_transition(
                ride.status,
                RideStatus::Cancelled,
            ));
        }

        let outcome = self.rides.cancel_ride_cascade(ride_id).await?;

        let now = Utc::now().timestamp();
        for cascaded in &outcome.cancelled {
            self.notifier
                .notify(NotificationEvent::BookingCancelled(BookingCancelledEvent {
                    booking_id: cascaded.booking.id,
                    ride_id,
                    passenger_id: cascaded.booking.passenger_id,
                    reason: CancellationReason::RideCancelled,
                    refund_due: cascaded.previous_status == BookingStatus::Paid,
                    timestamp: now,
                }));
        }

        info!(
            ride_id = %ride_id,
            bookings_cancelled = outcome.cancelled.len(),
            "Ride cancelled"
        );
        Ok(outcome.ride)
    }

    pub async fn get_ride(&self, ride_id: Uuid) -> CoreResult<Ride> {
        self.rides
            .get_ride(ride_id)
            .await?
            .ok_or(CoreError::RideNotFound(ride_id))
    }

    pub async fn rides_for_driver(&self, driver_id: Uuid) -> CoreResult<Vec<Ride>> {
        Ok(self.rides.list_rides_for_driver(driver_id).await?)
    }

    /// Load a ride and check that `driver_id` owns it.
    pub async fn load_owned(&self, ride_id: Uuid, driver_id: Uuid) -> CoreResult<Ride> {
        let ride = self.get_ride(ride_id).await?;
        if !ride.is_owned_by(driver_id) {
            return Err(CoreError::Unauthorized(format!(
                "ride {} belongs to another driver",
                ride_id
            )));
        }
        Ok(ride)
    }

    async fn move_ride(
        &self,
        ride_id: Uuid,
        driver_id: Uuid,
        allowed_from: &'static [RideStatus],
        to: RideStatus,
    ) -> CoreResult<Ride> {
        let ride = self.load_owned(ride_id, driver_id).await?;
        if !allowed_from.contains(&ride.status) {
            return Err(CoreError::invalid_transition(ride.status, to));
        }

        let ride = self.rides.transition_ride(ride_id, allowed_from, to).await?;
        info!(ride_id = %ride_id, status = %to, "Ride status updated");
        Ok(ride)
    }
}
