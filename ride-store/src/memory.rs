//! In-process store with one async mutex per ride.
//!
//! A ride and all of its bookings live in the same shard, so every atomic
//! unit (reserve + insert, release + status change, the cancellation cascade)
//! runs under a single lock. Rides never contend with each other.

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use ride_core::repository::{
    BookingRepository, BookingTransition, CascadedBooking, DirectoryRepository, RideCancellation,
    RideRepository,
};
use ride_core::{StoreError, StoreResult};
use ride_inventory::{release_on, reserve_on};
use ride_shared::{Booking, BookingStatus, DriverProfile, Ride, RideStatus, RideUpdate, Vehicle};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

struct RideShard {
    ride: Ride,
    bookings: HashMap<Uuid, Booking>,
}

type Shard = Arc<Mutex<RideShard>>;

/// Seat accounting for one ride, as seen under its lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatAudit {
    pub total_seats: i32,
    pub available_seats: i32,
    /// Sum of `seats_booked` over bookings that hold a reservation.
    pub held_by_bookings: i32,
    pub status: RideStatus,
}

impl SeatAudit {
    /// `total - available` matches the live reservations. Cancelled rides
    /// keep a frozen counter and are exempt.
    pub fn is_balanced(&self) -> bool {
        let in_range = (0..=self.total_seats).contains(&self.available_seats);
        in_range
            && (self.status == RideStatus::Cancelled
                || self.total_seats - self.available_seats == self.held_by_bookings)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    rides: RwLock<HashMap<Uuid, Shard>>,
    booking_index: RwLock<HashMap<Uuid, Uuid>>,
    drivers: RwLock<HashMap<Uuid, DriverProfile>>,
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_ride(&self, ride: Ride) {
        let id = ride.id;
        let shard = RideShard {
            ride,
            bookings: HashMap::new(),
        };
        self.rides.write().insert(id, Arc::new(Mutex::new(shard)));
    }

    pub fn seed_driver(&self, driver: DriverProfile) {
        self.drivers.write().insert(driver.id, driver);
    }

    pub fn seed_vehicle(&self, vehicle: Vehicle) {
        self.vehicles.write().insert(vehicle.id, vehicle);
    }

    pub async fn ride_snapshot(&self, ride_id: Uuid) -> Option<Ride> {
        let shard = self.shard(ride_id)?;
        let guard = shard.lock().await;
        Some(guard.ride.clone())
    }

    pub async fn audit_ride(&self, ride_id: Uuid) -> Option<SeatAudit> {
        let shard = self.shard(ride_id)?;
        let guard = shard.lock().await;
        let held_by_bookings = guard
            .bookings
            .values()
            .filter(|b| b.status.holds_reservation())
            .map(|b| b.seats_booked)
            .sum();
        Some(SeatAudit {
            total_seats: guard.ride.total_seats,
            available_seats: guard.ride.available_seats,
            held_by_bookings,
            status: guard.ride.status,
        })
    }

    fn shard(&self, ride_id: Uuid) -> Option<Shard> {
        self.rides.read().get(&ride_id).cloned()
    }

    fn ride_shard(&self, ride_id: Uuid) -> StoreResult<Shard> {
        self.shard(ride_id).ok_or(StoreError::RideNotFound(ride_id))
    }

    fn booking_shard(&self, booking_id: Uuid) -> StoreResult<Shard> {
        let ride_id = self
            .booking_index
            .read()
            .get(&booking_id)
            .copied()
            .ok_or(StoreError::BookingNotFound(booking_id))?;
        self.ride_shard(ride_id)
    }

    fn all_shards(&self) -> Vec<Shard> {
        self.rides.read().values().cloned().collect()
    }
}

#[async_trait]
impl RideRepository for MemoryStore {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()> {
        self.seed_ride(ride.clone());
        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> StoreResult<Option<Ride>> {
        Ok(self.ride_snapshot(id).await)
    }

    async fn list_rides_for_driver(&self, driver_id: Uuid) -> StoreResult<Vec<Ride>> {
        let mut rides = Vec::new();
        for shard in self.all_shards() {
            let guard = shard.lock().await;
            if guard.ride.driver_id == driver_id {
                rides.push(guard.ride.clone());
            }
        }
        rides.sort_by(|a, b| {
            (b.travel_date, b.departure_time).cmp(&(a.travel_date, a.departure_time))
        });
        Ok(rides)
    }

    async fn search_rides(
        &self,
        from_city: &str,
        to_city: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Ride>> {
        let from_city = from_city.to_lowercase();
        let to_city = to_city.to_lowercase();

        let mut rides = Vec::new();
        for shard in self.all_shards() {
            let guard = shard.lock().await;
            let ride = &guard.ride;
            if ride.status == RideStatus::Scheduled
                && ride.available_seats > 0
                && ride.travel_date == date
                && ride.from_city.to_lowercase() == from_city
                && ride.to_city.to_lowercase() == to_city
            {
                rides.push(ride.clone());
            }
        }
        rides.sort_by_key(|r| r.departure_time);
        Ok(rides)
    }

    async fn update_schedule(&self, id: Uuid, update: &RideUpdate) -> StoreResult<Ride> {
        let shard = self.ride_shard(id)?;
        let mut guard = shard.lock().await;
        if guard.ride.status.is_terminal() {
            return Err(StoreError::RideClosed {
                status: guard.ride.status,
            });
        }
        guard.ride.apply_update(update);
        Ok(guard.ride.clone())
    }

    async fn transition_ride(
        &self,
        id: Uuid,
        allowed_from: &'static [RideStatus],
        to: RideStatus,
    ) -> StoreResult<Ride> {
        let shard = self.ride_shard(id)?;
        let mut guard = shard.lock().await;
        if !allowed_from.contains(&guard.ride.status) {
            return Err(StoreError::RideStatusConflict {
                current: guard.ride.status,
                requested: to,
            });
        }
        guard.ride.update_status(to);
        Ok(guard.ride.clone())
    }

    async fn cancel_ride_cascade(&self, id: Uuid) -> StoreResult<RideCancellation> {
        let shard = self.ride_shard(id)?;
        let mut guard = shard.lock().await;
        if guard.ride.status.is_terminal() {
            return Err(StoreError::RideStatusConflict {
                current: guard.ride.status,
                requested: RideStatus::Cancelled,
            });
        }

        let mut cancelled = Vec::new();
        for booking in guard.bookings.values_mut() {
            if booking.status.holds_reservation() {
                let previous_status = booking.status;
                booking.update_status(BookingStatus::Cancelled);
                cancelled.push(CascadedBooking {
                    booking: booking.clone(),
                    previous_status,
                });
            }
        }
        cancelled.sort_by_key(|c| c.booking.booked_at);

        guard.ride.update_status(RideStatus::Cancelled);
        Ok(RideCancellation {
            ride: guard.ride.clone(),
            cancelled,
        })
    }
}

#[async_trait]
impl BookingRepository for MemoryStore {
    async fn create_booking(&self, booking: &Booking) -> StoreResult<i32> {
        let shard = self.ride_shard(booking.ride_id)?;
        let mut guard = shard.lock().await;

        let remaining = reserve_on(&mut guard.ride, booking.seats_booked)?;
        guard.bookings.insert(booking.id, booking.clone());
        self.booking_index.write().insert(booking.id, booking.ride_id);
        Ok(remaining)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let shard = match self.booking_shard(id) {
            Ok(shard) => shard,
            Err(StoreError::BookingNotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };
        let guard = shard.lock().await;
        Ok(guard.bookings.get(&id).cloned())
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &BookingTransition,
    ) -> StoreResult<Booking> {
        let shard = self.booking_shard(id)?;
        let mut guard = shard.lock().await;
        let RideShard { ride, bookings } = &mut *guard;

        let booking = bookings
            .get_mut(&id)
            .ok_or(StoreError::BookingNotFound(id))?;
        if !transition.permits(booking.status) {
            return Err(StoreError::BookingStatusConflict {
                current: booking.status,
                requested: transition.to,
            });
        }

        // Release first: if it fails the booking is untouched.
        if transition.release_seats {
            release_on(ride, booking.seats_booked)?;
        }
        booking.update_status(transition.to);
        if let Some(payment_id) = &transition.payment_id {
            booking.payment_id = Some(payment_id.clone());
        }
        Ok(booking.clone())
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> StoreResult<Vec<Booking>> {
        let shard = self.ride_shard(ride_id)?;
        let guard = shard.lock().await;
        let mut bookings: Vec<Booking> = guard.bookings.values().cloned().collect();
        bookings.sort_by_key(|b| b.booked_at);
        Ok(bookings)
    }

    async fn list_bookings_for_passenger(&self, passenger_id: Uuid) -> StoreResult<Vec<Booking>> {
        let mut bookings = Vec::new();
        for shard in self.all_shards() {
            let guard = shard.lock().await;
            bookings.extend(
                guard
                    .bookings
                    .values()
                    .filter(|b| b.passenger_id == passenger_id)
                    .cloned(),
            );
        }
        bookings.sort_by(|a, b| b.booked_at.cmp(&a.booked_at));
        Ok(bookings)
    }

    async fn list_pending_for_driver(&self, driver_id: Uuid) -> StoreResult<Vec<Booking>> {
        let mut bookings = Vec::new();
        for shard in self.all_shards() {
            let guard = shard.lock().await;
            if guard.ride.driver_id != driver_id {
                continue;
            }
            bookings.extend(
                guard
                    .bookings
                    .values()
                    .filter(|b| b.status == BookingStatus::Pending)
                    .cloned(),
            );
        }
        bookings.sort_by_key(|b| b.booked_at);
        Ok(bookings)
    }
}

#[async_trait]
impl DirectoryRepository for MemoryStore {
    async fn get_driver(&self, id: Uuid) -> StoreResult<Option<DriverProfile>> {
        Ok(self.drivers.read().get(&id).cloned())
    }

    async fn get_vehicle(&self, id: Uuid) -> StoreResult<Option<Vehicle>> {
        Ok(self.vehicles.read().get(&id).cloned())
    }
}
