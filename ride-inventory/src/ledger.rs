//! Seat arithmetic for a ride held under its store's lock.
//!
//! Every store runs these inside the same atomic unit as the booking write
//! that needs them: reservation with the booking insert, release with the
//! status change that frees the seats.

use chrono::Utc;
use ride_core::{StoreError, StoreResult};
use ride_shared::Ride;
use tracing::warn;

/// Outcome of returning seats to a ride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeatRelease {
    pub available: i32,
    pub released: i32,
    /// The ride could not absorb the full amount without exceeding capacity.
    pub clamped: bool,
}

/// Debit `seats` from a ride the caller holds exclusively. Returns the new
/// available count.
pub fn reserve_on(ride: &mut Ride, seats: i32) -> StoreResult<i32> {
    if seats < 1 {
        return Err(StoreError::InvalidQuantity(seats));
    }
    if ride.status.is_terminal() {
        return Err(StoreError::RideClosed {
            status: ride.status,
        });
    }
    if ride.available_seats < seats {
        return Err(StoreError::InsufficientSeats {
            requested: seats,
            available: ride.available_seats,
        });
    }

    ride.available_seats -= seats;
    ride.updated_at = Utc::now();
    Ok(ride.available_seats)
}

/// Credit `seats` back to a ride the caller holds exclusively, never above
/// `total_seats`.
pub fn release_on(ride: &mut Ride, seats: i32) -> StoreResult<SeatRelease> {
    if seats < 1 {
        return Err(StoreError::InvalidQuantity(seats));
    }
    if ride.status.is_terminal() {
        return Err(StoreError::RideClosed {
            status: ride.status,
        });
    }

    let headroom = ride.total_seats - ride.available_seats;
    let released = seats.min(headroom);
    let clamped = released < seats;
    if clamped {
        warn!(
            ride_id = %ride.id,
            requested = seats,
            released,
            total_seats = ride.total_seats,
            "Seat release clamped at capacity, probable double release"
        );
    }

    ride.available_seats += released;
    ride.updated_at = Utc::now();
    Ok(SeatRelease {
        available: ride.available_seats,
        released,
        clamped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveTime};
    use ride_shared::{RideSpec, RideStatus};
    use uuid::Uuid;

    fn ride(total_seats: i32) -> Ride {
        Ride::new(
            Uuid::new_v4(),
            RideSpec {
                vehicle_id: Uuid::new_v4(),
                from_city: "Pune".to_string(),
                to_city: "Nashik".to_string(),
                pickup_points: vec![],
                drop_points: vec![],
                travel_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
                departure_time: NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                total_seats,
                base_fare: 30_000,
                fare_per_km: 800,
            },
        )
    }

    #[test]
    fn test_seat_ledger_lifecycle() {
        let mut ride = ride(4);

        assert_eq!(reserve_on(&mut ride, 3).unwrap(), 1);
        assert_eq!(ride.reserved_seats(), 3);

        let release = release_on(&mut ride, 2).unwrap();
        assert_eq!(release.available, 3);
        assert_eq!(release.released, 2);
        assert!(!release.clamped);
    }

    #[test]
    fn test_reserve_cannot_overdraw() {
        let mut ride = ride(2);
        reserve_on(&mut ride, 1).unwrap();

        match reserve_on(&mut ride, 2) {
            Err(StoreError::InsufficientSeats {
                requested,
                available,
            }) => {
                assert_eq!(requested, 2);
                assert_eq!(available, 1);
            }
            other => panic!("expected InsufficientSeats, got {:?}", other),
        }
        assert_eq!(ride.available_seats, 1);
    }

    #[test]
    fn test_release_is_clamped_at_capacity() {
        let mut ride = ride(3);
        reserve_on(&mut ride, 1).unwrap();

        let release = release_on(&mut ride, 2).unwrap();
        assert!(release.clamped);
        assert_eq!(release.released, 1);
        assert_eq!(ride.available_seats, ride.total_seats);
    }

    #[test]
    fn test_terminal_ride_rejects_seat_changes() {
        let mut ride = ride(3);
        reserve_on(&mut ride, 1).unwrap();
        ride.update_status(RideStatus::Completed);

        assert!(matches!(
            reserve_on(&mut ride, 1),
            Err(StoreError::RideClosed { status: RideStatus::Completed })
        ));
        assert!(matches!(
            release_on(&mut ride, 1),
            Err(StoreError::RideClosed { .. })
        ));
        assert_eq!(ride.available_seats, 2);
    }

    #[test]
    fn test_non_positive_quantities_are_rejected() {
        let mut ride = ride(3);
        assert!(matches!(reserve_on(&mut ride, 0), Err(StoreError::InvalidQuantity(0))));
        assert!(matches!(release_on(&mut ride, -1), Err(StoreError::InvalidQuantity(-1))));
        assert_eq!(ride.available_seats, 3);
    }
}
