use async_trait::async_trait;
use ride_core::repository::{BookingRepository, BookingTransition};
use ride_core::{StoreError, StoreResult};
use ride_inventory::release_on;
use ride_shared::Booking;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::rows::{self, BookingRow, BOOKING_COLUMNS};

pub struct PgBookingRepository {
    pool: PgPool,
}

impl PgBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingRepository for PgBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> StoreResult<i32> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let remaining = rows::reserve_seats(&mut tx, booking.ride_id, booking.seats_booked).await?;

        sqlx::query(&format!(
            "INSERT INTO bookings ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
            BOOKING_COLUMNS
        ))
        .bind(booking.id)
        .bind(booking.ride_id)
        .bind(booking.passenger_id)
        .bind(&booking.pickup_location)
        .bind(&booking.drop_location)
        .bind(booking.seats_booked)
        .bind(booking.total_fare)
        .bind(booking.status.as_str())
        .bind(&booking.payment_id)
        .bind(booking.booked_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(remaining)
    }

    async fn get_booking(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        row.map(Booking::try_from).transpose()
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        transition: &BookingTransition,
    ) -> StoreResult<Booking> {
        // ride_id never changes, so it can be read before locking.
        let ride_id: Option<Uuid> = sqlx::query_scalar("SELECT ride_id FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        let ride_id = ride_id.ok_or(StoreError::BookingNotFound(id))?;

        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        // Ride before booking, the same order the cancellation cascade uses.
        let mut ride = rows::lock_ride(&mut tx, ride_id).await?;
        let mut booking = rows::lock_booking(&mut tx, id).await?;

        if !transition.permits(booking.status) {
            return Err(StoreError::BookingStatusConflict {
                current: booking.status,
                requested: transition.to,
            });
        }

        if transition.release_seats {
            let release = release_on(&mut ride, booking.seats_booked)?;
            if release.released > 0 {
                rows::store_seats(&mut tx, &ride).await?;
            }
        }

        booking.update_status(transition.to);
        if let Some(payment_id) = &transition.payment_id {
            booking.payment_id = Some(payment_id.clone());
        }

        sqlx::query("UPDATE bookings SET status = $2, payment_id = $3, updated_at = $4 WHERE id = $1")
            .bind(id)
            .bind(booking.status.as_str())
            .bind(&booking.payment_id)
            .bind(booking.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        debug!(booking_id = %id, status = %booking.status, "Booking transition committed");
        Ok(booking)
    }

    async fn list_bookings_for_ride(&self, ride_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE ride_id = $1 ORDER BY booked_at",
            BOOKING_COLUMNS
        ))
        .bind(ride_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows::collect(rows)
    }

    async fn list_bookings_for_passenger(&self, passenger_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE passenger_id = $1 ORDER BY booked_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(passenger_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows::collect(rows)
    }

    async fn list_pending_for_driver(&self, driver_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(
            r#"
            SELECT b.id, b.ride_id, b.passenger_id, b.pickup_location, b.drop_location,
                   b.seats_booked, b.total_fare, b.status, b.payment_id, b.booked_at, b.updated_at
            FROM bookings b
            JOIN rides r ON r.id = b.ride_id
            WHERE r.driver_id = $1 AND b.status = 'PENDING'
            ORDER BY b.booked_at
            "#,
        )
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows::collect(rows)
    }
}
