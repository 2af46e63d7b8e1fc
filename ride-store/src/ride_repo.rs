use async_trait::async_trait;
use chrono::NaiveDate;
use ride_core::repository::{CascadedBooking, RideCancellation, RideRepository};
use ride_core::{StoreError, StoreResult};
use ride_shared::{Ride, RideStatus, RideUpdate};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{self, BookingRow, RideRow, BOOKING_COLUMNS, RIDE_COLUMNS};

pub struct PgRideRepository {
    pool: PgPool,
}

impl PgRideRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CascadeRow {
    #[sqlx(flatten)]
    booking: BookingRow,
    previous_status: String,
}

#[async_trait]
impl RideRepository for PgRideRepository {
    async fn insert_ride(&self, ride: &Ride) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO rides ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)",
            RIDE_COLUMNS
        ))
        .bind(ride.id)
        .bind(ride.driver_id)
        .bind(ride.vehicle_id)
        .bind(&ride.from_city)
        .bind(&ride.to_city)
        .bind(&ride.pickup_points)
        .bind(&ride.drop_points)
        .bind(ride.travel_date)
        .bind(ride.departure_time)
        .bind(ride.total_seats)
        .bind(ride.available_seats)
        .bind(ride.base_fare)
        .bind(ride.fare_per_km)
        .bind(ride.status.as_str())
        .bind(ride.created_at)
        .bind(ride.updated_at)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(())
    }

    async fn get_ride(&self, id: Uuid) -> StoreResult<Option<Ride>> {
        let row = sqlx::query_as::<_, RideRow>(&format!("SELECT {} FROM rides WHERE id = $1", RIDE_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(StoreError::backend)?;

        row.map(Ride::try_from).transpose()
    }

    async fn list_rides_for_driver(&self, driver_id: Uuid) -> StoreResult<Vec<Ride>> {
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            "SELECT {} FROM rides WHERE driver_id = $1 ORDER BY travel_date DESC, departure_time DESC",
            RIDE_COLUMNS
        ))
        .bind(driver_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows::collect(rows)
    }

    async fn search_rides(
        &self,
        from_city: &str,
        to_city: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Ride>> {
        let rows = sqlx::query_as::<_, RideRow>(&format!(
            r#"
            SELECT {}
            FROM rides
            WHERE LOWER(from_city) = LOWER($1)
              AND LOWER(to_city) = LOWER($2)
              AND travel_date = $3
              AND status = 'SCHEDULED'
              AND available_seats > 0
            ORDER BY departure_time
            "#,
            RIDE_COLUMNS
        ))
        .bind(from_city)
        .bind(to_city)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        rows::collect(rows)
    }

    async fn update_schedule(&self, id: Uuid, update: &RideUpdate) -> StoreResult<Ride> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let mut ride = rows::lock_ride(&mut tx, id).await?;
        if ride.status.is_terminal() {
            return Err(StoreError::RideClosed {
                status: ride.status,
            });
        }
        ride.apply_update(update);

        sqlx::query("UPDATE rides SET travel_date = $2, departure_time = $3, updated_at = $4 WHERE id = $1")
            .bind(id)
            .bind(ride.travel_date)
            .bind(ride.departure_time)
            .bind(ride.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(ride)
    }

    async fn transition_ride(
        &self,
        id: Uuid,
        allowed_from: &'static [RideStatus],
        to: RideStatus,
    ) -> StoreResult<Ride> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let mut ride = rows::lock_ride(&mut tx, id).await?;
        if !allowed_from.contains(&ride.status) {
            return Err(StoreError::RideStatusConflict {
                current: ride.status,
                requested: to,
            });
        }
        ride.update_status(to);

        sqlx::query("UPDATE rides SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(to.as_str())
            .bind(ride.updated_at)
            .execute(&mut *tx)
            .await
            .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;
        Ok(ride)
    }

    async fn cancel_ride_cascade(&self, id: Uuid) -> StoreResult<RideCancellation> {
        let mut tx = self.pool.begin().await.map_err(StoreError::backend)?;

        let ride = rows::lock_ride(&mut tx, id).await?;
        if ride.status.is_terminal() {
            return Err(StoreError::RideStatusConflict {
                current: ride.status,
                requested: RideStatus::Cancelled,
            });
        }

        let columns = BOOKING_COLUMNS
            .split(", ")
            .map(|c| format!("b.{}", c.trim()))
            .collect::<Vec<_>>()
            .join(", ");
        let cascaded = sqlx::query_as::<_, CascadeRow>(&format!(
            r#"
            WITH target AS (
                SELECT id, status FROM bookings
                WHERE ride_id = $1 AND status IN ('PENDING', 'APPROVED', 'PAID')
                FOR UPDATE
            )
            UPDATE bookings b
            SET status = 'CANCELLED', updated_at = NOW()
            FROM target t
            WHERE b.id = t.id
            RETURNING {}, t.status AS previous_status
            "#,
            columns
        ))
        .bind(id)
        .fetch_all(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        // The ride closes last, inside the same transaction.
        let row = sqlx::query_as::<_, RideRow>(&format!(
            "UPDATE rides SET status = 'CANCELLED', updated_at = NOW() WHERE id = $1 RETURNING {}",
            RIDE_COLUMNS
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(StoreError::backend)?;

        tx.commit().await.map_err(StoreError::backend)?;

        let mut cancelled = Vec::with_capacity(cascaded.len());
        for row in cascaded {
            cancelled.push(CascadedBooking {
                previous_status: row.previous_status.parse().map_err(StoreError::backend)?,
                booking: row.booking.try_into()?,
            });
        }
        cancelled.sort_by_key(|c| c.booking.booked_at);

        Ok(RideCancellation {
            ride: row.try_into()?,
            cancelled,
        })
    }
}
