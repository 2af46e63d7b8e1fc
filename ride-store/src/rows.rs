use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use ride_core::{StoreError, StoreResult};
use ride_shared::{Booking, DriverProfile, Ride, RideStatus, Vehicle};
use sqlx::PgConnection;
use uuid::Uuid;

pub(crate) const RIDE_COLUMNS: &str = "id, driver_id, vehicle_id, from_city, to_city, \
    pickup_points, drop_points, travel_date, departure_time, total_seats, available_seats, \
    base_fare, fare_per_km, status, created_at, updated_at";

pub(crate) const BOOKING_COLUMNS: &str = "id, ride_id, passenger_id, pickup_location, \
    drop_location, seats_booked, total_fare, status, payment_id, booked_at, updated_at";

#[derive(sqlx::FromRow)]
pub(crate) struct RideRow {
    id: Uuid,
    driver_id: Uuid,
    vehicle_id: Uuid,
    from_city: String,
    to_city: String,
    pickup_points: Vec<String>,
    drop_points: Vec<String>,
    travel_date: NaiveDate,
    departure_time: NaiveTime,
    total_seats: i32,
    available_seats: i32,
    base_fare: i64,
    fare_per_km: i64,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RideRow> for Ride {
    type Error = StoreError;

    fn try_from(row: RideRow) -> Result<Self, Self::Error> {
        Ok(Ride {
            id: row.id,
            driver_id: row.driver_id,
            vehicle_id: row.vehicle_id,
            from_city: row.from_city,
            to_city: row.to_city,
            pickup_points: row.pickup_points,
            drop_points: row.drop_points,
            travel_date: row.travel_date,
            departure_time: row.departure_time,
            total_seats: row.total_seats,
            available_seats: row.available_seats,
            base_fare: row.base_fare,
            fare_per_km: row.fare_per_km,
            status: row.status.parse().map_err(StoreError::backend)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookingRow {
    id: Uuid,
    ride_id: Uuid,
    passenger_id: Uuid,
    pickup_location: String,
    drop_location: String,
    seats_booked: i32,
    total_fare: i64,
    status: String,
    payment_id: Option<String>,
    booked_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<BookingRow> for Booking {
    type Error = StoreError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(Booking {
            id: row.id,
            ride_id: row.ride_id,
            passenger_id: row.passenger_id,
            pickup_location: row.pickup_location,
            drop_location: row.drop_location,
            seats_booked: row.seats_booked,
            total_fare: row.total_fare,
            status: row.status.parse().map_err(StoreError::backend)?,
            payment_id: row.payment_id,
            booked_at: row.booked_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct DriverRow {
    id: Uuid,
    first_name: String,
    last_name: String,
    phone: Option<String>,
}

impl From<DriverRow> for DriverProfile {
    fn from(row: DriverRow) -> Self {
        DriverProfile {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            phone: row.phone,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct VehicleRow {
    id: Uuid,
    driver_id: Uuid,
    company: String,
    model: String,
    colour: String,
    car_number: String,
    seats: i32,
    has_ac: bool,
    is_active: bool,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        Vehicle {
            id: row.id,
            driver_id: row.driver_id,
            company: row.company,
            model: row.model,
            colour: row.colour,
            car_number: row.car_number,
            seats: row.seats,
            has_ac: row.has_ac,
            is_active: row.is_active,
        }
    }
}

pub(crate) fn collect<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// Row-locks the ride for the rest of the transaction.
pub(crate) async fn lock_ride(conn: &mut PgConnection, ride_id: Uuid) -> StoreResult<Ride> {
    let row = sqlx::query_as::<_, RideRow>(&format!(
        "SELECT {} FROM rides WHERE id = $1 FOR UPDATE",
        RIDE_COLUMNS
    ))
    .bind(ride_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StoreError::backend)?;

    row.ok_or(StoreError::RideNotFound(ride_id))?.try_into()
}

pub(crate) async fn lock_booking(conn: &mut PgConnection, booking_id: Uuid) -> StoreResult<Booking> {
    let row = sqlx::query_as::<_, BookingRow>(&format!(
        "SELECT {} FROM bookings WHERE id = $1 FOR UPDATE",
        BOOKING_COLUMNS
    ))
    .bind(booking_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StoreError::backend)?;

    row.ok_or(StoreError::BookingNotFound(booking_id))?.try_into()
}

pub(crate) async fn store_seats(conn: &mut PgConnection, ride: &Ride) -> StoreResult<()> {
    sqlx::query("UPDATE rides SET available_seats = $2, updated_at = $3 WHERE id = $1")
        .bind(ride.id)
        .bind(ride.available_seats)
        .bind(ride.updated_at)
        .execute(&mut *conn)
        .await
        .map_err(StoreError::backend)?;
    Ok(())
}

/// Conditional decrement: succeeds only while the ride is open and has the
/// seats, so concurrent writers never overdraw. On a miss the row is read
/// back to report why.
pub(crate) async fn reserve_seats(conn: &mut PgConnection, ride_id: Uuid, seats: i32) -> StoreResult<i32> {
    if seats < 1 {
        return Err(StoreError::InvalidQuantity(seats));
    }

    let remaining: Option<i32> = sqlx::query_scalar(
        r#"
        UPDATE rides
        SET available_seats = available_seats - $2, updated_at = NOW()
        WHERE id = $1 AND available_seats >= $2 AND status IN ('SCHEDULED', 'ACTIVE')
        RETURNING available_seats
        "#,
    )
    .bind(ride_id)
    .bind(seats)
    .fetch_optional(&mut *conn)
    .await
    .map_err(StoreError::backend)?;

    if let Some(remaining) = remaining {
        return Ok(remaining);
    }

    let current: Option<(String, i32)> =
        sqlx::query_as("SELECT status, available_seats FROM rides WHERE id = $1")
            .bind(ride_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(StoreError::backend)?;

    let (status, available) = current.ok_or(StoreError::RideNotFound(ride_id))?;
    let status: RideStatus = status.parse().map_err(StoreError::backend)?;
    if status.is_terminal() {
        return Err(StoreError::RideClosed { status });
    }
    Err(StoreError::InsufficientSeats {
        requested: seats,
        available,
    })
}
