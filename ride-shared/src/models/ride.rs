use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::UnknownStatus;

/// Ride status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RideStatus {
    Scheduled,
    Active,
    Completed,
    Cancelled,
}

impl RideStatus {
    /// Completed and cancelled rides accept no further seat mutation.
    pub fn is_terminal(self) -> bool {
        matches!(self, RideStatus::Completed | RideStatus::Cancelled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RideStatus::Scheduled => "SCHEDULED",
            RideStatus::Active => "ACTIVE",
            RideStatus::Completed => "COMPLETED",
            RideStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for RideStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RideStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(RideStatus::Scheduled),
            "ACTIVE" => Ok(RideStatus::Active),
            "COMPLETED" => Ok(RideStatus::Completed),
            "CANCELLED" => Ok(RideStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A trip offer published by a driver.
///
/// `available_seats` is owned by the seat ledger: it only moves through
/// reservation and release, and always stays within `0..=total_seats`.
/// Fares are in minor currency units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ride {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub vehicle_id: Uuid,
    pub from_city: String,
    pub to_city: String,
    pub pickup_points: Vec<String>,
    pub drop_points: Vec<String>,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub total_seats: i32,
    pub available_seats: i32,
    pub base_fare: i64,
    pub fare_per_km: i64,
    pub status: RideStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Ride {
    pub fn new(driver_id: Uuid, spec: RideSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            driver_id,
            vehicle_id: spec.vehicle_id,
            from_city: spec.from_city.trim().to_string(),
            to_city: spec.to_city.trim().to_string(),
            pickup_points: spec.pickup_points,
            drop_points: spec.drop_points,
            travel_date: spec.travel_date,
            departure_time: spec.departure_time,
            total_seats: spec.total_seats,
            available_seats: spec.total_seats,
            base_fare: spec.base_fare,
            fare_per_km: spec.fare_per_km,
            status: RideStatus::Scheduled,
            created_at: now,
            updated_at: now,
        }
    }

    /// Seats currently held by live bookings.
    pub fn reserved_seats(&self) -> i32 {
        self.total_seats - self.available_seats
    }

    pub fn is_owned_by(&self, driver_id: Uuid) -> bool {
        self.driver_id == driver_id
    }

    pub fn update_status(&mut self, new_status: RideStatus) {
        self.status = new_status;
        self.updated_at = Utc::now();
    }

    /// Apply a schedule edit. Seat counts are never touched here.
    pub fn apply_update(&mut self, update: &RideUpdate) {
        if let Some(date) = update.travel_date {
            self.travel_date = date;
        }
        if let Some(time) = update.departure_time {
            self.departure_time = time;
        }
        self.updated_at = Utc::now();
    }
}

/// Driver-supplied description of a new ride.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RideSpec {
    pub vehicle_id: Uuid,
    pub from_city: String,
    pub to_city: String,
    pub pickup_points: Vec<String>,
    pub drop_points: Vec<String>,
    pub travel_date: NaiveDate,
    #[serde(with = "flexible_time")]
    pub departure_time: NaiveTime,
    pub total_seats: i32,
    pub base_fare: i64,
    pub fare_per_km: i64,
}

/// The only fields a driver may edit after posting.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RideUpdate {
    #[serde(default)]
    pub travel_date: Option<NaiveDate>,
    #[serde(default, with = "flexible_time::option")]
    pub departure_time: Option<NaiveTime>,
}

impl RideUpdate {
    pub fn is_empty(&self) -> bool {
        self.travel_date.is_none() && self.departure_time.is_none()
    }
}

/// Accepts both `HH:MM:SS` and `HH:MM` departure times.
mod flexible_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M:%S";

    pub(super) fn parse(raw: &str) -> Result<NaiveTime, chrono::ParseError> {
        NaiveTime::parse_from_str(raw, FORMAT).or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
    }

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(raw.trim()).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use chrono::NaiveTime;
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            time: &Option<NaiveTime>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match time {
                Some(t) => super::serialize(t, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<NaiveTime>, D::Error> {
            let raw = Option::<String>::deserialize(deserializer)?;
            raw.map(|s| super::parse(s.trim()).map_err(serde::de::Error::custom))
                .transpose()
        }
    }
}
