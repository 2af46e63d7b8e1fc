use chrono::{NaiveDate, NaiveTime};
use ride_shared::{DriverProfile, Ride, Vehicle};
use serde::Serialize;
use uuid::Uuid;

/// Public driver contact: name and phone, never credentials.
#[derive(Debug, Clone, Serialize)]
pub struct DriverSummary {
    pub id: Uuid,
    pub name: String,
    pub phone: Option<String>,
}

impl From<DriverProfile> for DriverSummary {
    fn from(profile: DriverProfile) -> Self {
        Self {
            id: profile.id,
            name: profile.display_name(),
            phone: profile.phone,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct VehicleSummary {
    pub company: String,
    pub model: String,
    pub colour: String,
    pub car_number: String,
    pub has_ac: bool,
}

impl From<Vehicle> for VehicleSummary {
    fn from(vehicle: Vehicle) -> Self {
        Self {
            company: vehicle.company,
            model: vehicle.model,
            colour: vehicle.colour,
            car_number: vehicle.car_number,
            has_ac: vehicle.has_ac,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RideSearchResult {
    pub ride_id: Uuid,
    pub from_city: String,
    pub to_city: String,
    pub pickup_points: Vec<String>,
    pub drop_points: Vec<String>,
    pub travel_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub available_seats: i32,
    pub base_fare: i64,
    pub fare_per_km: i64,
    pub driver: Option<DriverSummary>,
    pub vehicle: Option<VehicleSummary>,
}

impl RideSearchResult {
    pub fn compose(ride: Ride, driver: Option<DriverSummary>, vehicle: Option<VehicleSummary>) -> Self {
        Self {
            ride_id: ride.id,
            from_city: ride.from_city,
            to_city: ride.to_city,
            pickup_points: ride.pickup_points,
            drop_points: ride.drop_points,
            travel_date: ride.travel_date,
            departure_time: ride.departure_time,
            available_seats: ride.available_seats,
            base_fare: ride.base_fare,
            fare_per_km: ride.fare_per_km,
            driver,
            vehicle,
        }
    }
}
