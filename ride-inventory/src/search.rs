use chrono::NaiveDate;
use ride_core::repository::{DirectoryRepository, RideRepository};
use ride_core::search::{DriverSummary, RideSearchResult, VehicleSummary};
use ride_core::{CoreError, CoreResult};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Read-side search over open rides, joined with driver and vehicle data.
pub struct InventoryQueryService {
    rides: Arc<dyn RideRepository>,
    directory: Arc<dyn DirectoryRepository>,
}

impl InventoryQueryService {
    pub fn new(rides: Arc<dyn RideRepository>, directory: Arc<dyn DirectoryRepository>) -> Self {
        Self { rides, directory }
    }

    /// Scheduled rides with free seats on the given route and date, earliest
    /// departure first.
    pub async fn search(
        &self,
        from_city: &str,
        to_city: &str,
        date: NaiveDate,
    ) -> CoreResult<Vec<RideSearchResult>> {
        let from_city = from_city.trim();
        let to_city = to_city.trim();
        if from_city.is_empty() || to_city.is_empty() {
            return Err(CoreError::InvalidRequest(
                "both cities are required".to_string(),
            ));
        }

        let mut rides = self.rides.search_rides(from_city, to_city, date).await?;
        rides.sort_by_key(|r| (r.departure_time, r.id));

        // A driver usually has several rides on a popular route.
        let mut drivers: HashMap<Uuid, Option<DriverSummary>> = HashMap::new();
        let mut results = Vec::with_capacity(rides.len());
        for ride in rides {
            let driver = match drivers.get(&ride.driver_id) {
                Some(cached) => cached.clone(),
                None => {
                    let found = self
                        .directory
                        .get_driver(ride.driver_id)
                        .await?
                        .map(DriverSummary::from);
                    drivers.insert(ride.driver_id, found.clone());
                    found
                }
            };
            let vehicle = self
                .directory
                .get_vehicle(ride.vehicle_id)
                .await?
                .map(VehicleSummary::from);

            if driver.is_none() || vehicle.is_none() {
                debug!(ride_id = %ride.id, "Search result missing driver or vehicle details");
            }
            results.push(RideSearchResult::compose(ride, driver, vehicle));
        }

        Ok(results)
    }
}
