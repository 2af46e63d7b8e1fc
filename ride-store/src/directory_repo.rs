use async_trait::async_trait;
use ride_core::repository::DirectoryRepository;
use ride_core::{StoreError, StoreResult};
use ride_shared::{DriverProfile, Vehicle};
use sqlx::PgPool;
use uuid::Uuid;

use crate::rows::{DriverRow, VehicleRow};

pub struct PgDirectoryRepository {
    pool: PgPool,
}

impl PgDirectoryRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DirectoryRepository for PgDirectoryRepository {
    async fn get_driver(&self, id: Uuid) -> StoreResult<Option<DriverProfile>> {
        let row = sqlx::query_as::<_, DriverRow>(
            "SELECT id, first_name, last_name, phone FROM users WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(DriverProfile::from))
    }

    async fn get_vehicle(&self, id: Uuid) -> StoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            r#"
            SELECT id, driver_id, company, model, colour, car_number, seats, has_ac, is_active
            FROM vehicles
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;

        Ok(row.map(Vehicle::from))
    }
}
