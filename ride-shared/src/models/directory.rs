use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Driver contact details as owned by the user registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DriverProfile {
    pub id: Uuid,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
}

impl DriverProfile {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Vehicle registered by a driver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: Uuid,
    pub driver_id: Uuid,
    pub company: String,
    pub model: String,
    pub colour: String,
    pub car_number: String,
    pub seats: i32,
    pub has_ac: bool,
    pub is_active: bool,
}
