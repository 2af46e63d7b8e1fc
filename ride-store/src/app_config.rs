use ride_inventory::RideRules;
use ride_shared::Masked;
use serde::Deserialize;
use std::env;

const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub kafka: KafkaConfig,
    pub payment: PaymentConfig,
    pub business_rules: BusinessRules,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_secs: u64,
}

fn default_max_connections() -> u32 { 5 }
fn default_acquire_timeout() -> u64 { 3 }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub group_id: String,
    /// Notifications go to `<prefix>.<event kind>`.
    pub notification_topic_prefix: String,
    pub payment_topic: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PaymentConfig {
    pub key_id: String,
    pub key_secret: Masked<String>,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    pub max_route_points: usize,
    pub min_seats: i32,
    pub max_seats: i32,
}

impl From<&BusinessRules> for RideRules {
    fn from(rules: &BusinessRules) -> Self {
        RideRules {
            max_route_points: rules.max_route_points,
            min_seats: rules.min_seats,
            max_seats: rules.max_seats,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            // Compiled-in defaults, so the binary starts from any working directory
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // Eg.. `RIDESHARE__DATABASE__URL=postgres://...`
            .add_source(config::Environment::with_prefix("RIDESHARE").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
