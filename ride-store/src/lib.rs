pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod directory_repo;
pub mod events;
pub mod memory;
pub mod ride_repo;
mod rows;

pub use app_config::Config;
pub use booking_repo::PgBookingRepository;
pub use database::DbClient;
pub use directory_repo::PgDirectoryRepository;
pub use events::{EventProducer, KafkaNotificationSink};
pub use memory::MemoryStore;
pub use ride_repo::PgRideRepository;
