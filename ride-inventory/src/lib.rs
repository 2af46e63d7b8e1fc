pub mod ledger;
pub mod lifecycle;
pub mod search;

pub use ledger::{release_on, reserve_on, SeatRelease};
pub use lifecycle::{RideLifecycle, RideRules};
pub use search::InventoryQueryService;
