pub mod booking;
pub mod directory;
pub mod events;
pub mod ride;

pub use booking::{Booking, BookingRequest, BookingStatus};
pub use directory::{DriverProfile, Vehicle};
pub use events::{
    BookingApprovedEvent, BookingCancelledEvent, BookingPaidEvent, BookingRejectedEvent,
    CancellationReason, NotificationEvent,
};
pub use ride::{Ride, RideSpec, RideStatus, RideUpdate};

/// Returned when a persisted status string does not name a known status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl std::fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}
