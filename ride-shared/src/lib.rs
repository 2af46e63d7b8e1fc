pub mod models;
pub mod pii;

pub use models::{
    Booking, BookingRequest, BookingStatus, CancellationReason, DriverProfile, NotificationEvent,
    Ride, RideSpec, RideStatus, RideUpdate, Vehicle,
};
pub use pii::Masked;
