use ride_shared::{BookingStatus, RideStatus};
use serde::Serialize;
use uuid::Uuid;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Failures reported by a persistence backend.
///
/// Everything except `Backend` is a guard that was evaluated inside the
/// atomic unit, so seeing one of them means nothing was written.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("ride {0} not found")]
    RideNotFound(Uuid),

    #[error("booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("seat quantity must be positive, got {0}")]
    InvalidQuantity(i32),

    #[error("ride is {status} and no longer accepts seat changes")]
    RideClosed { status: RideStatus },

    #[error("booking is {current}, cannot move to {requested}")]
    BookingStatusConflict {
        current: BookingStatus,
        requested: BookingStatus,
    },

    #[error("ride is {current}, cannot move to {requested}")]
    RideStatusConflict {
        current: RideStatus,
        requested: RideStatus,
    },

    #[error("storage backend failure")]
    Backend(#[source] BoxError),
}

impl StoreError {
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        StoreError::Backend(Box::new(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("ride {0} not found")]
    RideNotFound(Uuid),

    #[error("booking {0} not found")]
    BookingNotFound(Uuid),

    #[error("vehicle {0} not found")]
    VehicleNotFound(Uuid),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("invalid transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("insufficient seats: requested {requested}, available {available}")]
    InsufficientSeats { requested: i32, available: i32 },

    #[error("booking already paid with reference {existing}, got {attempted}")]
    PaymentConflict { existing: String, attempted: String },

    #[error("payment signature verification failed")]
    InvalidSignature,

    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// Display stays generic; the backend error is only reachable through `source()`.
    #[error("internal infrastructure error")]
    Infrastructure(#[source] BoxError),
}

impl CoreError {
    pub fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        CoreError::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    pub fn code(&self) -> FailureCode {
        match self {
            CoreError::InvalidRequest(_) => FailureCode::InvalidRequest,
            CoreError::RideNotFound(_)
            | CoreError::BookingNotFound(_)
            | CoreError::VehicleNotFound(_) => FailureCode::NotFound,
            CoreError::Unauthorized(_) => FailureCode::Unauthorized,
            CoreError::InvalidTransition { .. } => FailureCode::InvalidTransition,
            CoreError::InsufficientSeats { .. } => FailureCode::InsufficientSeats,
            CoreError::PaymentConflict { .. } => FailureCode::PaymentConflict,
            CoreError::InvalidSignature => FailureCode::InvalidSignature,
            CoreError::Gateway(_) => FailureCode::GatewayError,
            CoreError::Infrastructure(_) => FailureCode::Internal,
        }
    }

    /// Only infrastructure faults are worth retrying; every other variant is
    /// a deterministic answer for the same input and state.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CoreError::Infrastructure(_))
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RideNotFound(id) => CoreError::RideNotFound(id),
            StoreError::BookingNotFound(id) => CoreError::BookingNotFound(id),
            StoreError::InsufficientSeats {
                requested,
                available,
            } => CoreError::InsufficientSeats {
                requested,
                available,
            },
            StoreError::InvalidQuantity(n) => {
                CoreError::InvalidRequest(format!("seat quantity must be positive, got {}", n))
            }
            StoreError::RideClosed { status } => CoreError::invalid_transition(status, "MODIFIED"),
            StoreError::BookingStatusConflict { current, requested } => {
                CoreError::invalid_transition(current, requested)
            }
            StoreError::RideStatusConflict { current, requested } => {
                CoreError::invalid_transition(current, requested)
            }
            StoreError::Backend(source) => CoreError::Infrastructure(source),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;

/// Stable failure codes a boundary layer maps onto its own protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FailureCode {
    InvalidRequest,
    NotFound,
    Unauthorized,
    InvalidTransition,
    InsufficientSeats,
    PaymentConflict,
    InvalidSignature,
    GatewayError,
    Internal,
}

impl FailureCode {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureCode::InvalidRequest => "INVALID_REQUEST",
            FailureCode::NotFound => "NOT_FOUND",
            FailureCode::Unauthorized => "UNAUTHORIZED",
            FailureCode::InvalidTransition => "INVALID_TRANSITION",
            FailureCode::InsufficientSeats => "INSUFFICIENT_SEATS",
            FailureCode::PaymentConflict => "PAYMENT_CONFLICT",
            FailureCode::InvalidSignature => "INVALID_SIGNATURE",
            FailureCode::GatewayError => "GATEWAY_ERROR",
            FailureCode::Internal => "INTERNAL",
        }
    }
}

impl std::fmt::Display for FailureCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
