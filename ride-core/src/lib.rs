pub mod error;
pub mod notify;
pub mod payment;
pub mod repository;
pub mod search;

pub use error::{BoxError, CoreError, CoreResult, FailureCode, StoreError, StoreResult};
