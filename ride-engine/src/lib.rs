pub mod engine;
pub mod worker;

pub use engine::{Engine, EngineParts};
