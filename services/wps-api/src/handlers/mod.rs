//! HTTP handlers.

pub mod health;
pub mod processes;

pub use processes::ApiError;
