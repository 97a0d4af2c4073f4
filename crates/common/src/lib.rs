//! Shared error types, configuration, and telemetry bootstrap used by
//! every crate in the workspace.

pub mod config;
pub mod errors;
pub mod telemetry;

pub use config::CoreConfig;
pub use errors::{AppError, ErrorResponse, ValidationError};
