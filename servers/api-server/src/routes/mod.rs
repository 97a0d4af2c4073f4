//! Route modules for the admin/read API.
//!
//! Each module owns one slice of the Engine's public surface and
//! builds its own `Router<AppState>`.

pub mod buildings;
pub mod health;
pub mod ingest;
pub mod properties;
