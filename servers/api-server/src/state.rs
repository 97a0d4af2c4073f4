//! Application state.

use std::time::Instant;

use core_engine::Engine;

/// Application state shared across all handlers: the engine (a cheap
/// pool handle, cloned per request) plus the process start time used
/// by the health check's uptime figure.
#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub boot_time: Instant,
}

impl AppState {
    pub fn new(engine: Engine) -> Self {
        Self {
            engine,
            boot_time: Instant::now(),
        }
    }
}
