// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod scheduler;
pub mod seen;
pub mod session;
pub mod stats;
pub mod stream;
pub mod validate;

// ---- Re-exports for stable public API ----
pub use crate::api::{create_router, AppState};
pub use crate::config::RelayConfig;
pub use crate::error::RelayError;
pub use crate::seen::SeenSet;
