pub mod error;
pub mod json;
pub mod rest_api;
pub mod state;

pub use rest_api::router;

/// Version reported by the health check.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
