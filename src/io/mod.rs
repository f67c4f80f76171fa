//! IO modules - external interfaces
//!
//! - `http_api` - HTTP server exposing the check-in decision, health and metrics
//! - `prometheus` - Prometheus text formatting of the check-in counters

pub mod http_api;
pub mod prometheus;

// Re-export commonly used types
pub use http_api::{start_api_server, ApiState, CheckInRequest, CheckInResponse};
