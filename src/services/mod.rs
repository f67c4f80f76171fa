//! Services - check-in business logic
//!
//! - `qr` - QR payload format and shared-secret validation
//! - `geofence` - Haversine distance and zone membership
//! - `eligibility` - Ordered accept/reject decision

pub mod eligibility;
pub mod geofence;
pub mod qr;

// Re-export commonly used types
pub use eligibility::CheckInGate;
pub use geofence::{distance_km, GeofenceEvaluator};
pub use qr::{QrTokenValidator, PAYLOAD_PREFIX};
