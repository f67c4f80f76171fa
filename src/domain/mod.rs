//! Domain models - check-in types
//!
//! This module contains the canonical data types used throughout the system:
//! - `GeoPoint` / `GeoZone` - coordinates and circular check-in zones
//! - `QrToken` - the shared QR secret
//! - `CheckInAttempt` / `ActivityWindow` - inputs of a check-in decision
//! - `Decision` / `RejectionReason` - its outcome

pub mod types;

pub use types::{
    ActivityWindow, CheckInAttempt, Decision, GeoPoint, GeoZone, QrToken, RejectionReason,
};
