//! Shared types for check-in verification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coordinate in degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    #[inline]
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Both components are finite and inside their valid degree ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Circular check-in zone
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoZone {
    pub name: String,
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl GeoZone {
    pub fn new(name: impl Into<String>, center: GeoPoint, radius_km: f64) -> Self {
        Self { name: name.into(), center, radius_km }
    }
}

/// Shared QR secret. Debug output never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct QrToken(String);

impl QrToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for QrToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("QrToken(***)")
    }
}

/// A single user check-in action
#[derive(Debug, Clone)]
pub struct CheckInAttempt {
    pub scanned_payload: String,
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
}

impl CheckInAttempt {
    pub fn new(scanned_payload: impl Into<String>, location: GeoPoint, timestamp: DateTime<Utc>) -> Self {
        Self { scanned_payload: scanned_payload.into(), location, timestamp }
    }
}

/// Start/end of an activity, both instants included
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl ActivityWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at <= self.end
    }
}

/// Why a check-in attempt was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    InvalidQrFormat,
    InvalidQrToken,
    OutOfZone,
    OutsideTimeWindow,
}

impl RejectionReason {
    pub const ALL: [RejectionReason; 4] = [
        RejectionReason::InvalidQrFormat,
        RejectionReason::InvalidQrToken,
        RejectionReason::OutOfZone,
        RejectionReason::OutsideTimeWindow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::InvalidQrFormat => "invalid_qr_format",
            RejectionReason::InvalidQrToken => "invalid_qr_token",
            RejectionReason::OutOfZone => "out_of_zone",
            RejectionReason::OutsideTimeWindow => "outside_time_window",
        }
    }

    /// Message suitable for showing to the volunteer
    pub fn message(&self) -> &'static str {
        match self {
            RejectionReason::InvalidQrFormat => "This is not a check-in QR code.",
            RejectionReason::InvalidQrToken => "This check-in QR code is not valid.",
            RejectionReason::OutOfZone => "You are not at a check-in location.",
            RejectionReason::OutsideTimeWindow => "Check-in is not open for this activity right now.",
        }
    }

    /// Dense index used by the metrics counters
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            RejectionReason::InvalidQrFormat => 0,
            RejectionReason::InvalidQrToken => 1,
            RejectionReason::OutOfZone => 2,
            RejectionReason::OutsideTimeWindow => 3,
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a check-in evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Accepted,
    Rejected(RejectionReason),
}

impl Decision {
    #[inline]
    pub fn is_accepted(&self) -> bool {
        matches!(self, Decision::Accepted)
    }

    pub fn rejection(&self) -> Option<RejectionReason> {
        match self {
            Decision::Accepted => None,
            Decision::Rejected(reason) => Some(*reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_window_contains_is_inclusive() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let window = ActivityWindow::new(start, end);

        assert!(window.contains(start));
        assert!(window.contains(end));
        assert!(!window.contains(start - chrono::Duration::seconds(1)));
        assert!(!window.contains(end + chrono::Duration::seconds(1)));
    }

    #[test]
    fn test_inverted_window_contains_nothing() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let window = ActivityWindow::new(start, end);

        assert!(!window.contains(start));
        assert!(!window.contains(end));
    }

    #[test]
    fn test_qr_token_debug_is_redacted() {
        let token = QrToken::new("secret123");
        let debug = format!("{:?}", token);
        assert!(!debug.contains("secret123"));
    }

    #[test]
    fn test_rejection_reason_serde_code() {
        let json = serde_json::to_string(&RejectionReason::OutOfZone).unwrap();
        assert_eq!(json, "\"out_of_zone\"");
        for reason in RejectionReason::ALL {
            assert_eq!(
                serde_json::to_string(&reason).unwrap(),
                format!("\"{}\"", reason.as_str())
            );
        }
    }

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(25.03, 121.56).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
