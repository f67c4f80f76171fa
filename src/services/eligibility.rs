//! Check-in eligibility decision
//!
//! Combines the QR validator, the geofence and the activity window into a
//! single accept/reject outcome. Checks run in a fixed order and the first
//! failure determines the rejection reason:
//! format -> token -> location -> time.

use crate::domain::types::{
    ActivityWindow, CheckInAttempt, Decision, GeoZone, QrToken, RejectionReason,
};
use crate::infra::config::Config;
use crate::services::geofence::GeofenceEvaluator;
use crate::services::qr::QrTokenValidator;

/// Immutable check-in gate, shared across requests
pub struct CheckInGate {
    qr: QrTokenValidator,
    geofence: GeofenceEvaluator,
}

impl CheckInGate {
    pub fn new(token: QrToken, zones: Vec<GeoZone>) -> Self {
        Self { qr: QrTokenValidator::new(token), geofence: GeofenceEvaluator::new(zones) }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.qr_token().clone(), config.zones().to_vec())
    }

    pub fn qr(&self) -> &QrTokenValidator {
        &self.qr
    }

    pub fn geofence(&self) -> &GeofenceEvaluator {
        &self.geofence
    }

    /// Decide whether `attempt` may check in to the activity running during `window`
    pub fn evaluate(&self, attempt: &CheckInAttempt, window: &ActivityWindow) -> Decision {
        let Some(token) = self.qr.parse_payload(&attempt.scanned_payload) else {
            return Decision::Rejected(RejectionReason::InvalidQrFormat);
        };

        if !self.qr.is_valid_token(token) {
            return Decision::Rejected(RejectionReason::InvalidQrToken);
        }

        if !self.geofence.is_within_any_zone(attempt.location) {
            return Decision::Rejected(RejectionReason::OutOfZone);
        }

        if !window.contains(attempt.timestamp) {
            return Decision::Rejected(RejectionReason::OutsideTimeWindow);
        }

        Decision::Accepted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::GeoPoint;
    use crate::services::geofence::EARTH_RADIUS_KM;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const HALL: GeoPoint = GeoPoint { latitude: 25.0330, longitude: 121.5654 };

    fn gate() -> CheckInGate {
        CheckInGate::new(QrToken::new("secret123"), vec![GeoZone::new("hall", HALL, 1.0)])
    }

    fn window() -> ActivityWindow {
        ActivityWindow::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        )
    }

    fn during() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 10, 30, 0).unwrap()
    }

    fn north_of_hall(km: f64) -> GeoPoint {
        GeoPoint::new(HALL.latitude + (km / EARTH_RADIUS_KM).to_degrees(), HALL.longitude)
    }

    #[test]
    fn test_accepts_valid_attempt() {
        let attempt = CheckInAttempt::new("tiani-checkin:secret123", HALL, during());
        assert_eq!(gate().evaluate(&attempt, &window()), Decision::Accepted);
    }

    #[test]
    fn test_rejects_missing_prefix() {
        let attempt = CheckInAttempt::new("not-a-checkin:xyz", HALL, during());
        assert_eq!(
            gate().evaluate(&attempt, &window()),
            Decision::Rejected(RejectionReason::InvalidQrFormat)
        );
    }

    #[test]
    fn test_rejects_wrong_token() {
        let attempt = CheckInAttempt::new("tiani-checkin:secret124", HALL, during());
        assert_eq!(
            gate().evaluate(&attempt, &window()),
            Decision::Rejected(RejectionReason::InvalidQrToken)
        );
    }

    #[test]
    fn test_rejects_out_of_zone() {
        // 5 km beyond the edge of a 1 km zone
        let attempt = CheckInAttempt::new("tiani-checkin:secret123", north_of_hall(6.0), during());
        assert_eq!(
            gate().evaluate(&attempt, &window()),
            Decision::Rejected(RejectionReason::OutOfZone)
        );
    }

    #[test]
    fn test_rejects_impossible_coordinates() {
        let gate = gate();
        for location in [
            GeoPoint::new(HALL.latitude + 360.0, HALL.longitude),
            GeoPoint::new(91.0, HALL.longitude),
        ] {
            let attempt = CheckInAttempt::new("tiani-checkin:secret123", location, during());
            assert_eq!(
                gate.evaluate(&attempt, &window()),
                Decision::Rejected(RejectionReason::OutOfZone)
            );
        }
    }

    #[test]
    fn test_rejects_after_window() {
        let late = window().end + Duration::minutes(1);
        let attempt = CheckInAttempt::new("tiani-checkin:secret123", HALL, late);
        assert_eq!(
            gate().evaluate(&attempt, &window()),
            Decision::Rejected(RejectionReason::OutsideTimeWindow)
        );
    }

    #[test]
    fn test_rejects_before_window() {
        let early = window().start - Duration::seconds(1);
        let attempt = CheckInAttempt::new("tiani-checkin:secret123", HALL, early);
        assert_eq!(
            gate().evaluate(&attempt, &window()),
            Decision::Rejected(RejectionReason::OutsideTimeWindow)
        );
    }

    #[test]
    fn test_window_edges_accepted() {
        let gate = gate();
        for at in [window().start, window().end] {
            let attempt = CheckInAttempt::new("tiani-checkin:secret123", HALL, at);
            assert!(gate.evaluate(&attempt, &window()).is_accepted());
        }
    }

    #[test]
    fn test_zone_edge_accepted() {
        let attempt = CheckInAttempt::new("tiani-checkin:secret123", north_of_hall(1.0), during());
        assert!(gate().evaluate(&attempt, &window()).is_accepted());
    }

    #[test]
    fn test_rejection_order() {
        let gate = gate();
        let far = north_of_hall(50.0);
        let late = window().end + Duration::hours(1);

        // Everything wrong: format wins
        let attempt = CheckInAttempt::new("garbage", far, late);
        assert_eq!(gate.evaluate(&attempt, &window()).rejection(), Some(RejectionReason::InvalidQrFormat));

        // Token, location and time wrong: token wins
        let attempt = CheckInAttempt::new("tiani-checkin:nope", far, late);
        assert_eq!(gate.evaluate(&attempt, &window()).rejection(), Some(RejectionReason::InvalidQrToken));

        // Location and time wrong: location wins
        let attempt = CheckInAttempt::new("tiani-checkin:secret123", far, late);
        assert_eq!(gate.evaluate(&attempt, &window()).rejection(), Some(RejectionReason::OutOfZone));
    }

    #[test]
    fn test_from_config_uses_configured_secret() {
        let config = Config::default();
        let gate = CheckInGate::from_config(&config);
        let payload = gate.qr().build_payload();
        let center = config.zones()[0].center;

        let attempt = CheckInAttempt::new(payload, center, during());
        assert!(gate.evaluate(&attempt, &window()).is_accepted());
    }

    #[test]
    fn test_gate_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<CheckInGate>();
    }
}
