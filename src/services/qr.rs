//! QR check-in payload building and verification
//!
//! Payload format: `tiani-checkin:<token>`. The token is the process-wide
//! shared secret; scanned payloads are accepted only when the text after
//! the prefix equals it exactly.

use crate::domain::types::QrToken;
use subtle::ConstantTimeEq;

/// Literal prefix of every check-in payload
pub const PAYLOAD_PREFIX: &str = "tiani-checkin:";

pub struct QrTokenValidator {
    token: QrToken,
}

impl QrTokenValidator {
    pub fn new(token: QrToken) -> Self {
        Self { token }
    }

    /// Payload to encode into the QR code shown at the activity
    pub fn build_payload(&self) -> String {
        format!("{}{}", PAYLOAD_PREFIX, self.token.expose())
    }

    /// Strip the check-in prefix, `None` if the text is not a check-in code
    pub fn parse_payload<'a>(&self, scanned: &'a str) -> Option<&'a str> {
        scanned.strip_prefix(PAYLOAD_PREFIX)
    }

    /// Constant-time equality against the configured secret
    pub fn is_valid_token(&self, candidate: &str) -> bool {
        candidate.as_bytes().ct_eq(self.token.expose().as_bytes()).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> QrTokenValidator {
        QrTokenValidator::new(QrToken::new("secret123"))
    }

    #[test]
    fn test_build_payload() {
        assert_eq!(validator().build_payload(), "tiani-checkin:secret123");
    }

    #[test]
    fn test_parse_payload_with_prefix() {
        let v = validator();
        assert_eq!(v.parse_payload("tiani-checkin:secret123"), Some("secret123"));
        assert_eq!(v.parse_payload("tiani-checkin:"), Some(""));
        assert_eq!(v.parse_payload("tiani-checkin:a:b"), Some("a:b"));
    }

    #[test]
    fn test_parse_payload_without_prefix() {
        let v = validator();
        for scanned in [
            "",
            "secret123",
            "not-a-checkin:xyz",
            "TIANI-CHECKIN:secret123",
            " tiani-checkin:secret123",
            "tiani-checkin",
            "https://example.org/?q=tiani-checkin:secret123",
        ] {
            assert_eq!(v.parse_payload(scanned), None, "scanned={scanned:?}");
        }
    }

    #[test]
    fn test_is_valid_token() {
        let v = validator();
        assert!(v.is_valid_token("secret123"));
        assert!(!v.is_valid_token("secret12"));
        assert!(!v.is_valid_token("secret1234"));
        assert!(!v.is_valid_token("Secret123"));
        assert!(!v.is_valid_token(""));
    }

    #[test]
    fn test_built_payload_round_trips() {
        let v = validator();
        let payload = v.build_payload();
        let token = v.parse_payload(&payload).unwrap();
        assert!(v.is_valid_token(token));
    }
}
