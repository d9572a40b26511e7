//! Webhook signature generation and verification
//!
//! Signatures travel in the `x-ghost-signature` header as comma separated
//! `key=value` pairs: `t=<unix-timestamp>,v1=<hex-hmac>`. The digest is
//! `HMAC-SHA256(secret, canonical_body || timestamp)`, where the canonical
//! body is the compact JSON re-serialization of the request body.

use crate::SignatureError;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Header names
pub mod headers {
    /// The signature header name
    pub const SIGNATURE: &str = "x-ghost-signature";
}

/// Timestamps above this are taken to be in milliseconds.
const MILLIS_THRESHOLD: i64 = 10_000_000_000;

/// Produces signature headers for a body.
#[derive(Debug, Clone)]
pub struct WebhookSigner {
    secret: String,
}

impl WebhookSigner {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Sign with the current time
    pub fn sign(&self, body: &serde_json::Value) -> String {
        self.sign_with_timestamp(body, chrono::Utc::now().timestamp())
    }

    /// Sign with a specific timestamp
    pub fn sign_with_timestamp(&self, body: &serde_json::Value, timestamp: i64) -> String {
        let digest = compute_hmac(&self.secret, &canonical_json(body), &timestamp.to_string());
        format!("t={},v1={}", timestamp, digest)
    }
}

/// Authenticates inbound callbacks against the shared secret.
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    secret: String,
    tolerance_secs: Option<u64>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs: None,
        }
    }

    /// Reject signatures whose timestamp is further than `seconds` from now.
    pub fn with_tolerance(mut self, seconds: u64) -> Self {
        self.tolerance_secs = Some(seconds);
        self
    }

    /// Verify a raw request body against the signature header.
    ///
    /// Missing body or header fail before any digest is computed. Length is
    /// compared before content, and content is compared in constant time.
    pub fn verify(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<(), SignatureError> {
        let header = signature_header
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or(SignatureError::MissingHeader)?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(SignatureError::MissingBody);
        }

        let parts = parse_signature(header)?;
        if let Some(tolerance) = self.tolerance_secs {
            check_timestamp(&parts.timestamp, tolerance)?;
        }

        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(|_| SignatureError::MalformedBody)?;
        let expected = compute_hmac(&self.secret, &canonical_json(&value), &parts.timestamp);

        constant_time_compare(&expected, &parts.signature)
    }
}

/// Parsed signature components
#[derive(Debug, PartialEq, Eq)]
struct SignatureParts {
    timestamp: String,
    signature: String,
}

/// Parse `t=<ts>,v1=<hex>`. Ghost's native `sha256=<hex>` is accepted in
/// place of `v1`, and the pairs may appear in either order.
fn parse_signature(header: &str) -> Result<SignatureParts, SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", t)) => timestamp = Some(t.trim().to_string()),
            Some(("v1" | "sha256", v)) => signature = Some(v.trim().to_string()),
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(t), Some(s)) if !t.is_empty() && !s.is_empty() => Ok(SignatureParts {
            timestamp: t,
            signature: s,
        }),
        _ => Err(SignatureError::MalformedHeader(
            "missing timestamp or signature".to_string(),
        )),
    }
}

fn check_timestamp(timestamp: &str, tolerance: u64) -> Result<(), SignatureError> {
    let mut ts: i64 = timestamp.parse().map_err(|_| {
        SignatureError::MalformedHeader(format!("invalid timestamp '{}'", timestamp))
    })?;
    if ts > MILLIS_THRESHOLD {
        ts /= 1000;
    }

    // `t` may sit at either end of the i64 range
    let age = chrono::Utc::now()
        .timestamp()
        .saturating_sub(ts)
        .unsigned_abs();
    if age > tolerance {
        return Err(SignatureError::TimestampOutOfTolerance { age, tolerance });
    }
    Ok(())
}

/// Compact JSON in the body's original key order.
fn canonical_json(value: &serde_json::Value) -> String {
    value.to_string()
}

fn compute_hmac(secret: &str, canonical_body: &str, timestamp: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take any size key");
    mac.update(canonical_body.as_bytes());
    mac.update(timestamp.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time comparison to prevent timing attacks
fn constant_time_compare(expected: &str, provided: &str) -> Result<(), SignatureError> {
    if expected.len() != provided.len() {
        return Err(SignatureError::LengthMismatch {
            expected: expected.len(),
            actual: provided.len(),
        });
    }

    let mut result = 0u8;
    for (x, y) in expected.bytes().zip(provided.bytes()) {
        result |= x ^ y;
    }
    if result == 0 {
        Ok(())
    } else {
        Err(SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SECRET: &str = "test-secret";

    fn body() -> serde_json::Value {
        json!({"post": {"current": {"slug": "cdn-tester", "title": "Hello"}}})
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = WebhookSigner::new(SECRET);
        let verifier = SignatureVerifier::new(SECRET);
        let body = body();

        let header = signer.sign_with_timestamp(&body, 1_700_000_000);
        assert!(header.starts_with("t=1700000000,v1="));

        let raw = serde_json::to_vec(&body).unwrap();
        assert_eq!(verifier.verify(&raw, Some(&header)), Ok(()));
    }

    #[test]
    fn test_digest_matches_manual_hmac() {
        let body = body();
        let canonical = body.to_string();
        let mut mac = HmacSha256::new_from_slice(SECRET.as_bytes()).unwrap();
        mac.update(format!("{}{}", canonical, 1_700_000_000).as_bytes());
        let manual = hex::encode(mac.finalize().into_bytes());

        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body, 1_700_000_000);
        assert_eq!(header, format!("t=1700000000,v1={}", manual));
    }

    #[test]
    fn test_whitespace_in_body_does_not_matter() {
        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body(), 1_700_000_000);
        let pretty = serde_json::to_vec_pretty(&body()).unwrap();

        assert_eq!(SignatureVerifier::new(SECRET).verify(&pretty, Some(&header)), Ok(()));
    }

    #[test]
    fn test_tampered_body_fails() {
        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body(), 1_700_000_000);
        let mut raw = serde_json::to_vec(&body()).unwrap();
        let pos = raw.windows(6).position(|w| w == b"tester").unwrap();
        raw[pos] = b'T';

        assert_eq!(
            SignatureVerifier::new(SECRET).verify(&raw, Some(&header)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_truncated_signature_is_length_mismatch() {
        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body(), 1_700_000_000);
        let truncated = &header[..header.len() - 4];
        let raw = serde_json::to_vec(&body()).unwrap();

        assert_eq!(
            SignatureVerifier::new(SECRET).verify(&raw, Some(truncated)),
            Err(SignatureError::LengthMismatch {
                expected: 64,
                actual: 60
            })
        );
    }

    #[test]
    fn test_wrong_secret_fails() {
        let header = WebhookSigner::new("other").sign_with_timestamp(&body(), 1_700_000_000);
        let raw = serde_json::to_vec(&body()).unwrap();

        assert_eq!(
            SignatureVerifier::new(SECRET).verify(&raw, Some(&header)),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn test_missing_header_and_body() {
        let verifier = SignatureVerifier::new(SECRET);
        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body(), 1_700_000_000);

        assert_eq!(verifier.verify(b"{}", None), Err(SignatureError::MissingHeader));
        assert_eq!(verifier.verify(b"{}", Some("  ")), Err(SignatureError::MissingHeader));
        assert_eq!(verifier.verify(b"", Some(&header)), Err(SignatureError::MissingBody));
        assert_eq!(verifier.verify(b" \n", Some(&header)), Err(SignatureError::MissingBody));
    }

    #[test]
    fn test_malformed_header() {
        let verifier = SignatureVerifier::new(SECRET);
        assert!(matches!(
            verifier.verify(b"{}", Some("v1=abcdef")),
            Err(SignatureError::MalformedHeader(_))
        ));
        assert!(matches!(
            verifier.verify(b"{}", Some("garbage")),
            Err(SignatureError::MalformedHeader(_))
        ));
    }

    #[test]
    fn test_non_json_body() {
        let verifier = SignatureVerifier::new(SECRET);
        assert_eq!(
            verifier.verify(b"not json", Some("t=1,v1=ab")),
            Err(SignatureError::MalformedBody)
        );
    }

    #[test]
    fn test_native_header_order_accepted() {
        let body = body();
        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body, 1_700_000_000);
        let digest = header.split("v1=").nth(1).unwrap();
        let native = format!("sha256={}, t=1700000000", digest);
        let raw = serde_json::to_vec(&body).unwrap();

        assert_eq!(SignatureVerifier::new(SECRET).verify(&raw, Some(&native)), Ok(()));
    }

    #[test]
    fn test_tolerance() {
        let body = body();
        let raw = serde_json::to_vec(&body).unwrap();
        let signer = WebhookSigner::new(SECRET);
        let verifier = SignatureVerifier::new(SECRET).with_tolerance(60);

        let fresh = signer.sign(&body);
        assert_eq!(verifier.verify(&raw, Some(&fresh)), Ok(()));

        let stale = signer.sign_with_timestamp(&body, chrono::Utc::now().timestamp() - 1000);
        assert!(matches!(
            verifier.verify(&raw, Some(&stale)),
            Err(SignatureError::TimestampOutOfTolerance { tolerance: 60, .. })
        ));
    }

    #[test]
    fn test_millisecond_timestamps_within_tolerance() {
        let body = body();
        let raw = serde_json::to_vec(&body).unwrap();
        let millis = chrono::Utc::now().timestamp_millis();
        let header = WebhookSigner::new(SECRET).sign_with_timestamp(&body, millis);

        let verifier = SignatureVerifier::new(SECRET).with_tolerance(60);
        assert_eq!(verifier.verify(&raw, Some(&header)), Ok(()));
    }

    #[test]
    fn test_extreme_timestamp_is_out_of_tolerance() {
        let verifier = SignatureVerifier::new("s").with_tolerance(300);

        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            assert!(matches!(
                verifier.verify(b"{}", Some(header)),
                Err(SignatureError::TimestampOutOfTolerance { tolerance: 300, .. })
            ));
        }
    }

    #[test]
    fn test_constant_time_compare() {
        assert_eq!(constant_time_compare("abc", "abc"), Ok(()));
        assert_eq!(constant_time_compare("abc", "abd"), Err(SignatureError::Mismatch));
        assert!(matches!(
            constant_time_compare("abc", "ab"),
            Err(SignatureError::LengthMismatch { .. })
        ));
    }
}
