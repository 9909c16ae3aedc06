//! Webhook authenticity: HMAC-SHA256 signatures over timestamp + body.
//!
//! Each subscription carries its own signing secret; the external cloud
//! signs every delivery with it and the intake layer verifies before
//! dispatching.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rand::distributions::Alphanumeric;
use rand::Rng;
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Length of generated signing secrets.
const SIGNING_SECRET_LEN: usize = 32;

/// Compute the hex signature for `body` at `timestamp`.
///
/// Signature payload is the timestamp concatenated with the body.
pub fn sign(signing_secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(signing_secret.as_bytes())
        .expect("HMAC accepts keys of any size");
    mac.update(timestamp.as_bytes());
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Sign `body` with a fresh ISO8601 millisecond timestamp.
/// Returns `(signature, timestamp)`.
pub fn sign_now(signing_secret: &str, body: &[u8]) -> (String, String) {
    let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string();
    let signature = sign(signing_secret, &timestamp, body);
    (signature, timestamp)
}

/// Constant-time check of a received hex signature.
pub fn verify(signing_secret: &str, timestamp: &str, body: &[u8], signature: &str) -> bool {
    let expected = sign(signing_secret, timestamp, body);
    expected.as_bytes().ct_eq(signature.as_bytes()).into()
}

/// Fresh per-subscription signing secret.
pub fn generate_signing_secret() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SIGNING_SECRET_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let (signature, timestamp) = sign_now("secret", b"payload");
        assert!(verify("secret", &timestamp, b"payload", &signature));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let (signature, timestamp) = sign_now("secret", b"payload");
        assert!(!verify("secret", &timestamp, b"tampered", &signature));
    }

    #[test]
    fn verify_rejects_wrong_secret() {
        let (signature, timestamp) = sign_now("secret", b"payload");
        assert!(!verify("other", &timestamp, b"payload", &signature));
    }

    #[test]
    fn secrets_are_long_and_distinct() {
        let a = generate_signing_secret();
        let b = generate_signing_secret();
        assert_eq!(a.len(), 32);
        assert_ne!(a, b);
    }
}
