// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared HMAC-SHA256 webhook signature verification.
//!
//! Every supported provider signs webhook bodies with HMAC-SHA256 and a
//! per-connection app secret; they differ only in how the signed string is
//! assembled (Meta prefixes the hex with `sha256=`, TikTok mixes a
//! timestamp into the message). Channel crates compose this helper.

use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verify a hex-encoded HMAC-SHA256 signature over `message`.
///
/// Returns `false` on bad hex, wrong digest length, or mismatch. The
/// comparison runs in constant time via [`Mac::verify_slice`].
pub fn verify_hmac_sha256_hex(secret: &str, expected_hex: &str, message: &[u8]) -> bool {
    let Ok(expected) = hex::decode(expected_hex) else {
        return false;
    };
    // SHA-256 digests are 32 bytes; reject anything else before the MAC.
    if expected.len() != 32 {
        return false;
    }

    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(message);
    mac.verify_slice(&expected).is_ok()
}

/// Compute the hex-encoded HMAC-SHA256 of `message`.
///
/// Used by tests and fixture builders to produce valid signatures.
pub fn hmac_sha256_hex(secret: &str, message: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(message);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_signature_verifies() {
        let secret = "app_secret";
        let body = br#"{"entry":[{"id":"123"}]}"#;
        let sig = hmac_sha256_hex(secret, body);
        assert!(verify_hmac_sha256_hex(secret, &sig, body));
    }

    #[test]
    fn wrong_secret_fails() {
        let body = b"payload";
        let sig = hmac_sha256_hex("right", body);
        assert!(!verify_hmac_sha256_hex("wrong", &sig, body));
    }

    #[test]
    fn tampered_body_fails() {
        let secret = "s";
        let sig = hmac_sha256_hex(secret, b"original");
        assert!(!verify_hmac_sha256_hex(secret, &sig, b"tampered"));
    }

    #[test]
    fn invalid_hex_fails() {
        assert!(!verify_hmac_sha256_hex("s", "not-hex-zzz", b"body"));
    }

    #[test]
    fn wrong_length_digest_fails() {
        // Valid hex but only 4 bytes.
        assert!(!verify_hmac_sha256_hex("s", "deadbeef", b"body"));
    }

    #[test]
    fn empty_body_still_verifies() {
        let sig = hmac_sha256_hex("s", b"");
        assert!(verify_hmac_sha256_hex("s", &sig, b""));
    }
}
