// SPDX-License-Identifier: MIT

//! HMAC-SHA256 request signatures for webhook filters

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::FilterError;

type HmacSha256 = Hmac<Sha256>;

/// Hex-encoded HMAC-SHA256 of `message` under `key`
pub fn hmac_sha256_hex(key: &[u8], message: &[u8]) -> Result<String, FilterError> {
    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| FilterError::config(format!("Invalid signing key: {}", e)))?;
    mac.update(message);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Signature sent with webhook filter requests: the environment id signed
/// with the environment's API key.
pub fn sign_environment(api_key: &str, environment_id: &str) -> Result<String, FilterError> {
    hmac_sha256_hex(api_key.as_bytes(), environment_id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rfc4231_short_key() {
        assert_eq!(
            hmac_sha256_hex(b"Jefe", b"what do ya want for nothing?").unwrap(),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_known_vector() {
        assert_eq!(
            hmac_sha256_hex(b"key", b"The quick brown fox jumps over the lazy dog").unwrap(),
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_rfc4231_key_longer_than_block() {
        let key = [0xaau8; 131];
        let digest =
            hmac_sha256_hex(&key, b"Test Using Larger Than Block-Size Key - Hash Key First").unwrap();
        assert_eq!(
            digest,
            "60e431591ee0b67f0d8a26aacbf5b77f8e0bc6213728c5140546040f0ee37f54"
        );
    }

    #[test]
    fn test_sign_environment_is_deterministic() {
        let a = sign_environment("secret", "env-1").unwrap();
        assert_eq!(a, sign_environment("secret", "env-1").unwrap());
        assert_ne!(a, sign_environment("secret", "env-2").unwrap());
        assert_eq!(a.len(), 64);
    }
}
