//! Deterministic content digests for frozen tables.
//!
//! Two builds over the same corpus slice and configuration MUST produce
//! identical digests, so an evaluation result names exactly which tables
//! it was scored against.
//!
//! Algorithm:
//! 1. Serialize the value to compact JSON (map keys are BTreeMap-ordered)
//! 2. digest = "t1_" || base32hex_lower(SHA256(bytes))

use crate::error::PlrError;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub const DIGEST_PREFIX: &str = "t1_";

pub fn content_digest(value: &impl Serialize) -> Result<String, PlrError> {
    let bytes = serde_json::to_vec(value).map_err(|e| PlrError::Serialize(e.to_string()))?;
    let hash = Sha256::digest(&bytes);
    Ok(format!("{DIGEST_PREFIX}{}", base32hex_lower_no_pad(&hash)))
}

/// Base32hex encoding (RFC 4648 §7), lowercase, no padding.
fn base32hex_lower_no_pad(data: &[u8]) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuv";

    let mut result = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut bits: u64 = 0;
    let mut num_bits: u32 = 0;

    for &byte in data {
        bits = (bits << 8) | (byte as u64);
        num_bits += 8;

        while num_bits >= 5 {
            num_bits -= 5;
            let idx = ((bits >> num_bits) & 0x1f) as usize;
            result.push(ALPHABET[idx] as char);
        }
    }

    if num_bits > 0 {
        let idx = ((bits << (5 - num_bits)) & 0x1f) as usize;
        result.push(ALPHABET[idx] as char);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn base32hex_known_vectors() {
        // RFC 4648 §10 test vectors, lowercased and unpadded.
        assert_eq!(base32hex_lower_no_pad(b""), "");
        assert_eq!(base32hex_lower_no_pad(b"f"), "co");
        assert_eq!(base32hex_lower_no_pad(b"fo"), "cpng");
        assert_eq!(base32hex_lower_no_pad(b"foo"), "cpnmu");
        assert_eq!(base32hex_lower_no_pad(b"foobar"), "cpnmuoj1e8");
    }

    #[test]
    fn digest_is_deterministic_and_prefixed() {
        let a = content_digest(&json!({"modulus": 6, "rates": [0.05, 0.9]})).unwrap();
        let b = content_digest(&json!({"rates": [0.05, 0.9], "modulus": 6})).unwrap();
        assert_eq!(a, b);
        assert!(a.starts_with(DIGEST_PREFIX));
        // 32 bytes → 52 base32 characters.
        assert_eq!(a.len(), DIGEST_PREFIX.len() + 52);
    }

    #[test]
    fn digest_changes_with_content() {
        let a = content_digest(&json!({"rate": 0.05})).unwrap();
        let b = content_digest(&json!({"rate": 0.06})).unwrap();
        assert_ne!(a, b);
    }
}
