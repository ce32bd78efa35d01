// twin-fabric-core/src/hashing.rs
// ============================================================================
// Module: Canonical Hashing
// Description: RFC 8785 JSON canonicalization and content hashing utilities.
// Purpose: Provide deterministic digests for fingerprints and state heads.
// Dependencies: serde, serde_jcs, sha2
// ============================================================================

//! ## Overview
//! Workflow fingerprints and twin state heads hash RFC 8785 (JCS) canonical
//! JSON so that digests are stable across sessions and platforms. Raw bytes
//! hash directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Serialize;
use sha2::Digest;
use sha2::Sha256;

use crate::error::FabricError;

// ============================================================================
// SECTION: Hashing Helpers
// ============================================================================

/// Hashes raw bytes with SHA-256 and returns lowercase hex.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex_encode(&hasher.finalize())
}

/// Hashes the canonical (RFC 8785) JSON form of a serializable value.
///
/// # Errors
///
/// Returns a `hashing.canonicalization` error when the value cannot be
/// canonicalized (e.g. non-finite floats).
pub fn hash_canonical_json<T: Serialize>(value: &T) -> Result<String, FabricError> {
    let canonical = serde_jcs::to_string(value).map_err(|err| {
        FabricError::new(
            "hashing.canonicalization",
            format!("failed to canonicalize json: {err}"),
        )
    })?;
    Ok(hash_bytes(canonical.as_bytes()))
}

/// Encodes bytes as lowercase hex.
fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    //! Test-only lint relaxations for panic-based assertions.
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only output and panic-based assertions are permitted."
    )]

    use serde_json::json;

    use super::*;

    #[test]
    fn canonical_hash_ignores_key_order() {
        let a = json!({"b": 1, "a": [1, 2, 3]});
        let b = json!({"a": [1, 2, 3], "b": 1});
        assert_eq!(
            hash_canonical_json(&a).unwrap(),
            hash_canonical_json(&b).unwrap()
        );
    }

    #[test]
    fn byte_hash_matches_known_vector() {
        // SHA-256 of the empty string.
        assert_eq!(
            hash_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
