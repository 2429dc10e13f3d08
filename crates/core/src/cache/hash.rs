//! Stable fingerprints for values that must not be logged verbatim.

use sha2::{Digest, Sha256};

/// Length of the hex prefix returned by [`fingerprint`].
pub const FINGERPRINT_LEN: usize = 12;

/// Short SHA-256 fingerprint of a secret, safe to put in logs.
///
/// Empty input yields `"empty"` so a blank credential is distinguishable
/// from a configured one.
pub fn fingerprint(secret: &str) -> String {
    if secret.is_empty() {
        return "empty".to_string();
    }
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}
