use sha2::{Digest, Sha256};

/// SHA-256 content hash of the payload, as a lowercase hex string.
pub fn sha256_hex(payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(payload);
    hex::encode(hasher.finalize())
}
