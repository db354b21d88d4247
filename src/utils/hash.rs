//! Stable identifiers for records whose source has no native id.

use sha2::{Digest, Sha256};

/// Length of the hex digest prefix used as an identifier.
const ID_HEX_LEN: usize = 32;

/// Hash the given parts into a stable hex identifier.
///
/// The result never contains `_`, so it is safe as an event prefix.
pub fn hash_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
    }
    let digest = hex::encode(hasher.finalize());
    digest[..ID_HEX_LEN].to_string()
}
