use sha2::{Digest, Sha256};

/// Stable cache key for a `(leaf, intermediate)` certificate pair.
///
/// Each certificate is length-prefixed so that moving bytes across the
/// boundary yields a different fingerprint.
pub(crate) fn chain_fingerprint(leaf: &[u8], intermediate: &[u8]) -> String {
    let mut hasher = Sha256::new();
    for der in [leaf, intermediate] {
        hasher.update((der.len() as u64).to_be_bytes());
        hasher.update(der);
    }
    format!("sha256:{}", hex::encode(hasher.finalize()))
}
