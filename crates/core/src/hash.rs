//! Command fingerprints for cache identity

use sha2::{Digest, Sha256};

/// Length of a well-formed fingerprint: SHA-256, lowercase hex.
pub const CHECKSUM_LEN: usize = 64;

/// Compute the fingerprint of a command's shell text.
///
/// The input must be the text after all template expansion; two commands
/// with the same post-expansion shell text are the same command as far as
/// the cache is concerned.
pub fn fingerprint(shell: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(shell.as_bytes());
    hex::encode(hasher.finalize())
}
