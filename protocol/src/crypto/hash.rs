//! # Hashing Utilities
//!
//! Two hash functions, two jobs:
//!
//! - **SHA-256**: derived addresses and record discriminators. These values
//!   are recomputed by external clients, so the function has to be the one
//!   every toolchain already ships.
//! - **BLAKE3**: transaction identifiers. Internal to the runtime, so we use
//!   the faster hash.

use sha2::{Digest, Sha256};

/// Compute the SHA-256 hash and return a fixed-size array.
pub fn sha256_array(data: &[u8]) -> [u8; 32] {
    hashv(&[data])
}

/// SHA-256 over several byte slices fed sequentially into one hasher.
///
/// Equivalent to hashing the concatenation of `parts`, without allocating
/// the concatenation. Address derivation feeds seeds, bump, program id and
/// marker through here.
pub fn hashv(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();
    let mut output = [0u8; 32];
    output.copy_from_slice(&result);
    output
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; 32] {
    *blake3::hash(data).as_bytes()
}
