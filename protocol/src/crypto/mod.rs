//! # Cryptographic Primitives
//!
//! Everything the runtime needs to authenticate a caller and to derive
//! addresses:
//!
//! - **Ed25519** for transaction signatures (`ed25519-dalek`).
//! - **SHA-256** for derived addresses and account discriminators, because
//!   clients in other languages must be able to recompute both byte-for-byte.
//! - **BLAKE3** for transaction identifiers, which never leave this runtime.
//!
//! Nothing here is novel. Each function is a thin, typed wrapper around an
//! audited implementation.

pub mod hash;
pub mod keys;

pub use hash::{blake3_hash, hashv, sha256_array};
pub use keys::{KeyError, Keypair, Pubkey, Signature};
