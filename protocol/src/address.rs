//! # Derived Addresses
//!
//! Deterministic, lookup-free account addresses owned by a program.
//!
//! A derived address is `sha256(seeds ‖ [bump] ‖ program_id ‖ PDA_MARKER)`
//! for the first bump, counting down from 255, whose digest does *not*
//! decompress to an Ed25519 point. Being off the curve means no secret key
//! exists for it: only the program whose id went into the hash can sign for
//! (debit, write) the account.
//!
//! ```text
//! seeds ──┐
//! bump  ──┼─► sha256 ─► on curve? ──yes──► bump - 1, retry
//! prog  ──┤                 │
//! marker ─┘                 no
//!                           ▼
//!                    (address, bump)
//! ```
//!
//! Anyone can recompute a vault's addresses from the owner's pubkey and the
//! program id. No registry, no lookup table.

use curve25519_dalek::edwards::CompressedEdwardsY;
use thiserror::Error;

use crate::config::{MAX_SEEDS, MAX_SEED_LEN, PDA_MARKER};
use crate::crypto::{hashv, Pubkey};

/// Errors raised while deriving an address.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressError {
    /// Too many seeds, or one seed longer than [`MAX_SEED_LEN`].
    #[error("seed length or seed count exceeded")]
    MaxSeedLengthExceeded,

    /// The candidate for this exact bump lies on the curve.
    #[error("provided seeds do not result in a valid derived address")]
    InvalidSeeds,

    /// All 256 bumps produced on-curve candidates. Astronomically unlikely.
    #[error("unable to find a viable bump for the provided seeds")]
    Exhausted,
}

/// Returns `true` if `bytes` is a valid compressed Ed25519 point.
pub fn bytes_are_curve_point(bytes: &[u8; 32]) -> bool {
    CompressedEdwardsY(*bytes).decompress().is_some()
}

/// Derive the address for `seeds` (which must already include the bump) under
/// `program_id`.
///
/// # Errors
///
/// - [`AddressError::MaxSeedLengthExceeded`] on too many or too long seeds.
/// - [`AddressError::InvalidSeeds`] if the result lies on the curve.
pub fn create_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<Pubkey, AddressError> {
    if seeds.len() > MAX_SEEDS {
        return Err(AddressError::MaxSeedLengthExceeded);
    }
    if seeds.iter().any(|seed| seed.len() > MAX_SEED_LEN) {
        return Err(AddressError::MaxSeedLengthExceeded);
    }

    let mut parts: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 2);
    parts.extend_from_slice(seeds);
    parts.push(program_id.as_ref());
    parts.push(PDA_MARKER);
    let digest = hashv(&parts);

    if bytes_are_curve_point(&digest) {
        return Err(AddressError::InvalidSeeds);
    }
    Ok(Pubkey::new_from_array(digest))
}

/// Search bumps 255..=0 for the first off-curve address.
///
/// Returns the address together with the bump that produced it. Callers
/// store the bump so later checks can call [`create_program_address`] once
/// instead of repeating the search.
///
/// # Errors
///
/// - [`AddressError::MaxSeedLengthExceeded`] if the seeds plus a bump would
///   exceed the limits.
/// - [`AddressError::Exhausted`] if every bump lands on the curve.
pub fn find_program_address(
    seeds: &[&[u8]],
    program_id: &Pubkey,
) -> Result<(Pubkey, u8), AddressError> {
    if seeds.len() >= MAX_SEEDS {
        return Err(AddressError::MaxSeedLengthExceeded);
    }

    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump: Vec<&[u8]> = Vec::with_capacity(seeds.len() + 1);
        with_bump.extend_from_slice(seeds);
        with_bump.push(&bump_seed);

        match create_program_address(&with_bump, program_id) {
            Ok(address) => {
                tracing::debug!(%address, bump, program = %program_id, "derived program address");
                return Ok((address, bump));
            }
            Err(AddressError::InvalidSeeds) => continue,
            Err(other) => return Err(other),
        }
    }

    Err(AddressError::Exhausted)
}
