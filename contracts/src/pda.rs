//! Derived addresses used by the vault program.
//!
//! ```text
//! VaultConfig    = derive(["state",   owner])
//! CustodyAccount = derive(["vault",   VaultConfig])
//! ProgramConfig  = derive(["config"])
//! RewardsPool    = derive(["rewards"])
//! ```
//!
//! Custody is chained off the VaultConfig address rather than the owner, so
//! the two are bound one-to-one.

use serde::{Deserialize, Serialize};
use trust_protocol::{create_program_address, find_program_address, Pubkey};

use crate::error::VaultError;
use crate::PROGRAM_ID;

pub const STATE_SEED: &[u8] = b"state";
pub const VAULT_SEED: &[u8] = b"vault";
pub const CONFIG_SEED: &[u8] = b"config";
pub const REWARDS_SEED: &[u8] = b"rewards";

/// Both addresses of one owner's vault, with their bumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultAddresses {
    pub owner: Pubkey,
    pub vault_config: Pubkey,
    pub state_bump: u8,
    pub custody: Pubkey,
    pub vault_bump: u8,
}

impl VaultAddresses {
    /// Recompute a vault's addresses from its owner. No lookup involved.
    ///
    /// # Errors
    ///
    /// [`VaultError::AddressDerivationExhausted`] if no bump works.
    pub fn derive(owner: &Pubkey) -> Result<Self, VaultError> {
        let (vault_config, state_bump) = find_program_address(&[STATE_SEED, owner.as_ref()], &PROGRAM_ID)?;
        let (custody, vault_bump) = find_program_address(&[VAULT_SEED, vault_config.as_ref()], &PROGRAM_ID)?;
        Ok(Self {
            owner: *owner,
            vault_config,
            state_bump,
            custody,
            vault_bump,
        })
    }
}

/// Address and bump of the program configuration account.
pub fn program_config_address() -> Result<(Pubkey, u8), VaultError> {
    Ok(find_program_address(&[CONFIG_SEED], &PROGRAM_ID)?)
}

/// Address and bump of the rewards pool.
pub fn rewards_pool_address() -> Result<(Pubkey, u8), VaultError> {
    Ok(find_program_address(&[REWARDS_SEED], &PROGRAM_ID)?)
}

/// Re-derive a VaultConfig address from a stored bump. One hash, no search.
pub(crate) fn vault_config_from_bump(owner: &Pubkey, bump: u8) -> Result<Pubkey, VaultError> {
    Ok(create_program_address(&[STATE_SEED, owner.as_ref(), &[bump]], &PROGRAM_ID)?)
}

/// Re-derive a custody address from a stored bump.
pub(crate) fn custody_from_bump(vault_config: &Pubkey, bump: u8) -> Result<Pubkey, VaultError> {
    Ok(create_program_address(&[VAULT_SEED, vault_config.as_ref(), &[bump]], &PROGRAM_ID)?)
}
