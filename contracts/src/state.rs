//! # Vault Program State
//!
//! Persisted records and their byte layout.
//!
//! Every record is stored as an 8-byte discriminator followed by the bincode
//! encoding of its fields in declaration order. The discriminator is
//! `sha256("account:" ++ NAME)[..8]`, so a `ProgramConfig` can never be
//! mistaken for a `VaultConfig` even though both are owned by the program.
//!
//! ```text
//! VaultConfig (78 bytes)
//! ┌──────────┬───────┬──────┬─────────┬───────────┬────────┬────┬────┬─────────┐
//! │ disc (8) │ owner │ lock │ created │ principal │ status │ sb │ vb │ rewards │
//! │          │  32   │  8   │    8    │     8     │   4    │ 1  │ 1  │    8    │
//! └──────────┴───────┴──────┴─────────┴───────────┴────────┴────┴────┴─────────┘
//! ```

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trust_protocol::config::BPS_DENOMINATOR;
use trust_protocol::crypto::sha256_array;
use trust_protocol::Pubkey;

use crate::error::VaultError;

// ---------------------------------------------------------------------------
// Record encoding
// ---------------------------------------------------------------------------

/// A typed, discriminated account payload.
pub trait AccountRecord: Serialize + DeserializeOwned {
    /// Type name hashed into the discriminator.
    const NAME: &'static str;

    fn discriminator() -> [u8; 8] {
        let digest = sha256_array(format!("account:{}", Self::NAME).as_bytes());
        let mut out = [0u8; 8];
        out.copy_from_slice(&digest[..8]);
        out
    }

    /// Discriminator followed by the bincode body.
    ///
    /// # Errors
    ///
    /// [`VaultError::AccountDataCorrupt`] if serialization fails.
    fn to_bytes(&self) -> Result<Vec<u8>, VaultError> {
        let body = bincode::serialize(self).map_err(|_| VaultError::AccountDataCorrupt)?;
        let mut out = Vec::with_capacity(8 + body.len());
        out.extend_from_slice(&Self::discriminator());
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Parse bytes written by [`AccountRecord::to_bytes`].
    ///
    /// # Errors
    ///
    /// [`VaultError::AccountDataCorrupt`] on a short buffer, a foreign
    /// discriminator, or an undecodable body.
    fn try_from_bytes(data: &[u8]) -> Result<Self, VaultError> {
        if data.len() < 8 || data[..8] != Self::discriminator() {
            return Err(VaultError::AccountDataCorrupt);
        }
        bincode::deserialize(&data[8..]).map_err(|_| VaultError::AccountDataCorrupt)
    }
}

// ---------------------------------------------------------------------------
// VaultConfig
// ---------------------------------------------------------------------------

/// Lifecycle of a vault. Forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultStatus {
    Uninitialized,
    Active,
    Closed,
}

impl std::fmt::Display for VaultStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VaultStatus::Uninitialized => write!(f, "Uninitialized"),
            VaultStatus::Active => write!(f, "Active"),
            VaultStatus::Closed => write!(f, "Closed"),
        }
    }
}

/// One vault's ledger entry. Lives at `derive(["state", owner])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultConfig {
    pub owner: Pubkey,
    pub lock_duration_secs: i64,
    /// Unix seconds, from the runtime's clock.
    pub created_at: i64,
    /// Lamports deposited and not yet paid out. Zeroed on close.
    pub principal_deposited: u64,
    pub status: VaultStatus,
    pub state_bump: u8,
    pub vault_bump: u8,
    /// Rewards already paid to the owner.
    pub rewards_claimed: u64,
}

impl AccountRecord for VaultConfig {
    const NAME: &'static str = "VaultConfig";
}

impl VaultConfig {
    /// `created_at + lock_duration_secs`.
    ///
    /// # Errors
    ///
    /// [`VaultError::ArithmeticOverflow`] if the sum overflows `i64`.
    pub fn maturity(&self) -> Result<i64, VaultError> {
        self.created_at
            .checked_add(self.lock_duration_secs)
            .ok_or(VaultError::ArithmeticOverflow)
    }

    pub fn is_mature(&self, now: i64) -> Result<bool, VaultError> {
        Ok(now >= self.maturity()?)
    }

    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }

    /// Mark closed and zero the principal. Idempotence is the caller's
    /// problem; handlers check `is_active` first.
    pub fn close(&mut self) {
        self.principal_deposited = 0;
        self.status = VaultStatus::Closed;
    }
}

// ---------------------------------------------------------------------------
// ProgramConfig
// ---------------------------------------------------------------------------

/// Tunable policy parameters, as supplied to initialize/update config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigParams {
    /// Early-exit penalty in basis points of principal.
    pub penalty_bps: u16,
    /// Annual reward rate in basis points of principal.
    pub reward_rate_bps: u16,
    /// Longest lock a new vault may request.
    pub max_lock_duration_secs: i64,
}

impl Default for ConfigParams {
    fn default() -> Self {
        Self {
            penalty_bps: trust_protocol::config::DEFAULT_PENALTY_BPS,
            reward_rate_bps: trust_protocol::config::DEFAULT_REWARD_RATE_BPS,
            max_lock_duration_secs: trust_protocol::config::DEFAULT_MAX_LOCK_DURATION_SECS,
        }
    }
}

impl ConfigParams {
    /// # Errors
    ///
    /// [`VaultError::InvalidConfig`] if the penalty exceeds 100% or the
    /// maximum lock is negative.
    pub fn validate(&self) -> Result<(), VaultError> {
        if u64::from(self.penalty_bps) > BPS_DENOMINATOR || self.max_lock_duration_secs < 0 {
            return Err(VaultError::InvalidConfig);
        }
        Ok(())
    }
}

/// Program-wide configuration. Lives at `derive(["config"])`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Administrator; receives penalties and may update this record.
    pub admin: Pubkey,
    pub penalty_bps: u16,
    pub reward_rate_bps: u16,
    pub max_lock_duration_secs: i64,
    pub bump: u8,
}

impl AccountRecord for ProgramConfig {
    const NAME: &'static str = "ProgramConfig";
}

/// Proof that the current signer is the configured admin.
///
/// Only [`ProgramConfig::authorize`] constructs one, so any function taking
/// `&AdminAuthority` can only be reached after the check.
#[derive(Debug)]
pub struct AdminAuthority {
    admin: Pubkey,
}

impl AdminAuthority {
    pub fn admin(&self) -> &Pubkey {
        &self.admin
    }
}

impl ProgramConfig {
    pub fn new(admin: Pubkey, params: ConfigParams, bump: u8) -> Self {
        Self {
            admin,
            penalty_bps: params.penalty_bps,
            reward_rate_bps: params.reward_rate_bps,
            max_lock_duration_secs: params.max_lock_duration_secs,
            bump,
        }
    }

    pub fn params(&self) -> ConfigParams {
        ConfigParams {
            penalty_bps: self.penalty_bps,
            reward_rate_bps: self.reward_rate_bps,
            max_lock_duration_secs: self.max_lock_duration_secs,
        }
    }

    /// # Errors
    ///
    /// [`VaultError::Unauthorized`] unless `signer` is the stored admin.
    pub fn authorize(&self, signer: &Pubkey) -> Result<AdminAuthority, VaultError> {
        if *signer != self.admin {
            return Err(VaultError::Unauthorized);
        }
        Ok(AdminAuthority { admin: *signer })
    }

    /// Replace the policy parameters and optionally hand over the admin role.
    pub fn apply(&mut self, _authority: &AdminAuthority, params: ConfigParams, new_admin: Option<Pubkey>) {
        self.penalty_bps = params.penalty_bps;
        self.reward_rate_bps = params.reward_rate_bps;
        self.max_lock_duration_secs = params.max_lock_duration_secs;
        if let Some(admin) = new_admin {
            self.admin = admin;
        }
    }

    /// `principal * penalty_bps / 10_000`, rounded down.
    pub fn penalty_for(&self, principal: u64) -> u64 {
        let penalty = u128::from(principal) * u128::from(self.penalty_bps) / u128::from(BPS_DENOMINATOR);
        // penalty_bps <= 10_000, so penalty <= principal.
        penalty as u64
    }
}
