//! Reward accrual for matured vaults.
//!
//! Kept behind [`RewardCalculator`] so the close paths never depend on how
//! rewards are computed. The stock [`LinearRewards`] accrues simple interest
//! on principal over the committed lock duration:
//!
//! ```text
//! entitled = principal * reward_rate_bps * lock_duration_secs
//!            / (10_000 * SECONDS_PER_YEAR)
//! ```
//!
//! Integer math in `u128`, rounded down.

use trust_protocol::config::{BPS_DENOMINATOR, SECONDS_PER_YEAR};

use crate::error::VaultError;
use crate::state::{ProgramConfig, VaultConfig};

/// Total reward a vault is entitled to, including what was already paid.
pub trait RewardCalculator: Send + Sync {
    /// # Errors
    ///
    /// [`VaultError::ArithmeticOverflow`] if the result does not fit `u64`.
    fn entitlement(&self, vault: &VaultConfig, config: &ProgramConfig) -> Result<u64, VaultError>;
}

/// Simple interest over the lock duration.
#[derive(Debug, Default, Clone, Copy)]
pub struct LinearRewards;

impl RewardCalculator for LinearRewards {
    fn entitlement(&self, vault: &VaultConfig, config: &ProgramConfig) -> Result<u64, VaultError> {
        let lock = u128::try_from(vault.lock_duration_secs).map_err(|_| VaultError::InvalidDuration)?;
        let numerator = u128::from(vault.principal_deposited)
            .checked_mul(u128::from(config.reward_rate_bps))
            .and_then(|n| n.checked_mul(lock))
            .ok_or(VaultError::ArithmeticOverflow)?;
        let denominator = u128::from(BPS_DENOMINATOR) * SECONDS_PER_YEAR as u128;
        u64::try_from(numerator / denominator).map_err(|_| VaultError::ArithmeticOverflow)
    }
}
