//! Instruction set and client-side message builders.
//!
//! Instruction data is the bincode encoding of [`VaultInstruction`]. Each
//! builder below lays out the accounts in the order the processor expects,
//! deriving every program address from the caller's pubkey.

use serde::{Deserialize, Serialize};
use trust_protocol::runtime::{AccountMeta, Message};
use trust_protocol::Pubkey;

use crate::error::VaultError;
use crate::pda::{program_config_address, rewards_pool_address, VaultAddresses};
use crate::state::ConfigParams;
use crate::PROGRAM_ID;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultInstruction {
    /// Accounts: owner (signer, w), vault_config (w), custody (w), program_config.
    Initialize { lock_duration_secs: i64 },
    /// Accounts: owner (signer, w), vault_config (w), custody (w).
    Deposit { amount: u64 },
    /// Accounts: owner (signer, w), vault_config (w), custody (w),
    /// program_config, treasury (w).
    PrematureClose,
    /// Accounts: owner (signer, w), vault_config (w), custody (w).
    MatureClose,
    /// Accounts: owner (signer, w), vault_config (w), program_config,
    /// rewards_pool (w).
    ClaimRewards,
    /// Accounts: admin (signer, w), program_config (w).
    InitializeConfig { params: ConfigParams },
    /// Accounts: admin (signer), program_config (w).
    UpdateConfig {
        params: ConfigParams,
        new_admin: Option<Pubkey>,
    },
    /// Accounts: funder (signer, w), rewards_pool (w).
    FundRewards { amount: u64 },
}

impl VaultInstruction {
    pub fn pack(&self) -> Result<Vec<u8>, VaultError> {
        bincode::serialize(self).map_err(|_| VaultError::InvalidInstruction)
    }

    pub fn unpack(data: &[u8]) -> Result<Self, VaultError> {
        bincode::deserialize(data).map_err(|_| VaultError::InvalidInstruction)
    }

    /// Stable label for logs and metrics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::Deposit { .. } => "deposit",
            Self::PrematureClose => "premature_close",
            Self::MatureClose => "mature_close",
            Self::ClaimRewards => "claim_rewards",
            Self::InitializeConfig { .. } => "initialize_config",
            Self::UpdateConfig { .. } => "update_config",
            Self::FundRewards { .. } => "fund_rewards",
        }
    }
}

fn message(accounts: Vec<AccountMeta>, ix: &VaultInstruction) -> Result<Message, VaultError> {
    Ok(Message::new(PROGRAM_ID, accounts, ix.pack()?))
}

pub fn initialize(owner: &Pubkey, lock_duration_secs: i64) -> Result<Message, VaultError> {
    let vault = VaultAddresses::derive(owner)?;
    let (config, _) = program_config_address()?;
    message(
        vec![
            AccountMeta::writable(*owner),
            AccountMeta::writable(vault.vault_config),
            AccountMeta::writable(vault.custody),
            AccountMeta::readonly(config),
        ],
        &VaultInstruction::Initialize { lock_duration_secs },
    )
}

pub fn deposit(owner: &Pubkey, amount: u64) -> Result<Message, VaultError> {
    let vault = VaultAddresses::derive(owner)?;
    message(
        vec![
            AccountMeta::writable(*owner),
            AccountMeta::writable(vault.vault_config),
            AccountMeta::writable(vault.custody),
        ],
        &VaultInstruction::Deposit { amount },
    )
}

/// `treasury` must be the configured admin. When the owner is the admin the
/// treasury slot is left out and the owner keeps the penalty.
pub fn premature_close(owner: &Pubkey, treasury: &Pubkey) -> Result<Message, VaultError> {
    let vault = VaultAddresses::derive(owner)?;
    let (config, _) = program_config_address()?;
    let mut accounts = vec![
        AccountMeta::writable(*owner),
        AccountMeta::writable(vault.vault_config),
        AccountMeta::writable(vault.custody),
        AccountMeta::readonly(config),
    ];
    if treasury != owner {
        accounts.push(AccountMeta::writable(*treasury));
    }
    message(accounts, &VaultInstruction::PrematureClose)
}

pub fn mature_close(owner: &Pubkey) -> Result<Message, VaultError> {
    let vault = VaultAddresses::derive(owner)?;
    message(
        vec![
            AccountMeta::writable(*owner),
            AccountMeta::writable(vault.vault_config),
            AccountMeta::writable(vault.custody),
        ],
        &VaultInstruction::MatureClose,
    )
}

pub fn claim_rewards(owner: &Pubkey) -> Result<Message, VaultError> {
    let vault = VaultAddresses::derive(owner)?;
    let (config, _) = program_config_address()?;
    let (pool, _) = rewards_pool_address()?;
    message(
        vec![
            AccountMeta::writable(*owner),
            AccountMeta::writable(vault.vault_config),
            AccountMeta::readonly(config),
            AccountMeta::writable(pool),
        ],
        &VaultInstruction::ClaimRewards,
    )
}

pub fn initialize_config(admin: &Pubkey, params: ConfigParams) -> Result<Message, VaultError> {
    let (config, _) = program_config_address()?;
    message(
        vec![AccountMeta::writable(*admin), AccountMeta::writable(config)],
        &VaultInstruction::InitializeConfig { params },
    )
}

pub fn update_config(
    admin: &Pubkey,
    params: ConfigParams,
    new_admin: Option<Pubkey>,
) -> Result<Message, VaultError> {
    let (config, _) = program_config_address()?;
    message(
        vec![AccountMeta::readonly(*admin), AccountMeta::writable(config)],
        &VaultInstruction::UpdateConfig { params, new_admin },
    )
}

pub fn fund_rewards(funder: &Pubkey, amount: u64) -> Result<Message, VaultError> {
    let (pool, _) = rewards_pool_address()?;
    message(
        vec![AccountMeta::writable(*funder), AccountMeta::writable(pool)],
        &VaultInstruction::FundRewards { amount },
    )
}
