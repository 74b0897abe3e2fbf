//! Vault program error taxonomy.
//!
//! Codes are stable and start at 6000. Clients match on the code (or the
//! name), never on the message text.

use thiserror::Error;
use trust_protocol::runtime::{AccountError, ProgramError};
use trust_protocol::AddressError;

/// Everything the vault program can reject an instruction with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u32)]
pub enum VaultError {
    /// A vault already exists for this owner, or the config already exists.
    #[error("account already initialized")]
    AlreadyInitialized = 6000,

    /// Lock duration is negative or above the configured maximum.
    #[error("lock duration out of range")]
    InvalidDuration = 6001,

    /// The vault is not `Active` (already closed).
    #[error("vault is not active")]
    VaultNotActive = 6002,

    /// Signer is not the vault owner / configured admin.
    #[error("signer is not authorized for this account")]
    Unauthorized = 6003,

    /// Payer cannot cover the amount or the rent reserve.
    #[error("insufficient funds")]
    InsufficientFunds = 6004,

    /// Mature close attempted before the lock expired.
    #[error("vault has not reached maturity")]
    NotMatureYet = 6005,

    /// Rewards claimed before maturity.
    #[error("vault is not yet eligible for rewards")]
    NotYetEligible = 6006,

    /// No off-curve bump exists for the seeds.
    #[error("could not derive a program address")]
    AddressDerivationExhausted = 6007,

    /// Operation on a vault that was never initialized.
    #[error("vault not initialized")]
    VaultNotInitialized = 6008,

    /// Zero amount.
    #[error("amount must be greater than zero")]
    InvalidAmount = 6009,

    /// Premature close attempted at or after maturity.
    #[error("vault has already matured; use mature close")]
    AlreadyMatured = 6010,

    /// Penalty recipient is not the configured administrator.
    #[error("treasury account does not match the configured admin")]
    InvalidTreasury = 6011,

    /// An account is not at the address (or owner) the instruction expects.
    #[error("invalid account for this instruction")]
    InvalidAccount = 6012,

    /// The program configuration account does not exist yet.
    #[error("program configuration not initialized")]
    ConfigNotInitialized = 6013,

    /// Configuration parameters out of range.
    #[error("invalid configuration parameters")]
    InvalidConfig = 6014,

    /// Rewards already paid up to the current entitlement.
    #[error("nothing to claim")]
    NothingToClaim = 6015,

    /// The rewards pool can't cover the claim above its own reserve.
    #[error("rewards pool depleted")]
    RewardsPoolDepleted = 6016,

    #[error("arithmetic overflow")]
    ArithmeticOverflow = 6017,

    #[error("invalid instruction data")]
    InvalidInstruction = 6018,

    /// Account data has the wrong discriminator or doesn't decode.
    #[error("account data corrupt")]
    AccountDataCorrupt = 6019,
}

impl VaultError {
    pub const ALL: [VaultError; 20] = [
        Self::AlreadyInitialized,
        Self::InvalidDuration,
        Self::VaultNotActive,
        Self::Unauthorized,
        Self::InsufficientFunds,
        Self::NotMatureYet,
        Self::NotYetEligible,
        Self::AddressDerivationExhausted,
        Self::VaultNotInitialized,
        Self::InvalidAmount,
        Self::AlreadyMatured,
        Self::InvalidTreasury,
        Self::InvalidAccount,
        Self::ConfigNotInitialized,
        Self::InvalidConfig,
        Self::NothingToClaim,
        Self::RewardsPoolDepleted,
        Self::ArithmeticOverflow,
        Self::InvalidInstruction,
        Self::AccountDataCorrupt,
    ];

    pub fn code(self) -> u32 {
        self as u32
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::AlreadyInitialized => "AlreadyInitialized",
            Self::InvalidDuration => "InvalidDuration",
            Self::VaultNotActive => "VaultNotActive",
            Self::Unauthorized => "Unauthorized",
            Self::InsufficientFunds => "InsufficientFunds",
            Self::NotMatureYet => "NotMatureYet",
            Self::NotYetEligible => "NotYetEligible",
            Self::AddressDerivationExhausted => "AddressDerivationExhausted",
            Self::VaultNotInitialized => "VaultNotInitialized",
            Self::InvalidAmount => "InvalidAmount",
            Self::AlreadyMatured => "AlreadyMatured",
            Self::InvalidTreasury => "InvalidTreasury",
            Self::InvalidAccount => "InvalidAccount",
            Self::ConfigNotInitialized => "ConfigNotInitialized",
            Self::InvalidConfig => "InvalidConfig",
            Self::NothingToClaim => "NothingToClaim",
            Self::RewardsPoolDepleted => "RewardsPoolDepleted",
            Self::ArithmeticOverflow => "ArithmeticOverflow",
            Self::InvalidInstruction => "InvalidInstruction",
            Self::AccountDataCorrupt => "AccountDataCorrupt",
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|e| e.code() == code)
    }
}

impl From<VaultError> for ProgramError {
    fn from(e: VaultError) -> Self {
        ProgramError::new(e.code(), e.name(), e.to_string())
    }
}

impl TryFrom<&ProgramError> for VaultError {
    type Error = ();

    fn try_from(e: &ProgramError) -> Result<Self, Self::Error> {
        Self::from_code(e.code).ok_or(())
    }
}

impl From<AddressError> for VaultError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::Exhausted => Self::AddressDerivationExhausted,
            AddressError::MaxSeedLengthExceeded | AddressError::InvalidSeeds => Self::InvalidAccount,
        }
    }
}

impl From<AccountError> for VaultError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::InsufficientFunds { .. } | AccountError::InsufficientRent { .. } => {
                Self::InsufficientFunds
            }
            AccountError::LamportOverflow(_) => Self::ArithmeticOverflow,
            AccountError::AlreadyInUse(_) => Self::AlreadyInitialized,
            AccountError::InvalidSeeds(inner) => inner.into(),
            AccountError::NotDeclared(_)
            | AccountError::ReadOnly(_)
            | AccountError::NotEnoughAccounts { .. }
            | AccountError::AccountNotFound(_)
            | AccountError::UnauthorizedDebit(_)
            | AccountError::NotOwned(_)
            | AccountError::PdaMismatch(_) => Self::InvalidAccount,
        }
    }
}
