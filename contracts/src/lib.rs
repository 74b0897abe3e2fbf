//! # Trust Vault Program
//!
//! Per-user, time-locked custody vaults. A user locks lamports for a chosen
//! duration and leaves by exactly one of two doors:
//!
//! - **Premature close**: before maturity, paying a penalty (10% by default)
//!   to the administrator's treasury.
//! - **Mature close**: at or after maturity, with the full principal.
//!   Matured vaults may also claim a reward from the rewards pool first.
//!
//! ## Accounts
//!
//! | Account         | Address                        | Owner   | Data          |
//! |-----------------|--------------------------------|---------|---------------|
//! | VaultConfig     | `derive(["state", owner])`     | program | `VaultConfig` |
//! | CustodyAccount  | `derive(["vault", vault])`     | program | none          |
//! | ProgramConfig   | `derive(["config"])`           | program | `ProgramConfig` |
//! | RewardsPool     | `derive(["rewards"])`          | program | none          |
//!
//! ## Design Principles
//!
//! 1. All monetary operations check for overflow. Wrapping arithmetic and
//!    money do not mix.
//! 2. State transitions are explicit: enum variants, not boolean flags.
//! 3. Time comes from the runtime, never from the instruction.
//! 4. Addresses are recomputed on every call, never trusted from the client.

pub mod error;
pub mod instruction;
pub mod pda;
pub mod processor;
pub mod rewards;
pub mod state;

pub use error::VaultError;
pub use instruction::VaultInstruction;
pub use pda::VaultAddresses;
pub use processor::VaultProgram;
pub use rewards::{LinearRewards, RewardCalculator};
pub use state::{AccountRecord, AdminAuthority, ConfigParams, ProgramConfig, VaultConfig, VaultStatus};

use trust_protocol::{minimum_balance, Pubkey};

/// The vault program's id.
pub const PROGRAM_ID: Pubkey = Pubkey::new_from_array(*b"trust-vault-program-id-000000001");

/// Lamports a custody account holds on top of principal: rent for an empty
/// program-owned account.
pub const CUSTODY_RESERVE: u64 = minimum_balance(0);
