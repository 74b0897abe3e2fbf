//! # Protocol Configuration & Constants
//!
//! Every magic number in the runtime lives here. If you're hardcoding a
//! constant somewhere else, move it here first.
//!
//! Vault *policy* (penalty rate, reward rate, maximum lock) is not a compile
//! time constant: it lives on-ledger in the program configuration account.
//! The values below are only the defaults the node bootstraps it with.

use crate::crypto::Pubkey;

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The full version string reported by `getVersion` and `/status`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

// ---------------------------------------------------------------------------
// Units
// ---------------------------------------------------------------------------

/// Lamports per SOL. The lamport is the smallest indivisible unit of value.
pub const LAMPORTS_PER_SOL: u64 = 1_000_000_000;

/// Seconds in a (non-leap) year. Used for rent and reward accrual.
pub const SECONDS_PER_YEAR: i64 = 31_536_000;

/// Seconds in a day.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Basis points in 100%.
pub const BPS_DENOMINATOR: u64 = 10_000;

// ---------------------------------------------------------------------------
// Built-in Programs
// ---------------------------------------------------------------------------

/// The system program. Owns every plain wallet account and implements
/// lamport transfers between them.
pub const SYSTEM_PROGRAM_ID: Pubkey = Pubkey::new_from_array([0u8; 32]);

// ---------------------------------------------------------------------------
// Rent
// ---------------------------------------------------------------------------

/// Lamports charged per byte per year of account storage.
pub const LAMPORTS_PER_BYTE_YEAR: u64 = 3_480;

/// Years of rent an account must hold up front to be exempt.
pub const EXEMPTION_THRESHOLD_YEARS: u64 = 2;

/// Bytes of bookkeeping every account costs, on top of its data.
pub const ACCOUNT_STORAGE_OVERHEAD: u64 = 128;

// ---------------------------------------------------------------------------
// Address Derivation
// ---------------------------------------------------------------------------

/// Maximum number of seeds (including the bump) in a derived address.
pub const MAX_SEEDS: usize = 16;

/// Maximum length of a single seed, in bytes.
pub const MAX_SEED_LEN: usize = 32;

/// Domain separator appended to every derived-address preimage.
pub const PDA_MARKER: &[u8] = b"ProgramDerivedAddress";

// ---------------------------------------------------------------------------
// Default Vault Policy
// ---------------------------------------------------------------------------

/// Early-exit penalty: 1 000 bps = 10% of principal.
pub const DEFAULT_PENALTY_BPS: u16 = 1_000;

/// Annual reward rate for matured vaults: 500 bps = 5%.
pub const DEFAULT_REWARD_RATE_BPS: u16 = 500;

/// Longest lock a vault may be initialized with: ten years.
pub const DEFAULT_MAX_LOCK_DURATION_SECS: i64 = 10 * SECONDS_PER_YEAR;

// ---------------------------------------------------------------------------
// Node Defaults
// ---------------------------------------------------------------------------

/// Default JSON-RPC / REST port.
pub const DEFAULT_RPC_PORT: u16 = 8899;

/// Default Prometheus metrics port.
pub const DEFAULT_METRICS_PORT: u16 = 9090;

/// Default data directory for the sled database and key files.
pub const DEFAULT_DATA_DIR: &str = "./trust-data";

/// Largest airdrop a single `requestAirdrop` call may ask for.
pub const MAX_AIRDROP_LAMPORTS: u64 = 100 * LAMPORTS_PER_SOL;

/// Lamports the node airdrops to the admin at bootstrap so it can pay rent
/// for the program configuration account.
pub const ADMIN_BOOTSTRAP_LAMPORTS: u64 = LAMPORTS_PER_SOL;
