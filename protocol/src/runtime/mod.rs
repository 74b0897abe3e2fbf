//! # Runtime
//!
//! Executes signed transactions against the account store, atomically.
//!
//! ## Architecture
//!
//! ```text
//! transaction.rs  Message, AccountMeta, signed Transaction, wire format
//! context.rs      InvokeContext: the program's account-model-enforcing view
//! system.rs       built-in system program (lamport transfers)
//! bank.rs         Bank: verify, load, invoke, post-check, commit
//! error.rs        ProgramError / AccountError / TransactionError
//! ```
//!
//! ## Lifecycle of a transaction
//!
//! ```text
//! verify sig ─► dedupe accounts ─► route program ─► read clock (once)
//!     └─► sled transaction { replay check ─► load ─► invoke ─► post-check ─► commit }
//! ```
//!
//! A program only ever sees an [`InvokeContext`]; it cannot reach storage,
//! the clock, or accounts the transaction didn't declare.

pub mod bank;
pub mod context;
pub mod error;
pub mod system;
pub mod transaction;

pub use bank::{Bank, TransactionReceipt};
pub use context::InvokeContext;
pub use error::{AccountError, ProgramError, TransactionError};
pub use system::{SystemInstruction, SystemProgram};
pub use transaction::{AccountMeta, Message, Transaction};

use crate::crypto::Pubkey;

/// An on-ledger program.
///
/// Implementations must be deterministic: the bank may invoke `process` more
/// than once for the same transaction when the storage engine retries a
/// conflicting commit, and only the last run's effects are kept.
pub trait Program: Send + Sync {
    /// The id accounts are owned by and addresses are derived under.
    fn id(&self) -> Pubkey;

    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;

    /// Execute one instruction.
    fn process(&self, ctx: &mut InvokeContext, data: &[u8]) -> Result<(), ProgramError>;
}
