//! Runtime error types.
//!
//! Three layers, kept apart on purpose:
//!
//! - [`ProgramError`] is what a program returns. It carries a stable numeric
//!   code and a name so clients can match on it without parsing strings.
//! - [`AccountError`] is a violation of the account model detected by the
//!   invoke context (debiting an account you don't own, writing a read-only
//!   account, and so on). Programs usually map it into their own taxonomy.
//! - [`TransactionError`] is everything that can reject a transaction as a
//!   whole: signatures, replays, the post-execution checks, storage and the
//!   clock.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::address::AddressError;
use crate::clock::ClockError;
use crate::crypto::Pubkey;
use crate::storage::DbError;

/// A program-level failure, as seen by clients.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{name} ({code}): {message}")]
pub struct ProgramError {
    pub code: u32,
    pub name: String,
    pub message: String,
}

impl ProgramError {
    pub fn new(code: u32, name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            name: name.into(),
            message: message.into(),
        }
    }
}

/// Account model violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccountError {
    #[error("account {0} was not declared by the transaction")]
    NotDeclared(Pubkey),

    #[error("account {0} is read-only in this transaction")]
    ReadOnly(Pubkey),

    #[error("instruction needs {expected} accounts, transaction declared {got}")]
    NotEnoughAccounts { expected: usize, got: usize },

    #[error("account {0} does not exist")]
    AccountNotFound(Pubkey),

    #[error("account {0} already in use")]
    AlreadyInUse(Pubkey),

    #[error("account {0} may not be debited by this program")]
    UnauthorizedDebit(Pubkey),

    #[error("account {0} is not owned by the executing program")]
    NotOwned(Pubkey),

    #[error("insufficient funds in {address}: available {available}, requested {requested}")]
    InsufficientFunds {
        address: Pubkey,
        available: u64,
        requested: u64,
    },

    #[error("lamport overflow crediting {0}")]
    LamportOverflow(Pubkey),

    #[error("invalid seeds: {0}")]
    InvalidSeeds(#[from] AddressError),

    #[error("seeds derive a different address than {0}")]
    PdaMismatch(Pubkey),

    #[error("account {address} needs {required} lamports to be rent exempt, got {provided}")]
    InsufficientRent {
        address: Pubkey,
        required: u64,
        provided: u64,
    },
}

/// Reasons a transaction is rejected. Any of these means nothing was
/// committed.
#[derive(Debug, Error)]
pub enum TransactionError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("transaction already processed")]
    AlreadyProcessed,

    #[error("unknown program {0}")]
    UnknownProgram(Pubkey),

    #[error("account {0} listed more than once")]
    DuplicateAccount(Pubkey),

    #[error("signer {0} is not among the transaction accounts")]
    SignerNotInAccounts(Pubkey),

    #[error("malformed transaction: {0}")]
    Malformed(String),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error("program error: {0}")]
    Program(#[from] ProgramError),

    #[error("lamports not conserved: {before} before, {after} after")]
    UnbalancedTransaction { before: u128, after: u128 },

    #[error("account {address} left below its rent-exempt minimum")]
    InsufficientFundsForRent { address: Pubkey },

    #[error("clock error: {0}")]
    Clock(#[from] ClockError),

    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl TransactionError {
    /// The program error, if that's what this is.
    pub fn program_error(&self) -> Option<&ProgramError> {
        match self {
            Self::Program(e) => Some(e),
            _ => None,
        }
    }
}
