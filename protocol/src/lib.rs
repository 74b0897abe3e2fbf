// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # Trust Protocol: Core Runtime Library
//!
//! The execution substrate the vault program runs on: addresses, accounts,
//! signed transactions and a bank that commits them atomically.
//!
//! It's a deliberately small account-model runtime. Programs own accounts,
//! only owners write data or debit lamports, addresses can be derived
//! deterministically from seeds, and every transaction is all-or-nothing.
//!
//! ## Architecture
//!
//! - **crypto**: Ed25519 keys, pubkeys, signatures, hashing.
//! - **address**: Derived (off-curve) program addresses.
//! - **clock**: The time oracle. Read by the runtime, never by clients.
//! - **storage**: Accounts, rent, and the sled-backed ledger.
//! - **runtime**: Messages, transactions, invoke context, the bank.
//! - **config**: Protocol constants and defaults.
//!
//! ## Design Philosophy
//!
//! 1. Correctness over performance.
//! 2. No `unsafe`, no `unwrap` on anything a client controls.
//! 3. If it touches money, it has tests. Plural.

pub mod address;
pub mod clock;
pub mod config;
pub mod crypto;
pub mod runtime;
pub mod storage;

pub use address::{create_program_address, find_program_address, AddressError};
pub use clock::{Clock, ClockError, ManualClock, SystemClock};
pub use crypto::{Keypair, Pubkey, Signature};
pub use runtime::{
    AccountError, AccountMeta, Bank, InvokeContext, Message, Program, ProgramError, Transaction,
    TransactionError, TransactionReceipt,
};
pub use storage::{minimum_balance, Account, DbError, LedgerDb};
