//! # Storage Module
//!
//! Persistent account state for the runtime.
//!
//! ## Architecture
//!
//! ```text
//! account.rs  Account record (lamports, owner, data) and rent math
//! db.rs       sled persistence: accounts, processed message ids, metadata
//! ```
//!
//! ## Design Decisions
//!
//! 1. **sled trees instead of column families.** One tree per concern, and
//!    sled's multi-tree transactions give us serializable, all-or-nothing
//!    commits across the account set a transaction touches.
//!
//! 2. **Bincode for on-disk serialization.** Compact, fast, deterministic.
//!    JSON is for the RPC surface; bincode is for storage.
//!
//! 3. **Raw 32-byte keys.** Accounts are keyed by their address bytes, not
//!    the base58 string, so keys sort and compare without decoding.

pub mod account;
pub mod db;

pub use account::{minimum_balance, Account};
pub use db::{DbError, DbResult, LedgerDb};
