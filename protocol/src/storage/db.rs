//! # LedgerDb: Persistent Storage Engine
//!
//! The persistence layer for the runtime, built on sled's embedded key-value
//! store. All on-disk data flows through this module.
//!
//! ## Tree Layout
//!
//! | Tree        | Key                   | Value                       |
//! |-------------|-----------------------|-----------------------------|
//! | `accounts`  | `address` (32B)       | `bincode(Account)`          |
//! | `processed` | `message_id` (32B)    | `timestamp` (8B BE, i64)    |
//! | `metadata`  | key (UTF-8)           | value (bytes)               |
//!
//! ## Atomicity
//!
//! Transactions are committed by the runtime through a sled multi-tree
//! transaction over `accounts` and `processed` (see
//! [`crate::runtime::Bank`]). Either every account write and the replay
//! marker land, or none do. sled retries conflicting transactions, so two
//! writers touching the same account serialize cleanly.

use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{Db, Transactional, Tree};
use std::path::Path;

use super::account::Account;
use crate::crypto::Pubkey;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("lamport balance overflow for {0}")]
    LamportOverflow(Pubkey),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

pub(crate) fn encode_account(account: &Account) -> DbResult<Vec<u8>> {
    bincode::serialize(account).map_err(|e| DbError::Serialization(e.to_string()))
}

pub(crate) fn decode_account(bytes: &[u8]) -> DbResult<Account> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

/// Running total of lamports minted by the faucet.
const META_TOTAL_AIRDROPPED: &[u8] = b"total_airdropped";

fn read_u64(bytes: Option<sled::IVec>) -> DbResult<u64> {
    match bytes {
        Some(b) => {
            let arr: [u8; 8] = b
                .as_ref()
                .try_into()
                .map_err(|_| DbError::Serialization("invalid u64 bytes".to_string()))?;
            Ok(u64::from_be_bytes(arr))
        }
        None => Ok(0),
    }
}

// ---------------------------------------------------------------------------
// LedgerDb
// ---------------------------------------------------------------------------

/// Persistent account store.
///
/// # Thread Safety
///
/// sled trees support lock-free concurrent reads and serializable
/// transactions. `LedgerDb` is cheap to clone and can be shared across
/// threads via `Arc<LedgerDb>` or by cloning the handle.
#[derive(Debug, Clone)]
pub struct LedgerDb {
    db: Db,
    accounts: Tree,
    processed: Tree,
    metadata: Tree,
}

impl LedgerDb {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is cleaned up when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let accounts = db.open_tree("accounts")?;
        let processed = db.open_tree("processed")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            accounts,
            processed,
            metadata,
        })
    }

    pub(crate) fn accounts_tree(&self) -> &Tree {
        &self.accounts
    }

    pub(crate) fn processed_tree(&self) -> &Tree {
        &self.processed
    }

    // -- Account operations -------------------------------------------------

    /// Retrieve an account. `None` if it has never been funded or was closed.
    pub fn get_account(&self, address: &Pubkey) -> DbResult<Option<Account>> {
        match self.accounts.get(address.as_ref())? {
            Some(bytes) => Ok(Some(decode_account(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Write an account outside of the transaction path. Used for genesis
    /// style setup; programs never reach this.
    pub fn put_account(&self, address: &Pubkey, account: &Account) -> DbResult<()> {
        self.accounts.insert(address.as_ref(), encode_account(account)?)?;
        Ok(())
    }

    /// Balance of an account, zero if it doesn't exist.
    pub fn balance(&self, address: &Pubkey) -> DbResult<u64> {
        Ok(self.get_account(address)?.map(|a| a.lamports).unwrap_or(0))
    }

    /// All accounts owned by `owner`. Full scan; meant for status pages and
    /// metrics, not the hot path.
    pub fn accounts_owned_by(&self, owner: &Pubkey) -> DbResult<Vec<(Pubkey, Account)>> {
        let mut out = Vec::new();
        for entry in self.accounts.iter() {
            let (key, value) = entry?;
            let account = decode_account(&value)?;
            if account.owner == *owner {
                let address = Pubkey::try_from_slice(&key)
                    .map_err(|e| DbError::Serialization(e.to_string()))?;
                out.push((address, account));
            }
        }
        Ok(out)
    }

    /// Credit `lamports` to `to`, creating a system-owned wallet if needed.
    ///
    /// This is the devnet faucet. It bypasses the transaction path and is the
    /// only way lamports enter the ledger. Returns the new balance.
    ///
    /// # Errors
    ///
    /// [`DbError::LamportOverflow`] if the credit would overflow `u64`.
    pub fn airdrop(&self, to: &Pubkey, lamports: u64) -> DbResult<u64> {
        let result = (&self.accounts, &self.metadata).transaction(|(accounts, metadata)| {
            let mut account = match accounts.get(to.as_ref())? {
                Some(bytes) => decode_account(&bytes).map_err(ConflictableTransactionError::Abort)?,
                None => Account::system(0),
            };
            account.lamports = account
                .lamports
                .checked_add(lamports)
                .ok_or(ConflictableTransactionError::Abort(DbError::LamportOverflow(*to)))?;

            let total = read_u64(metadata.get(META_TOTAL_AIRDROPPED)?)
                .map_err(ConflictableTransactionError::Abort)?
                .saturating_add(lamports);

            let encoded = encode_account(&account).map_err(ConflictableTransactionError::Abort)?;
            accounts.insert(to.as_ref(), encoded)?;
            metadata.insert(META_TOTAL_AIRDROPPED, &total.to_be_bytes())?;
            Ok(account.lamports)
        });

        match result {
            Ok(balance) => Ok(balance),
            Err(TransactionError::Abort(e)) => Err(e),
            Err(TransactionError::Storage(e)) => Err(DbError::Sled(e)),
        }
    }

    /// Lamports minted by the faucet since genesis.
    pub fn total_airdropped(&self) -> DbResult<u64> {
        read_u64(self.metadata.get(META_TOTAL_AIRDROPPED)?)
    }

    // -- Replay protection --------------------------------------------------

    /// Whether a message id has already been committed.
    pub fn is_processed(&self, message_id: &[u8; 32]) -> DbResult<bool> {
        Ok(self.processed.contains_key(message_id)?)
    }

    // -- Utility operations -------------------------------------------------

    pub fn account_count(&self) -> usize {
        self.accounts.len()
    }

    pub fn processed_count(&self) -> usize {
        self.processed.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use std::sync::Arc;

    #[test]
    fn open_temporary_database() {
        let db = LedgerDb::open_temporary().expect("should create temp db");
        assert_eq!(db.account_count(), 0);
        assert_eq!(db.processed_count(), 0);
        assert_eq!(db.total_airdropped().unwrap(), 0);
    }

    #[test]
    fn persistent_database_survives_reopen() {
        let dir = tempfile::tempdir().expect("tempdir");
        let alice = Keypair::generate().pubkey();
        {
            let db = LedgerDb::open(dir.path()).expect("should open db");
            db.airdrop(&alice, 42).unwrap();
            db.flush().unwrap();
        }
        let db = LedgerDb::open(dir.path()).expect("should reopen db");
        assert_eq!(db.balance(&alice).unwrap(), 42);
    }

    #[test]
    fn missing_account_is_none() {
        let db = LedgerDb::open_temporary().unwrap();
        let nobody = Keypair::generate().pubkey();
        assert!(db.get_account(&nobody).unwrap().is_none());
        assert_eq!(db.balance(&nobody).unwrap(), 0);
    }

    #[test]
    fn airdrop_creates_system_wallet() {
        let db = LedgerDb::open_temporary().unwrap();
        let alice = Keypair::generate().pubkey();
        assert_eq!(db.airdrop(&alice, 1_000).unwrap(), 1_000);
        assert_eq!(db.airdrop(&alice, 500).unwrap(), 1_500);

        let account = db.get_account(&alice).unwrap().unwrap();
        assert!(account.is_system_owned());
        assert_eq!(db.total_airdropped().unwrap(), 1_500);
    }

    #[test]
    fn airdrop_overflow_is_rejected_and_leaves_state() {
        let db = LedgerDb::open_temporary().unwrap();
        let alice = Keypair::generate().pubkey();
        db.airdrop(&alice, u64::MAX).unwrap();
        let err = db.airdrop(&alice, 1).unwrap_err();
        assert!(matches!(err, DbError::LamportOverflow(pk) if pk == alice));
        assert_eq!(db.balance(&alice).unwrap(), u64::MAX);
    }

    #[test]
    fn accounts_owned_by_filters() {
        let db = LedgerDb::open_temporary().unwrap();
        let program = Pubkey::new_from_array([5u8; 32]);
        let a = Keypair::generate().pubkey();
        let b = Keypair::generate().pubkey();
        db.put_account(&a, &Account::new(10, program)).unwrap();
        db.put_account(&b, &Account::system(10)).unwrap();

        let owned = db.accounts_owned_by(&program).unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].0, a);
    }

    #[test]
    fn concurrent_airdrops_all_land() {
        let db = Arc::new(LedgerDb::open_temporary().unwrap());
        let alice = Keypair::generate().pubkey();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let db = Arc::clone(&db);
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        db.airdrop(&alice, 1).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(db.balance(&alice).unwrap(), 200);
        assert_eq!(db.total_airdropped().unwrap(), 200);
    }
}
