//! # Accounts
//!
//! Every piece of state in the runtime is an [`Account`]: a lamport balance,
//! the program that owns it, and an opaque data buffer only that owner may
//! write.
//!
//! ## Rent
//!
//! Storage isn't free. An account carrying data (or owned by a program) must
//! hold at least [`minimum_balance`] lamports for its size, i.e. two years of
//! rent paid up front. Below that the runtime refuses to commit the
//! transaction. An account drained to zero lamports is deleted at commit.

use serde::{Deserialize, Serialize};

use crate::config::{
    ACCOUNT_STORAGE_OVERHEAD, EXEMPTION_THRESHOLD_YEARS, LAMPORTS_PER_BYTE_YEAR, SYSTEM_PROGRAM_ID,
};
use crate::crypto::Pubkey;

/// Minimum lamports an account with `data_len` bytes of data must hold.
///
/// `(128 + data_len) * 3480 * 2`. A data-less program-owned account still
/// pays for the 128 bytes of overhead: 890 880 lamports.
pub const fn minimum_balance(data_len: usize) -> u64 {
    (ACCOUNT_STORAGE_OVERHEAD + data_len as u64) * LAMPORTS_PER_BYTE_YEAR * EXEMPTION_THRESHOLD_YEARS
}

/// On-ledger account state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Balance in lamports.
    pub lamports: u64,
    /// The program allowed to debit this account and write its data.
    pub owner: Pubkey,
    /// Program-defined payload.
    pub data: Vec<u8>,
}

impl Account {
    /// A data-less account.
    pub fn new(lamports: u64, owner: Pubkey) -> Self {
        Self {
            lamports,
            owner,
            data: Vec::new(),
        }
    }

    /// An empty wallet owned by the system program.
    pub fn system(lamports: u64) -> Self {
        Self::new(lamports, SYSTEM_PROGRAM_ID)
    }

    pub fn is_system_owned(&self) -> bool {
        self.owner == SYSTEM_PROGRAM_ID
    }

    /// Whether rent rules apply at all. Plain wallets are exempt from the
    /// minimum; anything with data or a program owner is not.
    pub fn is_rent_paying(&self) -> bool {
        !self.data.is_empty() || !self.is_system_owned()
    }

    /// Lamports above the rent-exempt minimum, i.e. what may be withdrawn
    /// without closing the account.
    pub fn spendable(&self) -> u64 {
        if self.is_rent_paying() {
            self.lamports.saturating_sub(minimum_balance(self.data.len()))
        } else {
            self.lamports
        }
    }

    /// True if the account may be committed as-is.
    pub fn is_rent_exempt(&self) -> bool {
        self.lamports == 0 || !self.is_rent_paying() || self.lamports >= minimum_balance(self.data.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_account_reserve() {
        assert_eq!(minimum_balance(0), 890_880);
    }

    #[test]
    fn reserve_grows_with_data() {
        assert_eq!(minimum_balance(78), 1_433_760);
        assert!(minimum_balance(100) > minimum_balance(99));
    }

    #[test]
    fn wallet_has_no_rent_floor() {
        let wallet = Account::system(5);
        assert!(wallet.is_rent_exempt());
        assert_eq!(wallet.spendable(), 5);
    }

    #[test]
    fn program_account_needs_reserve() {
        let owner = Pubkey::new_from_array([9u8; 32]);
        let under = Account::new(minimum_balance(0) - 1, owner);
        assert!(!under.is_rent_exempt());
        let exact = Account::new(minimum_balance(0), owner);
        assert!(exact.is_rent_exempt());
        assert_eq!(exact.spendable(), 0);
    }

    #[test]
    fn zero_lamports_is_always_committable() {
        let owner = Pubkey::new_from_array([9u8; 32]);
        let closed = Account {
            lamports: 0,
            owner,
            data: vec![1, 2, 3],
        };
        assert!(closed.is_rent_exempt());
    }
}
