//! The invoke context: a program's only view of the ledger.
//!
//! The bank loads every declared account into an [`InvokeContext`] before the
//! program runs. The program reads and mutates those copies through the
//! methods here, each of which enforces the account model:
//!
//! - only declared accounts are visible,
//! - only writable accounts change,
//! - only the owning program writes data or debits lamports, except that a
//!   system-owned account may be debited when it signed the transaction,
//! - derived accounts are only created by the program whose id derives them.
//!
//! Nothing touches storage until the program returns `Ok` and the bank's
//! post-checks pass.

use super::error::AccountError;
use super::transaction::AccountMeta;
use crate::address::create_program_address;
use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::Pubkey;
use crate::storage::{minimum_balance, Account};

#[derive(Debug, Clone)]
pub(crate) struct AccountSlot {
    pub(crate) meta: AccountMeta,
    pub(crate) before: Option<Account>,
    pub(crate) current: Option<Account>,
}

/// Execution context handed to [`super::Program::process`].
#[derive(Debug)]
pub struct InvokeContext {
    program_id: Pubkey,
    signer: Pubkey,
    now: i64,
    slots: Vec<AccountSlot>,
    logs: Vec<String>,
}

impl InvokeContext {
    /// Build a context over already-loaded accounts, in message order.
    pub fn new(
        program_id: Pubkey,
        signer: Pubkey,
        now: i64,
        loaded: Vec<(AccountMeta, Option<Account>)>,
    ) -> Self {
        let slots = loaded
            .into_iter()
            .map(|(meta, account)| AccountSlot {
                meta,
                before: account.clone(),
                current: account,
            })
            .collect();
        Self {
            program_id,
            signer,
            now,
            slots,
            logs: Vec::new(),
        }
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    /// The transaction's (single, verified) signer.
    pub fn signer(&self) -> &Pubkey {
        &self.signer
    }

    /// Unix time as read by the runtime for this transaction.
    pub fn now(&self) -> i64 {
        self.now
    }

    pub fn is_signer(&self, key: &Pubkey) -> bool {
        self.signer == *key
    }

    /// The first `N` declared account keys, in order.
    ///
    /// # Errors
    ///
    /// [`AccountError::NotEnoughAccounts`] if fewer than `N` were declared.
    pub fn accounts<const N: usize>(&self) -> Result<[Pubkey; N], AccountError> {
        if self.slots.len() < N {
            return Err(AccountError::NotEnoughAccounts {
                expected: N,
                got: self.slots.len(),
            });
        }
        Ok(std::array::from_fn(|i| self.slots[i].meta.pubkey))
    }

    fn slot(&self, key: &Pubkey) -> Result<&AccountSlot, AccountError> {
        self.slots
            .iter()
            .find(|s| s.meta.pubkey == *key)
            .ok_or(AccountError::NotDeclared(*key))
    }

    fn slot_mut(&mut self, key: &Pubkey) -> Result<&mut AccountSlot, AccountError> {
        let slot = self
            .slots
            .iter_mut()
            .find(|s| s.meta.pubkey == *key)
            .ok_or(AccountError::NotDeclared(*key))?;
        if !slot.meta.is_writable {
            return Err(AccountError::ReadOnly(*key));
        }
        Ok(slot)
    }

    /// Current state of a declared account, `None` if it doesn't exist.
    pub fn get(&self, key: &Pubkey) -> Result<Option<&Account>, AccountError> {
        Ok(self.slot(key)?.current.as_ref())
    }

    pub fn exists(&self, key: &Pubkey) -> Result<bool, AccountError> {
        Ok(self.get(key)?.is_some())
    }

    pub fn lamports(&self, key: &Pubkey) -> Result<u64, AccountError> {
        Ok(self.get(key)?.map(|a| a.lamports).unwrap_or(0))
    }

    /// Data of an existing account.
    pub fn data(&self, key: &Pubkey) -> Result<&[u8], AccountError> {
        self.get(key)?
            .map(|a| a.data.as_slice())
            .ok_or(AccountError::AccountNotFound(*key))
    }

    /// Create a derived account owned by the executing program.
    ///
    /// `signer_seeds` must include the bump and derive exactly `address`
    /// under this program's id. `payer` tops the new account up to `lamports`,
    /// which must cover rent for `data`. An address that already holds a
    /// plain system wallet with no data (someone sent lamports to it ahead
    /// of time) is adopted, and its balance counts toward `lamports`.
    ///
    /// # Errors
    ///
    /// - [`AccountError::PdaMismatch`] / [`AccountError::InvalidSeeds`] for bad seeds.
    /// - [`AccountError::AlreadyInUse`] if the address is already allocated.
    /// - [`AccountError::InsufficientRent`] if `lamports` is below the minimum.
    /// - Any error from [`InvokeContext::transfer`] for the funding debit.
    pub fn create_pda_account(
        &mut self,
        payer: &Pubkey,
        address: &Pubkey,
        signer_seeds: &[&[u8]],
        data: Vec<u8>,
        lamports: u64,
    ) -> Result<(), AccountError> {
        let derived = create_program_address(signer_seeds, &self.program_id)?;
        if derived != *address {
            return Err(AccountError::PdaMismatch(*address));
        }

        let required = minimum_balance(data.len());
        if lamports < required {
            return Err(AccountError::InsufficientRent {
                address: *address,
                required,
                provided: lamports,
            });
        }

        let existing = match self.slot_mut(address)?.current.as_ref() {
            None => 0,
            Some(acc) if acc.is_system_owned() && acc.data.is_empty() => acc.lamports,
            Some(_) => return Err(AccountError::AlreadyInUse(*address)),
        };

        let top_up = lamports.saturating_sub(existing);
        if top_up > 0 {
            self.transfer(payer, address, top_up)?;
        }

        let program_id = self.program_id;
        let slot = self.slot_mut(address)?;
        let balance = slot.current.as_ref().map(|a| a.lamports).unwrap_or(0);
        slot.current = Some(Account {
            lamports: balance,
            owner: program_id,
            data,
        });
        tracing::debug!(%address, lamports = balance, "created program account");
        Ok(())
    }

    /// Replace the data of an account this program owns.
    ///
    /// # Errors
    ///
    /// [`AccountError::NotOwned`] unless the executing program owns `key`.
    pub fn write_data(&mut self, key: &Pubkey, data: Vec<u8>) -> Result<(), AccountError> {
        let program_id = self.program_id;
        let slot = self.slot_mut(key)?;
        let account = slot
            .current
            .as_mut()
            .ok_or(AccountError::AccountNotFound(*key))?;
        if account.owner != program_id {
            return Err(AccountError::NotOwned(*key));
        }
        account.data = data;
        Ok(())
    }

    /// Move lamports between two declared, writable accounts.
    ///
    /// `from` may be debited if the executing program owns it, or if it is a
    /// system wallet that signed the transaction. `to` is created as a
    /// system wallet if it doesn't exist yet.
    ///
    /// # Errors
    ///
    /// - [`AccountError::UnauthorizedDebit`] if neither rule above applies.
    /// - [`AccountError::InsufficientFunds`] if `from` is short.
    /// - [`AccountError::LamportOverflow`] if `to` would overflow.
    pub fn transfer(&mut self, from: &Pubkey, to: &Pubkey, lamports: u64) -> Result<(), AccountError> {
        if lamports == 0 {
            return Ok(());
        }
        let program_id = self.program_id;
        let signer = self.signer;

        // Validate the credit side before touching anything.
        {
            let to_slot = self.slot_mut(to)?;
            let to_balance = to_slot.current.as_ref().map(|a| a.lamports).unwrap_or(0);
            if from != to && to_balance.checked_add(lamports).is_none() {
                return Err(AccountError::LamportOverflow(*to));
            }
        }

        let from_slot = self.slot_mut(from)?;
        let source = from_slot
            .current
            .as_mut()
            .ok_or(AccountError::InsufficientFunds {
                address: *from,
                available: 0,
                requested: lamports,
            })?;
        let owned = source.owner == program_id && program_id != SYSTEM_PROGRAM_ID;
        let signed_wallet = source.is_system_owned() && *from == signer;
        if !owned && !signed_wallet {
            return Err(AccountError::UnauthorizedDebit(*from));
        }
        if source.lamports < lamports {
            return Err(AccountError::InsufficientFunds {
                address: *from,
                available: source.lamports,
                requested: lamports,
            });
        }
        source.lamports -= lamports;

        let to_slot = self.slot_mut(to)?;
        let dest = to_slot.current.get_or_insert_with(|| Account::system(0));
        dest.lamports = dest
            .lamports
            .checked_add(lamports)
            .ok_or(AccountError::LamportOverflow(*to))?;
        Ok(())
    }

    /// Append a line to the transaction log returned in the receipt.
    pub fn log(&mut self, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(program = %self.program_id, "{line}");
        self.logs.push(line);
    }

    pub(crate) fn into_parts(self) -> (Vec<AccountSlot>, Vec<String>) {
        (self.slots, self.logs)
    }
}
