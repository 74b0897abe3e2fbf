//! The bank: turns a signed transaction into a committed state change, or
//! into nothing at all.

use serde::{Deserialize, Serialize};
use sled::transaction::{ConflictableTransactionError, TransactionError as SledTxError};
use sled::Transactional;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use super::context::{AccountSlot, InvokeContext};
use super::error::TransactionError;
use super::system::SystemProgram;
use super::transaction::Transaction;
use super::Program;
use crate::clock::Clock;
use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::Pubkey;
use crate::storage::db::{decode_account, encode_account};
use crate::storage::{Account, DbError, LedgerDb};

/// What a successful transaction returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Hex message id.
    pub id: String,
    /// Unix time the runtime executed at.
    pub timestamp: i64,
    pub logs: Vec<String>,
    pub accounts_written: Vec<Pubkey>,
}

/// Executes transactions for the system program and one application program.
pub struct Bank<P: Program> {
    db: LedgerDb,
    program: P,
    system: SystemProgram,
    clock: Arc<dyn Clock>,
}

impl<P: Program> Bank<P> {
    pub fn new(db: LedgerDb, program: P, clock: Arc<dyn Clock>) -> Self {
        Self {
            db,
            program,
            system: SystemProgram,
            clock,
        }
    }

    pub fn db(&self) -> &LedgerDb {
        &self.db
    }

    pub fn program(&self) -> &P {
        &self.program
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn get_account(&self, address: &Pubkey) -> Result<Option<Account>, DbError> {
        self.db.get_account(address)
    }

    pub fn balance(&self, address: &Pubkey) -> Result<u64, DbError> {
        self.db.balance(address)
    }

    /// Faucet credit. See [`LedgerDb::airdrop`].
    pub fn airdrop(&self, to: &Pubkey, lamports: u64) -> Result<u64, DbError> {
        let balance = self.db.airdrop(to, lamports)?;
        tracing::info!(%to, lamports, balance, "airdrop");
        Ok(balance)
    }

    /// Name of the program a message is addressed to, if the bank knows it.
    pub fn program_name(&self, program_id: &Pubkey) -> Option<&'static str> {
        if *program_id == SYSTEM_PROGRAM_ID {
            Some(self.system.name())
        } else if *program_id == self.program.id() {
            Some(self.program.name())
        } else {
            None
        }
    }

    /// Verify, execute and commit a transaction.
    ///
    /// # Errors
    ///
    /// Any [`TransactionError`]. On error no account and no replay marker
    /// was written.
    pub fn process_transaction(&self, tx: &Transaction) -> Result<TransactionReceipt, TransactionError> {
        let started = Instant::now();
        let result = self.execute(tx);
        let elapsed_us = started.elapsed().as_micros() as u64;
        match &result {
            Ok(receipt) => tracing::info!(
                id = %receipt.id,
                program = %tx.message.program_id,
                signer = %tx.signer,
                elapsed_us,
                "transaction committed"
            ),
            Err(e) => tracing::warn!(
                id = %tx.id_hex(),
                program = %tx.message.program_id,
                signer = %tx.signer,
                error = %e,
                "transaction rejected"
            ),
        }
        result
    }

    fn execute(&self, tx: &Transaction) -> Result<TransactionReceipt, TransactionError> {
        if !tx.verify() {
            return Err(TransactionError::InvalidSignature);
        }

        let message = &tx.message;
        let mut seen = HashSet::with_capacity(message.accounts.len());
        for meta in &message.accounts {
            if !seen.insert(meta.pubkey) {
                return Err(TransactionError::DuplicateAccount(meta.pubkey));
            }
        }
        if !seen.contains(&tx.signer) {
            return Err(TransactionError::SignerNotInAccounts(tx.signer));
        }

        let program: &dyn Program = if message.program_id == SYSTEM_PROGRAM_ID {
            &self.system
        } else if message.program_id == self.program.id() {
            &self.program
        } else {
            return Err(TransactionError::UnknownProgram(message.program_id));
        };

        let now = self.clock.unix_timestamp()?;
        let id = tx.id();

        let result = (self.db.accounts_tree(), self.db.processed_tree()).transaction(
            |(accounts, processed)| {
                if processed.get(&id[..])?.is_some() {
                    return Err(ConflictableTransactionError::Abort(
                        TransactionError::AlreadyProcessed,
                    ));
                }

                let mut loaded = Vec::with_capacity(message.accounts.len());
                for meta in &message.accounts {
                    let account = match accounts.get(meta.pubkey.as_ref())? {
                        Some(bytes) => Some(decode_account(&bytes).map_err(|e| {
                            ConflictableTransactionError::Abort(TransactionError::Storage(e))
                        })?),
                        None => None,
                    };
                    loaded.push((*meta, account));
                }

                let mut ctx = InvokeContext::new(message.program_id, tx.signer, now, loaded);
                program
                    .process(&mut ctx, &message.data)
                    .map_err(|e| ConflictableTransactionError::Abort(TransactionError::Program(e)))?;
                let (slots, logs) = ctx.into_parts();

                let written = post_check(&slots).map_err(ConflictableTransactionError::Abort)?;
                for slot in slots.iter().filter(|s| written.contains(&s.meta.pubkey)) {
                    let key = slot.meta.pubkey;
                    match &slot.current {
                        Some(account) if account.lamports > 0 => {
                            let bytes = encode_account(account).map_err(|e| {
                                ConflictableTransactionError::Abort(TransactionError::Storage(e))
                            })?;
                            accounts.insert(key.as_ref(), bytes)?;
                        }
                        _ => {
                            accounts.remove(key.as_ref())?;
                        }
                    }
                }
                processed.insert(&id[..], &now.to_be_bytes())?;
                Ok((logs, written))
            },
        );

        let (logs, accounts_written) = match result {
            Ok(out) => out,
            Err(SledTxError::Abort(e)) => return Err(e),
            Err(SledTxError::Storage(e)) => return Err(TransactionError::Storage(DbError::Sled(e))),
        };

        Ok(TransactionReceipt {
            id: hex::encode(id),
            timestamp: now,
            logs,
            accounts_written,
        })
    }
}

/// Conservation and rent checks. Returns the accounts that changed.
fn post_check(slots: &[AccountSlot]) -> Result<Vec<Pubkey>, TransactionError> {
    let lamports = |a: &Option<Account>| a.as_ref().map(|a| a.lamports as u128).unwrap_or(0);
    let before: u128 = slots.iter().map(|s| lamports(&s.before)).sum();
    let after: u128 = slots.iter().map(|s| lamports(&s.current)).sum();
    if before != after {
        return Err(TransactionError::UnbalancedTransaction { before, after });
    }

    let mut written = Vec::new();
    for slot in slots {
        if slot.before == slot.current {
            continue;
        }
        if !slot.meta.is_writable {
            return Err(TransactionError::Account(super::AccountError::ReadOnly(slot.meta.pubkey)));
        }
        if let Some(account) = &slot.current {
            if !account.is_rent_exempt() {
                return Err(TransactionError::InsufficientFundsForRent {
                    address: slot.meta.pubkey,
                });
            }
        }
        written.push(slot.meta.pubkey);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::crypto::Keypair;
    use crate::runtime::system;
    use crate::runtime::{AccountMeta, InvokeContext, Message, ProgramError};
    use crate::storage::minimum_balance;

    // -- Helpers ------------------------------------------------------------

    const PROGRAM: Pubkey = Pubkey::new_from_array([11u8; 32]);

    /// `[0]` pays 10 lamports from account 0 to account 1, `[1]` does the
    /// same and then fails.
    struct Mischief;

    impl Program for Mischief {
        fn id(&self) -> Pubkey {
            PROGRAM
        }
        fn name(&self) -> &'static str {
            "mischief"
        }
        fn process(&self, ctx: &mut InvokeContext, data: &[u8]) -> Result<(), ProgramError> {
            let [payer, target] = ctx
                .accounts::<2>()
                .map_err(|e| ProgramError::new(1, "Account", e.to_string()))?;
            match data.first() {
                Some(0) => ctx
                    .transfer(&payer, &target, 10)
                    .map_err(|e| ProgramError::new(1, "Account", e.to_string())),
                // Pay then fail: nothing may stick.
                Some(1) => {
                    ctx.transfer(&payer, &target, 10)
                        .map_err(|e| ProgramError::new(1, "Account", e.to_string()))?;
                    Err(ProgramError::new(42, "Boom", "deliberate failure"))
                }
                _ => Ok(()),
            }
        }
    }

    fn bank() -> Bank<Mischief> {
        Bank::new(
            LedgerDb::open_temporary().unwrap(),
            Mischief,
            Arc::new(ManualClock::new(1_700_000_000)),
        )
    }

    // -- Tests --------------------------------------------------------------

    #[test]
    fn system_transfer_commits() {
        let bank = bank();
        let alice = Keypair::generate();
        let bob = Keypair::generate().pubkey();
        bank.airdrop(&alice.pubkey(), 1_000).unwrap();

        let tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 400), &alice);
        let receipt = bank.process_transaction(&tx).unwrap();

        assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 600);
        assert_eq!(bank.balance(&bob).unwrap(), 400);
        assert_eq!(receipt.timestamp, 1_700_000_000);
        assert_eq!(receipt.accounts_written.len(), 2);
    }

    #[test]
    fn replay_is_rejected() {
        let bank = bank();
        let alice = Keypair::generate();
        let bob = Keypair::generate().pubkey();
        bank.airdrop(&alice.pubkey(), 1_000).unwrap();

        let tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 100), &alice);
        bank.process_transaction(&tx).unwrap();
        assert!(matches!(
            bank.process_transaction(&tx),
            Err(TransactionError::AlreadyProcessed)
        ));
        assert_eq!(bank.balance(&bob).unwrap(), 100);
    }

    #[test]
    fn bad_signature_is_rejected() {
        let bank = bank();
        let alice = Keypair::generate();
        let bob = Keypair::generate().pubkey();
        bank.airdrop(&alice.pubkey(), 1_000).unwrap();

        let mut tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 100), &alice);
        tx.message.data = system::transfer(&alice.pubkey(), &bob, 999).data;
        assert!(matches!(
            bank.process_transaction(&tx),
            Err(TransactionError::InvalidSignature)
        ));
    }

    #[test]
    fn stranger_cannot_spend_wallet() {
        let bank = bank();
        let alice = Keypair::generate();
        let mallory = Keypair::generate();
        bank.airdrop(&alice.pubkey(), 1_000).unwrap();

        let msg = system::transfer(&alice.pubkey(), &mallory.pubkey(), 100);
        let tx = Transaction::new_signed(msg, &mallory);
        assert!(matches!(
            bank.process_transaction(&tx),
            Err(TransactionError::Program(_))
        ));
        assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 1_000);
    }

    #[test]
    fn duplicate_accounts_are_rejected() {
        let bank = bank();
        let alice = Keypair::generate();
        let msg = Message::new(
            PROGRAM,
            vec![AccountMeta::writable(alice.pubkey()), AccountMeta::writable(alice.pubkey())],
            vec![],
        );
        let tx = Transaction::new_signed(msg, &alice);
        assert!(matches!(
            bank.process_transaction(&tx),
            Err(TransactionError::DuplicateAccount(pk)) if pk == alice.pubkey()
        ));
    }

    #[test]
    fn signer_must_be_declared() {
        let bank = bank();
        let alice = Keypair::generate();
        let bob = Keypair::generate().pubkey();
        let msg = Message::new(PROGRAM, vec![AccountMeta::writable(bob)], vec![]);
        let tx = Transaction::new_signed(msg, &alice);
        assert!(matches!(
            bank.process_transaction(&tx),
            Err(TransactionError::SignerNotInAccounts(_))
        ));
    }

    #[test]
    fn unknown_program_is_rejected() {
        let bank = bank();
        let alice = Keypair::generate();
        let msg = Message::new(
            Pubkey::new_from_array([99u8; 32]),
            vec![AccountMeta::writable(alice.pubkey())],
            vec![],
        );
        let tx = Transaction::new_signed(msg, &alice);
        assert!(matches!(
            bank.process_transaction(&tx),
            Err(TransactionError::UnknownProgram(_))
        ));
    }

    #[test]
    fn failed_program_writes_nothing() {
        let bank = bank();
        let alice = Keypair::generate();
        let target = Keypair::generate().pubkey();
        bank.airdrop(&alice.pubkey(), 1_000).unwrap();

        let msg = Message::new(
            PROGRAM,
            vec![AccountMeta::writable(alice.pubkey()), AccountMeta::writable(target)],
            vec![1],
        );
        let tx = Transaction::new_signed(msg, &alice);
        let err = bank.process_transaction(&tx).unwrap_err();
        assert_eq!(err.program_error().map(|e| e.code), Some(42));
        assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 1_000);
        assert!(bank.get_account(&target).unwrap().is_none());
        assert!(!bank.db().is_processed(&tx.id()).unwrap());
    }

    #[test]
    fn program_can_credit_its_own_account() {
        let bank = bank();
        let alice = Keypair::generate();
        let pda = Pubkey::new_from_array([12u8; 32]);
        bank.airdrop(&alice.pubkey(), 1_000).unwrap();
        bank.db()
            .put_account(&pda, &Account::new(minimum_balance(0), PROGRAM))
            .unwrap();

        let msg = Message::new(
            PROGRAM,
            vec![AccountMeta::writable(alice.pubkey()), AccountMeta::writable(pda)],
            vec![0],
        );
        bank.process_transaction(&Transaction::new_signed(msg, &alice)).unwrap();
        assert_eq!(bank.balance(&pda).unwrap(), minimum_balance(0) + 10);
    }

    #[test]
    fn drained_accounts_are_deleted() {
        let bank = bank();
        let alice = Keypair::generate();
        let bob = Keypair::generate().pubkey();
        bank.airdrop(&alice.pubkey(), 500).unwrap();

        let tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 500), &alice);
        bank.process_transaction(&tx).unwrap();
        assert!(bank.get_account(&alice.pubkey()).unwrap().is_none());
    }

    #[test]
    fn post_check_detects_minted_lamports() {
        let key = Pubkey::new_from_array([1u8; 32]);
        let slots = vec![AccountSlot {
            meta: AccountMeta::writable(key),
            before: Some(Account::system(1)),
            current: Some(Account::system(2)),
        }];
        assert!(matches!(
            post_check(&slots),
            Err(TransactionError::UnbalancedTransaction { before: 1, after: 2 })
        ));
    }

    #[test]
    fn post_check_detects_rent_violation() {
        let a = Pubkey::new_from_array([1u8; 32]);
        let b = Pubkey::new_from_array([2u8; 32]);
        let slots = vec![
            AccountSlot {
                meta: AccountMeta::writable(a),
                before: Some(Account::new(minimum_balance(0), PROGRAM)),
                current: Some(Account::new(minimum_balance(0) - 5, PROGRAM)),
            },
            AccountSlot {
                meta: AccountMeta::writable(b),
                before: None,
                current: Some(Account::system(5)),
            },
        ];
        assert!(matches!(
            post_check(&slots),
            Err(TransactionError::InsufficientFundsForRent { address }) if address == a
        ));
    }

    #[test]
    fn concurrent_transfers_serialize() {
        let bank = Arc::new(bank());
        let alice = Keypair::generate();
        let bob = Keypair::generate().pubkey();
        bank.airdrop(&alice.pubkey(), 10_000).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let bank = Arc::clone(&bank);
                let alice = alice.clone();
                std::thread::spawn(move || {
                    for _ in 0..10 {
                        let tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 10), &alice);
                        bank.process_transaction(&tx).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(bank.balance(&bob).unwrap(), 800);
        assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 9_200);
    }
}
