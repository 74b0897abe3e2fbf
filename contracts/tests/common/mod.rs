//! Shared harness for the vault program integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use trust_contracts::{
    instruction, AccountRecord, ConfigParams, ProgramConfig, VaultAddresses, VaultConfig,
    VaultError, VaultProgram,
};
use trust_protocol::clock::{Clock, ManualClock};
use trust_protocol::config::LAMPORTS_PER_SOL;
use trust_protocol::runtime::{Bank, Message, Transaction, TransactionError, TransactionReceipt};
use trust_protocol::{Keypair, LedgerDb, Pubkey};

pub const T0: i64 = 1_700_000_000;

pub struct Harness {
    pub bank: Arc<Bank<VaultProgram>>,
    pub clock: Arc<ManualClock>,
    pub admin: Keypair,
}

impl Harness {
    /// Bank with no program configuration yet.
    pub fn bare() -> Self {
        let clock = Arc::new(ManualClock::new(T0));
        let bank = Bank::new(
            LedgerDb::open_temporary().expect("temp db"),
            VaultProgram::new(),
            Arc::clone(&clock) as Arc<dyn Clock>,
        );
        let admin = Keypair::generate();
        bank.airdrop(&admin.pubkey(), 10 * LAMPORTS_PER_SOL).expect("airdrop");
        Self {
            bank: Arc::new(bank),
            clock,
            admin,
        }
    }

    /// Bank with the default program configuration, admin as treasury.
    pub fn new() -> Self {
        let h = Self::bare();
        let msg = instruction::initialize_config(&h.admin.pubkey(), ConfigParams::default())
            .expect("config message");
        h.send(msg, &h.admin).expect("initialize_config");
        h
    }

    pub fn send(&self, msg: Message, signer: &Keypair) -> Result<TransactionReceipt, TransactionError> {
        self.bank.process_transaction(&Transaction::new_signed(msg, signer))
    }

    pub fn user(&self, lamports: u64) -> Keypair {
        let kp = Keypair::generate();
        self.bank.airdrop(&kp.pubkey(), lamports).expect("airdrop");
        kp
    }

    pub fn balance(&self, key: &Pubkey) -> u64 {
        self.bank.balance(key).expect("balance")
    }

    pub fn vault(&self, owner: &Pubkey) -> VaultConfig {
        let addrs = VaultAddresses::derive(owner).expect("derive");
        let account = self
            .bank
            .get_account(&addrs.vault_config)
            .expect("read")
            .expect("vault exists");
        VaultConfig::try_from_bytes(&account.data).expect("decode")
    }

    pub fn program_config(&self) -> ProgramConfig {
        let (addr, _) = trust_contracts::pda::program_config_address().expect("derive");
        let account = self.bank.get_account(&addr).expect("read").expect("config exists");
        ProgramConfig::try_from_bytes(&account.data).expect("decode")
    }

    pub fn custody_balance(&self, owner: &Pubkey) -> u64 {
        let addrs = VaultAddresses::derive(owner).expect("derive");
        self.balance(&addrs.custody)
    }

    /// Initialize a vault and deposit into it.
    pub fn open_vault(&self, owner: &Keypair, lock: i64, amount: u64) {
        self.send(instruction::initialize(&owner.pubkey(), lock).unwrap(), owner)
            .expect("initialize");
        if amount > 0 {
            self.send(instruction::deposit(&owner.pubkey(), amount).unwrap(), owner)
                .expect("deposit");
        }
    }
}

/// The vault error a rejected transaction carries.
pub fn vault_error(result: Result<TransactionReceipt, TransactionError>) -> VaultError {
    let err = result.expect_err("transaction should fail");
    err.program_error()
        .and_then(|p| VaultError::try_from(p).ok())
        .unwrap_or_else(|| panic!("expected a vault error, got {err}"))
}
