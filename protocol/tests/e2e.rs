//! End-to-end integration tests for the runtime.
//!
//! These exercise the full path from key generation through a committed,
//! persisted transaction: faucet funding, signing, the wire encoding, the
//! bank's atomic commit, replay protection and reopening the database.
//!
//! Each test stands alone with its own database. No shared state, no test
//! ordering dependencies.

use std::sync::Arc;

use trust_protocol::clock::ManualClock;
use trust_protocol::config::LAMPORTS_PER_SOL;
use trust_protocol::crypto::{Keypair, Pubkey};
use trust_protocol::runtime::{
    system, AccountMeta, Bank, InvokeContext, Message, Program, ProgramError, Transaction,
    TransactionError,
};
use trust_protocol::storage::LedgerDb;
use trust_protocol::{find_program_address, minimum_balance};

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const ESCROW_ID: Pubkey = Pubkey::new_from_array([0xE5; 32]);

/// Minimal escrow: `[0]` locks all lamports above rent from the signer into
/// its derived account, `[1]` releases the escrow back to the signer.
struct Escrow;

fn account_err(e: trust_protocol::AccountError) -> ProgramError {
    ProgramError::new(1, "Account", e.to_string())
}

impl Program for Escrow {
    fn id(&self) -> Pubkey {
        ESCROW_ID
    }

    fn name(&self) -> &'static str {
        "escrow"
    }

    fn process(&self, ctx: &mut InvokeContext, data: &[u8]) -> Result<(), ProgramError> {
        let [user, escrow] = ctx.accounts::<2>().map_err(account_err)?;
        let (expected, bump) = find_program_address(&[b"escrow", user.as_ref()], &ESCROW_ID)
            .map_err(|e| ProgramError::new(2, "Address", e.to_string()))?;
        if expected != escrow {
            return Err(ProgramError::new(3, "WrongEscrow", "escrow address mismatch"));
        }
        match data.first() {
            Some(0) => {
                let amount = ctx.lamports(&user).map_err(account_err)?;
                ctx.create_pda_account(
                    &user,
                    &escrow,
                    &[b"escrow", user.as_ref(), &[bump]],
                    Vec::new(),
                    minimum_balance(0),
                )
                .map_err(account_err)?;
                let rest = amount - minimum_balance(0);
                ctx.transfer(&user, &escrow, rest).map_err(account_err)?;
                Ok(())
            }
            Some(1) => {
                let all = ctx.lamports(&escrow).map_err(account_err)?;
                ctx.transfer(&escrow, &user, all).map_err(account_err)
            }
            _ => Err(ProgramError::new(4, "InvalidInstruction", "unknown opcode")),
        }
    }
}

fn bank_at(db: LedgerDb) -> Bank<Escrow> {
    Bank::new(db, Escrow, Arc::new(ManualClock::new(1_700_000_000)))
}

fn escrow_of(user: &Pubkey) -> Pubkey {
    find_program_address(&[b"escrow", user.as_ref()], &ESCROW_ID)
        .expect("derive")
        .0
}

fn escrow_message(user: &Pubkey, opcode: u8) -> Message {
    Message::new(
        ESCROW_ID,
        vec![AccountMeta::writable(*user), AccountMeta::writable(escrow_of(user))],
        vec![opcode],
    )
}

// ---------------------------------------------------------------------------
// 1. Fund, lock, release
// ---------------------------------------------------------------------------

#[test]
fn lock_and_release_roundtrip() {
    let bank = bank_at(LedgerDb::open_temporary().unwrap());
    let alice = Keypair::generate();
    bank.airdrop(&alice.pubkey(), 2 * LAMPORTS_PER_SOL).unwrap();

    bank.process_transaction(&Transaction::new_signed(escrow_message(&alice.pubkey(), 0), &alice))
        .unwrap();
    assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 0);
    let escrow = bank.get_account(&escrow_of(&alice.pubkey())).unwrap().unwrap();
    assert_eq!(escrow.owner, ESCROW_ID);
    assert_eq!(escrow.lamports, 2 * LAMPORTS_PER_SOL);

    bank.process_transaction(&Transaction::new_signed(escrow_message(&alice.pubkey(), 1), &alice))
        .unwrap();
    assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 2 * LAMPORTS_PER_SOL);
    assert!(bank.get_account(&escrow_of(&alice.pubkey())).unwrap().is_none());
}

// ---------------------------------------------------------------------------
// 2. Someone else's escrow is off limits
// ---------------------------------------------------------------------------

#[test]
fn stranger_cannot_release_foreign_escrow() {
    let bank = bank_at(LedgerDb::open_temporary().unwrap());
    let alice = Keypair::generate();
    let mallory = Keypair::generate();
    bank.airdrop(&alice.pubkey(), LAMPORTS_PER_SOL).unwrap();
    bank.process_transaction(&Transaction::new_signed(escrow_message(&alice.pubkey(), 0), &alice))
        .unwrap();

    // Mallory points at Alice's escrow but signs as herself.
    let msg = Message::new(
        ESCROW_ID,
        vec![
            AccountMeta::writable(mallory.pubkey()),
            AccountMeta::writable(escrow_of(&alice.pubkey())),
        ],
        vec![1],
    );
    let err = bank
        .process_transaction(&Transaction::new_signed(msg, &mallory))
        .unwrap_err();
    assert_eq!(err.program_error().map(|e| e.code), Some(3));
    assert_eq!(bank.balance(&escrow_of(&alice.pubkey())).unwrap(), LAMPORTS_PER_SOL);
}

// ---------------------------------------------------------------------------
// 3. Wire encoding goes through the bank unchanged
// ---------------------------------------------------------------------------

#[test]
fn wire_encoded_transfer_commits() {
    let bank = bank_at(LedgerDb::open_temporary().unwrap());
    let alice = Keypair::generate();
    let bob = Keypair::generate().pubkey();
    bank.airdrop(&alice.pubkey(), 1_000).unwrap();

    let wire = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 250), &alice)
        .to_base58()
        .unwrap();
    let tx = Transaction::from_base58(&wire).unwrap();
    bank.process_transaction(&tx).unwrap();
    assert_eq!(bank.balance(&bob).unwrap(), 250);
}

// ---------------------------------------------------------------------------
// 4. Replay protection survives a restart
// ---------------------------------------------------------------------------

#[test]
fn replay_marker_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let alice = Keypair::generate();
    let bob = Keypair::generate().pubkey();
    let tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 10), &alice);

    {
        let bank = bank_at(LedgerDb::open(dir.path()).unwrap());
        bank.airdrop(&alice.pubkey(), 100).unwrap();
        bank.process_transaction(&tx).unwrap();
        bank.db().flush().unwrap();
    }

    let bank = bank_at(LedgerDb::open(dir.path()).unwrap());
    assert_eq!(bank.balance(&bob).unwrap(), 10);
    assert!(matches!(
        bank.process_transaction(&tx),
        Err(TransactionError::AlreadyProcessed)
    ));
    assert_eq!(bank.balance(&bob).unwrap(), 10);
}

// ---------------------------------------------------------------------------
// 5. Overdraft leaves everything as it was
// ---------------------------------------------------------------------------

#[test]
fn overdraft_is_atomic() {
    let bank = bank_at(LedgerDb::open_temporary().unwrap());
    let alice = Keypair::generate();
    let bob = Keypair::generate().pubkey();
    bank.airdrop(&alice.pubkey(), 100).unwrap();

    let tx = Transaction::new_signed(system::transfer(&alice.pubkey(), &bob, 101), &alice);
    assert!(bank.process_transaction(&tx).is_err());
    assert_eq!(bank.balance(&alice.pubkey()).unwrap(), 100);
    assert!(bank.get_account(&bob).unwrap().is_none());
    assert_eq!(bank.db().processed_count(), 0);
}
