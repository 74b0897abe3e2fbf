//! The built-in system program: plain wallet-to-anything transfers.

use serde::{Deserialize, Serialize};

use super::context::InvokeContext;
use super::error::{AccountError, ProgramError};
use super::transaction::{AccountMeta, Message};
use super::Program;
use crate::config::SYSTEM_PROGRAM_ID;
use crate::crypto::Pubkey;

/// Instructions understood by the system program.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemInstruction {
    /// Move lamports from account 0 (signer) to account 1.
    Transfer { lamports: u64 },
}

/// Build a transfer message. The recipient must be a wallet (or not exist
/// yet); program-owned accounts are refused.
pub fn transfer(from: &Pubkey, to: &Pubkey, lamports: u64) -> Message {
    // A fieldful enum of fixed-size integers always serializes.
    let data = bincode::serialize(&SystemInstruction::Transfer { lamports }).unwrap_or_default();
    Message::new(
        SYSTEM_PROGRAM_ID,
        vec![AccountMeta::writable(*from), AccountMeta::writable(*to)],
        data,
    )
}

/// Error codes of the system program.
pub mod codes {
    pub const INVALID_INSTRUCTION: u32 = 1;
    pub const ACCOUNT: u32 = 2;
    pub const PROGRAM_OWNED_RECIPIENT: u32 = 3;
}

fn account_error(e: AccountError) -> ProgramError {
    ProgramError::new(codes::ACCOUNT, "AccountError", e.to_string())
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemProgram;

impl Program for SystemProgram {
    fn id(&self) -> Pubkey {
        SYSTEM_PROGRAM_ID
    }

    fn name(&self) -> &'static str {
        "system"
    }

    fn process(&self, ctx: &mut InvokeContext, data: &[u8]) -> Result<(), ProgramError> {
        let instruction: SystemInstruction = bincode::deserialize(data).map_err(|e| {
            ProgramError::new(codes::INVALID_INSTRUCTION, "InvalidInstruction", e.to_string())
        })?;
        match instruction {
            SystemInstruction::Transfer { lamports } => {
                let [from, to] = ctx.accounts::<2>().map_err(account_error)?;
                // Program accounts are funded through their program, so their
                // balances stay what the program thinks they are.
                if ctx.get(&to).map_err(account_error)?.is_some_and(|a| !a.is_system_owned()) {
                    return Err(ProgramError::new(
                        codes::PROGRAM_OWNED_RECIPIENT,
                        "ProgramOwnedRecipient",
                        format!("{to} is owned by a program"),
                    ));
                }
                ctx.transfer(&from, &to, lamports).map_err(account_error)?;
                ctx.log(format!("transfer {lamports} lamports {from} -> {to}"));
                Ok(())
            }
        }
    }
}
