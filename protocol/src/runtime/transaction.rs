//! Messages and signed transactions.
//!
//! A [`Message`] names the program to run, every account it will touch and
//! whether it may write them, an opaque instruction payload, and a random
//! nonce so two otherwise identical messages get different ids.
//!
//! The id of a message is `blake3(signable_bytes)`. The runtime stores it on
//! commit and rejects any later transaction with the same id.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::TransactionError;
use crate::crypto::{blake3_hash, Keypair, Pubkey, Signature};

/// An account reference inside a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountMeta {
    pub pubkey: Pubkey,
    pub is_writable: bool,
}

impl AccountMeta {
    pub fn writable(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_writable: true,
        }
    }

    pub fn readonly(pubkey: Pubkey) -> Self {
        Self {
            pubkey,
            is_writable: false,
        }
    }
}

/// What a transaction asks the runtime to do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub program_id: Pubkey,
    pub accounts: Vec<AccountMeta>,
    pub data: Vec<u8>,
    pub nonce: Uuid,
}

impl Message {
    /// New message with a fresh random nonce.
    pub fn new(program_id: Pubkey, accounts: Vec<AccountMeta>, data: Vec<u8>) -> Self {
        Self {
            program_id,
            accounts,
            data,
            nonce: Uuid::new_v4(),
        }
    }

    /// Canonical bytes covered by the signature and the id.
    ///
    /// Fixed layout, little-endian lengths:
    /// `program_id ‖ u32 n ‖ (pubkey ‖ writable)*n ‖ u32 len ‖ data ‖ nonce`.
    /// serde is avoided here so the id never depends on a codec version.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(32 + 4 + self.accounts.len() * 33 + 4 + self.data.len() + 16);
        buf.extend_from_slice(self.program_id.as_ref());
        buf.extend_from_slice(&(self.accounts.len() as u32).to_le_bytes());
        for meta in &self.accounts {
            buf.extend_from_slice(meta.pubkey.as_ref());
            buf.push(u8::from(meta.is_writable));
        }
        buf.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.data);
        buf.extend_from_slice(self.nonce.as_bytes());
        buf
    }

    /// Replay-protection id.
    pub fn id(&self) -> [u8; 32] {
        blake3_hash(&self.signable_bytes())
    }
}

/// A message plus the signature of the one signer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub message: Message,
    pub signer: Pubkey,
    pub signature: Signature,
}

impl Transaction {
    /// Sign `message` with `keypair`.
    pub fn new_signed(message: Message, keypair: &Keypair) -> Self {
        let signature = keypair.sign(&message.signable_bytes());
        Self {
            message,
            signer: keypair.pubkey(),
            signature,
        }
    }

    /// Verify the signature against the declared signer.
    pub fn verify(&self) -> bool {
        self.signer
            .verify(&self.message.signable_bytes(), &self.signature)
    }

    pub fn id(&self) -> [u8; 32] {
        self.message.id()
    }

    /// Hex id, as returned to clients.
    pub fn id_hex(&self) -> String {
        hex::encode(self.id())
    }

    /// Wire encoding: base58 of the bincode transaction.
    ///
    /// # Errors
    ///
    /// [`TransactionError::Malformed`] if serialization fails.
    pub fn to_base58(&self) -> Result<String, TransactionError> {
        let bytes =
            bincode::serialize(self).map_err(|e| TransactionError::Malformed(e.to_string()))?;
        Ok(bs58::encode(bytes).into_string())
    }

    /// Parse the wire encoding produced by [`Transaction::to_base58`].
    ///
    /// # Errors
    ///
    /// [`TransactionError::Malformed`] on bad base58 or bincode.
    pub fn from_base58(encoded: &str) -> Result<Self, TransactionError> {
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .map_err(|e| TransactionError::Malformed(e.to_string()))?;
        bincode::deserialize(&bytes).map_err(|e| TransactionError::Malformed(e.to_string()))
    }
}
