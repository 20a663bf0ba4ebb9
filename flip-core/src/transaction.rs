//! Legacy single-signer transfer transactions in ledger wire format.
//!
//! Layout: `compact(num_sigs) || sig[64] || message`, with the message being
//! `header[3] || compact(num_keys) || keys || blockhash[32] || compact(num_ix) || ix`.

use crate::error::{CoreError, Result};
use crate::keys::{verify_signature, Keypair};
use crate::types::{Amount, Blockhash, Pubkey, TxSignature};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// Discriminant of the system program's transfer instruction
const SYSTEM_TRANSFER: u32 = 2;

/// A value movement to be signed by `from`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferInstruction {
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: Amount,
}

impl TransferInstruction {
    pub fn new(from: Pubkey, to: Pubkey, amount: Amount) -> Self {
        Self { from, to, amount }
    }

    pub fn validate(&self) -> Result<()> {
        if self.amount == Amount::ZERO {
            return Err(CoreError::wallet("Transfer amount must be positive"));
        }
        if self.from == self.to {
            return Err(CoreError::wallet("Transfer source and destination are the same"));
        }
        Ok(())
    }

    fn instruction_data(&self) -> [u8; 12] {
        let mut data = [0u8; 12];
        data[..4].copy_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
        data[4..].copy_from_slice(&self.amount.to_lamports().to_le_bytes());
        data
    }

    /// Serialized message the fee payer signs
    pub fn compile_message(&self, recent_blockhash: &Blockhash) -> Vec<u8> {
        let mut msg = Vec::with_capacity(3 + 1 + 32 * 3 + 32 + 1 + 1 + 1 + 2 + 1 + 12);

        // one signer (writable), no readonly signers, one readonly unsigned (system program)
        msg.extend_from_slice(&[1, 0, 1]);

        encode_compact_u16(3, &mut msg);
        msg.extend_from_slice(self.from.as_bytes());
        msg.extend_from_slice(self.to.as_bytes());
        msg.extend_from_slice(Pubkey::SYSTEM_PROGRAM.as_bytes());

        msg.extend_from_slice(recent_blockhash.as_bytes());

        encode_compact_u16(1, &mut msg);
        msg.push(2); // program id index
        encode_compact_u16(2, &mut msg);
        msg.extend_from_slice(&[0, 1]);
        let data = self.instruction_data();
        encode_compact_u16(data.len() as u16, &mut msg);
        msg.extend_from_slice(&data);

        msg
    }
}

/// A transfer signed by its source account, ready for submission
#[derive(Debug, Clone)]
pub struct SignedTransfer {
    pub instruction: TransferInstruction,
    pub recent_blockhash: Blockhash,
    pub signature: TxSignature,
    message: Vec<u8>,
}

impl SignedTransfer {
    pub fn sign(
        instruction: TransferInstruction,
        recent_blockhash: Blockhash,
        keypair: &Keypair,
    ) -> Result<Self> {
        instruction.validate()?;
        if keypair.pubkey() != instruction.from {
            return Err(CoreError::wallet(format!(
                "Signer {} cannot authorize a transfer from {}",
                keypair.pubkey(),
                instruction.from
            )));
        }

        let message = instruction.compile_message(&recent_blockhash);
        let signature = TxSignature::new(keypair.sign(&message));

        Ok(Self {
            instruction,
            recent_blockhash,
            signature,
            message,
        })
    }

    pub fn message_bytes(&self) -> &[u8] {
        &self.message
    }

    pub fn verify(&self) -> bool {
        verify_signature(
            &self.instruction.from,
            &self.message,
            self.signature.as_bytes(),
        )
    }

    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(1 + 64 + self.message.len());
        encode_compact_u16(1, &mut wire);
        wire.extend_from_slice(self.signature.as_bytes());
        wire.extend_from_slice(&self.message);
        wire
    }

    pub fn to_base64(&self) -> String {
        general_purpose::STANDARD.encode(self.to_wire())
    }
}

/// Variable-length u16 with 7 bits per byte, high bit as continuation
fn encode_compact_u16(mut value: u16, out: &mut Vec<u8>) {
    loop {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        byte |= 0x80;
        out.push(byte);
    }
}
