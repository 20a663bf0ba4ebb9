pub mod memory;
pub mod rpc;

pub use memory::MemoryLedger;
pub use rpc::RpcLedger;

use crate::error::{CoreError, Result};
use crate::transaction::SignedTransfer;
use crate::types::{Amount, Blockhash, CommitmentLevel, Pubkey, TxSignature};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Status of a submitted transaction as reported by the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxStatus {
    pub level: Option<CommitmentLevel>,
    pub err: Option<String>,
}

impl TxStatus {
    pub fn reached(&self, level: CommitmentLevel) -> bool {
        self.err.is_none() && self.level.map_or(false, |l| l >= level)
    }
}

/// A native transfer found on the ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRecord {
    pub signature: TxSignature,
    pub from: Pubkey,
    pub to: Pubkey,
    pub amount: Amount,
    pub status: TxStatus,
}

/// Network ledger access: balances, submission, confirmation, lookup
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_balance(&self, address: &Pubkey) -> Result<Amount>;

    async fn latest_blockhash(&self) -> Result<Blockhash>;

    async fn submit_transfer(&self, transfer: &SignedTransfer) -> Result<TxSignature>;

    /// `None` when the ledger has never seen the signature
    async fn signature_status(&self, signature: &TxSignature) -> Result<Option<TxStatus>>;

    /// The native transfer carried by `signature`, if it exists and is one
    async fn get_transfer(&self, signature: &TxSignature) -> Result<Option<TransferRecord>>;

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(500)
    }

    /// Poll until `signature` reaches `level`, fails, or `timeout` elapses
    async fn await_confirmation(
        &self,
        signature: &TxSignature,
        level: CommitmentLevel,
        timeout: Duration,
    ) -> Result<()> {
        match tokio::time::timeout(timeout, poll_until(self, signature, level)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::ConfirmationTimeout {
                signature: signature.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }
}

async fn poll_until<L: Ledger + ?Sized>(
    ledger: &L,
    signature: &TxSignature,
    level: CommitmentLevel,
) -> Result<()> {
    loop {
        if let Some(status) = ledger.signature_status(signature).await? {
            if let Some(reason) = status.err {
                return Err(CoreError::TransactionFailed {
                    signature: signature.to_string(),
                    reason,
                });
            }
            if status.reached(level) {
                return Ok(());
            }
        }
        tokio::time::sleep(ledger.poll_interval()).await;
    }
}
