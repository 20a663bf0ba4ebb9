pub mod instance;
pub mod manager;

pub use instance::LocalWallet;
pub use manager::WalletManager;

use crate::error::Result;
use crate::transaction::TransferInstruction;
use crate::types::{Pubkey, TxSignature};
use async_trait::async_trait;

/// Anything that can authorize transfers out of one account.
///
/// `sign_and_send` returns as soon as the ledger accepts the transaction;
/// confirmation is the caller's concern.
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn address(&self) -> Pubkey;

    async fn sign_and_send(&self, instruction: &TransferInstruction) -> Result<TxSignature>;
}
