use crate::config::Cluster;
use crate::error::{CoreError, Result};
use crate::keys::Keypair;
use crate::ledger::Ledger;
use crate::transaction::{SignedTransfer, TransferInstruction};
use crate::types::{Amount, Pubkey, TxSignature};
use crate::wallet::WalletSigner;
use async_trait::async_trait;
use std::sync::Arc;

/// A player wallet whose key is held in this process
pub struct LocalWallet {
    id: String,
    name: String,
    keypair: Keypair,
    cluster: Cluster,
    ledger: Arc<dyn Ledger>,
}

impl LocalWallet {
    pub fn new(
        id: String,
        name: String,
        keypair: Keypair,
        cluster: Cluster,
        ledger: Arc<dyn Ledger>,
    ) -> Self {
        Self {
            id,
            name,
            keypair,
            cluster,
            ledger,
        }
    }

    // Wallet metadata
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cluster(&self) -> Cluster {
        self.cluster
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    pub async fn balance(&self) -> Result<Amount> {
        self.ledger.get_balance(&self.pubkey()).await
    }

    pub async fn transfer(&self, to: Pubkey, amount: Amount) -> Result<TxSignature> {
        self.sign_and_send(&TransferInstruction::new(self.pubkey(), to, amount))
            .await
    }
}

#[async_trait]
impl WalletSigner for LocalWallet {
    fn address(&self) -> Pubkey {
        self.pubkey()
    }

    async fn sign_and_send(&self, instruction: &TransferInstruction) -> Result<TxSignature> {
        if instruction.from != self.pubkey() {
            return Err(CoreError::Rejected(format!(
                "wallet '{}' does not own {}",
                self.name, instruction.from
            )));
        }
        instruction.validate()?;

        // Check balance before sending
        let available = self.ledger.get_balance(&instruction.from).await?;
        if available < instruction.amount {
            return Err(CoreError::InsufficientFunds {
                need: instruction.amount.to_lamports(),
                available: available.to_lamports(),
            });
        }

        let blockhash = self.ledger.latest_blockhash().await?;
        let signed = SignedTransfer::sign(*instruction, blockhash, &self.keypair)?;
        let signature = self.ledger.submit_transfer(&signed).await?;

        tracing::info!(
            "Wallet '{}' sent {} SOL to {} ({})",
            self.name,
            instruction.amount,
            instruction.to,
            signature
        );
        Ok(signature)
    }
}

impl std::fmt::Debug for LocalWallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalWallet")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("pubkey", &self.pubkey())
            .field("cluster", &self.cluster)
            .finish()
    }
}
