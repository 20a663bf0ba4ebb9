use crate::config::Cluster;
use crate::error::{CoreError, Result};
use crate::keys::Keypair;
use crate::keystore::{decrypt_keypair, encrypt_keypair};
use crate::ledger::Ledger;
use crate::storage::wallet_store::WalletData;
use crate::storage::{Storage, WalletStore};
use crate::wallet::LocalWallet;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Player wallets persisted in the local database, keys sealed by password
pub struct WalletManager {
    storage: Arc<Storage>,
    ledger: Arc<dyn Ledger>,
    cluster: Cluster,
    wallets: Arc<RwLock<HashMap<String, Arc<LocalWallet>>>>,
}

impl WalletManager {
    pub async fn new(data_dir: &Path, cluster: Cluster, ledger: Arc<dyn Ledger>) -> Result<Self> {
        let db_path = data_dir.join("coinflip.db");
        let storage = Arc::new(Storage::new(&db_path).await?);
        Ok(Self::with_storage(storage, cluster, ledger))
    }

    pub fn with_storage(storage: Arc<Storage>, cluster: Cluster, ledger: Arc<dyn Ledger>) -> Self {
        Self {
            storage,
            ledger,
            cluster,
            wallets: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    pub async fn create_wallet(&self, name: &str, password: &str) -> Result<Arc<LocalWallet>> {
        let wallet = self.store_new(name, Keypair::generate(), password).await?;
        tracing::info!("Created wallet '{}' with ID: {}", name, wallet.id());
        Ok(wallet)
    }

    /// Import a secret in base58 or JSON byte-array form
    pub async fn import_wallet(
        &self,
        name: &str,
        secret: &str,
        password: &str,
    ) -> Result<Arc<LocalWallet>> {
        let keypair = Keypair::parse_secret(secret)?;
        let wallet = self.store_new(name, keypair, password).await?;
        tracing::info!("Imported wallet '{}' with ID: {}", name, wallet.id());
        Ok(wallet)
    }

    async fn store_new(
        &self,
        name: &str,
        keypair: Keypair,
        password: &str,
    ) -> Result<Arc<LocalWallet>> {
        if name.trim().is_empty() {
            return Err(CoreError::config("Wallet name cannot be empty"));
        }

        let wallet_store = WalletStore::new(&self.storage);
        if wallet_store.wallet_exists(name).await? {
            return Err(CoreError::config(format!(
                "Wallet '{}' already exists",
                name
            )));
        }

        let wallet_id = Uuid::new_v4().to_string();
        let wallet_data = WalletData {
            id: wallet_id.clone(),
            name: name.to_string(),
            pubkey: keypair.pubkey(),
            cluster: self.cluster,
            created_at: Utc::now(),
            encrypted_key: encrypt_keypair(&keypair, password)?,
        };
        wallet_store.save_wallet(&wallet_data).await?;

        let wallet = Arc::new(LocalWallet::new(
            wallet_id.clone(),
            name.to_string(),
            keypair,
            self.cluster,
            self.ledger.clone(),
        ));

        self.wallets.write().insert(wallet_id, wallet.clone());
        Ok(wallet)
    }

    /// Unlock a stored wallet. The password is checked even when cached.
    pub async fn load_wallet(&self, name: &str, password: &str) -> Result<Arc<LocalWallet>> {
        let wallet_data = self.find(name).await?;
        let keypair = decrypt_keypair(&wallet_data.encrypted_key, password)?;

        if keypair.pubkey() != wallet_data.pubkey {
            return Err(CoreError::InvalidKey(format!(
                "stored key for '{}' does not match its address",
                name
            )));
        }

        if let Some(wallet) = self.wallets.read().get(&wallet_data.id) {
            return Ok(wallet.clone());
        }

        let wallet = Arc::new(LocalWallet::new(
            wallet_data.id.clone(),
            wallet_data.name,
            keypair,
            wallet_data.cluster,
            self.ledger.clone(),
        ));

        self.wallets.write().insert(wallet_data.id, wallet.clone());
        Ok(wallet)
    }

    /// Stored wallet metadata, no password needed
    pub async fn wallet_info(&self, name: &str) -> Result<WalletData> {
        self.find(name).await
    }

    pub async fn list_wallets(&self) -> Result<Vec<WalletData>> {
        WalletStore::new(&self.storage).list_wallets().await
    }

    pub async fn delete_wallet(&self, name: &str) -> Result<()> {
        let wallet_data = self.find(name).await?;

        // Remove from cache
        self.wallets.write().remove(&wallet_data.id);

        WalletStore::new(&self.storage)
            .delete_wallet(&wallet_data.id)
            .await?;

        tracing::info!("Deleted wallet '{}'", name);
        Ok(())
    }

    async fn find(&self, name: &str) -> Result<WalletData> {
        WalletStore::new(&self.storage)
            .find_by_name(name)
            .await?
            .ok_or_else(|| CoreError::WalletNotFound {
                name: name.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::MemoryLedger;
    use tempfile::tempdir;

    async fn manager(dir: &Path) -> WalletManager {
        WalletManager::new(dir, Cluster::Localnet, Arc::new(MemoryLedger::new()))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_reload() {
        let temp_dir = tempdir().unwrap();
        let address = {
            let manager = manager(temp_dir.path()).await;
            let wallet = manager.create_wallet("alice", "hunter2").await.unwrap();
            assert_eq!(wallet.name(), "alice");
            wallet.pubkey()
        };

        // fresh manager, same database
        let manager = manager(temp_dir.path()).await;
        let wallet = manager.load_wallet("alice", "hunter2").await.unwrap();
        assert_eq!(wallet.pubkey(), address);
        assert_eq!(wallet.cluster(), Cluster::Localnet);

        assert!(manager.load_wallet("alice", "wrong").await.is_err());
    }

    #[tokio::test]
    async fn test_duplicate_names_rejected() {
        let temp_dir = tempdir().unwrap();
        let manager = manager(temp_dir.path()).await;

        manager.create_wallet("alice", "pw").await.unwrap();
        let result = manager.create_wallet("alice", "pw").await;
        assert!(matches!(result, Err(CoreError::Config(_))));
    }

    #[tokio::test]
    async fn test_import_list_delete() {
        let temp_dir = tempdir().unwrap();
        let manager = manager(temp_dir.path()).await;
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let secret = keypair.to_base58_string();

        let wallet = manager.import_wallet("bob", &secret, "pw").await.unwrap();
        assert_eq!(wallet.pubkey(), keypair.pubkey());

        let listed = manager.list_wallets().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].pubkey, keypair.pubkey());

        manager.delete_wallet("bob").await.unwrap();
        assert!(matches!(
            manager.wallet_info("bob").await,
            Err(CoreError::WalletNotFound { .. })
        ));
    }
}
