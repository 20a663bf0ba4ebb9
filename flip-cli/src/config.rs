use anyhow::Context;
use flip_core::storage::Storage;
use flip_core::{Cluster, Ledger, NetworkConfig, RpcLedger, WalletManager};
use flip_game::RemoteSettlement;
use std::path::PathBuf;
use std::sync::Arc;

pub const DATABASE_FILE: &str = "coinflip.db";

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("coinflip")
}

/// Shared handles for one CLI invocation
pub struct CliContext {
    data_dir: PathBuf,
    storage: Arc<Storage>,
}

impl CliContext {
    pub async fn open(data_dir: PathBuf) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data directory {}", data_dir.display()))?;

        let storage = Storage::new(&data_dir.join(DATABASE_FILE))
            .await
            .context("opening the local database")?;

        Ok(Self {
            data_dir,
            storage: Arc::new(storage),
        })
    }

    pub fn data_dir(&self) -> &PathBuf {
        &self.data_dir
    }

    pub fn storage(&self) -> Arc<Storage> {
        self.storage.clone()
    }

    pub fn network(&self) -> anyhow::Result<NetworkConfig> {
        NetworkConfig::from_env().context("reading network settings from the environment")
    }

    pub fn rpc_ledger(&self, network: &NetworkConfig) -> anyhow::Result<Arc<dyn Ledger>> {
        tracing::debug!("Using RPC endpoint {}", network.rpc_url);
        Ok(Arc::new(RpcLedger::new(network)?))
    }

    /// Client for the settlement service; the player's process holds no platform key
    pub fn remote_settlement(&self, network: &NetworkConfig) -> anyhow::Result<Arc<RemoteSettlement>> {
        let remote = RemoteSettlement::from_env(network.request_timeout)
            .context("reading settlement service settings from the environment")?;
        tracing::debug!("Using settlement service {}", remote.base_url());
        Ok(Arc::new(remote))
    }

    pub fn wallet_manager(&self, cluster: Cluster, ledger: Arc<dyn Ledger>) -> WalletManager {
        WalletManager::with_storage(self.storage(), cluster, ledger)
    }
}
