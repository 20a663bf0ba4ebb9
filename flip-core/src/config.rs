use crate::error::{CoreError, Result};
use crate::types::{CommitmentLevel, Pubkey};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

pub const ENV_RPC_URL: &str = "FLIP_RPC_URL";
pub const ENV_CLUSTER: &str = "FLIP_CLUSTER";
pub const ENV_PLATFORM_WALLET: &str = "FLIP_PLATFORM_WALLET";
pub const ENV_COMMITMENT: &str = "FLIP_COMMITMENT";
pub const ENV_CONFIRM_TIMEOUT_SECS: &str = "FLIP_CONFIRM_TIMEOUT_SECS";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Cluster {
    Devnet,
    Testnet,
    Mainnet,
    Localnet,
}

impl Cluster {
    pub fn default_rpc_url(&self) -> &'static str {
        match self {
            Cluster::Devnet => "https://api.devnet.solana.com",
            Cluster::Testnet => "https://api.testnet.solana.com",
            Cluster::Mainnet => "https://api.mainnet-beta.solana.com",
            Cluster::Localnet => "http://127.0.0.1:8899",
        }
    }
}

impl FromStr for Cluster {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "devnet" => Ok(Cluster::Devnet),
            "testnet" => Ok(Cluster::Testnet),
            "mainnet" | "mainnet-beta" => Ok(Cluster::Mainnet),
            "localnet" | "localhost" => Ok(Cluster::Localnet),
            other => Err(CoreError::config(format!("Unknown cluster: {}", other))),
        }
    }
}

/// Client-visible network settings. Holds nothing secret.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub cluster: Cluster,
    pub rpc_url: String,
    pub platform_wallet: Option<Pubkey>,
    pub commitment: CommitmentLevel,
    pub confirmation_timeout: Duration,
    pub poll_interval: Duration,
    pub request_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            cluster: Cluster::Devnet,
            rpc_url: Cluster::Devnet.default_rpc_url().to_string(),
            platform_wallet: None,
            commitment: CommitmentLevel::Confirmed,
            confirmation_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl NetworkConfig {
    pub fn new(cluster: Cluster) -> Self {
        Self {
            cluster,
            rpc_url: cluster.default_rpc_url().to_string(),
            ..Self::default()
        }
    }

    pub fn with_platform_wallet(mut self, platform_wallet: Pubkey) -> Self {
        self.platform_wallet = Some(platform_wallet);
        self
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, environment-style
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let cluster = match lookup(ENV_CLUSTER) {
            Some(name) => name.parse()?,
            None => Cluster::Devnet,
        };
        let mut config = Self::new(cluster);

        if let Some(url) = lookup(ENV_RPC_URL) {
            config.rpc_url = url;
        }

        if let Some(addr) = lookup(ENV_PLATFORM_WALLET) {
            let platform = addr.parse().map_err(|e| {
                CoreError::config(format!("{} is not a valid address: {}", ENV_PLATFORM_WALLET, e))
            })?;
            config.platform_wallet = Some(platform);
        }

        if let Some(level) = lookup(ENV_COMMITMENT) {
            config.commitment = level.parse()?;
        }

        if let Some(secs) = lookup(ENV_CONFIRM_TIMEOUT_SECS) {
            let secs: u64 = secs.parse().map_err(|_| {
                CoreError::config(format!("{} must be a number of seconds", ENV_CONFIRM_TIMEOUT_SECS))
            })?;
            config.confirmation_timeout = Duration::from_secs(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// The platform account stakes are sent to
    pub fn require_platform_wallet(&self) -> Result<Pubkey> {
        self.platform_wallet.ok_or_else(|| {
            CoreError::config(format!(
                "Platform wallet not configured (set {})",
                ENV_PLATFORM_WALLET
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.rpc_url.is_empty() {
            return Err(CoreError::config("RPC URL cannot be empty"));
        }

        if !self.rpc_url.starts_with("http://") && !self.rpc_url.starts_with("https://") {
            return Err(CoreError::config(format!(
                "RPC URL must be http(s): {}",
                self.rpc_url
            )));
        }

        if self.confirmation_timeout.is_zero() {
            return Err(CoreError::config("Confirmation timeout must be greater than 0"));
        }

        if self.poll_interval.is_zero() {
            return Err(CoreError::config("Poll interval must be greater than 0"));
        }

        Ok(())
    }
}
