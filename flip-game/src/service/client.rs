use super::{RevealBody, ServiceError, ServiceInfo, DEFAULT_BIND, ENV_SETTLEMENT_URL};
use crate::commitment::{RoundCommitment, RoundReveal};
use crate::error::{Result, WagerError};
use crate::outcome::RoundOracle;
use crate::settlement::{PayoutReceipt, PayoutRequest, Settlement};
use async_trait::async_trait;
use flip_core::storage::PayoutRecord;
use flip_core::{Pubkey, TxSignature};
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

/// Settlement service client; holds no key material
pub struct RemoteSettlement {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteSettlement {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(WagerError::config("settlement service URL is empty"));
        }
        if timeout.is_zero() {
            return Err(WagerError::config("settlement request timeout must be positive"));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WagerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http, base_url })
    }

    pub fn from_env(timeout: Duration) -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok(), timeout)
    }

    /// `FLIP_SETTLEMENT_URL`, or a service on the default local port
    pub fn from_lookup<F>(lookup: F, timeout: Duration) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_SETTLEMENT_URL).unwrap_or_else(|| format!("http://{}", DEFAULT_BIND));
        Self::new(url, timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Address the service pays from
    pub async fn platform_address(&self) -> Result<Pubkey> {
        let info: ServiceInfo = self.get("/health").await?;
        Ok(info.platform)
    }

    pub async fn payout_status(&self, payout_id: Uuid) -> Result<PayoutRecord> {
        self.get(&format!("/payouts/{}", payout_id)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        tracing::debug!("GET {}{}", self.base_url, path);
        let response = self.http.get(self.url(path)).send().await?;
        Self::decode(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T> {
        tracing::debug!("POST {}{}", self.base_url, path);
        let mut request = self.http.post(self.url(path));
        if let Some(body) = body {
            request = request.json(body);
        }
        Self::decode(request.send().await?).await
    }

    async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            return Ok(response.json().await?);
        }

        let body = response.text().await?;
        match serde_json::from_str::<ServiceError>(&body) {
            Ok(err) => Err(err.into()),
            Err(_) => Err(WagerError::Remote(format!("{}: {}", status, body.trim()))),
        }
    }
}

#[async_trait]
impl Settlement for RemoteSettlement {
    async fn payout(&self, request: PayoutRequest) -> Result<PayoutReceipt> {
        let body = serde_json::to_value(&request)?;
        let receipt: PayoutReceipt = self.post("/payouts", Some(&body)).await?;
        tracing::info!(
            "Service acknowledged payout {} of {} SOL ({})",
            receipt.payout_id,
            receipt.amount,
            receipt.status
        );
        Ok(receipt)
    }
}

#[async_trait]
impl RoundOracle for RemoteSettlement {
    async fn open_round(&self) -> Result<RoundCommitment> {
        self.post("/rounds", None).await
    }

    async fn reveal_round(
        &self,
        round_id: Uuid,
        stake_signature: &TxSignature,
        client_seed: &[u8],
    ) -> Result<RoundReveal> {
        let body = serde_json::to_value(RevealBody {
            stake_signature: *stake_signature,
            client_seed: client_seed.to_vec(),
        })?;
        self.post(&format!("/rounds/{}/reveal", round_id), Some(&body))
            .await
    }
}
