use crate::config::NetworkConfig;
use crate::error::{CoreError, Result};
use crate::ledger::{Ledger, TransferRecord, TxStatus};
use crate::transaction::SignedTransfer;
use crate::types::{Amount, Blockhash, CommitmentLevel, Pubkey, TxSignature};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct WithContext<T> {
    value: T,
}

#[derive(Deserialize)]
struct BlockhashValue {
    blockhash: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignatureStatusValue {
    confirmation_status: Option<CommitmentLevel>,
    err: Option<Value>,
}

#[derive(Deserialize)]
struct ParsedTransaction {
    meta: Option<ParsedMeta>,
    transaction: ParsedEnvelope,
}

#[derive(Deserialize)]
struct ParsedMeta {
    err: Option<Value>,
}

#[derive(Deserialize)]
struct ParsedEnvelope {
    message: ParsedMessage,
}

#[derive(Deserialize)]
struct ParsedMessage {
    instructions: Vec<Value>,
}

/// JSON-RPC ledger client over HTTP
pub struct RpcLedger {
    http: reqwest::Client,
    url: String,
    commitment: CommitmentLevel,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl RpcLedger {
    pub fn new(config: &NetworkConfig) -> Result<Self> {
        config.validate()?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| CoreError::network_connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            url: config.rpc_url.clone(),
            commitment: config.commitment,
            poll_interval: config.poll_interval,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        tracing::debug!("RPC {} -> {}", method, self.url);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: RpcResponse<T> = response.json().await?;

        if let Some(err) = body.error {
            return Err(CoreError::Rpc {
                code: err.code,
                message: err.message,
            });
        }

        body.result
            .ok_or_else(|| CoreError::ledger(format!("RPC {} returned no result", method)))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<Amount> {
        let balance: WithContext<u64> = self
            .call(
                "getBalance",
                json!([address.to_string(), { "commitment": self.commitment.as_str() }]),
            )
            .await?;
        Ok(Amount::from_lamports(balance.value))
    }

    async fn latest_blockhash(&self) -> Result<Blockhash> {
        let latest: WithContext<BlockhashValue> = self
            .call(
                "getLatestBlockhash",
                json!([{ "commitment": self.commitment.as_str() }]),
            )
            .await?;
        latest.value.blockhash.parse()
    }

    async fn submit_transfer(&self, transfer: &SignedTransfer) -> Result<TxSignature> {
        let returned: String = self
            .call(
                "sendTransaction",
                json!([
                    transfer.to_base64(),
                    {
                        "encoding": "base64",
                        "preflightCommitment": self.commitment.as_str(),
                    }
                ]),
            )
            .await?;

        let signature: TxSignature = returned.parse()?;
        if signature != transfer.signature {
            tracing::warn!(
                "Node returned signature {} for transaction {}",
                signature,
                transfer.signature
            );
        }

        tracing::info!(
            "Submitted transfer of {} SOL from {} to {}: {}",
            transfer.instruction.amount,
            transfer.instruction.from,
            transfer.instruction.to,
            signature
        );
        Ok(signature)
    }

    async fn signature_status(&self, signature: &TxSignature) -> Result<Option<TxStatus>> {
        let statuses: WithContext<Vec<Option<SignatureStatusValue>>> = self
            .call(
                "getSignatureStatuses",
                json!([[signature.to_string()], { "searchTransactionHistory": true }]),
            )
            .await?;

        Ok(statuses
            .value
            .into_iter()
            .next()
            .flatten()
            .map(|status| TxStatus {
                level: status.confirmation_status,
                err: status.err.map(|e| e.to_string()),
            }))
    }

    async fn get_transfer(&self, signature: &TxSignature) -> Result<Option<TransferRecord>> {
        // getTransaction does not serve `processed`
        let queried = self.commitment.max(CommitmentLevel::Confirmed);
        let tx: Option<ParsedTransaction> = self
            .call(
                "getTransaction",
                json!([
                    signature.to_string(),
                    {
                        "encoding": "jsonParsed",
                        "commitment": queried.as_str(),
                        "maxSupportedTransactionVersion": 0,
                    }
                ]),
            )
            .await
            .or_else(|e| match e {
                // an unknown signature comes back as a null result
                CoreError::Ledger(_) => Ok(None),
                other => Err(other),
            })?;

        let Some(tx) = tx else {
            return Ok(None);
        };

        let Some((from, to, lamports)) = tx
            .transaction
            .message
            .instructions
            .iter()
            .find_map(parse_system_transfer)
        else {
            return Ok(None);
        };

        // Found at `queried`, so at least that durable; the status may know more
        let reported = self
            .signature_status(signature)
            .await?
            .and_then(|status| status.level);
        let level = reported.max(Some(queried));

        Ok(Some(TransferRecord {
            signature: *signature,
            from,
            to,
            amount: Amount::from_lamports(lamports),
            status: TxStatus {
                level,
                err: tx.meta.and_then(|m| m.err).map(|e| e.to_string()),
            },
        }))
    }

    fn poll_interval(&self) -> Duration {
        self.poll_interval
    }
}

fn parse_system_transfer(ix: &Value) -> Option<(Pubkey, Pubkey, u64)> {
    if ix.get("program")?.as_str()? != "system" {
        return None;
    }
    let parsed = ix.get("parsed")?;
    if parsed.get("type")?.as_str()? != "transfer" {
        return None;
    }
    let info = parsed.get("info")?;
    let from = info.get("source")?.as_str()?.parse().ok()?;
    let to = info.get("destination")?.as_str()?.parse().ok()?;
    let lamports = info.get("lamports")?.as_u64()?;
    Some((from, to, lamports))
}
