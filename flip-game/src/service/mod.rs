//! HTTP face of the settlement authority.
//!
//! The platform key stays in the `coinflip serve` process. Players reach it
//! through [`RemoteSettlement`], which implements [`Settlement`] and
//! [`RoundOracle`] over the routes [`router`] exposes:
//!
//! - `GET /health`: platform address
//! - `POST /payouts`: [`PayoutRequest`] in, [`PayoutReceipt`] out
//! - `GET /payouts/{id}`: stored payout record
//! - `POST /rounds`: open a commit-reveal round
//! - `POST /rounds/{id}/reveal`: bind the round to a stake and reveal it
//!
//! [`Settlement`]: crate::settlement::Settlement
//! [`RoundOracle`]: crate::outcome::RoundOracle
//! [`PayoutRequest`]: crate::settlement::PayoutRequest
//! [`PayoutReceipt`]: crate::settlement::PayoutReceipt

mod client;
mod server;

pub use client::RemoteSettlement;
pub use server::{router, serve};

use crate::commitment::scheme::hex_bytes;
use crate::error::WagerError;
use flip_core::{Amount, Pubkey, TxSignature};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ENV_SETTLEMENT_URL: &str = "FLIP_SETTLEMENT_URL";
pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceInfo {
    pub status: String,
    pub platform: Pubkey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RevealBody {
    pub stake_signature: TxSignature,
    #[serde(with = "hex_bytes")]
    pub client_seed: Vec<u8>,
}

/// Error body; keeps the failures a player reacts to distinguishable
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub(crate) enum ServiceError {
    InsufficientPlatformFunds { need: Amount, available: Amount },
    PayoutSubmission { payout_id: Uuid, reason: String },
    PayoutNotFound { payout_id: Uuid },
    NotAWinner { message: String },
    StakeProof { message: String },
    Round { message: String },
    InvalidCommitment,
    InputRejected { message: String },
    Unavailable { message: String },
}

impl From<&WagerError> for ServiceError {
    fn from(err: &WagerError) -> Self {
        match err {
            WagerError::InsufficientPlatformFunds { need, available } => {
                Self::InsufficientPlatformFunds {
                    need: *need,
                    available: *available,
                }
            }
            WagerError::PayoutSubmission { payout_id, reason } => Self::PayoutSubmission {
                payout_id: *payout_id,
                reason: reason.clone(),
            },
            WagerError::PayoutNotFound(payout_id) => Self::PayoutNotFound {
                payout_id: *payout_id,
            },
            WagerError::NotAWinner(message) => Self::NotAWinner {
                message: message.clone(),
            },
            WagerError::StakeProof(message) => Self::StakeProof {
                message: message.clone(),
            },
            WagerError::Round(message) => Self::Round {
                message: message.clone(),
            },
            WagerError::InvalidCommitment => Self::InvalidCommitment,
            WagerError::InputRejected(message) => Self::InputRejected {
                message: message.clone(),
            },
            other => Self::Unavailable {
                message: other.to_string(),
            },
        }
    }
}

impl From<ServiceError> for WagerError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InsufficientPlatformFunds { need, available } => {
                WagerError::InsufficientPlatformFunds { need, available }
            }
            ServiceError::PayoutSubmission { payout_id, reason } => {
                WagerError::PayoutSubmission { payout_id, reason }
            }
            ServiceError::PayoutNotFound { payout_id } => WagerError::PayoutNotFound(payout_id),
            ServiceError::NotAWinner { message } => WagerError::NotAWinner(message),
            ServiceError::StakeProof { message } => WagerError::StakeProof(message),
            ServiceError::Round { message } => WagerError::Round(message),
            ServiceError::InvalidCommitment => WagerError::InvalidCommitment,
            ServiceError::InputRejected { message } => WagerError::InputRejected(message),
            ServiceError::Unavailable { message } => WagerError::Remote(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::generate_seed;
    use crate::outcome::{CommittedCoin, RoundOracle};
    use crate::settlement::tests::fixture;
    use crate::settlement::{PayoutRequest, Settlement, SettlementAuthority, SettlementConfig};
    use crate::stake::{Side, Stake};
    use crate::submitter::{SubmitterConfig, WagerResult, WagerSubmitter};
    use flip_core::storage::PayoutStatus;
    use flip_core::{Cluster, Keypair, LocalWallet};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Runs the service on an ephemeral port until the sender drops
    async fn start(authority: Arc<SettlementAuthority>) -> (RemoteSettlement, oneshot::Sender<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let (stop, stopped) = oneshot::channel::<()>();
        tokio::spawn(serve(listener, authority, async move {
            let _ = stopped.await;
        }));
        (RemoteSettlement::new(url, Duration::from_secs(5)).unwrap(), stop)
    }

    fn stake(sol: &str) -> Stake {
        Stake::from_sol_str(sol).unwrap()
    }

    #[test]
    fn test_settlement_url_from_lookup() {
        let remote = RemoteSettlement::from_lookup(
            |key| (key == ENV_SETTLEMENT_URL).then(|| "http://10.0.0.5:9000/".to_string()),
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(remote.base_url(), "http://10.0.0.5:9000");

        let local = RemoteSettlement::from_lookup(|_| None, Duration::from_secs(1)).unwrap();
        assert_eq!(local.base_url(), "http://127.0.0.1:8787");

        assert!(RemoteSettlement::new("", Duration::from_secs(1)).is_err());
    }

    #[tokio::test]
    async fn test_remote_payout_and_status() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let (remote, _stop) = start(fx.authority.clone()).await;

        assert_eq!(
            remote.platform_address().await.unwrap(),
            fx.authority.platform_address()
        );

        let stake_tx = fx.stake(stake("1")).await;
        let request =
            PayoutRequest::new(stake("1"), fx.player.pubkey(), Side::Tails).with_stake_tx(stake_tx);

        let receipt = remote.payout(request.clone()).await.unwrap();
        assert_eq!(receipt.amount.to_string(), "1.97");
        assert_eq!(receipt.status, PayoutStatus::Submitted);

        // same stake, same payout
        let again = remote.payout(request).await.unwrap();
        assert_eq!(again.payout_id, receipt.payout_id);
        assert_eq!(fx.payouts_sent(), 1);

        let record = remote.payout_status(receipt.payout_id).await.unwrap();
        assert_eq!(record.id, receipt.payout_id);
        assert_eq!(record.winner, fx.player.pubkey());
        assert_eq!(record.stake_signature, Some(stake_tx));
    }

    #[tokio::test]
    async fn test_remote_errors_keep_their_kind() {
        let fx = fixture(SettlementConfig::default(), "0.05").await;
        let (remote, _stop) = start(fx.authority.clone()).await;

        let stake_tx = fx.stake(stake("1")).await;
        let result = remote
            .payout(PayoutRequest::new(stake("1"), fx.player.pubkey(), Side::Heads).with_stake_tx(stake_tx))
            .await;
        match result {
            Err(WagerError::InsufficientPlatformFunds { need, .. }) => {
                assert_eq!(need.to_string(), "1.97")
            }
            other => panic!("expected insufficient funds, got {:?}", other),
        }

        let forged = PayoutRequest::new(stake("1"), fx.player.pubkey(), Side::Heads)
            .with_stake_tx(TxSignature::new([9u8; 64]));
        assert!(matches!(
            remote.payout(forged).await,
            Err(WagerError::StakeProof(_))
        ));

        let missing = Uuid::new_v4();
        match remote.payout_status(missing).await {
            Err(WagerError::PayoutNotFound(id)) => assert_eq!(id, missing),
            other => panic!("expected not found, got {:?}", other),
        }
        assert_eq!(fx.payouts_sent(), 0);
    }

    #[tokio::test]
    async fn test_remote_round_reveal_verifies() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let (remote, _stop) = start(fx.authority.clone()).await;

        let commitment = remote.open_round().await.unwrap();
        let client_seed = generate_seed();
        let stake_tx = fx.stake(stake("0.5")).await;

        let reveal = remote
            .reveal_round(commitment.round_id, &stake_tx, &client_seed)
            .await
            .unwrap();
        assert_eq!(reveal.verify(&commitment, &client_seed).unwrap(), reveal.outcome);

        // bound to the first stake
        let other_tx = fx.stake(stake("0.5")).await;
        assert!(matches!(
            remote
                .reveal_round(commitment.round_id, &other_tx, &client_seed)
                .await,
            Err(WagerError::Round(_))
        ));
    }

    #[tokio::test]
    async fn test_remote_wager_end_to_end() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let (remote, _stop) = start(fx.authority.clone()).await;
        let remote = Arc::new(remote);

        let wallet = Arc::new(LocalWallet::new(
            "w".to_string(),
            "player".to_string(),
            Keypair::from_seed(&[11u8; 32]),
            Cluster::Localnet,
            fx.ledger.clone(),
        ));
        let config = SubmitterConfig {
            reset_delay: Duration::from_millis(10),
            ..SubmitterConfig::new(fx.authority.platform_address())
        };
        let submitter = WagerSubmitter::new(
            wallet.clone(),
            fx.ledger.clone(),
            remote.clone(),
            Arc::new(CommittedCoin::new(remote.clone())),
            config,
        );

        submitter.refresh_balance().await.unwrap();
        submitter.select_stake(stake("0.1")).unwrap();
        submitter.select_prediction(Side::Heads).unwrap();
        let report = submitter.submit_wager().await.unwrap();

        let balance = fx.ledger.balance_of(&wallet.pubkey()).to_string();
        match report.outcome {
            Some(Side::Heads) => {
                assert!(matches!(report.result, WagerResult::Won(_)), "{}", report.message);
                // 5 - 0.1 + 0.197
                assert_eq!(balance, "5.097");
                assert_eq!(fx.payouts_sent(), 1);
            }
            Some(Side::Tails) => {
                assert_eq!(report.result, WagerResult::Lost);
                assert_eq!(balance, "4.9");
                assert_eq!(fx.payouts_sent(), 0);
            }
            None => panic!("no outcome: {}", report.message),
        }
        assert!(!submitter.is_in_flight());
    }
}
