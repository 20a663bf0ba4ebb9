//! Custody side of the exchange.
//!
//! The authority owns the platform key. On a win it checks the stake really
//! landed, checks the round (when one was used), checks it can afford the
//! payout, then records and submits the payout without waiting for
//! confirmation. [`worker::PayoutWorker`] finishes the job.

pub mod signing;
pub mod worker;

pub use signing::{SigningContext, ENV_PLATFORM_SECRET};
pub use worker::{PayoutWorker, WorkerReport};

use crate::commitment::{
    generate_seed, outcome_from_seeds, CommitmentScheme, HashCommitment, RoundCommitment,
    RoundReveal,
};
use crate::error::{Result, WagerError};
use crate::outcome::RoundOracle;
use crate::stake::{Side, Stake};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flip_core::storage::{PayoutRecord, PayoutStatus, PayoutStore, RoundRecord, RoundStore, Storage};
use flip_core::{Amount, CommitmentLevel, Ledger, Pubkey, TransferInstruction, TxSignature};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// Level a stake must reach before it backs a payout, and a payout to count as done
    pub commitment: CommitmentLevel,
    /// Demand a confirmed stake transfer for every payout
    pub require_stake_proof: bool,
    /// Refuse payouts that do not come with a revealed round
    pub require_committed_round: bool,
    pub retry_base: Duration,
    pub max_backoff: Duration,
    pub max_attempts: u32,
    /// A submitted payout still unknown to the ledger after this long is sent again
    pub resubmit_after: Duration,
    pub worker_interval: Duration,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            commitment: CommitmentLevel::Confirmed,
            require_stake_proof: true,
            require_committed_round: false,
            retry_base: Duration::from_secs(2),
            max_backoff: Duration::from_secs(300),
            max_attempts: 8,
            resubmit_after: Duration::from_secs(120),
            worker_interval: Duration::from_secs(5),
        }
    }
}

impl SettlementConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(WagerError::config("max_attempts must be at least 1"));
        }

        if self.retry_base.is_zero() || self.worker_interval.is_zero() {
            return Err(WagerError::config("Retry and worker intervals must be greater than 0"));
        }

        if self.max_backoff < self.retry_base {
            return Err(WagerError::config("max_backoff cannot be below retry_base"));
        }

        Ok(())
    }

    /// `retry_base * 2^(attempts - 1)`, capped at `max_backoff`
    pub fn backoff_for(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(16);
        self.retry_base
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }
}

/// A win signal from the client side
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub stake: Stake,
    pub winner: Pubkey,
    pub prediction: Side,
    pub stake_tx: Option<TxSignature>,
    pub round: Option<Uuid>,
}

impl PayoutRequest {
    pub fn new(stake: Stake, winner: Pubkey, prediction: Side) -> Self {
        Self {
            stake,
            winner,
            prediction,
            stake_tx: None,
            round: None,
        }
    }

    pub fn with_stake_tx(mut self, signature: TxSignature) -> Self {
        self.stake_tx = Some(signature);
        self
    }

    pub fn with_round(mut self, round: Uuid) -> Self {
        self.round = Some(round);
        self
    }
}

/// Acknowledgment returned as soon as the payout is submitted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutReceipt {
    pub payout_id: Uuid,
    pub amount: Amount,
    pub status: PayoutStatus,
    pub signature: Option<TxSignature>,
}

impl From<&PayoutRecord> for PayoutReceipt {
    fn from(record: &PayoutRecord) -> Self {
        Self {
            payout_id: record.id,
            amount: record.amount,
            status: record.status,
            signature: record.payout_signature,
        }
    }
}

#[async_trait]
pub trait Settlement: Send + Sync {
    async fn payout(&self, request: PayoutRequest) -> Result<PayoutReceipt>;
}

pub struct SettlementAuthority {
    signer: SigningContext,
    ledger: Arc<dyn Ledger>,
    storage: Arc<Storage>,
    config: SettlementConfig,
}

impl SettlementAuthority {
    pub fn new(
        signer: SigningContext,
        ledger: Arc<dyn Ledger>,
        storage: Arc<Storage>,
        config: SettlementConfig,
    ) -> Result<Self> {
        config.validate()?;
        tracing::info!("Settlement authority ready for platform {}", signer.address());

        Ok(Self {
            signer,
            ledger,
            storage,
            config,
        })
    }

    pub fn platform_address(&self) -> Pubkey {
        self.signer.address()
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    pub(crate) fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    pub(crate) fn storage(&self) -> &Storage {
        &self.storage
    }

    pub async fn payout_status(&self, payout_id: Uuid) -> Result<PayoutRecord> {
        PayoutStore::new(&self.storage)
            .get(&payout_id)
            .await?
            .ok_or(WagerError::PayoutNotFound(payout_id))
    }

    pub async fn payout_for_stake(&self, stake_tx: &TxSignature) -> Result<Option<PayoutRecord>> {
        Ok(PayoutStore::new(&self.storage).find_by_stake(stake_tx).await?)
    }

    pub async fn list_payouts(&self, limit: usize) -> Result<Vec<PayoutRecord>> {
        Ok(PayoutStore::new(&self.storage).list(limit).await?)
    }

    /// Check the stake transfer on the ledger: confirmed, successful,
    /// `winner -> platform`, exactly the stake.
    async fn verify_stake(&self, request: &PayoutRequest, stake_tx: &TxSignature) -> Result<()> {
        let transfer = self
            .ledger
            .get_transfer(stake_tx)
            .await?
            .ok_or_else(|| {
                WagerError::stake_proof(format!("no transfer {} on the ledger", stake_tx))
            })?;

        if let Some(err) = &transfer.status.err {
            return Err(WagerError::stake_proof(format!("stake transfer failed: {}", err)));
        }
        if !transfer.status.reached(self.config.commitment) {
            return Err(WagerError::stake_proof(format!(
                "stake transfer not yet {}",
                self.config.commitment.as_str()
            )));
        }
        if transfer.from != request.winner {
            return Err(WagerError::stake_proof(format!(
                "stake was sent by {}, not {}",
                transfer.from, request.winner
            )));
        }
        if transfer.to != self.platform_address() {
            return Err(WagerError::stake_proof(format!(
                "stake was sent to {}, not the platform",
                transfer.to
            )));
        }
        if transfer.amount != request.stake.amount() {
            return Err(WagerError::stake_proof(format!(
                "stake transfer carried {} SOL, wager says {} SOL",
                transfer.amount, request.stake
            )));
        }

        Ok(())
    }

    async fn verify_round(&self, request: &PayoutRequest) -> Result<()> {
        let Some(round_id) = request.round else {
            if self.config.require_committed_round {
                return Err(WagerError::round("a committed round is required"));
            }
            return Ok(());
        };

        let round = RoundStore::new(&self.storage)
            .get(&round_id)
            .await?
            .ok_or_else(|| WagerError::round(format!("unknown round {}", round_id)))?;

        let (Some(bound_stake), Some(client_seed)) = (round.stake_signature, &round.client_seed)
        else {
            return Err(WagerError::round(format!("round {} was never revealed", round_id)));
        };

        if request.stake_tx != Some(bound_stake) {
            return Err(WagerError::round(format!(
                "round {} belongs to a different stake",
                round_id
            )));
        }

        let outcome = outcome_from_seeds(&round.server_seed, client_seed);
        if outcome != request.prediction {
            return Err(WagerError::NotAWinner(format!(
                "round {} landed {}, prediction was {}",
                round_id, outcome, request.prediction
            )));
        }

        Ok(())
    }

    /// Sign and submit one attempt for `record`, then persist the result.
    /// Failures reschedule the record or mark it failed after the last attempt.
    pub(crate) async fn submit_record(
        &self,
        record: &mut PayoutRecord,
        now: DateTime<Utc>,
    ) -> Result<TxSignature> {
        record.attempts += 1;
        let attempt = self.sign_and_submit(record).await;

        match &attempt {
            Ok(signature) => {
                record.status = PayoutStatus::Submitted;
                record.payout_signature = Some(*signature);
                record.submitted_at = Some(now);
                record.last_error = None;
                tracing::info!(
                    "Payout {} of {} SOL to {} submitted: {}",
                    record.id,
                    record.amount,
                    record.winner,
                    signature
                );
            }
            Err(e) => {
                self.schedule_retry(record, e.to_string(), now);
            }
        }

        PayoutStore::new(&self.storage).update(record).await?;
        attempt
    }

    async fn sign_and_submit(&self, record: &PayoutRecord) -> Result<TxSignature> {
        let instruction =
            TransferInstruction::new(self.platform_address(), record.winner, record.amount);
        let blockhash = self.ledger.latest_blockhash().await?;
        let signed = self.signer.sign(instruction, blockhash)?;
        Ok(self.ledger.submit_transfer(&signed).await?)
    }

    /// Back to `Queued` with backoff, or `Failed` once attempts run out
    pub(crate) fn schedule_retry(&self, record: &mut PayoutRecord, error: String, now: DateTime<Utc>) {
        record.payout_signature = None;
        record.submitted_at = None;

        if record.attempts >= self.config.max_attempts {
            record.status = PayoutStatus::Failed;
            tracing::error!(
                "Payout {} failed after {} attempts: {}",
                record.id,
                record.attempts,
                error
            );
        } else {
            let delay = self.config.backoff_for(record.attempts);
            record.status = PayoutStatus::Queued;
            record.next_attempt_at =
                now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
            tracing::warn!(
                "Payout {} attempt {} failed, retrying in {:?}: {}",
                record.id,
                record.attempts,
                delay,
                error
            );
        }
        record.last_error = Some(error);
    }
}

#[async_trait]
impl Settlement for SettlementAuthority {
    async fn payout(&self, request: PayoutRequest) -> Result<PayoutReceipt> {
        let amount = request.stake.payout_amount();
        let store = PayoutStore::new(&self.storage);

        if let Some(stake_tx) = &request.stake_tx {
            if let Some(existing) = store.find_by_stake(stake_tx).await? {
                tracing::info!(
                    "Stake {} already backs payout {} ({})",
                    stake_tx,
                    existing.id,
                    existing.status
                );
                return Ok(PayoutReceipt::from(&existing));
            }
        }

        if self.config.require_stake_proof {
            let stake_tx = request
                .stake_tx
                .ok_or_else(|| WagerError::stake_proof("stake signature is required"))?;
            self.verify_stake(&request, &stake_tx).await?;
        }

        self.verify_round(&request).await?;

        let available = self.ledger.get_balance(&self.platform_address()).await?;
        if available < amount {
            tracing::warn!(
                "Cannot pay {} SOL to {}: platform holds {} SOL",
                amount,
                request.winner,
                available
            );
            return Err(WagerError::InsufficientPlatformFunds {
                need: amount,
                available,
            });
        }

        let mut record =
            PayoutRecord::new(request.stake_tx, request.winner, request.stake.amount(), amount);
        if let Err(e) = store.insert(&record).await {
            // lost a race against the same stake
            if let Some(stake_tx) = &request.stake_tx {
                if let Some(existing) = store.find_by_stake(stake_tx).await? {
                    return Ok(PayoutReceipt::from(&existing));
                }
            }
            return Err(e.into());
        }

        match self.submit_record(&mut record, Utc::now()).await {
            Ok(_) => Ok(PayoutReceipt::from(&record)),
            Err(e) => Err(WagerError::PayoutSubmission {
                payout_id: record.id,
                reason: e.to_string(),
            }),
        }
    }
}

#[async_trait]
impl RoundOracle for SettlementAuthority {
    async fn open_round(&self) -> Result<RoundCommitment> {
        let server_seed = generate_seed();
        let round = RoundRecord {
            id: Uuid::new_v4(),
            commitment: HashCommitment::commit(&server_seed),
            server_seed,
            stake_signature: None,
            client_seed: None,
            created_at: Utc::now(),
            revealed_at: None,
        };
        RoundStore::new(&self.storage).insert(&round).await?;

        tracing::debug!("Opened round {}", round.id);
        Ok(RoundCommitment {
            round_id: round.id,
            commitment: round.commitment,
            created_at: round.created_at,
        })
    }

    async fn reveal_round(
        &self,
        round_id: Uuid,
        stake_signature: &TxSignature,
        client_seed: &[u8],
    ) -> Result<RoundReveal> {
        let rounds = RoundStore::new(&self.storage);
        let round = rounds
            .get(&round_id)
            .await?
            .ok_or_else(|| WagerError::round(format!("unknown round {}", round_id)))?;

        if round.revealed_at.is_none() {
            if self.config.require_stake_proof {
                self.verify_round_stake(stake_signature).await?;
            }
            rounds
                .mark_revealed(&round_id, stake_signature, client_seed)
                .await?;
        }

        // re-read: a concurrent reveal may have won
        let round = rounds
            .get(&round_id)
            .await?
            .ok_or_else(|| WagerError::round(format!("unknown round {}", round_id)))?;

        if round.stake_signature != Some(*stake_signature)
            || round.client_seed.as_deref() != Some(client_seed)
        {
            return Err(WagerError::round(format!(
                "round {} was already revealed for another stake",
                round_id
            )));
        }

        Ok(RoundReveal {
            round_id,
            outcome: outcome_from_seeds(&round.server_seed, client_seed),
            server_seed: round.server_seed,
            client_seed: client_seed.to_vec(),
        })
    }
}

impl SettlementAuthority {
    /// A round is only opened by a confirmed stake into the platform
    async fn verify_round_stake(&self, stake_tx: &TxSignature) -> Result<()> {
        let transfer = self.ledger.get_transfer(stake_tx).await?.ok_or_else(|| {
            WagerError::stake_proof(format!("no transfer {} on the ledger", stake_tx))
        })?;

        if transfer.to != self.platform_address()
            || !transfer.status.reached(self.config.commitment)
            || Stake::from_amount(transfer.amount).is_err()
        {
            return Err(WagerError::stake_proof(format!(
                "{} is not a confirmed stake into the platform",
                stake_tx
            )));
        }
        Ok(())
    }
}

impl std::fmt::Debug for SettlementAuthority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementAuthority")
            .field("signer", &self.signer)
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use flip_core::{Keypair, MemoryLedger, SignedTransfer, TransferRecord, TxStatus};

    pub(crate) struct Fixture {
        pub ledger: Arc<MemoryLedger>,
        pub authority: Arc<SettlementAuthority>,
        pub player: Keypair,
    }

    pub(crate) async fn fixture(config: SettlementConfig, platform_sol: &str) -> Fixture {
        let ledger = Arc::new(MemoryLedger::new());
        let storage = Arc::new(Storage::in_memory().await.unwrap());
        let signer = SigningContext::new(Keypair::from_seed(&[77u8; 32]));
        ledger.set_balance(signer.address(), Amount::from_sol_str(platform_sol).unwrap());

        let player = Keypair::from_seed(&[11u8; 32]);
        ledger.set_balance(player.pubkey(), Amount::from_sol_str("5").unwrap());

        let authority =
            Arc::new(SettlementAuthority::new(signer, ledger.clone(), storage, config).unwrap());
        Fixture {
            ledger,
            authority,
            player,
        }
    }

    impl Fixture {
        /// Send a confirmed stake from the player to the platform
        pub(crate) async fn stake(&self, stake: Stake) -> TxSignature {
            let ix = TransferInstruction::new(
                self.player.pubkey(),
                self.authority.platform_address(),
                stake.amount(),
            );
            let blockhash = self.ledger.latest_blockhash().await.unwrap();
            let signed = SignedTransfer::sign(ix, blockhash, &self.player).unwrap();
            self.ledger.submit_transfer(&signed).await.unwrap()
        }

        pub(crate) fn payouts_sent(&self) -> usize {
            let platform = self.authority.platform_address();
            self.ledger
                .transfers()
                .iter()
                .filter(|t| t.from == platform)
                .count()
        }
    }

    fn one_sol() -> Stake {
        Stake::from_sol_str("1").unwrap()
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let config = SettlementConfig {
            retry_base: Duration::from_secs(2),
            max_backoff: Duration::from_secs(10),
            ..SettlementConfig::default()
        };
        assert_eq!(config.backoff_for(1), Duration::from_secs(2));
        assert_eq!(config.backoff_for(2), Duration::from_secs(4));
        assert_eq!(config.backoff_for(3), Duration::from_secs(8));
        assert_eq!(config.backoff_for(4), Duration::from_secs(10));
        assert_eq!(config.backoff_for(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_winning_stake_is_paid_once() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let stake_tx = fx.stake(one_sol()).await;
        let request =
            PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Heads).with_stake_tx(stake_tx);

        let receipt = fx.authority.payout(request.clone()).await.unwrap();
        assert_eq!(receipt.amount.to_string(), "1.97");
        assert_eq!(receipt.status, PayoutStatus::Submitted);
        // 5 - 1 + 1.97
        assert_eq!(fx.ledger.balance_of(&fx.player.pubkey()).to_string(), "5.97");

        let again = fx.authority.payout(request).await.unwrap();
        assert_eq!(again.payout_id, receipt.payout_id);
        assert_eq!(fx.payouts_sent(), 1);

        let by_stake = fx.authority.payout_for_stake(&stake_tx).await.unwrap().unwrap();
        assert_eq!(by_stake.id, receipt.payout_id);
    }

    #[tokio::test]
    async fn test_forged_or_mismatched_stakes_are_refused() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let winner = fx.player.pubkey();

        // never on the ledger
        let forged = PayoutRequest::new(one_sol(), winner, Side::Heads)
            .with_stake_tx(TxSignature::new([9u8; 64]));
        assert!(matches!(
            fx.authority.payout(forged).await,
            Err(WagerError::StakeProof(_))
        ));

        // real stake, but smaller than claimed
        let half = Stake::from_sol_str("0.5").unwrap();
        let small_tx = fx.stake(half).await;
        let inflated = PayoutRequest::new(one_sol(), winner, Side::Heads).with_stake_tx(small_tx);
        assert!(matches!(
            fx.authority.payout(inflated).await,
            Err(WagerError::StakeProof(_))
        ));

        // real stake, claimed by somebody else
        let stake_tx = fx.stake(one_sol()).await;
        let thief = PayoutRequest::new(one_sol(), Pubkey::new([3u8; 32]), Side::Heads)
            .with_stake_tx(stake_tx);
        assert!(matches!(
            fx.authority.payout(thief).await,
            Err(WagerError::StakeProof(_))
        ));

        // no signature at all
        let bare = PayoutRequest::new(one_sol(), winner, Side::Heads);
        assert!(fx.authority.payout(bare).await.is_err());

        assert_eq!(fx.payouts_sent(), 0);
        assert!(fx.authority.list_payouts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unconfirmed_stake_is_refused() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let signature = TxSignature::new([4u8; 64]);
        fx.ledger.insert_transfer(TransferRecord {
            signature,
            from: fx.player.pubkey(),
            to: fx.authority.platform_address(),
            amount: one_sol().amount(),
            status: TxStatus {
                level: Some(CommitmentLevel::Processed),
                err: None,
            },
        });

        let request =
            PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Tails).with_stake_tx(signature);
        assert!(matches!(
            fx.authority.payout(request).await,
            Err(WagerError::StakeProof(_))
        ));
    }

    #[tokio::test]
    async fn test_insufficient_platform_funds_submits_nothing() {
        let config = SettlementConfig {
            require_stake_proof: false,
            ..SettlementConfig::default()
        };
        let fx = fixture(config, "0.05").await;

        let request = PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Heads);
        match fx.authority.payout(request).await {
            Err(WagerError::InsufficientPlatformFunds { need, available }) => {
                assert_eq!(need.to_string(), "1.97");
                assert_eq!(available.to_string(), "0.05");
            }
            other => panic!("expected insufficient funds, got {:?}", other),
        }

        assert_eq!(fx.ledger.submissions(), 0);
        assert!(fx.authority.list_payouts(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submission_failure_is_queued_for_retry() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let stake_tx = fx.stake(one_sol()).await;
        fx.ledger.fail_next_submissions(1);

        let request =
            PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Heads).with_stake_tx(stake_tx);
        let payout_id = match fx.authority.payout(request).await {
            Err(WagerError::PayoutSubmission { payout_id, .. }) => payout_id,
            other => panic!("expected a delayed payout, got {:?}", other),
        };

        let record = fx.authority.payout_status(payout_id).await.unwrap();
        assert_eq!(record.status, PayoutStatus::Queued);
        assert_eq!(record.attempts, 1);
        assert!(record.last_error.is_some());
        assert!(record.next_attempt_at > record.created_at);
    }

    #[tokio::test]
    async fn test_round_reveal_gates_the_payout() {
        let config = SettlementConfig {
            require_committed_round: true,
            ..SettlementConfig::default()
        };
        let fx = fixture(config, "10").await;
        let stake_tx = fx.stake(one_sol()).await;

        let commitment = fx.authority.open_round().await.unwrap();
        let reveal = fx
            .authority
            .reveal_round(commitment.round_id, &stake_tx, b"client")
            .await
            .unwrap();
        assert_eq!(reveal.verify(&commitment, b"client").unwrap(), reveal.outcome);

        // same reveal again is idempotent, another stake is not
        let again = fx
            .authority
            .reveal_round(commitment.round_id, &stake_tx, b"client")
            .await
            .unwrap();
        assert_eq!(again, reveal);
        let other_tx = fx.stake(one_sol()).await;
        assert!(fx
            .authority
            .reveal_round(commitment.round_id, &other_tx, b"client")
            .await
            .is_err());

        let losing = PayoutRequest::new(one_sol(), fx.player.pubkey(), reveal.outcome.opposite())
            .with_stake_tx(stake_tx)
            .with_round(commitment.round_id);
        assert!(matches!(
            fx.authority.payout(losing).await,
            Err(WagerError::NotAWinner(_))
        ));

        let without_round =
            PayoutRequest::new(one_sol(), fx.player.pubkey(), reveal.outcome).with_stake_tx(stake_tx);
        assert!(matches!(
            fx.authority.payout(without_round).await,
            Err(WagerError::Round(_))
        ));

        let winning = PayoutRequest::new(one_sol(), fx.player.pubkey(), reveal.outcome)
            .with_stake_tx(stake_tx)
            .with_round(commitment.round_id);
        fx.authority.payout(winning).await.unwrap();
        assert_eq!(fx.payouts_sent(), 1);
    }

    #[tokio::test]
    async fn test_reveal_requires_a_stake() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let commitment = fx.authority.open_round().await.unwrap();

        let result = fx
            .authority
            .reveal_round(commitment.round_id, &TxSignature::new([1u8; 64]), b"seed")
            .await;
        assert!(matches!(result, Err(WagerError::StakeProof(_))));
    }
}
