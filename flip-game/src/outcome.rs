//! Where heads or tails comes from.
//!
//! [`LocalCoin`] flips on the client. [`CommittedCoin`] asks the settlement
//! side to commit to a seed before the stake and to reveal it after, so
//! neither side picks the result alone.

use crate::commitment::{generate_seed, RoundCommitment, RoundReveal};
use crate::error::{Result, WagerError};
use crate::stake::Side;
use async_trait::async_trait;
use flip_core::TxSignature;
use rand::Rng;
use std::sync::Arc;
use uuid::Uuid;

/// State carried from before the stake to the draw
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrawTicket {
    Local,
    Committed {
        commitment: RoundCommitment,
        client_seed: Vec<u8>,
    },
}

impl DrawTicket {
    pub fn round_id(&self) -> Option<Uuid> {
        match self {
            DrawTicket::Local => None,
            DrawTicket::Committed { commitment, .. } => Some(commitment.round_id),
        }
    }
}

#[async_trait]
pub trait OutcomeSource: Send + Sync {
    /// Called before any money moves
    async fn prepare(&self) -> Result<DrawTicket>;

    /// Called once the stake is confirmed
    async fn draw(&self, ticket: &DrawTicket, stake_signature: &TxSignature) -> Result<Side>;
}

/// The settlement side of a commit-reveal round
#[async_trait]
pub trait RoundOracle: Send + Sync {
    async fn open_round(&self) -> Result<RoundCommitment>;

    async fn reveal_round(
        &self,
        round_id: Uuid,
        stake_signature: &TxSignature,
        client_seed: &[u8],
    ) -> Result<RoundReveal>;
}

/// Uniform client-side flip
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalCoin;

#[async_trait]
impl OutcomeSource for LocalCoin {
    async fn prepare(&self) -> Result<DrawTicket> {
        Ok(DrawTicket::Local)
    }

    async fn draw(&self, _ticket: &DrawTicket, _stake_signature: &TxSignature) -> Result<Side> {
        let bit: u8 = rand::thread_rng().gen_range(0..2);
        Ok(Side::from_bit(bit))
    }
}

pub struct CommittedCoin {
    oracle: Arc<dyn RoundOracle>,
}

impl CommittedCoin {
    pub fn new(oracle: Arc<dyn RoundOracle>) -> Self {
        Self { oracle }
    }
}

#[async_trait]
impl OutcomeSource for CommittedCoin {
    async fn prepare(&self) -> Result<DrawTicket> {
        let commitment = self.oracle.open_round().await?;
        tracing::debug!(
            "Round {} committed to {}",
            commitment.round_id,
            commitment.commitment
        );

        Ok(DrawTicket::Committed {
            commitment,
            client_seed: generate_seed(),
        })
    }

    async fn draw(&self, ticket: &DrawTicket, stake_signature: &TxSignature) -> Result<Side> {
        let DrawTicket::Committed {
            commitment,
            client_seed,
        } = ticket
        else {
            return Err(WagerError::round("committed draw needs a committed ticket"));
        };

        let reveal = self
            .oracle
            .reveal_round(commitment.round_id, stake_signature, client_seed)
            .await?;
        let outcome = reveal.verify(commitment, client_seed)?;

        tracing::info!("Round {} revealed: {}", commitment.round_id, outcome);
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{outcome_from_seeds, CommitmentScheme, HashCommitment};
    use chrono::Utc;
    use parking_lot::Mutex;

    /// Oracle that can be told to cheat
    struct TestOracle {
        server_seed: Vec<u8>,
        substitute_seed: Option<Vec<u8>>,
        round_id: Uuid,
        revealed: Mutex<Vec<TxSignature>>,
    }

    impl TestOracle {
        fn new(substitute_seed: Option<Vec<u8>>) -> Self {
            Self {
                server_seed: vec![42u8; 32],
                substitute_seed,
                round_id: Uuid::new_v4(),
                revealed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl RoundOracle for TestOracle {
        async fn open_round(&self) -> Result<RoundCommitment> {
            Ok(RoundCommitment {
                round_id: self.round_id,
                commitment: HashCommitment::commit(&self.server_seed),
                created_at: Utc::now(),
            })
        }

        async fn reveal_round(
            &self,
            round_id: Uuid,
            stake_signature: &TxSignature,
            client_seed: &[u8],
        ) -> Result<RoundReveal> {
            self.revealed.lock().push(*stake_signature);
            let server_seed = self
                .substitute_seed
                .clone()
                .unwrap_or_else(|| self.server_seed.clone());
            Ok(RoundReveal {
                round_id,
                outcome: outcome_from_seeds(&server_seed, client_seed),
                server_seed,
                client_seed: client_seed.to_vec(),
            })
        }
    }

    #[tokio::test]
    async fn test_committed_coin_round_trip() {
        let oracle = Arc::new(TestOracle::new(None));
        let coin = CommittedCoin::new(oracle.clone());
        let stake = TxSignature::new([1u8; 64]);

        let ticket = coin.prepare().await.unwrap();
        assert_eq!(ticket.round_id(), Some(oracle.round_id));

        let outcome = coin.draw(&ticket, &stake).await.unwrap();
        let DrawTicket::Committed { client_seed, .. } = &ticket else {
            panic!("expected a committed ticket");
        };
        assert_eq!(outcome, outcome_from_seeds(&oracle.server_seed, client_seed));
        assert_eq!(oracle.revealed.lock().as_slice(), &[stake]);
    }

    #[tokio::test]
    async fn test_committed_coin_detects_seed_swap() {
        let oracle = Arc::new(TestOracle::new(Some(vec![0u8; 32])));
        let coin = CommittedCoin::new(oracle);

        let ticket = coin.prepare().await.unwrap();
        let result = coin.draw(&ticket, &TxSignature::new([1u8; 64])).await;
        assert!(matches!(result, Err(WagerError::InvalidCommitment)));
    }

    #[tokio::test]
    async fn test_committed_coin_needs_committed_ticket() {
        let coin = CommittedCoin::new(Arc::new(TestOracle::new(None)));
        let result = coin.draw(&DrawTicket::Local, &TxSignature::new([1u8; 64])).await;
        assert!(matches!(result, Err(WagerError::Round(_))));
    }

    #[tokio::test]
    async fn test_local_coin_lands_both_ways() {
        let coin = LocalCoin;
        let sig = TxSignature::new([0u8; 64]);
        let mut seen = Vec::new();
        for _ in 0..200 {
            seen.push(coin.draw(&DrawTicket::Local, &sig).await.unwrap());
        }
        assert!(seen.contains(&Side::Heads));
        assert!(seen.contains(&Side::Tails));
    }
}
