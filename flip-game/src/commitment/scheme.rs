use crate::commitment::outcome_from_seeds;
use crate::error::{Result, WagerError};
use crate::stake::Side;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Trait for commitment schemes
pub trait CommitmentScheme {
    type Secret: ?Sized;
    type Commitment;

    fn commit(secret: &Self::Secret) -> Self::Commitment;
    fn verify(commitment: &Self::Commitment, secret: &Self::Secret) -> bool;
}

/// Published by the settlement side before any stake moves
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundCommitment {
    pub round_id: Uuid,
    /// hex sha256 of the server seed
    pub commitment: String,
    pub created_at: DateTime<Utc>,
}

/// The opened round, bound to one stake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundReveal {
    pub round_id: Uuid,
    #[serde(with = "hex_bytes")]
    pub server_seed: Vec<u8>,
    #[serde(with = "hex_bytes")]
    pub client_seed: Vec<u8>,
    pub outcome: Side,
}

impl RoundReveal {
    /// Check the reveal against what was committed and what the client sent.
    /// Returns the recomputed outcome.
    pub fn verify(&self, commitment: &RoundCommitment, client_seed: &[u8]) -> Result<Side> {
        if self.round_id != commitment.round_id {
            return Err(WagerError::round(format!(
                "reveal is for round {}, expected {}",
                self.round_id, commitment.round_id
            )));
        }

        if !super::HashCommitment::verify(&commitment.commitment, &self.server_seed) {
            return Err(WagerError::InvalidCommitment);
        }

        if self.client_seed != client_seed {
            return Err(WagerError::round("reveal used a different client seed"));
        }

        let outcome = outcome_from_seeds(&self.server_seed, &self.client_seed);
        if outcome != self.outcome {
            return Err(WagerError::round(format!(
                "reveal claims {} but the seeds give {}",
                self.outcome, outcome
            )));
        }

        Ok(outcome)
    }
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        hex::decode(raw).map_err(serde::de::Error::custom)
    }
}
