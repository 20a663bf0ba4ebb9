use flip_core::{Amount, CoreError};
use thiserror::Error;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, WagerError>;

#[derive(Error, Debug)]
pub enum WagerError {
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    #[error("Input rejected: {0}")]
    InputRejected(String),

    #[error("A wager is already in flight")]
    WagerInFlight,

    #[error("Insufficient platform funds: need {need} SOL, have {available} SOL")]
    InsufficientPlatformFunds { need: Amount, available: Amount },

    #[error("Payout {payout_id} not submitted: {reason}")]
    PayoutSubmission { payout_id: Uuid, reason: String },

    #[error("Payout not found: {0}")]
    PayoutNotFound(Uuid),

    #[error("Not a winning wager: {0}")]
    NotAWinner(String),

    #[error("Stake proof rejected: {0}")]
    StakeProof(String),

    #[error("Round error: {0}")]
    Round(String),

    #[error("Invalid commitment")]
    InvalidCommitment,

    #[error("Settlement service error: {0}")]
    Remote(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for WagerError {
    fn from(err: reqwest::Error) -> Self {
        WagerError::Core(err.into())
    }
}

impl WagerError {
    pub fn input_rejected(msg: impl Into<String>) -> Self {
        Self::InputRejected(msg.into())
    }

    pub fn stake_proof(msg: impl Into<String>) -> Self {
        Self::StakeProof(msg.into())
    }

    pub fn round(msg: impl Into<String>) -> Self {
        Self::Round(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}
