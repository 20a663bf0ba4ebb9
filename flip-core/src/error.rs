use thiserror::Error;

pub type Result<T> = std::result::Result<T, CoreError>;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Network connection error: {0}")]
    NetworkConnection(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Insufficient funds: need {need}, have {available}")]
    InsufficientFunds { need: u64, available: u64 },

    #[error("Wallet not found: {name}")]
    WalletNotFound { name: String },

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Transfer rejected by signer: {0}")]
    Rejected(String),

    #[error("Transaction {signature} failed: {reason}")]
    TransactionFailed { signature: String, reason: String },

    #[error("Confirmation timeout after {waited_ms} ms for {signature}")]
    ConfirmationTimeout { signature: String, waited_ms: u64 },

    #[error("Encryption error: {0}")]
    Crypto(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn wallet(msg: impl Into<String>) -> Self {
        Self::Wallet(msg.into())
    }

    pub fn ledger(msg: impl Into<String>) -> Self {
        Self::Ledger(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn network_connection(msg: impl Into<String>) -> Self {
        Self::NetworkConnection(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        CoreError::NetworkConnection(err.to_string())
    }
}
