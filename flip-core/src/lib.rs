//! flip-core - ledger-facing building blocks for the coin-flip exchange
//!
//! Amounts and addresses, ed25519 keys, the native transfer wire format,
//! a ledger client trait with JSON-RPC and in-memory backends, password
//! sealed player wallets and the SQLite store shared with the settlement side.

pub mod config;
pub mod error;
pub mod keys;
pub mod keystore;
pub mod ledger;
pub mod storage;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use config::{Cluster, NetworkConfig};
pub use error::{CoreError, Result};
pub use keys::Keypair;
pub use ledger::{Ledger, MemoryLedger, RpcLedger, TransferRecord, TxStatus};
pub use transaction::{SignedTransfer, TransferInstruction};
pub use types::{Amount, Blockhash, CommitmentLevel, Pubkey, TxSignature, LAMPORTS_PER_SOL};
pub use wallet::{LocalWallet, WalletManager, WalletSigner};
