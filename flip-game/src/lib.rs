//! Coin-flip wager exchange
//!
//! A player stakes a menu amount on heads or tails. The stake is sent to the
//! platform wallet and must be confirmed before the coin is drawn. On a win
//! the settlement authority pays `stake * 1.97` back from the platform wallet.
//!
//! - [`WagerSubmitter`] is the client side: selection, stake, draw, payout request.
//! - [`SettlementAuthority`] holds the platform key and pays winners, once per stake.
//! - [`PayoutWorker`] retries and confirms payouts the authority queued.
//! - [`service`] puts the authority behind HTTP; [`RemoteSettlement`] is the
//!   player-side client, so only the service process loads the platform key.

pub mod commitment;
pub mod error;
pub mod outcome;
pub mod service;
pub mod settlement;
pub mod stake;
pub mod submitter;

pub use commitment::{CommitmentScheme, HashCommitment, RoundCommitment, RoundReveal};
pub use error::{Result, WagerError};
pub use outcome::{CommittedCoin, DrawTicket, LocalCoin, OutcomeSource, RoundOracle};
pub use service::{RemoteSettlement, ServiceInfo};
pub use settlement::{
    PayoutReceipt, PayoutRequest, PayoutWorker, Settlement, SettlementAuthority,
    SettlementConfig, SigningContext, WorkerReport,
};
pub use stake::{Side, Stake};
pub use submitter::{
    stake_options, StakeOption, SubmitterConfig, WagerPhase, WagerReport, WagerResult,
    WagerSubmitter, WagerView,
};

use flip_core::storage::Storage;
use flip_core::{Ledger, NetworkConfig};
use std::sync::Arc;

/// Build the authority for `network`, loading the platform key from the environment
pub fn authority_from_env(
    network: &NetworkConfig,
    ledger: Arc<dyn Ledger>,
    storage: Arc<Storage>,
) -> Result<SettlementAuthority> {
    let signer = SigningContext::from_env(network.platform_wallet)?;
    let config = SettlementConfig {
        commitment: network.commitment,
        ..SettlementConfig::default()
    };
    SettlementAuthority::new(signer, ledger, storage, config)
}
