//! Client side of the exchange: pick a stake and a side, send the stake,
//! wait for it to land, draw, and ask for the payout on a win.

use crate::error::{Result, WagerError};
use crate::outcome::{DrawTicket, OutcomeSource};
use crate::settlement::{PayoutReceipt, PayoutRequest, Settlement};
use crate::stake::{Side, Stake};
use flip_core::{
    Amount, CommitmentLevel, Ledger, NetworkConfig, Pubkey, TransferInstruction, TxSignature,
    WalletSigner,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use uuid::Uuid;

pub const LOSS_MESSAGE: &str = "You Lost. Better luck next time";

pub fn win_message(stake: Stake) -> String {
    format!(
        "Congrats! You won an amount of {} SOL",
        stake.announced_winnings()
    )
}

/// Returns the submitter to idle however the wager future ends
struct CycleGuard<'a> {
    submitter: &'a WagerSubmitter,
    finished: bool,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            let phase = self.submitter.view.borrow().phase;
            tracing::warn!("Wager abandoned in phase {:?}, resetting", phase);
        }
        self.submitter.reset();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerPhase {
    #[default]
    Idle,
    StakeSubmitted,
    StakeConfirmed,
    OutcomeDrawn,
    PayoutRequested,
    PayoutAcknowledged,
}

/// Snapshot a front end renders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerView {
    pub phase: WagerPhase,
    pub stake: Option<Stake>,
    pub prediction: Option<Side>,
    pub outcome: Option<Side>,
    pub message: Option<String>,
    pub in_flight: bool,
    pub balance: Option<Amount>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeOption {
    pub stake: Stake,
    pub enabled: bool,
}

/// How a finished cycle ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WagerResult {
    Won(PayoutReceipt),
    Lost,
    /// Won, payout recorded but its submission failed; it will be retried
    PayoutDelayed { payout_id: Uuid },
    /// Won, but the platform could not cover it
    PayoutUnavailable,
    PayoutRejected,
    /// Stopped before an outcome existed
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WagerReport {
    pub stake: Stake,
    pub prediction: Side,
    pub stake_signature: Option<TxSignature>,
    pub outcome: Option<Side>,
    pub result: WagerResult,
    pub message: String,
}

/// The menu, each entry enabled iff affordable and nothing is in flight.
/// An unknown balance enables nothing.
pub fn stake_options(balance: Option<Amount>, in_flight: bool) -> Vec<StakeOption> {
    Stake::menu()
        .map(|stake| StakeOption {
            stake,
            enabled: !in_flight && balance.map_or(false, |b| stake.amount() <= b),
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub platform: Pubkey,
    pub commitment: CommitmentLevel,
    pub confirmation_timeout: Duration,
    pub reset_delay: Duration,
}

impl SubmitterConfig {
    pub fn new(platform: Pubkey) -> Self {
        Self {
            platform,
            commitment: CommitmentLevel::Confirmed,
            confirmation_timeout: Duration::from_secs(60),
            reset_delay: Duration::from_millis(2000),
        }
    }

    pub fn from_network(network: &NetworkConfig) -> Result<Self> {
        Ok(Self {
            commitment: network.commitment,
            confirmation_timeout: network.confirmation_timeout,
            ..Self::new(network.require_platform_wallet()?)
        })
    }
}

pub struct WagerSubmitter {
    wallet: Arc<dyn WalletSigner>,
    ledger: Arc<dyn Ledger>,
    settlement: Arc<dyn Settlement>,
    outcomes: Arc<dyn OutcomeSource>,
    config: SubmitterConfig,
    in_flight: AtomicBool,
    view: watch::Sender<WagerView>,
}

impl WagerSubmitter {
    pub fn new(
        wallet: Arc<dyn WalletSigner>,
        ledger: Arc<dyn Ledger>,
        settlement: Arc<dyn Settlement>,
        outcomes: Arc<dyn OutcomeSource>,
        config: SubmitterConfig,
    ) -> Self {
        let (view, _) = watch::channel(WagerView::default());
        Self {
            wallet,
            ledger,
            settlement,
            outcomes,
            config,
            in_flight: AtomicBool::new(false),
            view,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WagerView> {
        self.view.subscribe()
    }

    pub fn view(&self) -> WagerView {
        self.view.borrow().clone()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn address(&self) -> Pubkey {
        self.wallet.address()
    }

    pub async fn refresh_balance(&self) -> Result<Amount> {
        let balance = self.ledger.get_balance(&self.wallet.address()).await?;
        self.view.send_modify(|v| v.balance = Some(balance));
        Ok(balance)
    }

    pub fn stake_options(&self) -> Vec<StakeOption> {
        let balance = self.view.borrow().balance;
        stake_options(balance, self.is_in_flight())
    }

    pub fn select_stake(&self, stake: Stake) -> Result<()> {
        if self.is_in_flight() {
            return Err(WagerError::WagerInFlight);
        }

        let balance = self
            .view
            .borrow()
            .balance
            .ok_or_else(|| WagerError::input_rejected("balance has not been fetched"))?;
        if stake.amount() > balance {
            return Err(WagerError::input_rejected(format!(
                "stake of {} SOL exceeds balance of {} SOL",
                stake, balance
            )));
        }

        self.view.send_modify(|v| v.stake = Some(stake));
        Ok(())
    }

    pub fn select_prediction(&self, side: Side) -> Result<()> {
        if self.is_in_flight() {
            return Err(WagerError::WagerInFlight);
        }
        if self.view.borrow().stake.is_none() {
            return Err(WagerError::input_rejected("select a stake first"));
        }

        self.view.send_modify(|v| v.prediction = Some(side));
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        let view = self.view.borrow();
        view.stake.is_some() && view.prediction.is_some() && !self.is_in_flight()
    }

    /// Run one full cycle. Always ends back in `Idle` after the reset delay.
    pub async fn submit_wager(&self) -> Result<WagerReport> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(WagerError::WagerInFlight);
        }

        let selection = {
            let view = self.view.borrow();
            view.stake.zip(view.prediction)
        };
        let Some((stake, prediction)) = selection else {
            self.in_flight.store(false, Ordering::Release);
            return Err(WagerError::input_rejected(
                "select a stake and a prediction first",
            ));
        };

        let mut guard = CycleGuard {
            submitter: self,
            finished: false,
        };

        self.view.send_modify(|v| {
            v.in_flight = true;
            v.outcome = None;
            v.message = None;
        });

        let report = self.run_cycle(stake, prediction).await;
        self.view
            .send_modify(|v| v.message = Some(report.message.clone()));

        tokio::time::sleep(self.config.reset_delay).await;
        guard.finished = true;
        Ok(report)
    }

    fn reset(&self) {
        self.view.send_modify(|v| {
            *v = WagerView::default();
        });
        self.in_flight.store(false, Ordering::Release);
    }

    fn set_phase(&self, phase: WagerPhase) {
        self.view.send_modify(|v| v.phase = phase);
    }

    async fn run_cycle(&self, stake: Stake, prediction: Side) -> WagerReport {
        let mut report = WagerReport {
            stake,
            prediction,
            stake_signature: None,
            outcome: None,
            result: WagerResult::Aborted,
            message: String::new(),
        };

        let ticket = match self.outcomes.prepare().await {
            Ok(ticket) => ticket,
            Err(e) => {
                report.message = format!("Wager not started, the draw could not be prepared: {}", e);
                return report;
            }
        };

        let instruction =
            TransferInstruction::new(self.wallet.address(), self.config.platform, stake.amount());
        let signature = match self.wallet.sign_and_send(&instruction).await {
            Ok(signature) => signature,
            Err(e) => {
                tracing::warn!("Stake of {} SOL not sent: {}", stake, e);
                report.message = format!("Stake transfer failed: {}", e);
                return report;
            }
        };
        report.stake_signature = Some(signature);
        self.set_phase(WagerPhase::StakeSubmitted);

        if let Err(e) = self
            .ledger
            .await_confirmation(
                &signature,
                self.config.commitment,
                self.config.confirmation_timeout,
            )
            .await
        {
            tracing::warn!("Stake {} did not confirm: {}", signature, e);
            report.message = format!("Stake transfer pending or failed: {}", e);
            return report;
        }
        self.set_phase(WagerPhase::StakeConfirmed);

        let outcome = match self.outcomes.draw(&ticket, &signature).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Stake {} confirmed but no outcome: {}", signature, e);
                report.message = format!(
                    "Stake confirmed but the outcome could not be determined: {}",
                    e
                );
                return report;
            }
        };
        report.outcome = Some(outcome);
        self.view.send_modify(|v| {
            v.phase = WagerPhase::OutcomeDrawn;
            v.outcome = Some(outcome);
        });
        tracing::info!(
            "Wager {} SOL on {}: coin landed {}",
            stake,
            prediction,
            outcome
        );

        if outcome != prediction {
            report.result = WagerResult::Lost;
            report.message = LOSS_MESSAGE.to_string();
            return report;
        }

        self.request_payout(stake, prediction, signature, &ticket, &mut report)
            .await;
        report
    }

    async fn request_payout(
        &self,
        stake: Stake,
        prediction: Side,
        stake_signature: TxSignature,
        ticket: &DrawTicket,
        report: &mut WagerReport,
    ) {
        self.set_phase(WagerPhase::PayoutRequested);

        let mut request = PayoutRequest::new(stake, self.wallet.address(), prediction)
            .with_stake_tx(stake_signature);
        if let Some(round) = ticket.round_id() {
            request = request.with_round(round);
        }

        match self.settlement.payout(request).await {
            Ok(receipt) => {
                self.set_phase(WagerPhase::PayoutAcknowledged);
                report.result = WagerResult::Won(receipt);
                report.message = win_message(stake);
            }
            Err(WagerError::InsufficientPlatformFunds { need, available }) => {
                report.result = WagerResult::PayoutUnavailable;
                report.message = format!(
                    "You won, but the platform cannot cover the {} SOL payout right now (holds {} SOL)",
                    need, available
                );
            }
            Err(WagerError::PayoutSubmission { payout_id, reason }) => {
                report.result = WagerResult::PayoutDelayed { payout_id };
                report.message = format!(
                    "You won! Payout {} is delayed and will be retried: {}",
                    payout_id, reason
                );
            }
            Err(e) => {
                report.result = WagerResult::PayoutRejected;
                report.message = format!("You won, but the payout was rejected: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::outcome::CommittedCoin;
    use crate::settlement::tests::fixture;
    use crate::settlement::SettlementConfig;
    use async_trait::async_trait;
    use flip_core::{Cluster, Keypair, LocalWallet, MemoryLedger};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use tokio::time::Instant;

    /// Lands a scripted sequence and counts draws
    #[derive(Default)]
    struct ScriptedCoin {
        script: Mutex<VecDeque<Side>>,
        draws: AtomicUsize,
    }

    impl ScriptedCoin {
        fn landing(sides: &[Side]) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(sides.iter().copied().collect()),
                draws: AtomicUsize::new(0),
            })
        }

        fn draws(&self) -> usize {
            self.draws.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl OutcomeSource for ScriptedCoin {
        async fn prepare(&self) -> Result<DrawTicket> {
            Ok(DrawTicket::Local)
        }

        async fn draw(&self, _: &DrawTicket, _: &TxSignature) -> Result<Side> {
            self.draws.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .pop_front()
                .ok_or_else(|| WagerError::internal("script exhausted"))
        }
    }

    /// Acknowledges every payout and remembers the requests
    #[derive(Default)]
    struct RecordingSettlement {
        requests: Mutex<Vec<PayoutRequest>>,
    }

    #[async_trait]
    impl Settlement for RecordingSettlement {
        async fn payout(&self, request: PayoutRequest) -> Result<PayoutReceipt> {
            let amount = request.stake.payout_amount();
            self.requests.lock().push(request);
            Ok(PayoutReceipt {
                payout_id: Uuid::new_v4(),
                amount,
                status: flip_core::storage::PayoutStatus::Submitted,
                signature: None,
            })
        }
    }

    fn player(ledger: &Arc<MemoryLedger>, sol: &str) -> Arc<LocalWallet> {
        let wallet = Arc::new(LocalWallet::new(
            "w".to_string(),
            "player".to_string(),
            Keypair::from_seed(&[21u8; 32]),
            Cluster::Localnet,
            ledger.clone(),
        ));
        ledger.set_balance(wallet.pubkey(), Amount::from_sol_str(sol).unwrap());
        wallet
    }

    fn config(platform: Pubkey) -> SubmitterConfig {
        SubmitterConfig {
            confirmation_timeout: Duration::from_secs(5),
            ..SubmitterConfig::new(platform)
        }
    }

    struct Rig {
        ledger: Arc<MemoryLedger>,
        coin: Arc<ScriptedCoin>,
        settlement: Arc<RecordingSettlement>,
        submitter: Arc<WagerSubmitter>,
    }

    fn build_rig(balance: &str, sides: &[Side]) -> Rig {
        let ledger = Arc::new(MemoryLedger::new());
        let wallet = player(&ledger, balance);
        let coin = ScriptedCoin::landing(sides);
        let settlement = Arc::new(RecordingSettlement::default());
        let submitter = Arc::new(WagerSubmitter::new(
            wallet,
            ledger.clone(),
            settlement.clone(),
            coin.clone(),
            config(Pubkey::new([99u8; 32])),
        ));
        Rig {
            ledger,
            coin,
            settlement,
            submitter,
        }
    }

    async fn place(submitter: &WagerSubmitter, stake: &str, side: Side) -> WagerReport {
        submitter.refresh_balance().await.unwrap();
        submitter.select_stake(Stake::from_sol_str(stake).unwrap()).unwrap();
        submitter.select_prediction(side).unwrap();
        submitter.submit_wager().await.unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_can_submit_needs_both_selections_and_idle() {
        let rig = build_rig("5", &[Side::Heads]);
        let s = rig.submitter.clone();
        assert!(!s.can_submit());

        s.refresh_balance().await.unwrap();
        assert!(s.select_prediction(Side::Heads).is_err());
        s.select_stake(Stake::from_sol_str("1").unwrap()).unwrap();
        assert!(!s.can_submit());
        s.select_prediction(Side::Heads).unwrap();
        assert!(s.can_submit());

        let running = tokio::spawn({
            let s = s.clone();
            async move { s.submit_wager().await }
        });
        while !s.is_in_flight() {
            tokio::task::yield_now().await;
        }

        assert!(!s.can_submit());
        assert!(matches!(s.submit_wager().await, Err(WagerError::WagerInFlight)));
        assert!(matches!(
            s.select_stake(Stake::from_sol_str("0.1").unwrap()),
            Err(WagerError::WagerInFlight)
        ));
        assert!(s.stake_options().iter().all(|o| !o.enabled));

        running.await.unwrap().unwrap();
        assert!(!s.can_submit());
        assert_eq!(s.view(), WagerView::default());
    }

    #[tokio::test]
    async fn test_stake_options_follow_balance() {
        let rig = build_rig("0.5", &[]);
        let s = &rig.submitter;
        assert!(s.stake_options().iter().all(|o| !o.enabled));

        s.refresh_balance().await.unwrap();
        let enabled: Vec<String> = s
            .stake_options()
            .iter()
            .filter(|o| o.enabled)
            .map(|o| o.stake.to_string())
            .collect();
        assert_eq!(enabled, vec!["0.1", "0.2", "0.3", "0.5"]);

        let result = s.select_stake(Stake::from_sol_str("1").unwrap());
        assert!(matches!(result, Err(WagerError::InputRejected(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_draw_without_confirmation() {
        // held: never confirms
        let rig = build_rig("5", &[Side::Heads]);
        rig.ledger.hold_confirmations(true);
        let report = place(&rig.submitter, "1", Side::Heads).await;
        assert_eq!(report.result, WagerResult::Aborted);
        assert!(report.message.starts_with("Stake transfer pending or failed"));
        assert_eq!(rig.coin.draws(), 0);

        // lands with an error
        let rig_rejected = rig_with_rejection();
        let report = place(&rig_rejected.submitter, "1", Side::Heads).await;
        assert!(report.message.starts_with("Stake transfer pending or failed"));
        assert_eq!(rig_rejected.coin.draws(), 0);

        // never leaves the wallet
        let rig = build_rig("5", &[Side::Heads]);
        rig.ledger.fail_next_submissions(1);
        let report = place(&rig.submitter, "1", Side::Heads).await;
        assert!(report.message.starts_with("Stake transfer failed"));
        assert_eq!(report.stake_signature, None);
        assert_eq!(rig.coin.draws(), 0);
        assert!(rig.settlement.requests.lock().is_empty());
        assert_eq!(rig.submitter.view().phase, WagerPhase::Idle);
    }

    fn rig_with_rejection() -> Rig {
        let rig = build_rig("5", &[Side::Heads]);
        rig.ledger.reject_transactions(Some("blockhash not found"));
        rig
    }

    #[tokio::test(start_paused = true)]
    async fn test_payout_requested_iff_prediction_matches() {
        let outcomes = [
            Side::Heads,
            Side::Tails,
            Side::Tails,
            Side::Heads,
            Side::Heads,
            Side::Tails,
            Side::Heads,
            Side::Tails,
        ];
        let rig = build_rig("100", &outcomes);

        let mut expected_wins = 0;
        for (i, landed) in outcomes.iter().enumerate() {
            let prediction = if i % 3 == 0 { Side::Heads } else { Side::Tails };
            let report = place(&rig.submitter, "0.2", prediction).await;

            assert_eq!(report.outcome, Some(*landed));
            if *landed == prediction {
                expected_wins += 1;
                assert!(matches!(report.result, WagerResult::Won(_)));
            } else {
                assert_eq!(report.result, WagerResult::Lost);
            }
            assert_eq!(rig.settlement.requests.lock().len(), expected_wins);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_wager_returns_to_idle() {
        let rig = build_rig("5", &[Side::Heads]);
        rig.ledger.hold_confirmations(true);
        let s = &rig.submitter;
        s.refresh_balance().await.unwrap();
        s.select_stake(Stake::from_sol_str("1").unwrap()).unwrap();
        s.select_prediction(Side::Heads).unwrap();

        // caller gives up while the stake is still unconfirmed
        let abandoned = tokio::time::timeout(Duration::from_secs(1), s.submit_wager()).await;
        assert!(abandoned.is_err());

        assert!(!s.is_in_flight());
        assert_eq!(s.view(), WagerView::default());
        assert_eq!(rig.coin.draws(), 0);

        rig.ledger.release_held();
        let report = place(s, "1", Side::Heads).await;
        assert!(matches!(report.result, WagerResult::Won(_)));
        assert_eq!(rig.settlement.requests.lock().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_loss_sends_nothing_back() {
        let rig = build_rig("5", &[Side::Heads]);
        let report = place(&rig.submitter, "0.3", Side::Tails).await;

        assert_eq!(report.message, LOSS_MESSAGE);
        assert_eq!(report.result, WagerResult::Lost);
        assert!(rig.settlement.requests.lock().is_empty());
        assert_eq!(
            rig.ledger.balance_of(&rig.submitter.address()).to_string(),
            "4.7"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_resets_to_idle_after_delay() {
        let rig = build_rig("5", &[Side::Heads]);
        let mut views = rig.submitter.subscribe();

        let started = Instant::now();
        let report = place(&rig.submitter, "1", Side::Heads).await;
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert_eq!(report.message, "Congrats! You won an amount of 2 SOL");

        let view = views.borrow_and_update().clone();
        assert_eq!(view, WagerView::default());
        assert!(!rig.submitter.is_in_flight());
    }

    #[tokio::test(start_paused = true)]
    async fn test_win_against_real_authority() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let wallet = Arc::new(LocalWallet::new(
            "w".to_string(),
            "player".to_string(),
            Keypair::from_seed(&[11u8; 32]),
            Cluster::Localnet,
            fx.ledger.clone(),
        ));
        let coin = ScriptedCoin::landing(&[Side::Heads]);
        let submitter = WagerSubmitter::new(
            wallet.clone(),
            fx.ledger.clone(),
            fx.authority.clone(),
            coin,
            config(fx.authority.platform_address()),
        );

        let report = place(&submitter, "1", Side::Heads).await;
        let WagerResult::Won(receipt) = &report.result else {
            panic!("expected a win, got {:?}", report.result);
        };
        assert_eq!(receipt.amount.to_string(), "1.97");
        assert!(report.message.contains("won an amount of 2"));

        // fixture funds the player with 5
        assert_eq!(fx.ledger.balance_of(&wallet.pubkey()).to_string(), "5.97");
        let record = fx
            .authority
            .payout_for_stake(&report.stake_signature.unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.stake.to_string(), "1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_win_with_empty_platform_pays_nothing() {
        let fx = fixture(SettlementConfig::default(), "0.05").await;
        let wallet = Arc::new(LocalWallet::new(
            "w".to_string(),
            "player".to_string(),
            Keypair::from_seed(&[11u8; 32]),
            Cluster::Localnet,
            fx.ledger.clone(),
        ));
        let submitter = WagerSubmitter::new(
            wallet,
            fx.ledger.clone(),
            fx.authority.clone(),
            ScriptedCoin::landing(&[Side::Tails]),
            config(fx.authority.platform_address()),
        );

        let report = place(&submitter, "1", Side::Tails).await;
        assert_eq!(report.result, WagerResult::PayoutUnavailable);
        assert!(!report.message.contains("Congrats"));
        assert_eq!(fx.payouts_sent(), 0);
        assert!(fx.authority.list_payouts(10).await.unwrap().is_empty());
    }

    /// Lets the stake through, then breaks the first payout submission
    struct FlakySettlement {
        inner: Arc<crate::settlement::SettlementAuthority>,
        ledger: Arc<MemoryLedger>,
    }

    #[async_trait]
    impl Settlement for FlakySettlement {
        async fn payout(&self, request: PayoutRequest) -> Result<PayoutReceipt> {
            self.ledger.fail_next_submissions(1);
            self.inner.payout(request).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_payout_is_reported() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let wallet = Arc::new(LocalWallet::new(
            "w".to_string(),
            "player".to_string(),
            Keypair::from_seed(&[11u8; 32]),
            Cluster::Localnet,
            fx.ledger.clone(),
        ));
        let settlement = Arc::new(FlakySettlement {
            inner: fx.authority.clone(),
            ledger: fx.ledger.clone(),
        });
        let submitter = WagerSubmitter::new(
            wallet,
            fx.ledger.clone(),
            settlement,
            ScriptedCoin::landing(&[Side::Heads]),
            config(fx.authority.platform_address()),
        );

        let report = place(&submitter, "0.5", Side::Heads).await;
        let WagerResult::PayoutDelayed { payout_id } = report.result else {
            panic!("expected a delayed payout, got {:?}", report.result);
        };
        assert!(report.message.contains("delayed and will be retried"));

        let record = fx.authority.payout_status(payout_id).await.unwrap();
        assert_eq!(record.status, flip_core::storage::PayoutStatus::Queued);
        assert_eq!(fx.payouts_sent(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_committed_round_end_to_end() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let wallet = Arc::new(LocalWallet::new(
            "w".to_string(),
            "player".to_string(),
            Keypair::from_seed(&[11u8; 32]),
            Cluster::Localnet,
            fx.ledger.clone(),
        ));
        let submitter = WagerSubmitter::new(
            wallet,
            fx.ledger.clone(),
            fx.authority.clone(),
            Arc::new(CommittedCoin::new(fx.authority.clone())),
            config(fx.authority.platform_address()),
        );

        let report = place(&submitter, "0.1", Side::Heads).await;
        match report.outcome {
            Some(Side::Heads) => assert!(matches!(report.result, WagerResult::Won(_))),
            Some(Side::Tails) => assert_eq!(report.result, WagerResult::Lost),
            None => panic!("no outcome: {}", report.message),
        }
    }
}
