use crate::error::Result;
use crate::settlement::SettlementAuthority;
use chrono::{DateTime, Utc};
use flip_core::storage::{PayoutStatus, PayoutStore};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;

/// What one pass over the payout queue did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerReport {
    pub confirmed: usize,
    pub requeued: usize,
    pub resubmitted: usize,
    pub failed: usize,
}

/// Drives queued and submitted payouts to a final state
pub struct PayoutWorker {
    authority: Arc<SettlementAuthority>,
}

impl PayoutWorker {
    pub fn new(authority: Arc<SettlementAuthority>) -> Self {
        Self { authority }
    }

    pub async fn run_once(&self) -> Result<WorkerReport> {
        self.run_once_at(Utc::now()).await
    }

    pub async fn run_once_at(&self, now: DateTime<Utc>) -> Result<WorkerReport> {
        let mut report = WorkerReport::default();
        self.poll_submitted(now, &mut report).await?;
        self.resubmit_due(now, &mut report).await?;

        if report != WorkerReport::default() {
            tracing::info!(
                "Payout worker: {} confirmed, {} requeued, {} resubmitted, {} failed",
                report.confirmed,
                report.requeued,
                report.resubmitted,
                report.failed
            );
        }
        Ok(report)
    }

    async fn poll_submitted(&self, now: DateTime<Utc>, report: &mut WorkerReport) -> Result<()> {
        let authority = &self.authority;
        let config = authority.config();
        let in_flight = PayoutStore::new(authority.storage()).in_flight().await?;

        for mut record in in_flight {
            let Some(signature) = record.payout_signature else {
                continue;
            };

            let status = match authority.ledger().signature_status(&signature).await {
                Ok(status) => status,
                Err(e) => {
                    tracing::warn!("Could not poll payout {}: {}", record.id, e);
                    continue;
                }
            };

            match status {
                Some(status) if status.err.is_some() => {
                    let reason = status.err.unwrap_or_default();
                    authority.schedule_retry(
                        &mut record,
                        format!("payout transaction failed: {}", reason),
                        now,
                    );
                }
                Some(status) if status.reached(config.commitment) => {
                    record.status = PayoutStatus::Confirmed;
                    tracing::info!("Payout {} confirmed: {}", record.id, signature);
                }
                _ => {
                    let submitted_at = record.submitted_at.unwrap_or(record.updated_at);
                    let waited = (now - submitted_at).to_std().unwrap_or_default();
                    if waited < config.resubmit_after {
                        continue;
                    }
                    authority.schedule_retry(
                        &mut record,
                        format!("not {} after {:?}", config.commitment.as_str(), waited),
                        now,
                    );
                }
            }

            match record.status {
                PayoutStatus::Confirmed => report.confirmed += 1,
                PayoutStatus::Failed => report.failed += 1,
                _ => report.requeued += 1,
            }
            PayoutStore::new(authority.storage()).update(&record).await?;
        }

        Ok(())
    }

    async fn resubmit_due(&self, now: DateTime<Utc>, report: &mut WorkerReport) -> Result<()> {
        let due = PayoutStore::new(self.authority.storage()).due(now).await?;

        for mut record in due {
            match self.authority.submit_record(&mut record, now).await {
                Ok(_) => report.resubmitted += 1,
                Err(_) if record.status == PayoutStatus::Failed => report.failed += 1,
                Err(_) => {}
            }
        }

        Ok(())
    }

    /// Loop `run_once` on the configured interval until `shutdown` resolves
    pub async fn run<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut ticker = tokio::time::interval(self.authority.config().worker_interval);

        tracing::info!(
            "Payout worker started for {} (every {:?})",
            self.authority.platform_address(),
            self.authority.config().worker_interval
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Payout worker stopping");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_once().await {
                        tracing::warn!("Payout worker pass failed: {}", e);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::tests::fixture;
    use crate::settlement::{PayoutRequest, Settlement, SettlementConfig};
    use crate::stake::{Side, Stake};
    use crate::WagerError;
    use chrono::Duration;

    fn one_sol() -> Stake {
        Stake::from_sol_str("1").unwrap()
    }

    #[tokio::test]
    async fn test_retries_with_backoff_then_confirms() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let worker = PayoutWorker::new(fx.authority.clone());
        let stake_tx = fx.stake(one_sol()).await;

        fx.ledger.fail_next_submissions(2);
        let request =
            PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Heads).with_stake_tx(stake_tx);
        let payout_id = match fx.authority.payout(request).await {
            Err(WagerError::PayoutSubmission { payout_id, .. }) => payout_id,
            other => panic!("expected a delayed payout, got {:?}", other),
        };

        // not due yet
        let now = Utc::now();
        assert_eq!(worker.run_once_at(now).await.unwrap(), WorkerReport::default());

        // second attempt fails too, backoff doubles
        let report = worker.run_once_at(now + Duration::seconds(3)).await.unwrap();
        assert_eq!(report.resubmitted, 0);
        let record = fx.authority.payout_status(payout_id).await.unwrap();
        assert_eq!(record.attempts, 2);
        assert!(record.next_attempt_at >= now + Duration::seconds(6));

        let later = now + Duration::seconds(10);
        let report = worker.run_once_at(later).await.unwrap();
        assert_eq!(report.resubmitted, 1);

        let report = worker.run_once_at(later).await.unwrap();
        assert_eq!(report.confirmed, 1);

        let record = fx.authority.payout_status(payout_id).await.unwrap();
        assert_eq!(record.status, PayoutStatus::Confirmed);
        assert_eq!(record.attempts, 3);
        assert_eq!(fx.payouts_sent(), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let config = SettlementConfig {
            max_attempts: 2,
            require_stake_proof: false,
            ..SettlementConfig::default()
        };
        let fx = fixture(config, "10").await;
        let worker = PayoutWorker::new(fx.authority.clone());

        fx.ledger.fail_next_submissions(5);
        let request = PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Tails);
        assert!(fx.authority.payout(request).await.is_err());

        let report = worker
            .run_once_at(Utc::now() + Duration::minutes(10))
            .await
            .unwrap();
        assert_eq!(report.failed, 1);

        let payouts = fx.authority.list_payouts(10).await.unwrap();
        assert_eq!(payouts[0].status, PayoutStatus::Failed);
        assert_eq!(payouts[0].attempts, 2);
    }

    #[tokio::test]
    async fn test_landed_error_requeues_and_stale_submissions_resend() {
        let config = SettlementConfig {
            require_stake_proof: false,
            ..SettlementConfig::default()
        };
        let fx = fixture(config, "10").await;
        let worker = PayoutWorker::new(fx.authority.clone());
        let request = PayoutRequest::new(one_sol(), fx.player.pubkey(), Side::Heads);

        // lands with an execution error
        fx.ledger.reject_transactions(Some("account in use"));
        let rejected = fx.authority.payout(request.clone()).await.unwrap();
        fx.ledger.reject_transactions(None);

        // lands but never confirms
        fx.ledger.hold_confirmations(true);
        let held = fx.authority.payout(request).await.unwrap();

        let now = Utc::now();
        let report = worker.run_once_at(now).await.unwrap();
        assert_eq!(report.requeued, 1);
        let record = fx.authority.payout_status(rejected.payout_id).await.unwrap();
        assert_eq!(record.status, PayoutStatus::Queued);
        assert!(record.last_error.unwrap().contains("account in use"));

        // held one stays put until the resubmit window passes
        let record = fx.authority.payout_status(held.payout_id).await.unwrap();
        assert_eq!(record.status, PayoutStatus::Submitted);

        // the stale one backs off like any other failure
        let report = worker
            .run_once_at(now + Duration::seconds(150))
            .await
            .unwrap();
        assert_eq!(report.requeued, 1);
        assert_eq!(report.resubmitted, 1);

        let record = fx.authority.payout_status(held.payout_id).await.unwrap();
        assert_eq!(record.status, PayoutStatus::Queued);
        assert!(record.last_error.unwrap().starts_with("not confirmed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let fx = fixture(SettlementConfig::default(), "10").await;
        let worker = PayoutWorker::new(fx.authority.clone());

        let shutdown = tokio::time::sleep(std::time::Duration::from_secs(30));
        worker.run(shutdown).await.unwrap();
    }
}
