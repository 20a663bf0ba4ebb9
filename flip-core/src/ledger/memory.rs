//! In-process ledger. Verifies signatures and moves balances synchronously,
//! with switches for the failure modes a real network produces.

use crate::error::{CoreError, Result};
use crate::ledger::{Ledger, TransferRecord, TxStatus};
use crate::transaction::SignedTransfer;
use crate::types::{Amount, Blockhash, CommitmentLevel, Pubkey, TxSignature};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Default)]
struct LedgerState {
    balances: HashMap<Pubkey, Amount>,
    transactions: HashMap<TxSignature, TransferRecord>,
    history: Vec<TxSignature>,
    blockhash_counter: u64,
    submissions: usize,
    fail_submissions: usize,
    hold_confirmations: bool,
    reject_transactions: Option<String>,
}

#[derive(Debug, Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, address: Pubkey, amount: Amount) {
        self.state.lock().balances.insert(address, amount);
    }

    pub fn balance_of(&self, address: &Pubkey) -> Amount {
        self.state
            .lock()
            .balances
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Make the next `count` submissions fail with a network error
    pub fn fail_next_submissions(&self, count: usize) {
        self.state.lock().fail_submissions = count;
    }

    /// Leave new transactions at `processed` so confirmation never arrives
    pub fn hold_confirmations(&self, hold: bool) {
        self.state.lock().hold_confirmations = hold;
    }

    /// Land new transactions with an execution error instead of applying them
    pub fn reject_transactions(&self, reason: Option<&str>) {
        self.state.lock().reject_transactions = reason.map(str::to_string);
    }

    /// Promote every held transaction to `confirmed`
    pub fn release_held(&self) {
        let mut state = self.state.lock();
        state.hold_confirmations = false;
        for record in state.transactions.values_mut() {
            if record.status.err.is_none()
                && record.status.level == Some(CommitmentLevel::Processed)
            {
                record.status.level = Some(CommitmentLevel::Confirmed);
            }
        }
    }

    /// Number of submission attempts, failed ones included
    pub fn submissions(&self) -> usize {
        self.state.lock().submissions
    }

    /// Accepted transfers in submission order
    pub fn transfers(&self) -> Vec<TransferRecord> {
        let state = self.state.lock();
        state
            .history
            .iter()
            .filter_map(|sig| state.transactions.get(sig).cloned())
            .collect()
    }

    /// Record a transfer that was never submitted through this ledger
    pub fn insert_transfer(&self, record: TransferRecord) {
        let mut state = self.state.lock();
        state.history.push(record.signature);
        state.transactions.insert(record.signature, record);
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<Amount> {
        Ok(self.balance_of(address))
    }

    async fn latest_blockhash(&self) -> Result<Blockhash> {
        let mut state = self.state.lock();
        state.blockhash_counter += 1;
        let mut bytes = [0u8; 32];
        bytes[..8].copy_from_slice(&state.blockhash_counter.to_le_bytes());
        Ok(Blockhash::new(bytes))
    }

    async fn submit_transfer(&self, transfer: &SignedTransfer) -> Result<TxSignature> {
        let mut state = self.state.lock();
        state.submissions += 1;

        if state.fail_submissions > 0 {
            state.fail_submissions -= 1;
            return Err(CoreError::network_connection("simulated submission failure"));
        }

        if !transfer.verify() {
            return Err(CoreError::Rpc {
                code: -32003,
                message: "Transaction signature verification failure".to_string(),
            });
        }

        if state.transactions.contains_key(&transfer.signature) {
            return Ok(transfer.signature);
        }

        let ix = transfer.instruction;
        let available = state.balances.get(&ix.from).copied().unwrap_or(Amount::ZERO);

        let err = if let Some(reason) = state.reject_transactions.clone() {
            Some(reason)
        } else if available < ix.amount {
            Some(format!(
                "insufficient lamports {}, need {}",
                available.to_lamports(),
                ix.amount.to_lamports()
            ))
        } else {
            None
        };

        if err.is_none() {
            state.balances.insert(ix.from, available - ix.amount);
            let credited = state.balances.get(&ix.to).copied().unwrap_or(Amount::ZERO) + ix.amount;
            state.balances.insert(ix.to, credited);
        }

        let level = if state.hold_confirmations {
            CommitmentLevel::Processed
        } else {
            CommitmentLevel::Confirmed
        };

        let record = TransferRecord {
            signature: transfer.signature,
            from: ix.from,
            to: ix.to,
            amount: ix.amount,
            status: TxStatus {
                level: Some(level),
                err,
            },
        };
        state.history.push(record.signature);
        state.transactions.insert(record.signature, record);

        Ok(transfer.signature)
    }

    async fn signature_status(&self, signature: &TxSignature) -> Result<Option<TxStatus>> {
        Ok(self
            .state
            .lock()
            .transactions
            .get(signature)
            .map(|r| r.status.clone()))
    }

    async fn get_transfer(&self, signature: &TxSignature) -> Result<Option<TransferRecord>> {
        Ok(self.state.lock().transactions.get(signature).cloned())
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(10)
    }
}
