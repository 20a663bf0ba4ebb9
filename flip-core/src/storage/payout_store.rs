use crate::error::{CoreError, Result};
use crate::storage::{millis_to_datetime, parse_column, parse_optional_column, Storage};
use crate::types::{Amount, Pubkey, TxSignature};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PayoutStatus {
    /// Recorded, waiting for (re)submission
    Queued,
    /// Handed to the ledger, confirmation not yet seen
    Submitted,
    Confirmed,
    /// Gave up after exhausting attempts
    Failed,
}

impl PayoutStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayoutStatus::Queued => "queued",
            PayoutStatus::Submitted => "submitted",
            PayoutStatus::Confirmed => "confirmed",
            PayoutStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Confirmed | PayoutStatus::Failed)
    }
}

impl fmt::Display for PayoutStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PayoutStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(PayoutStatus::Queued),
            "submitted" => Ok(PayoutStatus::Submitted),
            "confirmed" => Ok(PayoutStatus::Confirmed),
            "failed" => Ok(PayoutStatus::Failed),
            other => Err(CoreError::internal(format!("Unknown payout status: {}", other))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: Uuid,
    pub stake_signature: Option<TxSignature>,
    pub winner: Pubkey,
    pub stake: Amount,
    pub amount: Amount,
    pub status: PayoutStatus,
    pub payout_signature: Option<TxSignature>,
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_attempt_at: DateTime<Utc>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayoutRecord {
    pub fn new(
        stake_signature: Option<TxSignature>,
        winner: Pubkey,
        stake: Amount,
        amount: Amount,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            stake_signature,
            winner,
            stake,
            amount,
            status: PayoutStatus::Queued,
            payout_signature: None,
            attempts: 0,
            last_error: None,
            next_attempt_at: now,
            submitted_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

const PAYOUT_COLUMNS: &str = "id, stake_signature, winner, stake_lamports, payout_lamports, status, \
     payout_signature, attempts, last_error, next_attempt_at, submitted_at, created_at, updated_at";

pub struct PayoutStore<'a> {
    storage: &'a Storage,
}

impl<'a> PayoutStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Insert a new record. Fails if the stake signature already backs a payout.
    pub async fn insert(&self, record: &PayoutRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            &format!(
                "INSERT INTO payouts ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                PAYOUT_COLUMNS
            ),
            params![
                record.id.to_string(),
                record.stake_signature.map(|s| s.to_string()),
                record.winner.to_string(),
                record.stake.to_lamports() as i64,
                record.amount.to_lamports() as i64,
                record.status.as_str(),
                record.payout_signature.map(|s| s.to_string()),
                record.attempts,
                record.last_error,
                record.next_attempt_at.timestamp_millis(),
                record.submitted_at.map(|t| t.timestamp_millis()),
                record.created_at.timestamp_millis(),
                record.updated_at.timestamp_millis(),
            ],
        )?;

        Ok(())
    }

    /// Persist the mutable part of a record (status, attempts, schedule)
    pub async fn update(&self, record: &PayoutRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        let changed = conn.execute(
            "UPDATE payouts SET status = ?2, payout_signature = ?3, attempts = ?4, last_error = ?5,
                next_attempt_at = ?6, submitted_at = ?7, updated_at = ?8
             WHERE id = ?1",
            params![
                record.id.to_string(),
                record.status.as_str(),
                record.payout_signature.map(|s| s.to_string()),
                record.attempts,
                record.last_error,
                record.next_attempt_at.timestamp_millis(),
                record.submitted_at.map(|t| t.timestamp_millis()),
                Utc::now().timestamp_millis(),
            ],
        )?;

        if changed == 0 {
            return Err(CoreError::internal(format!("Payout {} not found", record.id)));
        }
        Ok(())
    }

    pub async fn get(&self, id: &Uuid) -> Result<Option<PayoutRecord>> {
        let conn = self.storage.get_connection().await;

        let record = conn
            .query_row(
                &format!("SELECT {} FROM payouts WHERE id = ?1", PAYOUT_COLUMNS),
                params![id.to_string()],
                row_to_payout,
            )
            .optional()?;

        Ok(record)
    }

    pub async fn find_by_stake(&self, stake_signature: &TxSignature) -> Result<Option<PayoutRecord>> {
        let conn = self.storage.get_connection().await;

        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM payouts WHERE stake_signature = ?1",
                    PAYOUT_COLUMNS
                ),
                params![stake_signature.to_string()],
                row_to_payout,
            )
            .optional()?;

        Ok(record)
    }

    /// Most recent first
    pub async fn list(&self, limit: usize) -> Result<Vec<PayoutRecord>> {
        self.query(
            &format!(
                "SELECT {} FROM payouts ORDER BY created_at DESC LIMIT {}",
                PAYOUT_COLUMNS, limit
            ),
            &[],
        )
        .await
    }

    /// Queued payouts whose next attempt is at or before `now`
    pub async fn due(&self, now: DateTime<Utc>) -> Result<Vec<PayoutRecord>> {
        self.query(
            &format!(
                "SELECT {} FROM payouts WHERE status = 'queued' AND next_attempt_at <= ?1
                 ORDER BY next_attempt_at",
                PAYOUT_COLUMNS
            ),
            &[&now.timestamp_millis()],
        )
        .await
    }

    pub async fn in_flight(&self) -> Result<Vec<PayoutRecord>> {
        self.query(
            &format!(
                "SELECT {} FROM payouts WHERE status = 'submitted' ORDER BY submitted_at",
                PAYOUT_COLUMNS
            ),
            &[],
        )
        .await
    }

    async fn query(&self, sql: &str, args: &[&dyn rusqlite::ToSql]) -> Result<Vec<PayoutRecord>> {
        let conn = self.storage.get_connection().await;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt.query_map(args, row_to_payout)?;

        let mut records = Vec::new();
        for record in rows {
            records.push(record?);
        }
        Ok(records)
    }
}

fn row_to_payout(row: &Row<'_>) -> rusqlite::Result<PayoutRecord> {
    let stake: i64 = row.get(3)?;
    let amount: i64 = row.get(4)?;
    let submitted_at: Option<i64> = row.get(10)?;

    Ok(PayoutRecord {
        id: parse_column(row, 0)?,
        stake_signature: parse_optional_column(row, 1)?,
        winner: parse_column(row, 2)?,
        stake: Amount::from_lamports(stake as u64),
        amount: Amount::from_lamports(amount as u64),
        status: parse_column(row, 5)?,
        payout_signature: parse_optional_column(row, 6)?,
        attempts: row.get(7)?,
        last_error: row.get(8)?,
        next_attempt_at: millis_to_datetime(row.get(9)?),
        submitted_at: submitted_at.map(millis_to_datetime),
        created_at: millis_to_datetime(row.get(11)?),
        updated_at: millis_to_datetime(row.get(12)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record(stake_sig: Option<TxSignature>) -> PayoutRecord {
        PayoutRecord::new(
            stake_sig,
            Pubkey::new([5u8; 32]),
            Amount::from_lamports(1_000_000_000),
            Amount::from_lamports(1_970_000_000),
        )
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let storage = Storage::in_memory().await.unwrap();
        let store = PayoutStore::new(&storage);
        let sig = TxSignature::new([8u8; 64]);

        let rec = record(Some(sig));
        store.insert(&rec).await.unwrap();

        let by_id = store.get(&rec.id).await.unwrap().unwrap();
        assert_eq!(by_id.amount, Amount::from_lamports(1_970_000_000));
        assert_eq!(by_id.status, PayoutStatus::Queued);

        let by_stake = store.find_by_stake(&sig).await.unwrap().unwrap();
        assert_eq!(by_stake.id, rec.id);
    }

    #[tokio::test]
    async fn test_stake_signature_is_unique() {
        let storage = Storage::in_memory().await.unwrap();
        let store = PayoutStore::new(&storage);
        let sig = TxSignature::new([8u8; 64]);

        store.insert(&record(Some(sig))).await.unwrap();
        assert!(store.insert(&record(Some(sig))).await.is_err());

        // unlinked payouts do not collide with each other
        store.insert(&record(None)).await.unwrap();
        store.insert(&record(None)).await.unwrap();
        assert_eq!(store.list(10).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_due_and_in_flight_selection() {
        let storage = Storage::in_memory().await.unwrap();
        let store = PayoutStore::new(&storage);
        let now = Utc::now();

        let ready = record(None);
        store.insert(&ready).await.unwrap();

        let mut later = record(None);
        later.next_attempt_at = now + Duration::minutes(5);
        store.insert(&later).await.unwrap();

        let mut sent = record(None);
        store.insert(&sent).await.unwrap();
        sent.status = PayoutStatus::Submitted;
        sent.payout_signature = Some(TxSignature::new([1u8; 64]));
        sent.submitted_at = Some(now);
        store.update(&sent).await.unwrap();

        let due = store.due(now).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].id, ready.id);

        let in_flight = store.in_flight().await.unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].payout_signature, sent.payout_signature);
    }
}
