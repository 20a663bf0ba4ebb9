pub mod payout_store;
pub mod round_store;
pub mod wallet_store;

pub use payout_store::{PayoutRecord, PayoutStatus, PayoutStore};
pub use round_store::{RoundRecord, RoundStore};
pub use wallet_store::{WalletData, WalletStore};

use crate::error::{CoreError, Result};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use std::path::Path;
use std::str::FromStr;
use tokio::sync::Mutex;

pub struct Storage {
    conn: Mutex<Connection>,
}

impl Storage {
    pub async fn new(db_path: &Path) -> Result<Self> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = db_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| CoreError::internal(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)?;
        Self::with_connection(conn).await
    }

    /// Throwaway database, used by tests and offline runs
    pub async fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?).await
    }

    async fn with_connection(conn: Connection) -> Result<Self> {
        let storage = Self {
            conn: Mutex::new(conn),
        };
        storage.init_schema().await?;
        Ok(storage)
    }

    async fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().await;

        // Player wallets, secret sealed under a password
        conn.execute(
            "CREATE TABLE IF NOT EXISTS wallets (
                id TEXT PRIMARY KEY,
                name TEXT UNIQUE NOT NULL,
                pubkey TEXT NOT NULL,
                cluster TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                encrypted_key TEXT NOT NULL
            )",
            [],
        )?;

        // Payout queue; a stake signature can back at most one payout
        conn.execute(
            "CREATE TABLE IF NOT EXISTS payouts (
                id TEXT PRIMARY KEY,
                stake_signature TEXT UNIQUE,
                winner TEXT NOT NULL,
                stake_lamports INTEGER NOT NULL,
                payout_lamports INTEGER NOT NULL,
                status TEXT NOT NULL,
                payout_signature TEXT,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                next_attempt_at INTEGER NOT NULL,
                submitted_at INTEGER,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS payouts_status ON payouts (status, next_attempt_at)",
            [],
        )?;

        // Commit-reveal rounds; a stake signature can reveal at most one round
        conn.execute(
            "CREATE TABLE IF NOT EXISTS rounds (
                id TEXT PRIMARY KEY,
                commitment TEXT NOT NULL,
                server_seed TEXT NOT NULL,
                stake_signature TEXT UNIQUE,
                client_seed TEXT,
                created_at INTEGER NOT NULL,
                revealed_at INTEGER
            )",
            [],
        )?;

        Ok(())
    }

    pub async fn get_connection(&self) -> tokio::sync::MutexGuard<'_, Connection> {
        self.conn.lock().await
    }
}

/// Read a text column through `FromStr`, surfacing parse failures as row errors
pub(crate) fn parse_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn parse_optional_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        s.parse()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

pub(crate) fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
}
