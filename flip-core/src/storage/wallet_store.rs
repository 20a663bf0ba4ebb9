use crate::config::Cluster;
use crate::error::Result;
use crate::keystore::EncryptedKey;
use crate::storage::{millis_to_datetime, parse_column, Storage};
use crate::types::Pubkey;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalletData {
    pub id: String,
    pub name: String,
    pub pubkey: Pubkey,
    pub cluster: Cluster,
    pub created_at: DateTime<Utc>,
    pub encrypted_key: EncryptedKey,
}

pub struct WalletStore<'a> {
    storage: &'a Storage,
}

const WALLET_COLUMNS: &str = "id, name, pubkey, cluster, created_at, encrypted_key";

impl<'a> WalletStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn save_wallet(&self, wallet_data: &WalletData) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            "INSERT OR REPLACE INTO wallets (id, name, pubkey, cluster, created_at, encrypted_key)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                wallet_data.id,
                wallet_data.name,
                wallet_data.pubkey.to_string(),
                serde_json::to_string(&wallet_data.cluster)?,
                wallet_data.created_at.timestamp_millis(),
                serde_json::to_string(&wallet_data.encrypted_key)?,
            ],
        )?;

        Ok(())
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<WalletData>> {
        let conn = self.storage.get_connection().await;

        let wallet = conn
            .query_row(
                &format!("SELECT {} FROM wallets WHERE name = ?1", WALLET_COLUMNS),
                params![name],
                row_to_wallet,
            )
            .optional()?;

        Ok(wallet)
    }

    pub async fn list_wallets(&self) -> Result<Vec<WalletData>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM wallets ORDER BY created_at DESC",
            WALLET_COLUMNS
        ))?;

        let wallet_iter = stmt.query_map([], row_to_wallet)?;

        let mut wallets = Vec::new();
        for wallet in wallet_iter {
            wallets.push(wallet?);
        }

        Ok(wallets)
    }

    pub async fn delete_wallet(&self, wallet_id: &str) -> Result<()> {
        let conn = self.storage.get_connection().await;
        conn.execute("DELETE FROM wallets WHERE id = ?1", params![wallet_id])?;
        Ok(())
    }

    pub async fn wallet_exists(&self, name: &str) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM wallets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_wallet(row: &Row<'_>) -> rusqlite::Result<WalletData> {
    Ok(WalletData {
        id: row.get(0)?,
        name: row.get(1)?,
        pubkey: parse_column(row, 2)?,
        cluster: json_column(row, 3)?,
        created_at: millis_to_datetime(row.get(4)?),
        encrypted_key: json_column(row, 5)?,
    })
}
