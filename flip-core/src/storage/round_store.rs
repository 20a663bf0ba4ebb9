use crate::error::{CoreError, Result};
use crate::storage::{millis_to_datetime, parse_column, parse_optional_column, Storage};
use crate::types::TxSignature;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One commit-reveal randomness round held by the settlement side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoundRecord {
    pub id: Uuid,
    /// hex sha256 of the server seed, published before the stake
    pub commitment: String,
    pub server_seed: Vec<u8>,
    pub stake_signature: Option<TxSignature>,
    pub client_seed: Option<Vec<u8>>,
    pub created_at: DateTime<Utc>,
    pub revealed_at: Option<DateTime<Utc>>,
}

pub struct RoundStore<'a> {
    storage: &'a Storage,
}

const ROUND_COLUMNS: &str =
    "id, commitment, server_seed, stake_signature, client_seed, created_at, revealed_at";

impl<'a> RoundStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    pub async fn insert(&self, round: &RoundRecord) -> Result<()> {
        let conn = self.storage.get_connection().await;

        conn.execute(
            &format!(
                "INSERT INTO rounds ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                ROUND_COLUMNS
            ),
            params![
                round.id.to_string(),
                round.commitment,
                hex::encode(&round.server_seed),
                round.stake_signature.map(|s| s.to_string()),
                round.client_seed.as_ref().map(hex::encode),
                round.created_at.timestamp_millis(),
                round.revealed_at.map(|t| t.timestamp_millis()),
            ],
        )?;

        Ok(())
    }

    pub async fn get(&self, id: &Uuid) -> Result<Option<RoundRecord>> {
        let conn = self.storage.get_connection().await;

        let round = conn
            .query_row(
                &format!("SELECT {} FROM rounds WHERE id = ?1", ROUND_COLUMNS),
                params![id.to_string()],
                row_to_round,
            )
            .optional()?;

        Ok(round)
    }

    /// Bind an unrevealed round to a stake. Returns false if the round was
    /// already revealed; errors if the stake already revealed another round.
    pub async fn mark_revealed(
        &self,
        id: &Uuid,
        stake_signature: &TxSignature,
        client_seed: &[u8],
    ) -> Result<bool> {
        let conn = self.storage.get_connection().await;

        let changed = conn
            .execute(
                "UPDATE rounds SET stake_signature = ?2, client_seed = ?3, revealed_at = ?4
                 WHERE id = ?1 AND revealed_at IS NULL",
                params![
                    id.to_string(),
                    stake_signature.to_string(),
                    hex::encode(client_seed),
                    Utc::now().timestamp_millis(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(code, _)
                    if code.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    CoreError::internal(format!(
                        "Stake {} already revealed another round",
                        stake_signature
                    ))
                }
                other => CoreError::Storage(other),
            })?;

        Ok(changed == 1)
    }
}

fn hex_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Vec<u8>> {
    let raw: String = row.get(idx)?;
    hex::decode(raw).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn row_to_round(row: &Row<'_>) -> rusqlite::Result<RoundRecord> {
    let client_seed: Option<String> = row.get(4)?;
    let revealed_at: Option<i64> = row.get(6)?;

    Ok(RoundRecord {
        id: parse_column(row, 0)?,
        commitment: row.get(1)?,
        server_seed: hex_column(row, 2)?,
        stake_signature: parse_optional_column(row, 3)?,
        client_seed: client_seed
            .map(hex::decode)
            .transpose()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, Box::new(e)))?,
        created_at: millis_to_datetime(row.get(5)?),
        revealed_at: revealed_at.map(millis_to_datetime),
    })
}
