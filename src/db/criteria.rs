//! Deduplicating store for immutable status criteria snapshots
//!
//! Snapshots are content-addressed: the SHA-256 of the canonical JSON
//! encoding is stored under a UNIQUE constraint, so structurally equal
//! values always converge on a single row. A lookup-then-insert that
//! loses a race against a concurrent identical insert hits the
//! constraint and is resolved by retrying the lookup; the conflict is
//! never surfaced to callers.

use rusqlite::{params, Connection, ErrorCode};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ServiceError;
use crate::models::StatusCriteria;

/// Canonical encoding of a snapshot: JSON with the fixed struct field
/// order, plus its SHA-256 hex digest.
pub fn canonical_encoding(criteria: &StatusCriteria) -> Result<(String, String), ServiceError> {
    let json = serde_json::to_string(criteria)?;
    let digest = Sha256::digest(json.as_bytes());
    Ok((json, hex::encode(digest)))
}

/// Look up the record holding a structurally equal snapshot, inserting
/// one if none exists. Returns the record id either way.
pub fn get_or_create(conn: &Connection, criteria: &StatusCriteria) -> Result<i64, ServiceError> {
    let (json, hash) = canonical_encoding(criteria)?;

    if let Some(id) = find_by_hash(conn, &hash)? {
        return Ok(id);
    }

    let inserted = conn.execute(
        "INSERT INTO status_criteria (criteria_hash, criteria_json) VALUES (?, ?)",
        params![hash, json],
    );

    match inserted {
        Ok(_) => Ok(conn.last_insert_rowid()),
        Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
            // Lost the race against a concurrent identical insert; the
            // winning row is the canonical one.
            debug!(hash = %hash, "Criteria insert hit dedup constraint, retrying lookup");
            find_by_hash(conn, &hash)?.ok_or_else(|| {
                ServiceError::Conflict(format!(
                    "Criteria {} vanished after a dedup constraint violation",
                    hash
                ))
            })
        }
        Err(e) => Err(ServiceError::Internal(format!("Criteria insert failed: {}", e))),
    }
}

/// Retrieve the snapshot stored under an id.
pub fn retrieve(conn: &Connection, id: i64) -> Result<StatusCriteria, ServiceError> {
    let json: Option<String> = conn
        .query_row(
            "SELECT criteria_json FROM status_criteria WHERE id = ?",
            params![id],
            |row| row.get(0),
        )
        .map(Some)
        .or_else(|e| match e {
            rusqlite::Error::QueryReturnedNoRows => Ok(None),
            other => Err(ServiceError::Internal(format!("Query failed: {}", other))),
        })?;

    let json = json
        .ok_or_else(|| ServiceError::NotFound(format!("No status criteria with the id {}", id)))?;

    Ok(serde_json::from_str(&json)?)
}

fn find_by_hash(conn: &Connection, hash: &str) -> Result<Option<i64>, ServiceError> {
    conn.query_row(
        "SELECT id FROM status_criteria WHERE criteria_hash = ?",
        params![hash],
        |row| row.get(0),
    )
    .map(Some)
    .or_else(|e| match e {
        rusqlite::Error::QueryReturnedNoRows => Ok(None),
        other => Err(ServiceError::Internal(format!("Query failed: {}", other))),
    })
}
