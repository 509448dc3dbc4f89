//! SQLite database module for patient and treatment records
//!
//! ## Tables
//!
//! - `status_criteria` - Deduplicated immutable status snapshots,
//!   content-addressed by a hash of their canonical encoding
//! - `patients` - Mutable patient rows (name, status reference),
//!   patched sparsely and stamped with a revision time
//! - `treatments` / `treatment_actions` - Treatments with their fixed,
//!   ordered action list captured at creation time
//! - `action_feedback` / `value_feedback` - Append-only feedback ledger;
//!   the current state of a treatment is a read-time projection

pub mod criteria;
pub mod feedback;
pub mod patients;
pub mod projection;
pub mod schema;
pub mod treatments;
pub mod update;

use std::path::Path;
use std::sync::Mutex;

use rusqlite::Connection;
use tracing::{debug, info};

use crate::error::ServiceError;

/// SQLite database for patient and treatment records
pub struct RecordDb {
    conn: Mutex<Connection>,
}

impl RecordDb {
    /// Open or create the record database
    pub fn open(data_dir: &Path) -> Result<Self, ServiceError> {
        let db_path = data_dir.join("records.db");
        info!("Opening SQLite database at {:?}", db_path);

        let conn = Connection::open(&db_path)
            .map_err(|e| ServiceError::Internal(format!("Failed to open SQLite: {}", e)))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| ServiceError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        debug!("Opening in-memory SQLite database");

        let conn = Connection::open_in_memory()
            .map_err(|e| ServiceError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| ServiceError::Internal(format!("Failed to set PRAGMA: {}", e)))?;

        let db = Self {
            conn: Mutex::new(conn),
        };

        db.init_schema()?;

        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<(), ServiceError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {}", e)))?;

        schema::init_schema(&conn)?;

        Ok(())
    }

    /// Run a read operation against the connection
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&Connection) -> Result<T, ServiceError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&conn)
    }

    /// Run a write operation with exclusive access (for transactions)
    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Connection) -> Result<T, ServiceError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| ServiceError::Internal(format!("Lock poisoned: {}", e)))?;
        f(&mut conn)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, ServiceError> {
        self.with_conn(|conn| {
            let count = |sql: &str| -> Result<i64, ServiceError> {
                conn.query_row(sql, [], |row| row.get(0))
                    .map_err(|e| ServiceError::Internal(format!("Query failed: {}", e)))
            };

            Ok(DbStats {
                criteria_count: count("SELECT COUNT(*) FROM status_criteria")? as u64,
                patient_count: count("SELECT COUNT(*) FROM patients")? as u64,
                treatment_count: count("SELECT COUNT(*) FROM treatments")? as u64,
                action_feedback_count: count("SELECT COUNT(*) FROM action_feedback")? as u64,
                value_feedback_count: count("SELECT COUNT(*) FROM value_feedback")? as u64,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct DbStats {
    pub criteria_count: u64,
    pub patient_count: u64,
    pub treatment_count: u64,
    pub action_feedback_count: u64,
    pub value_feedback_count: u64,
}
