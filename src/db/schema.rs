//! Database schema definitions

use rusqlite::Connection;
use tracing::info;

use crate::error::ServiceError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the database schema
pub fn init_schema(conn: &Connection) -> Result<(), ServiceError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        migrate_schema(conn, current_version)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &Connection) -> Result<i32, ServiceError> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)",
        [],
    )
    .map_err(|e| ServiceError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let version: i32 = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| row.get(0))
        .unwrap_or(0);

    Ok(version)
}

/// Set schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<(), ServiceError> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| ServiceError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?)", [version])
        .map_err(|e| ServiceError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &Connection) -> Result<(), ServiceError> {
    conn.execute_batch(RECORDS_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create record tables: {}", e)))?;

    conn.execute_batch(LEDGER_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create ledger tables: {}", e)))?;

    conn.execute_batch(INDEXES_SCHEMA)
        .map_err(|e| ServiceError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Migrate schema from older version
fn migrate_schema(conn: &Connection, from_version: i32) -> Result<(), ServiceError> {
    // Add migration steps here as schema evolves
    match from_version {
        _ => {}
    }

    set_schema_version(conn, SCHEMA_VERSION)?;
    Ok(())
}

/// Patients, treatments and deduplicated status snapshots
const RECORDS_SCHEMA: &str = r#"
-- Immutable status criteria snapshots, one row per distinct value.
-- criteria_hash is the SHA-256 of the canonical JSON encoding; the
-- UNIQUE constraint is what makes concurrent identical inserts converge.
CREATE TABLE IF NOT EXISTS status_criteria (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    criteria_hash TEXT NOT NULL UNIQUE,
    criteria_json TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS patients (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT,

    -- Epoch seconds of the last write; stamped on every patch
    updated_time INTEGER NOT NULL,

    status_id INTEGER,
    FOREIGN KEY (status_id) REFERENCES status_criteria(id)
);

CREATE TABLE IF NOT EXISTS treatments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    patient_id INTEGER NOT NULL,
    before_status_id INTEGER NOT NULL,
    expected_status_id INTEGER NOT NULL,

    -- Epoch seconds of creation; immutable
    created_time INTEGER NOT NULL,

    FOREIGN KEY (patient_id) REFERENCES patients(id) ON DELETE CASCADE,
    FOREIGN KEY (before_status_id) REFERENCES status_criteria(id),
    FOREIGN KEY (expected_status_id) REFERENCES status_criteria(id)
);

-- The fixed, ordered action list captured at treatment creation
CREATE TABLE IF NOT EXISTS treatment_actions (
    treatment_id INTEGER NOT NULL,
    position INTEGER NOT NULL,
    action TEXT NOT NULL,
    PRIMARY KEY (treatment_id, position),
    FOREIGN KEY (treatment_id) REFERENCES treatments(id) ON DELETE CASCADE
);
"#;

/// Append-only feedback ledger
const LEDGER_SCHEMA: &str = r#"
-- Entries are only ever inserted. The rowid doubles as the insertion
-- sequence and breaks ties between entries sharing a created_time.
CREATE TABLE IF NOT EXISTS action_feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    treatment_id INTEGER NOT NULL,
    action TEXT NOT NULL,
    feedback TEXT NOT NULL,
    created_time INTEGER NOT NULL,
    FOREIGN KEY (treatment_id) REFERENCES treatments(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS value_feedback (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    treatment_id INTEGER NOT NULL,

    -- Reported casing is kept; grouping is case-insensitive at read time
    value_name TEXT NOT NULL,

    alignment REAL NOT NULL,
    created_time INTEGER NOT NULL,
    FOREIGN KEY (treatment_id) REFERENCES treatments(id) ON DELETE CASCADE
);
"#;

/// Index definitions for fast queries
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_patients_name ON patients(name);

CREATE INDEX IF NOT EXISTS idx_treatments_patient_id ON treatments(patient_id);
CREATE INDEX IF NOT EXISTS idx_treatments_created_time ON treatments(created_time);

CREATE INDEX IF NOT EXISTS idx_action_feedback_treatment ON action_feedback(treatment_id, action);
CREATE INDEX IF NOT EXISTS idx_value_feedback_treatment ON value_feedback(treatment_id);
"#;
