// src/ledger/schema.rs

//! Ledger schema and migrations

use crate::error::Result;
use rusqlite::Connection;
use tracing::debug;

const SCHEMA_VERSION: i64 = 1;

/// Apply any pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

    for version in (current + 1)..=SCHEMA_VERSION {
        debug!("migrating ledger to schema version {version}");
        apply(conn, version)?;
        conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    }
    Ok(())
}

fn apply(conn: &Connection, version: i64) -> Result<()> {
    match version {
        1 => {
            conn.execute_batch(
                "CREATE TABLE installations (
                    name       TEXT PRIMARY KEY,
                    digest     TEXT NOT NULL,
                    state      TEXT NOT NULL,
                    prefix     TEXT NOT NULL DEFAULT '',
                    output     TEXT NOT NULL DEFAULT '',
                    updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
                );",
            )?;
        }
        _ => {}
    }
    Ok(())
}
