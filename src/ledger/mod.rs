// src/ledger/mod.rs

//! Installation ledger
//!
//! Durable record of every formula the engine has touched: its state in the
//! install lifecycle, the digest it was installed from, the prefix it landed
//! in, and the last captured output. States advance monotonically; the only
//! lateral move is into Failed from any non-terminal state.

mod schema;

use crate::error::{Error, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

/// Lifecycle state of one formula installation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallState {
    Pending,
    Fetching,
    Verified,
    Building,
    Built,
    Tested,
    Installed,
    Failed,
}

impl InstallState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallState::Pending => "pending",
            InstallState::Fetching => "fetching",
            InstallState::Verified => "verified",
            InstallState::Building => "building",
            InstallState::Built => "built",
            InstallState::Tested => "tested",
            InstallState::Installed => "installed",
            InstallState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InstallState::Installed | InstallState::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            InstallState::Pending => 0,
            InstallState::Fetching => 1,
            InstallState::Verified => 2,
            InstallState::Building => 3,
            InstallState::Built => 4,
            InstallState::Tested => 5,
            InstallState::Installed => 6,
            InstallState::Failed => 7,
        }
    }

    /// Whether a transition to `next` is legal
    ///
    /// States only move forward; Failed is reachable from any non-terminal
    /// state and nothing leaves a terminal state.
    pub fn can_advance_to(&self, next: InstallState) -> bool {
        if self.is_terminal() {
            return false;
        }
        if next == InstallState::Failed {
            return true;
        }
        next.rank() > self.rank()
    }
}

impl fmt::Display for InstallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for InstallState {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(InstallState::Pending),
            "fetching" => Ok(InstallState::Fetching),
            "verified" => Ok(InstallState::Verified),
            "building" => Ok(InstallState::Building),
            "built" => Ok(InstallState::Built),
            "tested" => Ok(InstallState::Tested),
            "installed" => Ok(InstallState::Installed),
            "failed" => Ok(InstallState::Failed),
            other => Err(Error::ParseError(format!("unknown install state '{other}'"))),
        }
    }
}

/// One ledger row
#[derive(Debug, Clone, Serialize)]
pub struct InstallRecord {
    pub name: String,
    pub digest: String,
    pub state: InstallState,
    pub prefix: String,
    pub output: String,
    pub updated_at: String,
}

/// Open handle on the ledger database
pub struct Ledger {
    conn: Connection,
}

impl Ledger {
    /// Open (creating if needed) the ledger at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// In-memory ledger for tests
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::migrate(&conn)?;
        Ok(Self { conn })
    }

    /// Start (or restart) tracking a formula at Pending with a new digest
    ///
    /// Re-running with a different digest resets the row; this is how an
    /// updated formula gets rebuilt.
    pub fn begin(&self, name: &str, digest: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO installations (name, digest, state, updated_at)
             VALUES (?1, ?2, 'pending', ?3)
             ON CONFLICT(name) DO UPDATE SET
                 digest = excluded.digest,
                 state = 'pending',
                 prefix = '',
                 output = '',
                 updated_at = excluded.updated_at",
            params![name, digest, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Advance a formula to `next`, enforcing monotonicity
    pub fn advance(&self, name: &str, next: InstallState) -> Result<()> {
        let record = self
            .find(name)?
            .ok_or_else(|| Error::InitError(format!("no ledger entry for '{name}'")))?;
        if !record.state.can_advance_to(next) {
            return Err(Error::InitError(format!(
                "illegal state transition for '{name}': {} -> {next}",
                record.state
            )));
        }
        debug!("'{name}': {} -> {next}", record.state);
        self.conn.execute(
            "UPDATE installations
             SET state = ?2, updated_at = ?3
             WHERE name = ?1",
            params![name, next.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record the install prefix and captured build output
    pub fn record_result(&self, name: &str, prefix: &str, output: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE installations
             SET prefix = ?2, output = ?3, updated_at = ?4
             WHERE name = ?1",
            params![name, prefix, output, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Record captured output without touching the recorded prefix
    ///
    /// Used on the failure path: a build may already have populated a
    /// prefix on disk, and the row must keep pointing at it.
    pub fn record_output(&self, name: &str, output: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE installations
             SET output = ?2, updated_at = ?3
             WHERE name = ?1",
            params![name, output, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// Look up one formula's record
    pub fn find(&self, name: &str) -> Result<Option<InstallRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT name, digest, state, prefix, output, updated_at
                 FROM installations WHERE name = ?1",
                [name],
                row_to_record,
            )
            .optional()?;
        Ok(record)
    }

    /// All records, name order
    pub fn list(&self) -> Result<Vec<InstallRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT name, digest, state, prefix, output, updated_at
             FROM installations ORDER BY name",
        )?;
        let rows = stmt.query_map([], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Whether `name` is already installed from exactly this digest
    pub fn is_installed(&self, name: &str, digest: &str) -> Result<bool> {
        Ok(self
            .find(name)?
            .is_some_and(|r| r.state == InstallState::Installed && r.digest == digest))
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<InstallRecord> {
    let state_str: String = row.get(2)?;
    let state = InstallState::from_str(&state_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            Box::new(std::io::Error::other(e.to_string())),
        )
    })?;
    Ok(InstallRecord {
        name: row.get(0)?,
        digest: row.get(1)?,
        state,
        prefix: row.get(3)?,
        output: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_begin_and_advance_full_lifecycle() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("pkg", "abc").unwrap();

        for state in [
            InstallState::Fetching,
            InstallState::Verified,
            InstallState::Building,
            InstallState::Built,
            InstallState::Tested,
            InstallState::Installed,
        ] {
            ledger.advance("pkg", state).unwrap();
        }

        let record = ledger.find("pkg").unwrap().unwrap();
        assert_eq!(record.state, InstallState::Installed);
        assert!(ledger.is_installed("pkg", "abc").unwrap());
        assert!(!ledger.is_installed("pkg", "other").unwrap());
    }

    #[test]
    fn test_states_never_move_backward() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("pkg", "abc").unwrap();
        ledger.advance("pkg", InstallState::Building).unwrap();
        assert!(ledger.advance("pkg", InstallState::Fetching).is_err());
    }

    #[test]
    fn test_failed_is_reachable_from_any_nonterminal() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("pkg", "abc").unwrap();
        ledger.advance("pkg", InstallState::Built).unwrap();
        ledger.advance("pkg", InstallState::Failed).unwrap();
        let record = ledger.find("pkg").unwrap().unwrap();
        assert_eq!(record.state, InstallState::Failed);
    }

    #[test]
    fn test_terminal_states_are_final() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("pkg", "abc").unwrap();
        ledger.advance("pkg", InstallState::Failed).unwrap();
        assert!(ledger.advance("pkg", InstallState::Fetching).is_err());
        assert!(ledger.advance("pkg", InstallState::Failed).is_err());
    }

    #[test]
    fn test_record_output_preserves_prefix() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("pkg", "abc").unwrap();
        ledger
            .record_result("pkg", "/opt/cellar/pkg", "built ok")
            .unwrap();

        ledger.record_output("pkg", "smoke test exploded").unwrap();
        let record = ledger.find("pkg").unwrap().unwrap();
        assert_eq!(record.prefix, "/opt/cellar/pkg");
        assert_eq!(record.output, "smoke test exploded");
    }

    #[test]
    fn test_new_digest_resets_record() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("pkg", "abc").unwrap();
        ledger.advance("pkg", InstallState::Failed).unwrap();

        ledger.begin("pkg", "def").unwrap();
        let record = ledger.find("pkg").unwrap().unwrap();
        assert_eq!(record.state, InstallState::Pending);
        assert_eq!(record.digest, "def");
    }

    #[test]
    fn test_list_orders_by_name() {
        let ledger = Ledger::open_in_memory().unwrap();
        ledger.begin("zlib", "1").unwrap();
        ledger.begin("autoconf", "2").unwrap();
        let names: Vec<_> = ledger.list().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, vec!["autoconf", "zlib"]);
    }

    #[test]
    fn test_state_roundtrip() {
        for s in ["pending", "installed", "failed"] {
            assert_eq!(InstallState::from_str(s).unwrap().as_str(), s);
        }
        assert!(InstallState::from_str("bogus").is_err());
    }
}
