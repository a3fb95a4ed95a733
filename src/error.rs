// src/error.rs

//! Error types for the formula-execution engine
//!
//! The variants mirror the pipeline phases: resolution errors abort a run
//! before any I/O happens, fetch/verify errors are per-formula, and
//! build/test errors carry the captured output of the failing step.

use thiserror::Error;

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A declared dependency name does not exist in the formula universe
    #[error("unknown dependency '{dependency}' required by '{formula}'")]
    UnknownDependency { formula: String, dependency: String },

    /// The dependency graph contains a cycle (hard error, never broken)
    #[error("cyclic dependency: {}", cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    /// The formula declares no integrity digest for its source
    #[error("formula '{formula}' has no integrity digest; refusing unverified fetch")]
    MissingIntegrityDigest { formula: String },

    /// The fetched artifact does not hash to the declared digest
    #[error("integrity mismatch for '{formula}': expected {expected}, got {actual}")]
    IntegrityMismatch {
        formula: String,
        expected: String,
        actual: String,
    },

    /// Transport-level download failure after exhausting retries
    #[error("fetch failed for '{formula}' ({url}) after {attempts} attempts: {reason}")]
    FetchFailed {
        formula: String,
        url: String,
        attempts: u32,
        reason: String,
    },

    /// A build step exited non-zero or could not be run
    #[error("build failed for '{formula}' at step `{step}`:\n{output}")]
    BuildFailed {
        formula: String,
        step: String,
        output: String,
    },

    /// A test step exited non-zero or could not be run
    #[error("test failed for '{formula}' at step `{step}`:\n{output}")]
    TestFailed {
        formula: String,
        step: String,
        output: String,
    },

    /// Single transport attempt failed (retried by the fetcher)
    #[error("download error: {0}")]
    DownloadError(String),

    /// Cancellation was requested between pipeline phases
    #[error("operation cancelled")]
    Cancelled,

    /// Engine setup failure (HTTP client, directories, ledger open)
    #[error("initialization error: {0}")]
    InitError(String),

    /// Formula file or value could not be parsed
    #[error("parse error: {0}")]
    ParseError(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Exit code for the CLI, distinguishing failure classes
    ///
    /// 2 = resolution, 3 = fetch/verify, 4 = build, 5 = test, 1 = other.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::UnknownDependency { .. } | Error::CyclicDependency { .. } => 2,
            Error::MissingIntegrityDigest { .. }
            | Error::IntegrityMismatch { .. }
            | Error::FetchFailed { .. }
            | Error::DownloadError(_) => 3,
            Error::BuildFailed { .. } => 4,
            Error::TestFailed { .. } => 5,
            _ => 1,
        }
    }

    /// Short machine-readable name of the error kind, used in reports
    pub fn kind(&self) -> &'static str {
        match self {
            Error::UnknownDependency { .. } => "unknown-dependency",
            Error::CyclicDependency { .. } => "cyclic-dependency",
            Error::MissingIntegrityDigest { .. } => "missing-integrity-digest",
            Error::IntegrityMismatch { .. } => "integrity-mismatch",
            Error::FetchFailed { .. } => "fetch-failed",
            Error::BuildFailed { .. } => "build-failed",
            Error::TestFailed { .. } => "test-failed",
            Error::DownloadError(_) => "download-error",
            Error::Cancelled => "cancelled",
            Error::InitError(_) => "init-error",
            Error::ParseError(_) => "parse-error",
            Error::Database(_) => "database-error",
            Error::Io(_) => "io-error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_class() {
        let resolution = Error::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "a".into()],
        };
        assert_eq!(resolution.exit_code(), 2);

        let fetch = Error::MissingIntegrityDigest {
            formula: "x".into(),
        };
        assert_eq!(fetch.exit_code(), 3);

        let build = Error::BuildFailed {
            formula: "x".into(),
            step: "make".into(),
            output: String::new(),
        };
        assert_eq!(build.exit_code(), 4);

        let test = Error::TestFailed {
            formula: "x".into(),
            step: "check".into(),
            output: String::new(),
        };
        assert_eq!(test.exit_code(), 5);

        assert_eq!(Error::Cancelled.exit_code(), 1);
    }

    #[test]
    fn test_cycle_display_names_members() {
        let err = Error::CyclicDependency {
            cycle: vec!["a".into(), "b".into(), "c".into(), "a".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("a -> b -> c -> a"));
    }
}
