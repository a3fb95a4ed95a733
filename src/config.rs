// src/config.rs

//! Engine configuration and path derivation
//!
//! All engine directories hang off a single state directory:
//! - `sources/` — digest-keyed cache of verified source artifacts
//! - `cellar/`  — one install prefix ("keg") per formula
//! - `cellar.db` — the installation ledger

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default state directory
pub const DEFAULT_STATE_DIR: &str = "/var/lib/cellar";

/// Centralized path derivation for engine directories
pub mod paths {
    use super::*;

    /// Digest-keyed source artifact cache
    pub fn sources_dir(state_dir: &Path) -> PathBuf {
        state_dir.join("sources")
    }

    /// Root directory containing one prefix per formula
    pub fn cellar_dir(state_dir: &Path) -> PathBuf {
        state_dir.join("cellar")
    }

    /// Installation ledger database
    pub fn ledger_path(state_dir: &Path) -> PathBuf {
        state_dir.join("cellar.db")
    }

    /// Install prefix for a single formula
    pub fn keg_dir(state_dir: &Path, formula: &str) -> PathBuf {
        cellar_dir(state_dir).join(formula)
    }
}

/// Configuration for the formula-execution engine
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base state directory (sources, cellar, ledger live under it)
    pub state_dir: PathBuf,
    /// Directory for downloaded source artifacts
    pub source_cache: PathBuf,
    /// Root directory for install prefixes
    pub cellar_root: PathBuf,
    /// Path to the installation ledger database
    pub ledger_path: PathBuf,
    /// Maximum transport attempts per fetch
    pub max_fetch_attempts: u32,
    /// Initial retry delay; doubles per attempt
    pub retry_base_delay: Duration,
    /// Per-step timeout for build/test commands (None = no limit)
    pub step_timeout: Option<Duration>,
    /// Keep the build working directory after completion (for debugging)
    pub keep_workdir: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::for_state_dir(Path::new(DEFAULT_STATE_DIR))
    }
}

impl EngineConfig {
    /// Derive all paths from a state directory
    pub fn for_state_dir(state_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            source_cache: paths::sources_dir(state_dir),
            cellar_root: paths::cellar_dir(state_dir),
            ledger_path: paths::ledger_path(state_dir),
            max_fetch_attempts: 3,
            retry_base_delay: Duration::from_millis(1000),
            step_timeout: None,
            keep_workdir: false,
        }
    }

    /// Install prefix for a formula under this configuration
    pub fn prefix_for(&self, formula: &str) -> PathBuf {
        self.cellar_root.join(formula)
    }

    /// Set the per-step timeout
    pub fn with_step_timeout(mut self, timeout: Duration) -> Self {
        self.step_timeout = Some(timeout);
        self
    }

    /// Keep build workdirs around after completion
    pub fn with_keep_workdir(mut self, keep: bool) -> Self {
        self.keep_workdir = keep;
        self
    }
}
