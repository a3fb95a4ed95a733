// src/lib.rs

//! Cellar formula engine
//!
//! Builds software from source, Homebrew-style: formulas declare a source
//! archive, an integrity digest, dependencies, and opaque install and test
//! steps; the engine resolves the dependency closure deterministically,
//! fetches and verifies sources through a digest-keyed cache, executes the
//! build, tests the requested target, and tracks every installation in a
//! durable SQLite ledger.
//!
//! # Architecture
//!
//! - Formulas: validated TOML records, never executable code
//! - Resolution: pure depth-first traversal, cycles are hard errors
//! - Fetching: digest-keyed cache, exponential backoff on transport errors
//! - Brewing: isolated workdir per build, first failed step aborts
//! - Ledger: monotonic per-formula state machine in SQLite

pub mod brew;
pub mod config;
pub mod digest;
mod error;
pub mod fetch;
pub mod formula;
pub mod install;
pub mod ledger;
pub mod resolver;

pub use brew::{Brewer, ShellRunner, StepOutput, StepRunner};
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use fetch::{Fetcher, HttpTransport, SourceTransport};
pub use formula::{
    Dependency, DependencyKind, Formula, FormulaUniverse, SourceRef, Step, load_formula_dir,
    load_formula_file,
};
pub use install::{FormulaReport, InstallReport, Installer, Outcome};
pub use ledger::{InstallRecord, InstallState, Ledger};
pub use resolver::{dependents_within, resolve};
