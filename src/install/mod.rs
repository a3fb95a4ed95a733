// src/install/mod.rs

//! Installation orchestration
//!
//! Drives one install request end to end: resolve the dependency closure,
//! then walk the topological order fetching, verifying, building, and (for
//! the target) testing each formula, recording every lifecycle transition in
//! the ledger. A failure poisons the dependent subtree; unrelated formulas
//! still proceed. Resolution failures abort the run before any side effect.

use crate::brew::Brewer;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::fetch::Fetcher;
use crate::formula::FormulaUniverse;
use crate::ledger::{InstallState, Ledger};
use crate::resolver;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// Outcome of one formula within an install run
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    /// Installed during this run
    Installed,
    /// Already installed from the same digest; nothing done
    AlreadyInstalled,
    /// A phase failed; `kind` matches the error taxonomy
    Failed { kind: String, detail: String },
    /// Not attempted
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Failed { .. })
    }
}

/// Per-formula result line of an install run
#[derive(Debug, Clone, Serialize)]
pub struct FormulaReport {
    pub name: String,
    #[serde(flatten)]
    pub outcome: Outcome,
}

/// Full report for one install request
#[derive(Debug, Clone, Serialize)]
pub struct InstallReport {
    pub target: String,
    pub formulas: Vec<FormulaReport>,
}

impl InstallReport {
    /// The run succeeded if the target itself ended up installed
    pub fn succeeded(&self) -> bool {
        self.formulas.iter().any(|f| {
            f.name == self.target
                && matches!(f.outcome, Outcome::Installed | Outcome::AlreadyInstalled)
        })
    }

    /// First failure in the run, if any
    pub fn first_failure(&self) -> Option<&FormulaReport> {
        self.formulas.iter().find(|f| f.outcome.is_failure())
    }
}

/// Coordinates fetcher, brewer, and ledger for install runs
pub struct Installer<'a> {
    universe: &'a FormulaUniverse,
    config: EngineConfig,
    fetcher: Fetcher,
    brewer: Brewer,
    ledger: Ledger,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl<'a> Installer<'a> {
    pub fn new(
        universe: &'a FormulaUniverse,
        config: EngineConfig,
        fetcher: Fetcher,
        brewer: Brewer,
        ledger: Ledger,
    ) -> Self {
        Self {
            universe,
            config,
            fetcher,
            brewer,
            ledger,
            locks: Mutex::new(HashMap::new()),
            cancel: None,
        }
    }

    /// Attach a cancellation token, checked between formulas
    pub fn with_cancel_token(mut self, token: Arc<AtomicBool>) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .is_some_and(|t| t.load(Ordering::SeqCst))
    }

    /// Lock guarding all phases of one formula
    fn lock_for(&self, name: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Install `target` and everything it depends on
    ///
    /// Resolution errors (unknown name, cycle) return `Err` with no side
    /// effects. Phase failures are reported per formula in the returned
    /// report, not as `Err`.
    pub fn install(&self, target: &str) -> Result<InstallReport> {
        let order = resolver::resolve(target, self.universe)?;
        info!("install order for '{target}': {}", order.join(", "));

        let mut skip_reasons: HashMap<String, String> = HashMap::new();
        let mut formulas = Vec::with_capacity(order.len());

        for name in &order {
            if self.cancelled() {
                warn!("cancelled; skipping '{name}'");
                formulas.push(FormulaReport {
                    name: name.clone(),
                    outcome: Outcome::Skipped {
                        reason: "cancelled".into(),
                    },
                });
                continue;
            }

            if let Some(reason) = skip_reasons.remove(name) {
                formulas.push(FormulaReport {
                    name: name.clone(),
                    outcome: Outcome::Skipped { reason },
                });
                continue;
            }

            let formula = match self.universe.get(name) {
                Some(f) => f,
                None => continue, // resolver guarantees presence
            };

            let digest = formula.source.sha256.to_lowercase();
            if !digest.is_empty() && self.ledger.is_installed(name, &digest)? {
                info!("'{name}': already installed, skipping");
                formulas.push(FormulaReport {
                    name: name.clone(),
                    outcome: Outcome::AlreadyInstalled,
                });
                continue;
            }

            let run_tests = name == target;
            let outcome = match self.install_one(name, run_tests) {
                Ok(()) => Outcome::Installed,
                Err(err) => {
                    warn!("'{name}': {err}");
                    for dependent in resolver::dependents_within(&order, self.universe, name) {
                        skip_reasons
                            .entry(dependent.to_string())
                            .or_insert_with(|| format!("dependency '{name}' failed"));
                    }
                    Outcome::Failed {
                        kind: err.kind().to_string(),
                        detail: err.to_string(),
                    }
                }
            };
            formulas.push(FormulaReport {
                name: name.clone(),
                outcome,
            });
        }

        Ok(InstallReport {
            target: target.to_string(),
            formulas,
        })
    }

    /// Run all phases for one formula under its lock
    fn install_one(&self, name: &str, run_tests: bool) -> Result<()> {
        let lock = self.lock_for(name);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let formula = self
            .universe
            .get(name)
            .ok_or_else(|| Error::UnknownDependency {
                formula: "<request>".into(),
                dependency: name.into(),
            })?;

        let digest = formula.source.sha256.to_lowercase();
        self.ledger.begin(name, &digest)?;

        let result = (|| -> Result<()> {
            self.ledger.advance(name, InstallState::Fetching)?;
            let artifact = self.fetcher.fetch(formula)?;
            self.ledger.advance(name, InstallState::Verified)?;

            let prefix = self.config.prefix_for(name);
            self.ledger.advance(name, InstallState::Building)?;
            let log = self.brewer.build(formula, &artifact, &prefix)?;
            self.ledger.advance(name, InstallState::Built)?;
            self.ledger
                .record_result(name, &prefix.to_string_lossy(), &log)?;

            if run_tests {
                self.brewer.check(formula, &prefix)?;
                self.ledger.advance(name, InstallState::Tested)?;
            }

            self.ledger.advance(name, InstallState::Installed)?;
            info!("'{name}': installed at {}", prefix.display());
            Ok(())
        })();

        if let Err(err) = &result {
            // Failure detail lands in the ledger alongside the Failed state;
            // any prefix recorded by a completed build stays intact
            self.ledger.advance(name, InstallState::Failed)?;
            self.ledger.record_output(name, &err.to_string())?;
        }
        result
    }

    /// Re-run the target's test steps against its installed prefix
    pub fn test_only(&self, target: &str) -> Result<()> {
        let formula = self
            .universe
            .get(target)
            .ok_or_else(|| Error::UnknownDependency {
                formula: "<request>".into(),
                dependency: target.into(),
            })?;

        let record = self
            .ledger
            .find(target)?
            .filter(|r| r.state == InstallState::Installed)
            .ok_or_else(|| Error::InitError(format!("'{target}' is not installed")))?;

        let prefix = if record.prefix.is_empty() {
            self.config.prefix_for(target)
        } else {
            record.prefix.into()
        };
        self.brewer.check(formula, &prefix)
    }

    /// Fetch and verify the target's source without building
    pub fn fetch_only(&self, target: &str) -> Result<std::path::PathBuf> {
        let formula = self
            .universe
            .get(target)
            .ok_or_else(|| Error::UnknownDependency {
                formula: "<request>".into(),
                dependency: target.into(),
            })?;
        self.fetcher.fetch(formula)
    }
}
