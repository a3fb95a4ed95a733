// src/brew/mod.rs

//! Build and test execution
//!
//! Turns a verified source artifact into a populated install prefix by
//! running the formula's install steps inside a scoped working directory,
//! and runs the formula's test steps against that prefix afterwards. Steps
//! are opaque commands; the first non-zero exit aborts the procedure.

mod archive;
mod runner;

pub use runner::{ShellRunner, StepOutput, StepRunner};

use crate::error::{Error, Result};
use crate::formula::Formula;
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{debug, info};

/// How many trailing output lines to keep in failure diagnostics
const OUTPUT_TAIL_LINES: usize = 40;

/// Runs install and test procedures
pub struct Brewer {
    runner: Arc<dyn StepRunner>,
    keep_workdir: bool,
}

impl Brewer {
    pub fn new(runner: Arc<dyn StepRunner>, keep_workdir: bool) -> Self {
        Self {
            runner,
            keep_workdir,
        }
    }

    /// Run the formula's install steps against a fresh workdir
    ///
    /// The artifact is staged into a temporary working directory, the
    /// install prefix is created, and each step runs in order with
    /// `%(prefix)s` substituted. Combined step output is returned for the
    /// ledger. The workdir is removed whether the build succeeds or fails,
    /// unless workdir retention was requested.
    pub fn build(&self, formula: &Formula, artifact: &Path, prefix: &Path) -> Result<String> {
        let workdir = TempDir::with_prefix(format!("cellar-{}-", formula.name))?;
        let root = archive::stage(artifact, &formula.archive_filename(), workdir.path())?;
        fs::create_dir_all(prefix)?;

        let mut env = HashMap::new();
        env.insert(
            "CELLAR_PREFIX".to_string(),
            prefix.to_string_lossy().into_owned(),
        );

        let mut log = String::new();
        for step in &formula.install {
            let resolved = step.resolved(prefix);
            info!("'{}': {}", formula.name, resolved.label());
            let output = self.runner.run(&resolved, &root, &env)?;
            log.push_str(&output.tail(OUTPUT_TAIL_LINES));
            log.push('\n');
            if !output.success() {
                self.dispose(workdir);
                return Err(Error::BuildFailed {
                    formula: formula.name.clone(),
                    step: resolved.label(),
                    output: output.tail(OUTPUT_TAIL_LINES),
                });
            }
        }

        self.dispose(workdir);
        debug!("'{}': build complete at {}", formula.name, prefix.display());
        Ok(log)
    }

    /// Run the formula's test steps against an installed prefix
    ///
    /// A formula with no test steps passes trivially.
    pub fn check(&self, formula: &Formula, prefix: &Path) -> Result<()> {
        let mut env = HashMap::new();
        env.insert(
            "CELLAR_PREFIX".to_string(),
            prefix.to_string_lossy().into_owned(),
        );

        for step in &formula.test {
            let resolved = step.resolved(prefix);
            info!("'{}': test: {}", formula.name, resolved.label());
            let output = self.runner.run(&resolved, prefix, &env)?;
            if !output.success() {
                return Err(Error::TestFailed {
                    formula: formula.name.clone(),
                    step: resolved.label(),
                    output: output.tail(OUTPUT_TAIL_LINES),
                });
            }
        }
        Ok(())
    }

    fn dispose(&self, workdir: TempDir) {
        if self.keep_workdir {
            let kept = workdir.keep();
            info!("keeping workdir {}", kept.display());
        }
        // dropping the TempDir removes it otherwise
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{SourceRef, Step};
    use std::sync::Mutex;

    /// Records every step it is asked to run; fails steps whose program
    /// matches a configured name
    struct RecordingRunner {
        ran: Mutex<Vec<String>>,
        fail_program: Option<String>,
    }

    impl RecordingRunner {
        fn new() -> Self {
            Self {
                ran: Mutex::new(Vec::new()),
                fail_program: None,
            }
        }

        fn failing(program: &str) -> Self {
            Self {
                ran: Mutex::new(Vec::new()),
                fail_program: Some(program.into()),
            }
        }
    }

    impl StepRunner for RecordingRunner {
        fn run(
            &self,
            step: &Step,
            _workdir: &Path,
            _env: &HashMap<String, String>,
        ) -> Result<StepOutput> {
            self.ran.lock().unwrap().push(step.label());
            let fail = self.fail_program.as_deref() == Some(step.program.as_str());
            Ok(StepOutput {
                status: if fail { Some(1) } else { Some(0) },
                stdout: String::new(),
                stderr: if fail { "boom".into() } else { String::new() },
            })
        }
    }

    fn formula_with_steps(install: &[(&str, &[&str])], test: &[(&str, &[&str])]) -> Formula {
        let steps = |list: &[(&str, &[&str])]| {
            list.iter()
                .map(|(p, a)| Step {
                    program: p.to_string(),
                    args: a.iter().map(|s| s.to_string()).collect(),
                    env: HashMap::new(),
                })
                .collect()
        };
        Formula {
            name: "demo".into(),
            description: String::new(),
            homepage: None,
            license: None,
            source: SourceRef {
                url: "https://example.com/demo.bin".into(),
                sha256: "aa".into(),
            },
            dependencies: Vec::new(),
            install: steps(install),
            test: steps(test),
        }
    }

    fn artifact() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("demo.bin");
        fs::write(&path, b"bits").unwrap();
        (dir, path)
    }

    #[test]
    fn test_build_runs_steps_in_order() {
        let (dir, path) = artifact();
        let runner = Arc::new(RecordingRunner::new());
        let brewer = Brewer::new(runner.clone(), false);
        let formula = formula_with_steps(&[("configure", &[]), ("make", &["install"])], &[]);

        brewer.build(&formula, &path, &dir.path().join("prefix")).unwrap();
        assert_eq!(
            *runner.ran.lock().unwrap(),
            vec!["configure".to_string(), "make install".to_string()]
        );
    }

    #[test]
    fn test_first_failure_aborts() {
        let (dir, path) = artifact();
        let runner = Arc::new(RecordingRunner::failing("make"));
        let brewer = Brewer::new(runner.clone(), false);
        let formula =
            formula_with_steps(&[("configure", &[]), ("make", &[]), ("install", &[])], &[]);

        let err = brewer
            .build(&formula, &path, &dir.path().join("prefix"))
            .unwrap_err();
        match err {
            Error::BuildFailed { step, output, .. } => {
                assert_eq!(step, "make");
                assert_eq!(output, "boom");
            }
            other => panic!("expected build failure, got {other:?}"),
        }
        // install never ran
        assert_eq!(
            *runner.ran.lock().unwrap(),
            vec!["configure".to_string(), "make".to_string()]
        );
    }

    #[test]
    fn test_check_with_no_steps_passes() {
        let dir = tempfile::tempdir().unwrap();
        let brewer = Brewer::new(Arc::new(RecordingRunner::new()), false);
        let formula = formula_with_steps(&[], &[]);
        brewer.check(&formula, dir.path()).unwrap();
    }

    #[test]
    fn test_check_failure_is_test_failed() {
        let dir = tempfile::tempdir().unwrap();
        let brewer = Brewer::new(Arc::new(RecordingRunner::failing("smoke")), false);
        let formula = formula_with_steps(&[], &[("smoke", &[])]);
        let err = brewer.check(&formula, dir.path()).unwrap_err();
        assert!(matches!(err, Error::TestFailed { .. }));
    }

    #[test]
    fn test_prefix_substitution_in_steps() {
        let (dir, path) = artifact();
        let runner = Arc::new(RecordingRunner::new());
        let brewer = Brewer::new(runner.clone(), false);
        let mut formula = formula_with_steps(&[], &[]);
        formula.install.push(Step {
            program: "cp".into(),
            args: vec!["out".into(), "%(prefix)s/bin".into()],
            env: HashMap::new(),
        });

        let prefix = dir.path().join("prefix");
        brewer.build(&formula, &path, &prefix).unwrap();
        let ran = runner.ran.lock().unwrap();
        assert!(ran[0].contains(&format!("{}/bin", prefix.display())));
    }
}
