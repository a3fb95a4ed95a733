// src/formula/mod.rs

//! Formula data model
//!
//! A Formula is a validated, immutable description of one installable unit:
//! where its source lives, how to verify it, what it depends on, and the
//! opaque command steps that install and test it. Formulas are TOML files on
//! disk; the engine itself only ever sees the in-memory records collected
//! into a [`FormulaUniverse`].

mod loader;

pub use loader::{load_formula_dir, load_formula_file};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// A complete formula for building one piece of software from source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Formula {
    /// Unique name within the universe
    pub name: String,

    /// Short description
    #[serde(default)]
    pub description: String,

    /// Homepage URL
    #[serde(default)]
    pub homepage: Option<String>,

    /// License identifier (SPDX), informational
    #[serde(default)]
    pub license: Option<String>,

    /// Source archive location and integrity digest
    pub source: SourceRef,

    /// Declared dependencies, in declaration order
    #[serde(default)]
    pub dependencies: Vec<Dependency>,

    /// Install procedure, run in order inside the build workdir
    #[serde(default)]
    pub install: Vec<Step>,

    /// Test procedure, run post-install against the populated prefix
    #[serde(default)]
    pub test: Vec<Step>,
}

impl Formula {
    /// Names of all declared dependencies, declaration order preserved
    pub fn dependency_names(&self) -> Vec<&str> {
        self.dependencies.iter().map(|d| d.name.as_str()).collect()
    }

    /// Basic structural validation
    ///
    /// The parser collaborator hands the engine validated records; this is
    /// the validation it applies.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(Error::ParseError("formula name must not be empty".into()));
        }
        if self.source.url.is_empty() {
            return Err(Error::ParseError(format!(
                "formula '{}' has an empty source url",
                self.name
            )));
        }
        for dep in &self.dependencies {
            if dep.name.is_empty() {
                return Err(Error::ParseError(format!(
                    "formula '{}' declares a dependency with an empty name",
                    self.name
                )));
            }
            if dep.name == self.name {
                return Err(Error::ParseError(format!(
                    "formula '{}' depends on itself",
                    self.name
                )));
            }
        }
        Ok(())
    }

    /// Filename component of the source URL
    pub fn archive_filename(&self) -> String {
        self.source
            .url
            .split('/')
            .next_back()
            .filter(|s| !s.is_empty())
            .unwrap_or("source.tar.gz")
            .to_string()
    }
}

/// Source archive reference: URL plus integrity digest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRef {
    /// Archive URL
    pub url: String,

    /// SHA-256 digest of the archive, lowercase hex
    ///
    /// An empty digest marks a pre-release formula; the fetcher refuses it.
    #[serde(default)]
    pub sha256: String,
}

/// Whether a dependency is needed only to build, or also at runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    Build,
    #[default]
    Runtime,
}

/// A declared dependency on another formula
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    /// Name of the required formula
    pub name: String,

    /// Build-time-only or runtime
    #[serde(default)]
    pub kind: DependencyKind,
}

/// One opaque command step of an install or test procedure
///
/// The engine never interprets step semantics; it substitutes the install
/// prefix, hands the step to the process-execution collaborator, and looks
/// only at exit status and captured output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Program to execute
    pub program: String,

    /// Arguments, in order
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment overrides for this step
    #[serde(default)]
    pub env: HashMap<String, String>,
}

impl Step {
    /// Substitute `%(prefix)s` in program, args, and env values
    pub fn resolved(&self, prefix: &Path) -> Step {
        let prefix = prefix.to_string_lossy();
        let subst = |s: &str| s.replace("%(prefix)s", &prefix);
        Step {
            program: subst(&self.program),
            args: self.args.iter().map(|a| subst(a)).collect(),
            env: self
                .env
                .iter()
                .map(|(k, v)| (k.clone(), subst(v)))
                .collect(),
        }
    }

    /// Human-readable label for logs and error messages
    pub fn label(&self) -> String {
        if self.args.is_empty() {
            self.program.clone()
        } else {
            format!("{} {}", self.program, self.args.join(" "))
        }
    }
}

/// The universe of known formulas for one run
///
/// An explicit, passed-in mapping rather than ambient global state, so tests
/// can run against synthetic universes. Read-only for the duration of a run.
#[derive(Debug, Default)]
pub struct FormulaUniverse {
    formulas: BTreeMap<String, Formula>,
}

impl FormulaUniverse {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a formula; duplicate names are rejected
    pub fn insert(&mut self, formula: Formula) -> Result<()> {
        formula.validate()?;
        if self.formulas.contains_key(&formula.name) {
            return Err(Error::ParseError(format!(
                "duplicate formula name '{}'",
                formula.name
            )));
        }
        self.formulas.insert(formula.name.clone(), formula);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Formula> {
        self.formulas.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.formulas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.formulas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formulas.is_empty()
    }

    /// Iterate formulas in name order
    pub fn iter(&self) -> impl Iterator<Item = &Formula> {
        self.formulas.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn sample_formula() -> Formula {
        toml::from_str(
            r#"
name = "lazyssh"
description = "A cross-platform SSH management tool with TUI interface"
homepage = "https://example.com/lazyssh"
license = "MIT"

[source]
url = "https://example.com/lazyssh/archive/v0.2.0.tar.gz"
sha256 = "deadbeef"

[[dependencies]]
name = "rust"
kind = "build"

[[install]]
program = "cargo"
args = ["install", "--locked", "--root", "%(prefix)s", "--path", "."]

[[test]]
program = "%(prefix)s/bin/lazyssh"
args = ["--help"]
"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_formula_toml() {
        let formula = sample_formula();
        assert_eq!(formula.name, "lazyssh");
        assert_eq!(formula.license.as_deref(), Some("MIT"));
        assert_eq!(formula.dependencies.len(), 1);
        assert_eq!(formula.dependencies[0].kind, DependencyKind::Build);
        assert_eq!(formula.install.len(), 1);
        assert_eq!(formula.test.len(), 1);
        formula.validate().unwrap();
    }

    #[test]
    fn test_dependency_kind_defaults_to_runtime() {
        let dep: Dependency = toml::from_str("name = \"zlib\"").unwrap();
        assert_eq!(dep.kind, DependencyKind::Runtime);
    }

    #[test]
    fn test_prefix_substitution() {
        let formula = sample_formula();
        let prefix = PathBuf::from("/opt/cellar/lazyssh");

        let install = formula.install[0].resolved(&prefix);
        assert!(install.args.contains(&"/opt/cellar/lazyssh".to_string()));
        assert!(!install.args.iter().any(|a| a.contains("%(prefix)s")));

        let test = formula.test[0].resolved(&prefix);
        assert_eq!(test.program, "/opt/cellar/lazyssh/bin/lazyssh");
    }

    #[test]
    fn test_step_label() {
        let step = Step {
            program: "make".into(),
            args: vec!["install".into()],
            env: HashMap::new(),
        };
        assert_eq!(step.label(), "make install");
    }

    #[test]
    fn test_archive_filename() {
        let formula = sample_formula();
        assert_eq!(formula.archive_filename(), "v0.2.0.tar.gz");
    }

    #[test]
    fn test_validate_rejects_self_dependency() {
        let mut formula = sample_formula();
        formula.dependencies.push(Dependency {
            name: "lazyssh".into(),
            kind: DependencyKind::Runtime,
        });
        assert!(formula.validate().is_err());
    }

    #[test]
    fn test_universe_rejects_duplicates() {
        let mut universe = FormulaUniverse::new();
        universe.insert(sample_formula()).unwrap();
        let err = universe.insert(sample_formula()).unwrap_err();
        assert!(err.to_string().contains("duplicate"));
        assert_eq!(universe.len(), 1);
        assert!(universe.contains("lazyssh"));
    }
}
