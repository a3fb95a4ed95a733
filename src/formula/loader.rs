// src/formula/loader.rs

//! Load formula TOML files from a directory into a universe

use crate::error::{Error, Result};
use crate::formula::{Formula, FormulaUniverse};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Load every `*.toml` file under `dir` into a new universe
///
/// Files are loaded in sorted path order so duplicate-name errors are
/// reported deterministically. Non-TOML files are ignored.
pub fn load_formula_dir(dir: &Path) -> Result<FormulaUniverse> {
    if !dir.is_dir() {
        return Err(Error::InitError(format!(
            "formula directory not found: {}",
            dir.display()
        )));
    }

    let mut paths: Vec<_> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    paths.sort();

    let mut universe = FormulaUniverse::new();
    for path in paths {
        let formula = load_formula_file(&path)?;
        debug!("loaded formula '{}' from {}", formula.name, path.display());
        universe.insert(formula)?;
    }
    Ok(universe)
}

/// Parse and validate a single formula file
pub fn load_formula_file(path: &Path) -> Result<Formula> {
    let contents = fs::read_to_string(path)?;
    let formula: Formula = toml::from_str(&contents)
        .map_err(|e| Error::ParseError(format!("{}: {e}", path.display())))?;
    formula.validate()?;
    Ok(formula)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const MINIMAL: &str = r#"
name = "NAME"
[source]
url = "https://example.com/NAME.tar.gz"
sha256 = "aa"
"#;

    #[test]
    fn test_load_directory_ignores_non_toml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.toml"), MINIMAL.replace("NAME", "a")).unwrap();
        fs::write(dir.path().join("b.toml"), MINIMAL.replace("NAME", "b")).unwrap();
        fs::write(dir.path().join("notes.txt"), "not a formula").unwrap();

        let universe = load_formula_dir(dir.path()).unwrap();
        assert_eq!(universe.len(), 2);
        assert!(universe.contains("a"));
        assert!(universe.contains("b"));
    }

    #[test]
    fn test_load_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(load_formula_dir(&missing).is_err());
    }

    #[test]
    fn test_load_invalid_toml_fails() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.toml"), "name = [broken").unwrap();
        assert!(load_formula_dir(dir.path()).is_err());
    }
}
