// src/resolver/mod.rs

//! Dependency resolution
//!
//! Pure depth-first traversal over the formula universe. Produces a
//! deterministic topological install order (dependencies before dependents,
//! target last) or fails with an unknown-dependency or cycle error. Performs
//! no I/O and mutates nothing.

use crate::error::{Error, Result};
use crate::formula::FormulaUniverse;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    InProgress,
    Done,
}

/// Resolve the install order for `target`
///
/// The returned list is a valid topological order: every formula appears
/// after all of its dependencies, the target is last, and each formula
/// appears exactly once. Dependency lists are walked in declaration order,
/// so the result is identical across runs for the same universe.
pub fn resolve(target: &str, universe: &FormulaUniverse) -> Result<Vec<String>> {
    if !universe.contains(target) {
        return Err(Error::UnknownDependency {
            formula: "<request>".into(),
            dependency: target.into(),
        });
    }

    let mut marks: HashMap<String, Mark> = HashMap::new();
    let mut path: Vec<String> = Vec::new();
    let mut order: Vec<String> = Vec::new();
    visit(target, universe, &mut marks, &mut path, &mut order)?;
    Ok(order)
}

fn visit(
    name: &str,
    universe: &FormulaUniverse,
    marks: &mut HashMap<String, Mark>,
    path: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    match marks.get(name) {
        Some(Mark::Done) => return Ok(()),
        Some(Mark::InProgress) => {
            // Back edge: the cycle is the tail of the current path from the
            // first occurrence of `name`, closed with `name` again.
            let start = path.iter().position(|n| n == name).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].to_vec();
            cycle.push(name.to_string());
            return Err(Error::CyclicDependency { cycle });
        }
        None => {}
    }

    marks.insert(name.to_string(), Mark::InProgress);
    path.push(name.to_string());

    // `name` is marked in-progress only after a successful lookup above or
    // by a parent that found it in a dependency list, so a miss here is an
    // unknown dependency of the formula at the top of the path.
    let formula = match universe.get(name) {
        Some(f) => f,
        None => {
            let requirer = path
                .get(path.len().wrapping_sub(2))
                .cloned()
                .unwrap_or_else(|| "<request>".into());
            return Err(Error::UnknownDependency {
                formula: requirer,
                dependency: name.into(),
            });
        }
    };

    for dep in formula.dependency_names() {
        visit(dep, universe, marks, path, order)?;
    }

    path.pop();
    marks.insert(name.to_string(), Mark::Done);
    order.push(name.to_string());
    Ok(())
}

/// Transitive dependents of `failed` within a resolved install order
///
/// Forward pass over the topological order: a formula is poisoned when any
/// of its dependencies is the failed formula or already poisoned. Used to
/// skip the dependent subtree after a failure.
pub fn dependents_within<'a>(
    order: &'a [String],
    universe: &FormulaUniverse,
    failed: &str,
) -> Vec<&'a str> {
    let mut poisoned: Vec<&str> = vec![failed];
    let mut out = Vec::new();
    for name in order {
        if name == failed {
            continue;
        }
        let Some(formula) = universe.get(name) else {
            continue;
        };
        if formula
            .dependency_names()
            .iter()
            .any(|d| poisoned.contains(d))
        {
            poisoned.push(name);
            out.push(name.as_str());
        }
    }
    out
}
