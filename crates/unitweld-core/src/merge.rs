//! Unit Loader: whole-unit merge planning.
//!
//! The target unit and the test unit become one translation unit, so every
//! symbol the target defines, private or public, is directly callable from
//! test code. Inclusion is whole-unit by construction: the loader takes unit
//! values, never symbol subsets, so partial extraction is unrepresentable.
//!
//! Merging also merges file-scope state. Any `static` variable in the target
//! becomes shared mutable state of the test binary, initialized once at load
//! and never reset between test cases; test authors who need isolation must
//! reinitialize it themselves.

use crate::model::{Mock, Unit, Visibility};

/// The target and test units welded into one planned translation unit.
///
/// Produced by [`load_for_test`]; the entry point is not neutralized yet —
/// see [`crate::entry::neutralize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedUnit {
    /// Unit under test.
    pub target: Unit,
    /// Test unit gaining private access.
    pub test: Unit,
    /// Test-unit definitions overriding target dependencies.
    pub mocks: Vec<Mock>,
    /// Symbols referenced by the merged unit but defined by neither half,
    /// in first-reference order (target first, then test).
    pub external_references: Vec<String>,
}

impl MergedUnit {
    /// True if either half defines the given symbol.
    #[must_use]
    pub fn defines(&self, name: &str) -> bool {
        self.target.define(name).is_some() || self.test.define(name).is_some()
    }

    /// True if either half references the given symbol.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.target.references.iter().any(|r| r == name)
            || self.test.references.iter().any(|r| r == name)
    }

    /// `.c` paths either half includes textually. Non-empty means the merge
    /// technique is already applied transitively inside the graph and
    /// duplicate symbols are possible; surfaced, never silently resolved.
    #[must_use]
    pub fn transitive_unit_includes(&self) -> Vec<String> {
        let mut all = self.target.unit_includes.clone();
        for inc in &self.test.unit_includes {
            if !all.contains(inc) {
                all.push(inc.clone());
            }
        }
        all
    }
}

/// Merge the whole target unit into the test unit's compilation context.
#[must_use]
pub fn load_for_test(target: Unit, test: Unit) -> MergedUnit {
    let mocks = target
        .references
        .iter()
        .filter_map(|reference| {
            test.define(reference)
                .filter(|d| d.visibility == Visibility::Public)
                .map(|d| Mock {
                    symbol: d.name.clone(),
                    kind: d.kind,
                })
        })
        .collect();

    let mut external_references = Vec::new();
    for reference in target.references.iter().chain(test.references.iter()) {
        if target.define(reference).is_some() || test.define(reference).is_some() {
            continue;
        }
        if !external_references.contains(reference) {
            external_references.push(reference.clone());
        }
    }

    MergedUnit {
        target,
        test,
        mocks,
        external_references,
    }
}
