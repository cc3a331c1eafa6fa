//! Symbol Resolution Policy Engine.
//!
//! For every symbol the merged unit references but does not define, decide
//! how the link satisfies it: a mock from the test unit, a collaborator
//! unit, or nothing at all (intentionally unresolved, by explicit opt-in).
//! The engine also owns the precedence rule for duplicate definitions:
//! earliest-listed link input wins, with the merged unit always first. That
//! rule is enforced here and documented on the plan rather than left to
//! whatever order the toolchain happens to process inputs in.
//!
//! Resolution is a single build-time pass. It either produces a complete
//! plan or rejects the build once, with the full list of unresolved and
//! ambiguous symbols; there are no retries.

use thiserror::Error;

use crate::diag::Diagnostic;
use crate::entry::{ENTRY_ALIAS, WeldedUnit};
use crate::model::{LinkInput, LinkPlan, ResolutionDecision, SymbolSource, Unit};
use crate::runtime_symbols::is_runtime_symbol;

/// Build-time resolution switches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Permit symbols with no definition anywhere in the link set. The
    /// engine cannot prove such a symbol is unreachable from the executed
    /// tests; it only defers the failure to runtime and makes it loud.
    pub tolerate_unresolved: bool,
    /// Permit the same symbol to be defined by more than one link input.
    pub tolerate_duplicates: bool,
    /// Extra compile-time definitions to carry onto the plan.
    pub defines: Vec<String>,
}

/// Output of one resolution pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Per-symbol decisions, in first-reference order.
    pub decisions: Vec<ResolutionDecision>,
    /// The ordered link inputs and flag set.
    pub plan: LinkPlan,
    /// Warning-class diagnostics: tolerated duplicates, surfaced rather than
    /// silent.
    pub warnings: Vec<Diagnostic>,
    /// Informational notes (e.g. transitive `.c` inclusion detected).
    pub notes: Vec<String>,
}

/// Resolution rejected the build.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// One report per build attempt, carrying every distinct cause.
    #[error("symbol resolution rejected the build: {}", render(.diagnostics))]
    Rejected {
        /// Every unresolved/ambiguous symbol found in this pass.
        diagnostics: Vec<Diagnostic>,
    },
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Compute the decision set and link plan for one welded unit.
pub fn resolve(
    welded: &WeldedUnit,
    collaborators: &[Unit],
    cfg: &PolicyConfig,
) -> Result<Resolution, PolicyError> {
    let merged = &welded.merged;
    let mut errors: Vec<Diagnostic> = Vec::new();
    let mut warnings: Vec<Diagnostic> = Vec::new();
    let mut decisions: Vec<ResolutionDecision> = Vec::new();
    let mut runtime_symbols: Vec<String> = Vec::new();

    // The alias only exists to be unclaimed; a collaborator defining it
    // would collide at link time, so reject it here.
    if welded.entry_alias.is_some() {
        for collab in collaborators {
            if collab.define(ENTRY_ALIAS).is_some() {
                errors.push(Diagnostic::EntryCollision {
                    symbol: ENTRY_ALIAS.to_string(),
                });
            }
        }
    }

    // Both halves compile as one translation unit, so a symbol defined by
    // both can never even compile; link-time duplicate tolerance does not
    // apply inside a single TU. The neutralized entry point is exempt.
    for def in &merged.target.defines {
        if welded.entry_alias.is_some() && def.name == "main" {
            continue;
        }
        if merged.test.define(&def.name).is_some() {
            errors.push(Diagnostic::DuplicateSymbol {
                symbol: def.name.clone(),
                locations: vec![
                    merged.target.path.display().to_string(),
                    merged.test.path.display().to_string(),
                ],
            });
        }
    }

    for symbol in &merged.external_references {
        // 1. Mock set first. The mock definition lives in the merged unit,
        //    which is always the earliest link input, so it is selected over
        //    any same-named definition when duplicates are permitted.
        if merged.mocks.iter().any(|m| m.symbol == *symbol) {
            for collab in collaborators {
                if collab.define(symbol).is_some_and(|d| d.visibility.is_public()) {
                    duplicate(
                        &mut errors,
                        &mut warnings,
                        cfg.tolerate_duplicates,
                        symbol,
                        vec![
                            format!("{} (mock, wins)", merged.test.path.display()),
                            collab.path.display().to_string(),
                        ],
                    );
                }
            }
            decisions.push(ResolutionDecision {
                symbol: symbol.clone(),
                source: SymbolSource::Mocked,
            });
            continue;
        }

        // 2. Collaborator units, in the order the author listed them.
        let mut providers = collaborators
            .iter()
            .filter(|c| c.define(symbol).is_some_and(|d| d.visibility.is_public()));
        if let Some(first) = providers.next() {
            let extra: Vec<&Unit> = providers.collect();
            if !extra.is_empty() {
                let mut locations = vec![format!("{} (earliest, wins)", first.path.display())];
                locations.extend(extra.iter().map(|c| c.path.display().to_string()));
                duplicate(
                    &mut errors,
                    &mut warnings,
                    cfg.tolerate_duplicates,
                    symbol,
                    locations,
                );
            }
            decisions.push(ResolutionDecision {
                symbol: symbol.clone(),
                source: SymbolSource::SuppliedByCollaborator {
                    unit: first.name.clone(),
                },
            });
            continue;
        }

        // 3. The hosted runtime satisfies these without any decision.
        if is_runtime_symbol(symbol) {
            runtime_symbols.push(symbol.clone());
            continue;
        }

        // 4. Nothing defines it. Permitted only by explicit opt-in, and only
        //    safe if no executed test path ever reaches it.
        if !cfg.tolerate_unresolved {
            errors.push(Diagnostic::UnresolvedSymbol {
                symbol: symbol.clone(),
            });
        }
        decisions.push(ResolutionDecision {
            symbol: symbol.clone(),
            source: SymbolSource::IntentionallyUnresolved,
        });
    }

    // Duplicates that no external reference points at are still link-time
    // collisions between inputs: merged public definitions vs collaborators,
    // and collaborators among themselves.
    let mocked = |symbol: &str| merged.mocks.iter().any(|m| m.symbol == symbol);
    for def in merged
        .target
        .public_defines()
        .chain(merged.test.public_defines())
    {
        if def.name == "main" || mocked(&def.name) {
            continue;
        }
        for collab in collaborators {
            if collab
                .define(&def.name)
                .is_some_and(|d| d.visibility.is_public())
            {
                duplicate(
                    &mut errors,
                    &mut warnings,
                    cfg.tolerate_duplicates,
                    &def.name,
                    vec![
                        "merged unit (earliest, wins)".to_string(),
                        collab.path.display().to_string(),
                    ],
                );
            }
        }
    }
    for (index, collab) in collaborators.iter().enumerate() {
        for def in collab.public_defines() {
            if mocked(&def.name)
                || merged.defines(&def.name)
                || merged.external_references.contains(&def.name)
            {
                continue; // already reported in the decision loop
            }
            for later in &collaborators[index + 1..] {
                if later
                    .define(&def.name)
                    .is_some_and(|d| d.visibility.is_public())
                {
                    duplicate(
                        &mut errors,
                        &mut warnings,
                        cfg.tolerate_duplicates,
                        &def.name,
                        vec![
                            format!("{} (earliest, wins)", collab.path.display()),
                            later.path.display().to_string(),
                        ],
                    );
                }
            }
        }
    }

    if !errors.is_empty() {
        return Err(PolicyError::Rejected {
            diagnostics: errors,
        });
    }

    let mut notes = Vec::new();
    let transitive = merged.transitive_unit_includes();
    if !transitive.is_empty() {
        notes.push(format!(
            "merged graph already includes other units textually ({}); duplicate symbols across the graph are possible",
            transitive.join(", ")
        ));
    }

    let unresolved: Vec<String> = decisions
        .iter()
        .filter(|d| d.source == SymbolSource::IntentionallyUnresolved)
        .map(|d| d.symbol.clone())
        .collect();

    let mut inputs = vec![LinkInput::Merged];
    inputs.extend(collaborators.iter().map(|c| LinkInput::Collaborator {
        unit: c.name.clone(),
        path: c.path.clone(),
    }));

    let plan = LinkPlan {
        inputs,
        tolerate_unresolved: cfg.tolerate_unresolved,
        tolerate_duplicates: cfg.tolerate_duplicates,
        // Relocating a binary with intentionally missing symbols is unsafe
        // at load time, so unresolved tolerance forces PIE off.
        disable_pie: cfg.tolerate_unresolved,
        entry_alias: welded.entry_alias.clone(),
        defines: cfg.defines.clone(),
        runtime_symbols,
        unresolved,
    };

    Ok(Resolution {
        decisions,
        plan,
        warnings,
        notes,
    })
}

fn duplicate(
    errors: &mut Vec<Diagnostic>,
    warnings: &mut Vec<Diagnostic>,
    tolerated: bool,
    symbol: &str,
    locations: Vec<String>,
) {
    let diagnostic = Diagnostic::DuplicateSymbol {
        symbol: symbol.to_string(),
        locations,
    };
    if tolerated {
        warnings.push(diagnostic);
    } else {
        errors.push(diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::neutralize;
    use crate::merge::load_for_test;
    use std::path::Path;

    fn unit(name: &str, src: &str) -> Unit {
        Unit::from_source(name, Path::new(&format!("/src/{name}.c")), src)
    }

    fn welded(target_src: &str, test_src: &str) -> WeldedUnit {
        let target = unit("example", target_src);
        let test = unit("example_test", test_src);
        neutralize(load_for_test(target, test)).unwrap()
    }

    const TARGET: &str = r"
        static int is_acceptable_id(unsigned int id) {
            if (database_id_exists(id)) return 0;
            return id > 1000 && id < 10000;
        }
        void some_function(int argument) {
            function_somewhere_else(argument);
        }
        int main(int argc, char **argv) { return 0; }
    ";

    const TEST: &str = r"
        int database_id_exists(unsigned int id) { return 0; }
        static void test_id(void) {
            assert(!is_acceptable_id(500));
            assert(is_acceptable_id(5000));
        }
        int main(void) { test_id(); return 0; }
    ";

    const COLLAB: &str = r"
        void function_somewhere_else(int argument) { abort(); }
        int database_id_exists(unsigned int id) { abort(); return 1; }
    ";

    #[test]
    fn mock_wins_and_unreached_dependency_may_stay_unresolved() {
        let w = welded(TARGET, TEST);
        let cfg = PolicyConfig {
            tolerate_unresolved: true,
            ..PolicyConfig::default()
        };
        let resolution = resolve(&w, &[], &cfg).unwrap();

        assert_eq!(
            resolution.decisions,
            vec![
                ResolutionDecision {
                    symbol: "database_id_exists".into(),
                    source: SymbolSource::Mocked,
                },
                ResolutionDecision {
                    symbol: "function_somewhere_else".into(),
                    source: SymbolSource::IntentionallyUnresolved,
                },
            ]
        );
        assert_eq!(
            resolution.plan.unresolved,
            vec!["function_somewhere_else".to_string()]
        );
        assert!(resolution.plan.disable_pie);
        assert!(resolution.plan.runtime_symbols.contains(&"assert".into()));
    }

    #[test]
    fn unresolved_without_opt_in_rejects_with_full_list() {
        let w = welded(
            "int run(void) { return probe() + other_probe(); }",
            "int main(void) { return run(); }",
        );
        let err = resolve(&w, &[], &PolicyConfig::default()).unwrap_err();
        let PolicyError::Rejected { diagnostics } = err;
        assert_eq!(diagnostics.len(), 2);
    }

    #[test]
    fn collaborator_supplies_what_is_not_mocked() {
        let w = welded(TARGET, TEST);
        let collab = unit("otherfile", COLLAB);
        let cfg = PolicyConfig {
            tolerate_duplicates: true,
            ..PolicyConfig::default()
        };
        let resolution = resolve(&w, &[collab], &cfg).unwrap();

        assert_eq!(
            resolution.decisions,
            vec![
                ResolutionDecision {
                    symbol: "database_id_exists".into(),
                    source: SymbolSource::Mocked,
                },
                ResolutionDecision {
                    symbol: "function_somewhere_else".into(),
                    source: SymbolSource::SuppliedByCollaborator {
                        unit: "otherfile".into()
                    },
                },
            ]
        );
        // the collaborator also defines the mocked symbol: surfaced, not silent
        assert_eq!(resolution.warnings.len(), 1);
        assert!(resolution.plan.unresolved.is_empty());
        assert!(!resolution.plan.disable_pie);
    }

    #[test]
    fn mock_shadowing_a_collaborator_needs_duplicate_tolerance() {
        let w = welded(TARGET, TEST);
        let collab = unit("otherfile", COLLAB);
        let err = resolve(&w, &[collab], &PolicyConfig::default()).unwrap_err();
        let PolicyError::Rejected { diagnostics } = err;
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DuplicateSymbol { symbol, .. } if symbol == "database_id_exists")));
    }

    #[test]
    fn earliest_listed_collaborator_wins() {
        let w = welded(
            "int run(void) { return probe(); }",
            "int main(void) { return run(); }",
        );
        let first = unit("first", "int probe(void) { return 1; }");
        let second = unit("second", "int probe(void) { return 2; }");
        let cfg = PolicyConfig {
            tolerate_duplicates: true,
            ..PolicyConfig::default()
        };
        let resolution = resolve(&w, &[first, second], &cfg).unwrap();
        assert_eq!(
            resolution.decisions,
            vec![ResolutionDecision {
                symbol: "probe".into(),
                source: SymbolSource::SuppliedByCollaborator {
                    unit: "first".into()
                },
            }]
        );
        assert_eq!(resolution.warnings.len(), 1);
        assert_eq!(
            resolution.plan.inputs,
            vec![
                LinkInput::Merged,
                LinkInput::Collaborator {
                    unit: "first".into(),
                    path: "/src/first.c".into()
                },
                LinkInput::Collaborator {
                    unit: "second".into(),
                    path: "/src/second.c".into()
                },
            ]
        );
    }

    #[test]
    fn redefining_a_target_definition_is_rejected_even_with_tolerance() {
        let w = welded(
            "int helper(void) { return 1; }\nint run(void) { return helper(); }",
            "int helper(void) { return 2; }\nint main(void) { return run(); }",
        );
        let cfg = PolicyConfig {
            tolerate_duplicates: true,
            tolerate_unresolved: true,
            defines: Vec::new(),
        };
        let err = resolve(&w, &[], &cfg).unwrap_err();
        let PolicyError::Rejected { diagnostics } = err;
        assert!(diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DuplicateSymbol { symbol, .. } if symbol == "helper")));
    }

    #[test]
    fn resolution_is_deterministic() {
        let collab_src = COLLAB;
        let cfg = PolicyConfig {
            tolerate_unresolved: true,
            tolerate_duplicates: true,
            defines: Vec::new(),
        };
        let first = {
            let w = welded(TARGET, TEST);
            resolve(&w, &[unit("otherfile", collab_src)], &cfg).unwrap()
        };
        let second = {
            let w = welded(TARGET, TEST);
            resolve(&w, &[unit("otherfile", collab_src)], &cfg).unwrap()
        };
        assert_eq!(first.decisions, second.decisions);
        assert_eq!(first.plan, second.plan);
    }

    #[test]
    fn merged_unit_is_always_the_first_link_input() {
        let w = welded(TARGET, TEST);
        let resolution = resolve(
            &w,
            &[],
            &PolicyConfig {
                tolerate_unresolved: true,
                ..PolicyConfig::default()
            },
        )
        .unwrap();
        assert_eq!(resolution.plan.inputs.first(), Some(&LinkInput::Merged));
        assert_eq!(resolution.plan.entry_alias.as_deref(), Some("uw_disabled_main"));
    }

    #[test]
    fn transitive_unit_inclusion_is_noted() {
        let w = welded(
            "#include \"legacy.c\"\nint run(void) { return 0; }",
            "int main(void) { return run(); }",
        );
        let resolution = resolve(&w, &[], &PolicyConfig::default()).unwrap();
        assert_eq!(resolution.notes.len(), 1);
        assert!(resolution.notes[0].contains("legacy.c"));
    }
}
