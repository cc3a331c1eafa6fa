//! Structured classification of toolchain and runtime failures.
//!
//! The linker is driven as an opaque service, so its failures arrive as raw
//! stderr text. This module maps the recognizable shapes (GNU ld, gold, and
//! lld spellings) onto symbol-scoped diagnostics, and classifies test-process
//! exits. Lines that match nothing are kept as an unclassified remainder so
//! nothing is swallowed, but they are never presented as the primary cause
//! when a structured one is identifiable.

use std::fmt;

use serde::Serialize;

use crate::entry::ENTRY_ALIAS;

/// A symbol-scoped failure cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Diagnostic {
    /// The same symbol is defined by more than one link input. Warning-class
    /// when duplicate tolerance is on (earliest-listed input wins), an error
    /// otherwise.
    DuplicateSymbol {
        /// The multiply defined symbol.
        symbol: String,
        /// Defining locations, earliest (winning) first.
        locations: Vec<String>,
    },
    /// A referenced symbol has no definition in the link set.
    UnresolvedSymbol {
        /// The missing symbol.
        symbol: String,
    },
    /// The entry rename target already names another symbol.
    EntryCollision {
        /// The colliding name.
        symbol: String,
    },
    /// The test process died reaching a symbol that was intentionally left
    /// unresolved: the test author's reachability assumption was wrong. This
    /// is distinct from a test failure.
    RuntimeUnexpectedCall {
        /// Terminating signal number.
        signal: i32,
        /// Symbols that were intentionally unresolved in this binary.
        suspects: Vec<String>,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DuplicateSymbol { symbol, locations } => {
                write!(f, "duplicate definition of '{symbol}'")?;
                if !locations.is_empty() {
                    write!(f, " ({})", locations.join(", "))?;
                }
                Ok(())
            }
            Self::UnresolvedSymbol { symbol } => {
                write!(
                    f,
                    "unresolved symbol '{symbol}' (mock it, supply a collaborator unit, or opt in with --allow-unresolved)"
                )
            }
            Self::EntryCollision { symbol } => {
                write!(f, "entry rename target '{symbol}' is already in use")
            }
            Self::RuntimeUnexpectedCall { signal, suspects } => {
                write!(
                    f,
                    "test process died on signal {signal} after reaching a symbol thought unreachable; unresolved in this binary: {}",
                    suspects.join(", ")
                )
            }
        }
    }
}

/// Classified linker stderr.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkDiagnostics {
    /// Structured causes, in first-occurrence order.
    pub diagnostics: Vec<Diagnostic>,
    /// Lines that matched no known shape.
    pub unclassified: Vec<String>,
}

impl LinkDiagnostics {
    /// True when at least one structured cause was identified.
    #[must_use]
    pub fn has_structured_cause(&self) -> bool {
        !self.diagnostics.is_empty()
    }
}

/// Classify raw linker stderr into symbol-scoped diagnostics.
#[must_use]
pub fn classify_link_stderr(stderr: &str) -> LinkDiagnostics {
    let mut out = LinkDiagnostics::default();

    for line in stderr.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(rest) = find_after(line, "multiple definition of ") {
            let Some(symbol) = extract_symbol(rest) else {
                out.unclassified.push(line.to_string());
                continue;
            };
            let mut locations = Vec::new();
            if let Some(head) = line.split(": multiple definition of").next()
                && head != line
            {
                locations.push(head.trim().to_string());
            }
            if let Some(first) = find_after(line, "; ")
                && first.contains("first defined here")
            {
                let loc = first.trim_end_matches(long_tail).trim_end_matches(':').trim();
                locations.push(loc.to_string());
            }
            record_duplicate(&mut out, symbol, locations);
            continue;
        }

        // compiler-stage in-TU duplicate (gcc/clang "error: redefinition of")
        if let Some(rest) = find_after(line, "redefinition of ") {
            let Some(symbol) = extract_symbol(rest) else {
                out.unclassified.push(line.to_string());
                continue;
            };
            let mut locations = Vec::new();
            if let Some(head) = line.split_once(": error:").map(|(h, _)| h) {
                locations.push(head.trim().to_string());
            }
            record_duplicate(&mut out, symbol, locations);
            continue;
        }

        if let Some(rest) = find_after(line, "duplicate symbol: ") {
            let Some(symbol) = extract_symbol(rest) else {
                out.unclassified.push(line.to_string());
                continue;
            };
            record_duplicate(&mut out, symbol, Vec::new());
            continue;
        }

        if line.starts_with(">>>") {
            // lld location detail for the preceding duplicate/undefined line
            if let Some(Diagnostic::DuplicateSymbol { locations, .. }) =
                out.diagnostics.last_mut()
            {
                locations.push(line.trim_start_matches('>').trim().to_string());
            } else {
                out.unclassified.push(line.to_string());
            }
            continue;
        }

        if let Some(rest) = find_after(line, "undefined reference to ")
            .or_else(|| find_after(line, "undefined symbol: "))
        {
            let Some(symbol) = extract_symbol(rest) else {
                out.unclassified.push(line.to_string());
                continue;
            };
            record_undefined(&mut out, symbol);
            continue;
        }

        out.unclassified.push(line.to_string());
    }

    out
}

fn long_tail(c: char) -> bool {
    // strip the "first defined here" suffix without caring about punctuation
    c.is_alphabetic() || c == ' '
}

fn find_after<'a>(line: &'a str, needle: &str) -> Option<&'a str> {
    line.find(needle).map(|pos| &line[pos + needle.len()..])
}

/// Pull a symbol name out of text like `` `foo'; `` or `foo` or `'foo'`.
fn extract_symbol(text: &str) -> Option<String> {
    let trimmed = text.trim_start_matches(['`', '\'', '"', ' ', '\u{2018}']);
    let symbol: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '.' || *c == '$')
        .collect();
    if symbol.is_empty() {
        None
    } else {
        Some(symbol)
    }
}

fn record_duplicate(out: &mut LinkDiagnostics, symbol: String, locations: Vec<String>) {
    if symbol == ENTRY_ALIAS {
        if !out
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::EntryCollision { symbol: s } if *s == symbol))
        {
            out.diagnostics.push(Diagnostic::EntryCollision { symbol });
        }
        return;
    }
    for existing in &mut out.diagnostics {
        if let Diagnostic::DuplicateSymbol {
            symbol: s,
            locations: locs,
        } = existing
            && *s == symbol
        {
            for loc in locations {
                if !locs.contains(&loc) {
                    locs.push(loc);
                }
            }
            return;
        }
    }
    out.diagnostics
        .push(Diagnostic::DuplicateSymbol { symbol, locations });
}

fn record_undefined(out: &mut LinkDiagnostics, symbol: String) {
    let already = out
        .diagnostics
        .iter()
        .any(|d| matches!(d, Diagnostic::UnresolvedSymbol { symbol: s } if *s == symbol));
    if !already {
        out.diagnostics.push(Diagnostic::UnresolvedSymbol { symbol });
    }
}

/// Outcome of running a built test binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunOutcome {
    /// Exit status 0: the test suite passed.
    Passed,
    /// Nonzero exit status: the test suite's own failure signal.
    TestFailed {
        /// Process exit code.
        code: i32,
    },
    /// Killed by a signal with intentionally unresolved symbols in the
    /// binary: almost certainly one of them was reached.
    UnexpectedCall {
        /// Terminating signal.
        signal: i32,
        /// The intentionally unresolved symbols.
        suspects: Vec<String>,
    },
    /// Killed by a signal with nothing unresolved: a plain crash.
    Crashed {
        /// Terminating signal.
        signal: i32,
    },
}

impl RunOutcome {
    /// Structured diagnostic for abnormal terminations, if any.
    #[must_use]
    pub fn diagnostic(&self) -> Option<Diagnostic> {
        match self {
            Self::UnexpectedCall { signal, suspects } => Some(Diagnostic::RuntimeUnexpectedCall {
                signal: *signal,
                suspects: suspects.clone(),
            }),
            _ => None,
        }
    }

    /// True for the pass case only.
    #[must_use]
    pub fn passed(&self) -> bool {
        matches!(self, Self::Passed)
    }
}

/// Classify a test-process exit. `code`/`signal` mirror the platform exit
/// status; `unresolved` is the plan's IntentionallyUnresolved set.
#[must_use]
pub fn classify_exit(code: Option<i32>, signal: Option<i32>, unresolved: &[String]) -> RunOutcome {
    match (code, signal) {
        (Some(0), _) => RunOutcome::Passed,
        (Some(code), _) => RunOutcome::TestFailed { code },
        (None, Some(signal)) if !unresolved.is_empty() => RunOutcome::UnexpectedCall {
            signal,
            suspects: unresolved.to_vec(),
        },
        (None, Some(signal)) => RunOutcome::Crashed { signal },
        (None, None) => RunOutcome::Crashed { signal: 0 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gnu_ld_multiple_definition_lines() {
        let stderr = "/usr/bin/ld: collab.o:collab.c:(.text+0x0): multiple definition of `database_id_exists'; weld.o:weld.c:(.text+0x40): first defined here";
        let result = classify_link_stderr(stderr);
        assert_eq!(result.diagnostics.len(), 1);
        match &result.diagnostics[0] {
            Diagnostic::DuplicateSymbol { symbol, locations } => {
                assert_eq!(symbol, "database_id_exists");
                assert!(!locations.is_empty());
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn gnu_ld_undefined_reference_lines() {
        let stderr = "/usr/bin/ld: weld.o: in function `some_function':\nweld.c:(.text+0x12): undefined reference to `function_somewhere_else'";
        let result = classify_link_stderr(stderr);
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::UnresolvedSymbol {
                symbol: "function_somewhere_else".into()
            }]
        );
    }

    #[test]
    fn lld_spellings() {
        let stderr = "ld.lld: error: duplicate symbol: database_id_exists\n>>> defined at collab.c:12\n>>> defined at weld.c:3\nld.lld: error: undefined symbol: function_somewhere_else";
        let result = classify_link_stderr(stderr);
        assert_eq!(result.diagnostics.len(), 2);
        match &result.diagnostics[0] {
            Diagnostic::DuplicateSymbol { symbol, locations } => {
                assert_eq!(symbol, "database_id_exists");
                assert_eq!(locations.len(), 2);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn repeated_undefined_references_are_deduped() {
        let stderr = "a.c: undefined reference to `probe'\nb.c: undefined reference to `probe'";
        let result = classify_link_stderr(stderr);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn entry_alias_duplicate_is_an_entry_collision() {
        let stderr =
            "x.o: multiple definition of `uw_disabled_main'; y.o:(.text+0x0): first defined here";
        let result = classify_link_stderr(stderr);
        assert_eq!(
            result.diagnostics,
            vec![Diagnostic::EntryCollision {
                symbol: "uw_disabled_main".into()
            }]
        );
    }

    #[test]
    fn gcc_redefinition_with_unicode_quotes() {
        let stderr = "weld.c:12:5: error: redefinition of \u{2018}helper\u{2019}";
        let result = classify_link_stderr(stderr);
        assert_eq!(result.diagnostics.len(), 1);
        match &result.diagnostics[0] {
            Diagnostic::DuplicateSymbol { symbol, locations } => {
                assert_eq!(symbol, "helper");
                assert_eq!(locations, &vec!["weld.c:12:5".to_string()]);
            }
            other => panic!("unexpected diagnostic {other:?}"),
        }
    }

    #[test]
    fn noise_is_kept_but_not_promoted() {
        let stderr = "collect2: error: ld returned 1 exit status";
        let result = classify_link_stderr(stderr);
        assert!(!result.has_structured_cause());
        assert_eq!(result.unclassified.len(), 1);
    }

    #[test]
    fn exit_classification() {
        assert_eq!(classify_exit(Some(0), None, &[]), RunOutcome::Passed);
        assert_eq!(
            classify_exit(Some(1), None, &[]),
            RunOutcome::TestFailed { code: 1 }
        );
        let unresolved = vec!["function_somewhere_else".to_string()];
        assert_eq!(
            classify_exit(None, Some(11), &unresolved),
            RunOutcome::UnexpectedCall {
                signal: 11,
                suspects: unresolved.clone()
            }
        );
        assert_eq!(
            classify_exit(None, Some(6), &[]),
            RunOutcome::Crashed { signal: 6 }
        );
    }

    #[test]
    fn nonzero_exit_beats_unresolved_suspicion() {
        // a clean nonzero exit is the test suite speaking, even when the
        // binary carries unresolved symbols
        let unresolved = vec!["do_other".to_string()];
        assert_eq!(
            classify_exit(Some(2), None, &unresolved),
            RunOutcome::TestFailed { code: 2 }
        );
    }
}
