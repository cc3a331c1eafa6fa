//! Build and run reports, rendered as markdown or JSON.
//!
//! The markdown rendering is for humans reading a terminal or a CI log; the
//! JSON rendering is the same data for tooling. Both are produced from the
//! plan and outcome of a single invocation and never persisted by the tool
//! itself.

use serde::Serialize;

use unitweld_core::diag::{Diagnostic, RunOutcome};
use unitweld_core::model::{LinkInput, ResolutionDecision, SymbolSource};

use crate::orchestrator::PlannedBuild;
use crate::runner::signal_name;
use crate::structured_log::now_timestamp;

/// Report over a planned (or completed) build.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub title: String,
    /// Unix-epoch seconds at report creation.
    pub timestamp: String,
    /// Correlates with the build's log entries.
    pub trace_id: String,
    /// Target unit path.
    pub target: String,
    /// Test unit path.
    pub test: String,
    /// Link inputs in precedence order, rendered.
    pub link_inputs: Vec<String>,
    /// Per-symbol resolution decisions.
    pub decisions: Vec<ResolutionDecision>,
    /// References satisfied by the hosted C runtime.
    pub runtime_symbols: Vec<String>,
    /// Symbols intentionally left unresolved.
    pub unresolved: Vec<String>,
    /// Tolerated duplicates and other warning-class findings, rendered.
    pub warnings: Vec<String>,
    /// Informational notes.
    pub notes: Vec<String>,
    /// Path of the built binary, when the build ran to completion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub binary: Option<String>,
}

impl BuildReport {
    /// Build the report from a plan; `binary` is set after a completed build.
    #[must_use]
    pub fn from_planned(planned: &PlannedBuild, binary: Option<&std::path::Path>) -> Self {
        let merged = &planned.welded.merged;
        Self {
            title: format!("unitweld: {} under test", merged.target.name),
            timestamp: now_timestamp(),
            trace_id: planned.trace_id.clone(),
            target: merged.target.path.display().to_string(),
            test: merged.test.path.display().to_string(),
            link_inputs: planned
                .resolution
                .plan
                .inputs
                .iter()
                .map(render_input)
                .collect(),
            decisions: planned.resolution.decisions.clone(),
            runtime_symbols: planned.resolution.plan.runtime_symbols.clone(),
            unresolved: planned.resolution.plan.unresolved.clone(),
            warnings: planned
                .resolution
                .warnings
                .iter()
                .map(Diagnostic::to_string)
                .collect(),
            notes: planned.resolution.notes.clone(),
            binary: binary.map(|p| p.display().to_string()),
        }
    }

    /// Render as a markdown document.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("# {}\n\n", self.title));
        out.push_str(&format!("- trace: `{}`\n", self.trace_id));
        out.push_str(&format!("- target: `{}`\n", self.target));
        out.push_str(&format!("- test: `{}`\n", self.test));
        if let Some(binary) = &self.binary {
            out.push_str(&format!("- binary: `{binary}`\n"));
        }
        out.push('\n');

        out.push_str("## Link inputs\n\n");
        for (index, input) in self.link_inputs.iter().enumerate() {
            out.push_str(&format!("{}. {input}\n", index + 1));
        }
        out.push('\n');

        out.push_str("## Symbol decisions\n\n");
        if self.decisions.is_empty() {
            out.push_str("(no external references)\n");
        } else {
            out.push_str("| Symbol | Source |\n|---|---|\n");
            for decision in &self.decisions {
                out.push_str(&format!(
                    "| `{}` | {} |\n",
                    decision.symbol,
                    render_source(&decision.source)
                ));
            }
        }
        out.push('\n');

        if !self.runtime_symbols.is_empty() {
            out.push_str("## Runtime-satisfied references\n\n");
            for symbol in &self.runtime_symbols {
                out.push_str(&format!("- `{symbol}`\n"));
            }
            out.push('\n');
        }
        if !self.warnings.is_empty() {
            out.push_str("## Warnings\n\n");
            for warning in &self.warnings {
                out.push_str(&format!("- {warning}\n"));
            }
            out.push('\n');
        }
        if !self.notes.is_empty() {
            out.push_str("## Notes\n\n");
            for note in &self.notes {
                out.push_str(&format!("- {note}\n"));
            }
            out.push('\n');
        }
        out
    }

    /// Render as pretty-printed JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }
}

/// Report over one test-binary execution.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    #[serde(flatten)]
    pub build: BuildReport,
    /// Classified exit of the test process.
    pub outcome: RunOutcome,
}

impl RunReport {
    #[must_use]
    pub fn new(build: BuildReport, outcome: RunOutcome) -> Self {
        Self { build, outcome }
    }

    /// Render as a markdown document: the build report plus the outcome.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let mut out = self.build.to_markdown();
        out.push_str("## Outcome\n\n");
        match &self.outcome {
            RunOutcome::Passed => out.push_str("**PASS**: test suite exited 0\n"),
            RunOutcome::TestFailed { code } => {
                out.push_str(&format!("**FAIL**: test suite exited {code}\n"));
            }
            RunOutcome::UnexpectedCall { signal, suspects } => {
                out.push_str(&format!(
                    "**UNEXPECTED CALL**: process died on {}; unresolved in this binary: {}\n",
                    signal_name(*signal),
                    suspects
                        .iter()
                        .map(|s| format!("`{s}`"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            RunOutcome::Crashed { signal } => {
                out.push_str(&format!(
                    "**CRASH**: process died on {}\n",
                    signal_name(*signal)
                ));
            }
        }
        out
    }

    /// Render as pretty-printed JSON.
    #[must_use]
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|_| String::from("{}"))
    }
}

fn render_input(input: &LinkInput) -> String {
    match input {
        LinkInput::Merged => String::from("merged unit (target + test, mocks win here)"),
        LinkInput::Collaborator { unit, path } => {
            format!("collaborator `{unit}` ({})", path.display())
        }
    }
}

fn render_source(source: &SymbolSource) -> String {
    match source {
        SymbolSource::Mocked => String::from("mocked by the test unit"),
        SymbolSource::SuppliedByCollaborator { unit } => {
            format!("supplied by collaborator `{unit}`")
        }
        SymbolSource::IntentionallyUnresolved => String::from("intentionally unresolved"),
    }
}
