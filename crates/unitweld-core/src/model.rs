//! Data model for units, symbols, and link planning.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::scan::{self, ScanError};

/// Kind of a defined symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    /// A function definition.
    Function,
    /// A file-scope object (variable) definition.
    Object,
}

/// Linkage visibility of a defined symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// `static`: visible only inside the defining translation unit.
    Private,
    /// External linkage: visible to the linker.
    Public,
}

impl Visibility {
    /// True for external linkage.
    #[must_use]
    pub const fn is_public(self) -> bool {
        matches!(self, Self::Public)
    }
}

/// One symbol defined by a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolDef {
    /// Symbol name.
    pub name: String,
    /// Function or object.
    pub kind: SymbolKind,
    /// Private (`static`) or public (external linkage).
    pub visibility: Visibility,
}

/// One compilable C source artifact and its symbol surface.
///
/// `defines` and `references` are in source order, deduplicated at first
/// occurrence. That ordering is load-bearing: the policy engine derives its
/// deterministic decision order from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    /// Short identity, usually the file stem.
    pub name: String,
    /// Source path as given by the caller.
    pub path: PathBuf,
    /// Symbols this unit defines.
    pub defines: Vec<SymbolDef>,
    /// Symbols this unit references but does not define.
    pub references: Vec<String>,
    /// Paths of other `.c` units this unit textually includes. Non-empty
    /// means the whole-unit merge technique is already applied transitively
    /// inside the unit, so duplicate symbols across the merged graph are
    /// possible; the orchestrator surfaces this, never silently resolves it.
    pub unit_includes: Vec<String>,
}

impl Unit {
    /// Build a unit from already-loaded source text.
    pub fn from_source(name: impl Into<String>, path: &Path, source: &str) -> Self {
        let scanned = scan::scan(source);
        let defines = scanned.defines;
        let defined: Vec<&str> = defines.iter().map(|d| d.name.as_str()).collect();
        let references = scanned
            .references
            .into_iter()
            .filter(|r| !defined.contains(&r.as_str()))
            .collect();
        Self {
            name: name.into(),
            path: path.to_path_buf(),
            defines,
            references,
            unit_includes: scanned.unit_includes,
        }
    }

    /// Load and scan a unit from disk. The unit name is the file stem.
    pub fn load(path: &Path) -> Result<Self, ScanError> {
        let source = std::fs::read_to_string(path).map_err(|source| ScanError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let name = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unit")
            .to_string();
        Ok(Self::from_source(name, path, &source))
    }

    /// Look up a definition by name.
    #[must_use]
    pub fn define(&self, name: &str) -> Option<&SymbolDef> {
        self.defines.iter().find(|d| d.name == name)
    }

    /// True if the unit defines the program entry point.
    #[must_use]
    pub fn defines_entry(&self) -> bool {
        self.define("main")
            .is_some_and(|d| d.kind == SymbolKind::Function)
    }

    /// Names of public (linker-visible) definitions.
    pub fn public_defines(&self) -> impl Iterator<Item = &SymbolDef> {
        self.defines
            .iter()
            .filter(|d| d.visibility == Visibility::Public)
    }
}

/// A test-supplied definition that overrides a real dependency of the unit
/// under test. Derived, not declared: any public definition in the test unit
/// whose name matches an external reference of the target unit is a mock.
/// Signature compatibility with the real declaration is the test author's
/// responsibility; unitweld performs no signature checking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mock {
    /// Name of the overridden symbol.
    pub symbol: String,
    /// Kind of the overriding definition.
    pub kind: SymbolKind,
}

/// How one externally referenced symbol gets satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SymbolSource {
    /// The test unit supplies a definition that overrides the real one.
    Mocked,
    /// A collaborator unit supplies the real definition.
    SuppliedByCollaborator {
        /// Name of the collaborator unit that defines the symbol.
        unit: String,
    },
    /// No definition anywhere in the link set; tolerated only by explicit
    /// opt-in, and fatal at runtime if the symbol is ever invoked.
    IntentionallyUnresolved,
}

/// Per-symbol outcome of the resolution policy. Built fresh per build,
/// serializable for `unitweld plan`, never persisted by the tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionDecision {
    /// The externally referenced symbol.
    pub symbol: String,
    /// Where its definition comes from.
    pub source: SymbolSource,
}

/// One ordered input to the final link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkInput {
    /// The merged translation unit (target + test welded together). Always
    /// listed first: that is what gives mocks and test-local definitions
    /// precedence when duplicate definitions are tolerated.
    Merged,
    /// A collaborator unit, in the order the test author listed it.
    Collaborator {
        /// Unit name.
        unit: String,
        /// Source path.
        path: PathBuf,
    },
}

/// Ordered link inputs plus the flag set the orchestrator must apply.
/// Computed once per build invocation, consumed immediately, discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkPlan {
    /// Link inputs, earliest first. Earliest-listed definition wins when
    /// duplicate definitions are tolerated; the engine enforces this order
    /// rather than leaving it to incidental toolchain behavior.
    pub inputs: Vec<LinkInput>,
    /// Permit unresolved symbols at link time (explicit opt-in).
    pub tolerate_unresolved: bool,
    /// Permit duplicate definitions across link inputs.
    pub tolerate_duplicates: bool,
    /// Disable position-independent-executable relocation. Forced on
    /// whenever `tolerate_unresolved` is on: relocating a binary with
    /// intentionally missing symbols is unsafe at load time.
    pub disable_pie: bool,
    /// Alias the target unit's `main` compiles under, when it has one.
    pub entry_alias: Option<String>,
    /// Extra compile-time definitions (`NAME` or `NAME=VALUE`).
    pub defines: Vec<String>,
    /// References satisfied by the hosted C runtime (printf and friends).
    /// Excluded from the decision set; listed here so the plan stays honest.
    pub runtime_symbols: Vec<String>,
    /// Symbols decided IntentionallyUnresolved. Invoking one at runtime
    /// terminates the test process abnormally.
    pub unresolved: Vec<String>,
}
