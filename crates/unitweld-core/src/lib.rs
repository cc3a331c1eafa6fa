//! Core policy engine for unitweld.
//!
//! unitweld lets a C test translation unit call another unit's file-local
//! (`static`) functions and substitute mocks for selected external
//! dependencies, without editing the unit under test. This crate holds the
//! build-time decision logic:
//!
//! - [`model`]: units, mocks, resolution decisions, and the link plan
//! - [`scan`]: a deterministic symbol scanner for C sources
//! - [`merge`]: whole-unit merge planning (the Unit Loader)
//! - [`entry`]: scoped neutralization of the target unit's `main`
//! - [`policy`]: the symbol resolution policy engine
//! - [`diag`]: structured classification of toolchain and runtime failures
//!
//! Nothing here spawns a process or writes a file; the harness crate turns
//! the plans produced here into compiler and linker invocations.

#![forbid(unsafe_code)]

pub mod diag;
pub mod entry;
pub mod merge;
pub mod model;
pub mod policy;
pub mod runtime_symbols;
pub mod scan;

pub use diag::{Diagnostic, RunOutcome};
pub use merge::MergedUnit;
pub use entry::WeldedUnit;
pub use model::{
    LinkInput, LinkPlan, Mock, ResolutionDecision, SymbolDef, SymbolKind, SymbolSource, Unit,
    Visibility,
};
pub use policy::{PolicyConfig, Resolution};
