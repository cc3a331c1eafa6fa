//! Build orchestration for unitweld.
//!
//! This crate turns the plans computed by `unitweld-core` into real compiler
//! and linker invocations:
//! - [`toolchain`]: compiler discovery and argv rendering
//! - [`orchestrator`]: the compile + link pipeline, one pass per test binary
//! - [`runner`]: test-binary execution and exit classification
//! - [`report`]: human-readable and machine-readable build/run reports
//! - [`structured_log`]: JSONL build event log

#![forbid(unsafe_code)]

pub mod orchestrator;
pub mod report;
pub mod runner;
pub mod structured_log;
pub mod toolchain;

pub use orchestrator::{BuildConfig, BuildError, BuiltBinary, PlannedBuild};
pub use report::{BuildReport, RunReport};
pub use runner::{RunnerError, run_binary, signal_name};
pub use structured_log::{LogEmitter, LogEntry, LogLevel};
pub use toolchain::{Invocation, Toolchain};
