//! Build Orchestrator: from source units to a runnable test binary.
//!
//! One synchronous pass per binary: load and scan the units, weld them,
//! resolve symbols, render the wrapper into a scratch directory, compile,
//! link, and classify anything that goes wrong. Build-time failures are all
//! surfaced before a binary exists; the link writes to a temporary name and
//! is renamed into place only on success, so a failed build never leaves a
//! partial binary behind.
//!
//! The scratch directory is named by a digest of the build inputs, so
//! rebuilding the same configuration lands in the same place and parallel
//! builds of different test binaries never share state.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Output;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use unitweld_core::diag::{self, Diagnostic};
use unitweld_core::entry::{self, EntryError, WeldedUnit};
use unitweld_core::merge;
use unitweld_core::model::Unit;
use unitweld_core::policy::{self, PolicyConfig, PolicyError, Resolution};
use unitweld_core::scan::ScanError;

use crate::structured_log::{LogEmitter, LogEntry, LogLevel};
use crate::toolchain::{Invocation, Toolchain};

/// Inputs and switches for one test-binary build.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Unit under test.
    pub target: PathBuf,
    /// Test unit.
    pub test: PathBuf,
    /// Collaborator units, in precedence order.
    pub collaborators: Vec<PathBuf>,
    /// Opt in to symbols with no definition in the link set.
    pub tolerate_unresolved: bool,
    /// Opt in to duplicate definitions across link inputs.
    pub tolerate_duplicates: bool,
    /// Extra compile-time definitions (`NAME` or `NAME=VALUE`).
    pub defines: Vec<String>,
    /// Compiler override; `CC` and then `cc` otherwise.
    pub cc: Option<PathBuf>,
    /// Root for per-build scratch directories.
    pub build_dir: PathBuf,
    /// Final binary path; defaults into the scratch directory.
    pub output: Option<PathBuf>,
}

impl BuildConfig {
    /// Config with defaults for everything but the two required units.
    #[must_use]
    pub fn new(target: impl Into<PathBuf>, test: impl Into<PathBuf>) -> Self {
        Self {
            target: target.into(),
            test: test.into(),
            collaborators: Vec::new(),
            tolerate_unresolved: false,
            tolerate_duplicates: false,
            defines: Vec::new(),
            cc: None,
            build_dir: PathBuf::from("target/unitweld"),
            output: None,
        }
    }
}

/// Pipeline stage a toolchain failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStage {
    Compile,
    Link,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile => write!(f, "compile"),
            Self::Link => write!(f, "link"),
        }
    }
}

/// Build failure. Every distinct cause found in the failing stage is
/// carried; nothing is reported piecemeal across retries (there are none).
#[derive(Debug, Error)]
pub enum BuildError {
    /// A unit source could not be read or scanned.
    #[error(transparent)]
    Scan(#[from] ScanError),
    /// Entry-point neutralization failed.
    #[error(transparent)]
    Entry(#[from] EntryError),
    /// The policy engine rejected the build.
    #[error(transparent)]
    Policy(#[from] PolicyError),
    /// Filesystem failure outside the toolchain.
    #[error("i/o failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The compiler driver could not be started at all.
    #[error("failed to spawn {}: {source}", program.display())]
    Spawn {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The toolchain ran and failed.
    #[error("{stage} failed with {} structured diagnostic(s)", diagnostics.len())]
    Stage {
        stage: BuildStage,
        /// Symbol-scoped causes identified in the toolchain output.
        diagnostics: Vec<Diagnostic>,
        /// Raw remainder for causes that did not classify.
        detail: String,
    },
}

/// Everything decided before the toolchain runs.
#[derive(Debug, Clone)]
pub struct PlannedBuild {
    /// The welded unit with its rendered wrapper.
    pub welded: WeldedUnit,
    /// Loaded collaborator units, in precedence order.
    pub collaborators: Vec<Unit>,
    /// Decision set, link plan, warnings, and notes.
    pub resolution: Resolution,
    /// Digest of the build inputs; names the scratch directory and
    /// correlates log entries.
    pub trace_id: String,
    /// Per-build scratch directory.
    pub scratch_dir: PathBuf,
}

/// A successfully built test binary.
#[derive(Debug)]
pub struct BuiltBinary {
    /// Final binary path.
    pub path: PathBuf,
    /// The plan it was built from.
    pub planned: PlannedBuild,
}

/// Run the front half of the pipeline: load, weld, neutralize, resolve.
/// Never touches a compiler; this is what `unitweld plan` prints.
pub fn plan(cfg: &BuildConfig) -> Result<PlannedBuild, BuildError> {
    let target_path = absolutize(&cfg.target)?;
    let test_path = absolutize(&cfg.test)?;
    let target = Unit::load(&target_path)?;
    let test = Unit::load(&test_path)?;

    let mut collaborators = Vec::with_capacity(cfg.collaborators.len());
    for path in &cfg.collaborators {
        collaborators.push(Unit::load(&absolutize(path)?)?);
    }

    let welded = entry::neutralize(merge::load_for_test(target, test))?;
    let resolution = policy::resolve(
        &welded,
        &collaborators,
        &PolicyConfig {
            tolerate_unresolved: cfg.tolerate_unresolved,
            tolerate_duplicates: cfg.tolerate_duplicates,
            defines: cfg.defines.clone(),
        },
    )?;

    let trace_id = input_digest(cfg, &welded, &collaborators);
    let scratch_dir = cfg.build_dir.join(&trace_id);

    Ok(PlannedBuild {
        welded,
        collaborators,
        resolution,
        trace_id,
        scratch_dir,
    })
}

/// Run the whole pipeline to a test binary.
pub fn build(cfg: &BuildConfig, log: &mut LogEmitter) -> Result<BuiltBinary, BuildError> {
    let planned = plan(cfg)?;
    let trace = planned.trace_id.clone();

    let _ = log.emit(
        &LogEntry::new(&trace, LogLevel::Info, "build.plan")
            .stage("plan")
            .detail(format!(
                "{} decision(s), {} intentionally unresolved",
                planned.resolution.decisions.len(),
                planned.resolution.plan.unresolved.len()
            )),
    );
    for warning in &planned.resolution.warnings {
        let _ = log.emit(
            &LogEntry::new(&trace, LogLevel::Warn, "build.duplicate_tolerated")
                .stage("plan")
                .detail(warning.to_string()),
        );
    }
    for note in &planned.resolution.notes {
        let _ = log.emit(
            &LogEntry::new(&trace, LogLevel::Warn, "build.note")
                .stage("plan")
                .detail(note.clone()),
        );
    }

    std::fs::create_dir_all(&planned.scratch_dir).map_err(|source| BuildError::Io {
        path: planned.scratch_dir.clone(),
        source,
    })?;

    let wrapper_path = planned.scratch_dir.join("weld.c");
    std::fs::write(&wrapper_path, &planned.welded.wrapper_source).map_err(|source| {
        BuildError::Io {
            path: wrapper_path.clone(),
            source,
        }
    })?;

    let toolchain = Toolchain::discover(cfg.cc.as_deref());
    let include_dirs = include_dirs(&planned.welded);
    let defines = &planned.resolution.plan.defines;

    // compile every object before reporting, so one build attempt carries
    // every distinct failure
    let mut objects = Vec::new();
    let mut failures: Vec<Diagnostic> = Vec::new();
    let mut raw_failures = String::new();

    let merged_object = planned.scratch_dir.join("weld.o");
    let mut compiles = vec![(wrapper_path.clone(), merged_object.clone())];
    for (index, collab) in planned.collaborators.iter().enumerate() {
        let object = planned.scratch_dir.join(format!("collab{index}_{}.o", collab.name));
        compiles.push((collab.path.clone(), object));
    }

    for (source, object) in &compiles {
        let invocation = toolchain.compile(source, object, defines, &include_dirs);
        let _ = log.emit(
            &LogEntry::new(&trace, LogLevel::Debug, "build.compile")
                .stage("compile")
                .detail(invocation.render()),
        );
        let output = run(&invocation)?;
        if output.status.success() {
            objects.push(object.clone());
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let classified = diag::classify_link_stderr(&stderr);
            failures.extend(classified.diagnostics);
            if !raw_failures.is_empty() {
                raw_failures.push('\n');
            }
            raw_failures.push_str(&classified.unclassified.join("\n"));
        }
    }
    if objects.len() != compiles.len() {
        return Err(stage_failure(BuildStage::Compile, failures, raw_failures, log, &trace));
    }

    let linked_tmp = planned.scratch_dir.join("test_bin.tmp");
    let invocation = toolchain.link(&objects, &linked_tmp, &planned.resolution.plan);
    let _ = log.emit(
        &LogEntry::new(&trace, LogLevel::Debug, "build.link")
            .stage("link")
            .detail(invocation.render()),
    );
    let output = run(&invocation)?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let classified = diag::classify_link_stderr(&stderr);
        return Err(stage_failure(
            BuildStage::Link,
            classified.diagnostics,
            classified.unclassified.join("\n"),
            log,
            &trace,
        ));
    }

    let final_path = cfg
        .output
        .clone()
        .unwrap_or_else(|| planned.scratch_dir.join("test_bin"));
    if let Some(parent) = final_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|source| BuildError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::rename(&linked_tmp, &final_path).map_err(|source| BuildError::Io {
        path: final_path.clone(),
        source,
    })?;

    let _ = log.emit(
        &LogEntry::new(&trace, LogLevel::Info, "build.done")
            .outcome("pass")
            .detail(final_path.display().to_string()),
    );

    Ok(BuiltBinary {
        path: final_path,
        planned,
    })
}

fn stage_failure(
    stage: BuildStage,
    diagnostics: Vec<Diagnostic>,
    detail: String,
    log: &mut LogEmitter,
    trace: &str,
) -> BuildError {
    for diagnostic in &diagnostics {
        let _ = log.emit(
            &LogEntry::new(trace, LogLevel::Error, "build.diagnostic")
                .stage(stage.to_string())
                .detail(diagnostic.to_string()),
        );
    }
    BuildError::Stage {
        stage,
        diagnostics,
        detail,
    }
}

fn run(invocation: &Invocation) -> Result<Output, BuildError> {
    invocation
        .to_command()
        .output()
        .map_err(|source| BuildError::Spawn {
            program: invocation.program.clone(),
            source,
        })
}

/// Headers next to either unit must stay reachable from the scratch dir.
fn include_dirs(welded: &WeldedUnit) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    for unit in [&welded.merged.target, &welded.merged.test] {
        if let Some(parent) = unit.path.parent()
            && !dirs.contains(&parent.to_path_buf())
        {
            dirs.push(parent.to_path_buf());
        }
    }
    dirs
}

fn absolutize(path: &Path) -> Result<PathBuf, BuildError> {
    std::fs::canonicalize(path).map_err(|source| BuildError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Digest of everything that shapes the build, for scratch naming and log
/// correlation. Same inputs, same id.
fn input_digest(cfg: &BuildConfig, welded: &WeldedUnit, collaborators: &[Unit]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(welded.merged.target.path.display().to_string());
    hasher.update([0]);
    hasher.update(welded.merged.test.path.display().to_string());
    for collab in collaborators {
        hasher.update([0]);
        hasher.update(collab.path.display().to_string());
    }
    hasher.update([
        u8::from(cfg.tolerate_unresolved),
        u8::from(cfg.tolerate_duplicates),
    ]);
    for define in &cfg.defines {
        hasher.update([0]);
        hasher.update(define);
    }
    let digest = hasher.finalize();
    digest
        .iter()
        .take(6)
        .map(|b| format!("{b:02x}"))
        .collect()
}
