//! unitweld command-line interface.
//!
//! Three subcommands over the same build configuration:
//! - `plan`: resolve symbols and print the decision set, no compiler run
//! - `build`: produce the test binary
//! - `run`: build, execute, and classify the exit

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use unitweld_core::diag::RunOutcome;
use unitweld_harness::orchestrator::{self, BuildConfig, BuildError};
use unitweld_harness::report::{BuildReport, RunReport};
use unitweld_harness::runner::{self, signal_name};
use unitweld_harness::structured_log::{LogEmitter, LogEntry, LogLevel};

#[derive(Parser)]
#[command(
    name = "unitweld",
    version,
    about = "Weld a C unit and its test into one binary, private symbols included"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct BuildArgs {
    /// C unit under test
    #[arg(long)]
    target: PathBuf,
    /// Test unit (included after the target; its definitions mock)
    #[arg(long)]
    test: PathBuf,
    /// Collaborator unit supplying real definitions; repeatable, earliest wins
    #[arg(long = "collab")]
    collaborators: Vec<PathBuf>,
    /// Permit symbols with no definition in the link set
    #[arg(long = "allow-unresolved")]
    allow_unresolved: bool,
    /// Permit duplicate definitions across link inputs (earliest wins)
    #[arg(long = "allow-duplicates")]
    allow_duplicates: bool,
    /// Extra compile-time definition (NAME or NAME=VALUE); repeatable
    #[arg(long = "define")]
    defines: Vec<String>,
    /// C compiler driver (default: $CC, then cc)
    #[arg(long)]
    cc: Option<PathBuf>,
    /// Root for per-build scratch directories
    #[arg(long = "build-dir", default_value = "target/unitweld")]
    build_dir: PathBuf,
    /// Binary path for build/run; plan output file for plan
    #[arg(long)]
    output: Option<PathBuf>,
    /// Write the JSONL build log to this file instead of stderr
    #[arg(long)]
    log: Option<PathBuf>,
    /// Emit JSON instead of markdown
    #[arg(long)]
    json: bool,
}

impl BuildArgs {
    fn to_config(&self) -> BuildConfig {
        BuildConfig {
            target: self.target.clone(),
            test: self.test.clone(),
            collaborators: self.collaborators.clone(),
            tolerate_unresolved: self.allow_unresolved,
            tolerate_duplicates: self.allow_duplicates,
            defines: self.defines.clone(),
            cc: self.cc.clone(),
            build_dir: self.build_dir.clone(),
            output: self.output.clone(),
        }
    }

    fn emitter(&self) -> Result<LogEmitter, Box<dyn std::error::Error>> {
        match &self.log {
            Some(path) => Ok(LogEmitter::to_file(path)?),
            None => Ok(LogEmitter::stderr()),
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// Resolve symbols and print the plan without touching a compiler
    Plan {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build the welded test binary
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Build, execute, and classify the test binary's exit
    Run {
        #[command(flatten)]
        build: BuildArgs,
        /// Write the run report (markdown, or JSON with --json) to this file
        #[arg(long)]
        report: Option<PathBuf>,
        /// Arguments forwarded to the test binary
        #[arg(trailing_var_arg = true)]
        test_args: Vec<String>,
    },
}

fn main() -> ExitCode {
    match dispatch() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("unitweld: {err}");
            ExitCode::FAILURE
        }
    }
}

fn dispatch() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Plan { build } => {
            let mut cfg = build.to_config();
            // plan never builds, so --output names the plan file here
            cfg.output = None;
            let planned = orchestrator::plan(&cfg).map_err(render_build_error)?;
            let report = BuildReport::from_planned(&planned, None);
            let rendered = if build.json {
                report.to_json()
            } else {
                report.to_markdown()
            };
            match &build.output {
                Some(path) => std::fs::write(path, &rendered)?,
                None => print!("{rendered}"),
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Build { build } => {
            let mut log = build.emitter()?;
            let built =
                orchestrator::build(&build.to_config(), &mut log).map_err(render_build_error)?;
            let report = BuildReport::from_planned(&built.planned, Some(&built.path));
            if build.json {
                println!("{}", report.to_json());
            } else {
                print!("{}", report.to_markdown());
            }
            eprintln!("built {}", built.path.display());
            Ok(ExitCode::SUCCESS)
        }
        Command::Run {
            build,
            report,
            test_args,
        } => {
            let mut log = build.emitter()?;
            let built =
                orchestrator::build(&build.to_config(), &mut log).map_err(render_build_error)?;
            let outcome = runner::run_binary(
                &built.path,
                &test_args,
                &built.planned.resolution.plan.unresolved,
            )?;
            let level = if outcome.passed() {
                LogLevel::Info
            } else {
                LogLevel::Error
            };
            let _ = log.emit(
                &LogEntry::new(&built.planned.trace_id, level, "run.exit")
                    .stage("run")
                    .outcome(if outcome.passed() { "pass" } else { "fail" }),
            );

            let run_report = RunReport::new(
                BuildReport::from_planned(&built.planned, Some(&built.path)),
                outcome.clone(),
            );
            let rendered = if build.json {
                run_report.to_json()
            } else {
                run_report.to_markdown()
            };
            match &report {
                Some(path) => std::fs::write(path, &rendered)?,
                None => print!("{rendered}"),
            }

            match outcome {
                RunOutcome::Passed => Ok(ExitCode::SUCCESS),
                RunOutcome::TestFailed { code } => {
                    eprintln!("test suite failed with exit code {code}");
                    Ok(ExitCode::FAILURE)
                }
                RunOutcome::UnexpectedCall { signal, suspects } => {
                    eprintln!(
                        "test process died on {} after reaching a symbol left unresolved on purpose ({})",
                        signal_name(signal),
                        suspects.join(", ")
                    );
                    Ok(ExitCode::FAILURE)
                }
                RunOutcome::Crashed { signal } => {
                    eprintln!("test process crashed on {}", signal_name(signal));
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Expand stage failures so every structured diagnostic is printed, not
/// just a count.
fn render_build_error(err: BuildError) -> Box<dyn std::error::Error> {
    if let BuildError::Stage {
        stage,
        diagnostics,
        detail,
    } = &err
    {
        eprintln!("unitweld: {stage} stage failed");
        for diagnostic in diagnostics {
            eprintln!("  - {diagnostic}");
        }
        if diagnostics.is_empty() && !detail.is_empty() {
            eprintln!("{detail}");
        }
    }
    Box::new(err)
}
