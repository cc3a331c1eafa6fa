//! Test-binary execution and exit classification.
//!
//! The test binary carries its own pass/fail protocol (exit status zero
//! means pass); this module just runs it, inherits its stdio so assertion
//! output lands where the author expects, and maps the platform exit status
//! onto a [`RunOutcome`].

use std::io;
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;

use unitweld_core::diag::{self, RunOutcome};

/// The binary could not be executed at all. Distinct from every
/// [`RunOutcome`]: those describe a process that ran.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to execute {}: {source}", path.display())]
    Exec {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Run a built test binary and classify its exit. `unresolved` is the
/// plan's intentionally-unresolved symbol set, used to tell an unexpected
/// call apart from a plain crash.
pub fn run_binary(
    path: &Path,
    args: &[String],
    unresolved: &[String],
) -> Result<RunOutcome, RunnerError> {
    let status = Command::new(path)
        .args(args)
        .status()
        .map_err(|source| RunnerError::Exec {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(diag::classify_exit(status.code(), status.signal(), unresolved))
}

/// Conventional name for the common terminating signals, falling back to
/// the raw number.
#[must_use]
pub fn signal_name(signal: i32) -> String {
    let name = match signal {
        libc::SIGABRT => "SIGABRT",
        libc::SIGSEGV => "SIGSEGV",
        libc::SIGILL => "SIGILL",
        libc::SIGBUS => "SIGBUS",
        libc::SIGFPE => "SIGFPE",
        libc::SIGTRAP => "SIGTRAP",
        libc::SIGKILL => "SIGKILL",
        libc::SIGTERM => "SIGTERM",
        _ => return format!("signal {signal}"),
    };
    name.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_signals_have_names() {
        assert_eq!(signal_name(libc::SIGSEGV), "SIGSEGV");
        assert_eq!(signal_name(libc::SIGABRT), "SIGABRT");
    }

    #[test]
    fn unknown_signals_fall_back_to_the_number() {
        assert_eq!(signal_name(64), "signal 64");
    }

    #[test]
    fn missing_binary_is_an_exec_error() {
        let err = run_binary(Path::new("/nonexistent/test_bin"), &[], &[]).unwrap_err();
        let RunnerError::Exec { path, .. } = err;
        assert_eq!(path, Path::new("/nonexistent/test_bin"));
    }
}
