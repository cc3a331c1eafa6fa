//! Compiler discovery and invocation rendering.
//!
//! Invocations are built as data and only turned into processes by the
//! orchestrator, so the exact flag set a plan produces can be asserted
//! without running a compiler.

use std::path::{Path, PathBuf};
use std::process::Command;

use unitweld_core::model::LinkPlan;

/// A rendered toolchain invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Program to run.
    pub program: PathBuf,
    /// Arguments in order.
    pub args: Vec<String>,
}

impl Invocation {
    /// Turn into a runnable command.
    #[must_use]
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        cmd
    }

    /// One-line rendering for logs and diagnostics.
    #[must_use]
    pub fn render(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

/// The C compiler driver used for both compiling and linking.
#[derive(Debug, Clone)]
pub struct Toolchain {
    /// Compiler driver path or name.
    pub cc: PathBuf,
}

impl Toolchain {
    /// Resolve the compiler: explicit override, then `CC`, then `cc`.
    #[must_use]
    pub fn discover(override_cc: Option<&Path>) -> Self {
        let cc = override_cc
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os("CC").map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from("cc"));
        Self { cc }
    }

    /// Compile one source file to an object.
    #[must_use]
    pub fn compile(
        &self,
        source: &Path,
        object: &Path,
        defines: &[String],
        include_dirs: &[PathBuf],
    ) -> Invocation {
        let mut args = vec![
            String::from("-c"),
            source.display().to_string(),
            String::from("-o"),
            object.display().to_string(),
            String::from("-g"),
        ];
        for dir in include_dirs {
            args.push(format!("-I{}", dir.display()));
        }
        for define in defines {
            args.push(format!("-D{define}"));
        }
        Invocation {
            program: self.cc.clone(),
            args,
        }
    }

    /// Link objects into the test binary, applying the plan's flag set.
    /// Object order must already follow the plan's link-input order; the
    /// caller passes them in sequence.
    #[must_use]
    pub fn link(&self, objects: &[PathBuf], output: &Path, plan: &LinkPlan) -> Invocation {
        let mut args: Vec<String> = objects.iter().map(|o| o.display().to_string()).collect();
        args.push(String::from("-o"));
        args.push(output.display().to_string());
        if plan.tolerate_duplicates {
            // gold also accepts -Wl,-z,muldefs; --allow-multiple-definition
            // is understood by GNU ld, gold, and lld alike
            args.push(String::from("-Wl,--allow-multiple-definition"));
        }
        if plan.tolerate_unresolved {
            args.push(String::from("-Wl,--unresolved-symbols=ignore-all"));
        }
        if plan.disable_pie {
            args.push(String::from("-no-pie"));
        }
        Invocation {
            program: self.cc.clone(),
            args,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use unitweld_core::model::LinkInput;

    fn plan(unresolved: bool, duplicates: bool) -> LinkPlan {
        LinkPlan {
            inputs: vec![LinkInput::Merged],
            tolerate_unresolved: unresolved,
            tolerate_duplicates: duplicates,
            disable_pie: unresolved,
            entry_alias: None,
            defines: Vec::new(),
            runtime_symbols: Vec::new(),
            unresolved: Vec::new(),
        }
    }

    #[test]
    fn compile_carries_defines_and_include_dirs() {
        let tc = Toolchain {
            cc: PathBuf::from("cc"),
        };
        let inv = tc.compile(
            Path::new("/b/weld.c"),
            Path::new("/b/weld.o"),
            &[String::from("UNIT_TESTING=1")],
            &[PathBuf::from("/src")],
        );
        assert!(inv.args.contains(&String::from("-I/src")));
        assert!(inv.args.contains(&String::from("-DUNIT_TESTING=1")));
        assert_eq!(inv.args[0], "-c");
    }

    #[test]
    fn strict_plan_links_with_no_tolerance_flags() {
        let tc = Toolchain {
            cc: PathBuf::from("cc"),
        };
        let inv = tc.link(
            &[PathBuf::from("/b/weld.o")],
            Path::new("/b/test_bin"),
            &plan(false, false),
        );
        assert!(!inv.render().contains("--unresolved-symbols"));
        assert!(!inv.render().contains("--allow-multiple-definition"));
        assert!(!inv.render().contains("-no-pie"));
    }

    #[test]
    fn unresolved_tolerance_also_disables_pie() {
        let tc = Toolchain {
            cc: PathBuf::from("cc"),
        };
        let inv = tc.link(
            &[PathBuf::from("/b/weld.o")],
            Path::new("/b/test_bin"),
            &plan(true, false),
        );
        let rendered = inv.render();
        assert!(rendered.contains("-Wl,--unresolved-symbols=ignore-all"));
        assert!(rendered.contains("-no-pie"));
    }

    #[test]
    fn objects_precede_output_and_flags() {
        let tc = Toolchain {
            cc: PathBuf::from("cc"),
        };
        let inv = tc.link(
            &[PathBuf::from("weld.o"), PathBuf::from("collab.o")],
            Path::new("test_bin"),
            &plan(false, true),
        );
        assert_eq!(inv.args[0], "weld.o");
        assert_eq!(inv.args[1], "collab.o");
        let o_pos = inv.args.iter().position(|a| a == "-o").unwrap();
        assert!(o_pos > 1);
        assert!(inv.args.contains(&String::from("-Wl,--allow-multiple-definition")));
    }

    #[test]
    fn discover_prefers_explicit_override() {
        let tc = Toolchain::discover(Some(Path::new("/opt/bin/clang")));
        assert_eq!(tc.cc, PathBuf::from("/opt/bin/clang"));
    }
}
