//! Entry-Point Neutralizer.
//!
//! When the target unit defines `main`, merging it with a test unit that has
//! its own `main` would produce two entry points in one translation unit.
//! The fix is a scoped compile-time rename inside the generated wrapper: a
//! `#define main <alias>` is in force only while the target's text compiles,
//! and is removed before the test unit's text. The target source on disk is
//! never touched.

use thiserror::Error;

use crate::merge::MergedUnit;

/// Alias the target's `main` compiles under. Fixed and documented so that a
/// collision is detectable up front instead of surprising the linker.
pub const ENTRY_ALIAS: &str = "uw_disabled_main";

/// Neutralization failure.
#[derive(Debug, Error)]
pub enum EntryError {
    /// The alias name is already a symbol somewhere in the merged graph.
    /// Renaming would silently overwrite it, so this fails fast instead.
    #[error("entry alias '{alias}' already names a symbol in unit '{unit}'")]
    AliasCollision {
        /// The reserved alias.
        alias: String,
        /// Unit that already uses the name.
        unit: String,
    },
}

/// A merged unit with its entry point resolved and its wrapper rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeldedUnit {
    /// The merged symbol model.
    pub merged: MergedUnit,
    /// `Some` when the target defined `main` and now compiles under the
    /// alias; `None` when the target has no entry point (detected by symbol
    /// presence, not configuration).
    pub entry_alias: Option<String>,
    /// The generated wrapper translation unit, ready to write to disk. One
    /// deterministic build input; includes the whole target then the whole
    /// test unit.
    pub wrapper_source: String,
}

/// Neutralize the target's entry point and render the wrapper.
pub fn neutralize(merged: MergedUnit) -> Result<WeldedUnit, EntryError> {
    for unit in [&merged.target, &merged.test] {
        let collides = unit.define(ENTRY_ALIAS).is_some()
            || unit.references.iter().any(|r| r == ENTRY_ALIAS);
        if collides {
            return Err(EntryError::AliasCollision {
                alias: ENTRY_ALIAS.to_string(),
                unit: unit.name.clone(),
            });
        }
    }

    let entry_alias = merged
        .target
        .defines_entry()
        .then(|| ENTRY_ALIAS.to_string());
    let wrapper_source = render_wrapper(&merged, entry_alias.as_deref());

    Ok(WeldedUnit {
        merged,
        entry_alias,
        wrapper_source,
    })
}

fn render_wrapper(merged: &MergedUnit, alias: Option<&str>) -> String {
    let mut out = String::new();
    out.push_str("/* Generated by unitweld; do not edit.\n");
    out.push_str(" * The target unit is welded into the test unit so test code can reach\n");
    out.push_str(" * the target's file-local symbols. File-scope state in the target is\n");
    out.push_str(" * shared with the tests and is not reset between test cases. */\n");
    if let Some(alias) = alias {
        out.push_str(&format!("#define main {alias}\n"));
    }
    out.push_str(&format!("#include \"{}\"\n", merged.target.path.display()));
    if alias.is_some() {
        out.push_str("#undef main\n");
    }
    out.push_str(&format!("#include \"{}\"\n", merged.test.path.display()));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::load_for_test;
    use crate::model::Unit;
    use std::path::Path;

    fn unit(name: &str, src: &str) -> Unit {
        Unit::from_source(name, Path::new(&format!("/src/{name}.c")), src)
    }

    #[test]
    fn target_entry_is_aliased() {
        let target = unit("example", "int main(int argc, char **argv) { return 0; }");
        let test = unit("example_test", "int main(void) { return 0; }");
        let welded = neutralize(load_for_test(target, test)).unwrap();

        assert_eq!(welded.entry_alias.as_deref(), Some(ENTRY_ALIAS));
        let lines: Vec<&str> = welded.wrapper_source.lines().collect();
        let define = lines
            .iter()
            .position(|l| *l == "#define main uw_disabled_main")
            .unwrap();
        let target_inc = lines
            .iter()
            .position(|l| l.contains("/src/example.c"))
            .unwrap();
        let undef = lines.iter().position(|l| *l == "#undef main").unwrap();
        let test_inc = lines
            .iter()
            .position(|l| l.contains("/src/example_test.c"))
            .unwrap();
        assert!(define < target_inc && target_inc < undef && undef < test_inc);
    }

    #[test]
    fn no_entry_means_no_rename() {
        let target = unit("example", "int run(void) { return 0; }");
        let test = unit("example_test", "int main(void) { return 0; }");
        let welded = neutralize(load_for_test(target, test)).unwrap();

        assert!(welded.entry_alias.is_none());
        assert!(!welded.wrapper_source.contains("#define main"));
        assert!(!welded.wrapper_source.contains("#undef main"));
    }

    #[test]
    fn alias_collision_fails_fast() {
        let target = unit(
            "example",
            "int uw_disabled_main(void) { return 1; }\nint main(void) { return 0; }",
        );
        let test = unit("example_test", "int main(void) { return 0; }");
        let err = neutralize(load_for_test(target, test)).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("uw_disabled_main"));
        assert!(msg.contains("example"));
    }

    #[test]
    fn alias_collision_in_test_unit_also_fails() {
        let target = unit("example", "int main(void) { return 0; }");
        let test = unit(
            "example_test",
            "int main(void) { return uw_disabled_main(); }",
        );
        let err = neutralize(load_for_test(target, test)).unwrap_err();
        assert!(err.to_string().contains("example_test"));
    }

    #[test]
    fn target_is_always_included_before_the_test_unit() {
        let target = unit("example", "int run(void) { return 0; }");
        let test = unit("example_test", "int main(void) { return run(); }");
        let welded = neutralize(load_for_test(target, test)).unwrap();
        let target_pos = welded.wrapper_source.find("/src/example.c").unwrap();
        let test_pos = welded.wrapper_source.find("/src/example_test.c").unwrap();
        assert!(target_pos < test_pos);
    }
}
