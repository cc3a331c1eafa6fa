//! Deterministic symbol scanner for C sources.
//!
//! This is a heuristic lexer, not a C parser: it strips comments, string and
//! character literals, and preprocessor lines, then walks the token stream
//! tracking brace depth. At file scope it recognizes function definitions,
//! object definitions, and declarations; inside bodies it collects referenced
//! symbols (call sites, plus uses of names the unit declares but never
//! defines). Preprocessor semantics are not modeled; macro-heavy units may
//! need their references adjusted via collaborator or tolerance flags.
//!
//! Output ordering is source order with first-occurrence dedup, which is what
//! the policy engine's determinism guarantee rests on.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::{SymbolDef, SymbolKind, Visibility};

/// Scanner failure.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Unit source could not be read.
    #[error("failed to read unit source {}: {source}", path.display())]
    Read {
        /// Path that failed to load.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Raw scan output for one source text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanResult {
    /// Symbols defined at file scope, in source order.
    pub defines: Vec<SymbolDef>,
    /// Names declared (prototypes, extern objects) but not defined here.
    pub declares: Vec<String>,
    /// Symbols referenced but not defined here, in first-use order.
    pub references: Vec<String>,
    /// Quoted `#include` paths ending in `.c`.
    pub unit_includes: Vec<String>,
}

/// Scan one C source text.
#[must_use]
pub fn scan(source: &str) -> ScanResult {
    let (clean, unit_includes) = strip(source);
    let tokens = tokenize(&clean);
    let mut result = parse(&tokens);
    result.unit_includes = unit_includes;
    result
}

// ---------------------------------------------------------------------------
// Stripping
// ---------------------------------------------------------------------------

/// Blank comments, string/char literals, and preprocessor lines, preserving
/// newlines so token positions stay roughly line-accurate. Returns the
/// cleaned text and any `#include "*.c"` paths found.
fn strip(source: &str) -> (String, Vec<String>) {
    let chars: Vec<char> = source.chars().collect();
    let mut out = String::with_capacity(source.len());
    let mut includes = Vec::new();
    let mut at_line_start = true;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();

        if c == '/' && next == Some('/') {
            while i < chars.len() && chars[i] != '\n' {
                out.push(' ');
                i += 1;
            }
            continue;
        }
        if c == '/' && next == Some('*') {
            out.push_str("  ");
            i += 2;
            while i < chars.len() {
                if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    out.push_str("  ");
                    i += 2;
                    break;
                }
                out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                i += 1;
            }
            continue;
        }
        if c == '"' || c == '\'' {
            let quote = c;
            out.push(' ');
            i += 1;
            while i < chars.len() {
                if chars[i] == '\\' {
                    out.push(' ');
                    i += 1;
                    if i < chars.len() {
                        out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                        i += 1;
                    }
                    continue;
                }
                let done = chars[i] == quote;
                out.push(if chars[i] == '\n' { '\n' } else { ' ' });
                i += 1;
                if done {
                    break;
                }
            }
            at_line_start = false;
            continue;
        }
        if c == '#' && at_line_start {
            let mut directive = String::new();
            while i < chars.len() {
                if chars[i] == '\n' {
                    if directive.ends_with('\\') {
                        directive.pop();
                        out.push('\n');
                        i += 1;
                        continue;
                    }
                    break;
                }
                directive.push(chars[i]);
                out.push(' ');
                i += 1;
            }
            if let Some(path) = parse_include(&directive)
                && path.ends_with(".c")
            {
                includes.push(path);
            }
            // the terminating newline, if any, is handled next iteration
            continue;
        }

        if c == '\n' {
            out.push('\n');
            at_line_start = true;
        } else {
            out.push(c);
            if !c.is_whitespace() {
                at_line_start = false;
            }
        }
        i += 1;
    }

    (out, includes)
}

/// Extract the quoted path of an `#include "..."` directive, if any.
fn parse_include(directive: &str) -> Option<String> {
    let body = directive.trim_start_matches('#').trim_start();
    if !body.starts_with("include") {
        return None;
    }
    let rest = &body["include".len()..];
    let open = rest.find('"')?;
    let tail = &rest[open + 1..];
    let close = tail.find('"')?;
    Some(tail[..close].to_string())
}

// ---------------------------------------------------------------------------
// Tokenizing
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tok {
    Ident(String),
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Comma,
    Assign,
    Other,
}

fn tokenize(text: &str) -> Vec<Tok> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut prev_sig = ' ';
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Tok::Ident(chars[start..i].iter().collect()));
            prev_sig = 'a';
            continue;
        }
        if c.is_ascii_digit() {
            // number literal, including suffixes and hex digits
            while i < chars.len()
                && (chars[i].is_ascii_alphanumeric() || chars[i] == '.' || chars[i] == '_')
            {
                i += 1;
            }
            tokens.push(Tok::Other);
            prev_sig = '0';
            continue;
        }
        let tok = match c {
            '(' => Tok::LParen,
            ')' => Tok::RParen,
            '{' => Tok::LBrace,
            '}' => Tok::RBrace,
            ';' => Tok::Semi,
            ',' => Tok::Comma,
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    i += 1;
                    Tok::Other
                } else if matches!(
                    prev_sig,
                    '+' | '-' | '*' | '/' | '%' | '&' | '|' | '^' | '!' | '<' | '>' | '='
                ) {
                    Tok::Other
                } else {
                    Tok::Assign
                }
            }
            _ => Tok::Other,
        };
        prev_sig = c;
        tokens.push(tok);
        i += 1;
    }
    tokens
}

// ---------------------------------------------------------------------------
// Parsing
// ---------------------------------------------------------------------------

/// Keywords that look like call sites but are not.
const STATEMENT_KEYWORDS: &[&str] = &[
    "if", "else", "for", "while", "do", "switch", "case", "default", "return", "sizeof", "goto",
    "break", "continue", "_Alignof", "_Static_assert",
];

/// Type and qualifier keywords that cannot be symbol names.
const TYPE_KEYWORDS: &[&str] = &[
    "void", "char", "short", "int", "long", "float", "double", "signed", "unsigned", "bool",
    "_Bool", "const", "volatile", "register", "static", "extern", "inline", "restrict", "struct",
    "union", "enum", "typedef", "auto",
];

fn is_keyword(name: &str) -> bool {
    STATEMENT_KEYWORDS.contains(&name) || TYPE_KEYWORDS.contains(&name)
}

fn parse(tokens: &[Tok]) -> ScanResult {
    let mut defines: Vec<SymbolDef> = Vec::new();
    let mut declares: Vec<String> = Vec::new();
    // (name, was_call) in body order
    let mut body_uses: Vec<(String, bool)> = Vec::new();

    let mut depth = 0usize;
    let mut stmt: Vec<Tok> = Vec::new();

    let mut i = 0;
    while i < tokens.len() {
        let tok = &tokens[i];
        if depth == 0 {
            match tok {
                Tok::LBrace => {
                    classify_block_opener(&stmt, &mut defines);
                    stmt.clear();
                    depth += 1;
                }
                Tok::Semi => {
                    classify_declaration(&stmt, &mut defines, &mut declares);
                    stmt.clear();
                }
                other => stmt.push(other.clone()),
            }
        } else {
            match tok {
                Tok::LBrace => depth += 1,
                Tok::RBrace => depth -= 1,
                Tok::Ident(name) if !is_keyword(name) => {
                    let is_call = matches!(tokens.get(i + 1), Some(Tok::LParen));
                    body_uses.push((name.clone(), is_call));
                }
                _ => {}
            }
        }
        i += 1;
    }

    dedup_defines(&mut defines);
    let defined: Vec<&str> = defines.iter().map(|d| d.name.as_str()).collect();
    declares.retain(|d| !defined.contains(&d.as_str()));
    declares.dedup();

    let mut references = Vec::new();
    for (name, is_call) in body_uses {
        if defined.contains(&name.as_str()) {
            continue;
        }
        if !is_call && !declares.contains(&name) {
            continue;
        }
        if !references.contains(&name) {
            references.push(name);
        }
    }

    ScanResult {
        defines,
        declares,
        references,
        unit_includes: Vec::new(),
    }
}

/// A `{` at file scope opens a function body, a braced initializer, or an
/// aggregate type definition. Only the first two define a symbol.
fn classify_block_opener(stmt: &[Tok], defines: &mut Vec<SymbolDef>) {
    let is_static = has_static(stmt);
    if let Some(pos) = assign_position(stmt) {
        // object with a braced initializer: `static struct cfg c = { ... }`
        if let Some(name) = last_ident(&stmt[..pos]) {
            push_define(defines, name, SymbolKind::Object, is_static);
        }
        return;
    }
    if let Some(name) = function_name(stmt) {
        push_define(defines, name, SymbolKind::Function, is_static);
    }
    // no parens, no assignment: struct/union/enum body or a bare block; no symbol
}

/// A `;` at file scope ends a prototype, an extern declaration, an object
/// definition, or a typedef/aggregate forward declaration.
fn classify_declaration(stmt: &[Tok], defines: &mut Vec<SymbolDef>, declares: &mut Vec<String>) {
    if stmt.is_empty() || stmt.contains(&Tok::Ident("typedef".into())) {
        return;
    }
    if let Some(name) = function_name(stmt) {
        declares.push(name);
        return;
    }
    let is_extern = stmt.contains(&Tok::Ident("extern".into()));
    let is_static = has_static(stmt);
    // forward declaration of an aggregate: `struct foo;`
    if stmt.len() == 2
        && matches!(&stmt[0], Tok::Ident(k) if k == "struct" || k == "union" || k == "enum")
    {
        return;
    }
    for segment in stmt.split(|t| *t == Tok::Comma) {
        let upto = assign_position(segment).unwrap_or(segment.len());
        let Some(name) = last_ident(&segment[..upto]) else {
            continue;
        };
        if is_keyword(&name) {
            continue;
        }
        if is_extern {
            declares.push(name);
        } else {
            push_define(defines, name, SymbolKind::Object, is_static);
        }
    }
}

/// Name of a function declarator: the identifier immediately before the first
/// file-scope `(` whose statement ends at the matching `)` (definitions) or
/// continues to `;` (prototypes). Returns None when the statement has no
/// call-shaped declarator.
fn function_name(stmt: &[Tok]) -> Option<String> {
    let lparen = stmt.iter().position(|t| *t == Tok::LParen)?;
    if lparen == 0 {
        return None;
    }
    match &stmt[lparen - 1] {
        Tok::Ident(name) if !is_keyword(name) => Some(name.clone()),
        _ => None,
    }
}

fn assign_position(stmt: &[Tok]) -> Option<usize> {
    stmt.iter().position(|t| *t == Tok::Assign)
}

fn has_static(stmt: &[Tok]) -> bool {
    stmt.iter()
        .any(|t| matches!(t, Tok::Ident(k) if k == "static"))
}

fn last_ident(toks: &[Tok]) -> Option<String> {
    toks.iter().rev().find_map(|t| match t {
        Tok::Ident(name) => Some(name.clone()),
        _ => None,
    })
}

fn push_define(defines: &mut Vec<SymbolDef>, name: String, kind: SymbolKind, is_static: bool) {
    defines.push(SymbolDef {
        name,
        kind,
        visibility: if is_static {
            Visibility::Private
        } else {
            Visibility::Public
        },
    });
}

fn dedup_defines(defines: &mut Vec<SymbolDef>) {
    let mut seen = Vec::new();
    defines.retain(|d| {
        if seen.contains(&d.name) {
            false
        } else {
            seen.push(d.name.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_comments_and_literals() {
        let (clean, _) = strip("int x = 'a'; // tail\n/* block\n */ char *s = \"hi\";\n");
        assert!(!clean.contains('\''));
        assert!(!clean.contains("tail"));
        assert!(!clean.contains("block"));
        assert!(!clean.contains("hi"));
        assert!(clean.contains("int x ="));
    }

    #[test]
    fn unmatched_quote_inside_comment_is_harmless() {
        let src = "/* wasn't supposed */ int f(void) { return g(); }\n";
        let result = scan(src);
        assert_eq!(result.defines.len(), 1);
        assert_eq!(result.defines[0].name, "f");
        assert_eq!(result.references, vec!["g".to_string()]);
    }

    #[test]
    fn records_unit_includes_only_for_c_files() {
        let src = "#include <stdio.h>\n#include \"other.h\"\n#include \"other.c\"\n";
        let result = scan(src);
        assert_eq!(result.unit_includes, vec!["other.c".to_string()]);
    }

    #[test]
    fn static_function_is_private() {
        let src = "static bool is_acceptable_id(unsigned int id) { return id > 1000; }\n";
        let result = scan(src);
        assert_eq!(
            result.defines,
            vec![SymbolDef {
                name: "is_acceptable_id".into(),
                kind: SymbolKind::Function,
                visibility: Visibility::Private,
            }]
        );
    }

    #[test]
    fn prototypes_declare_without_defining() {
        let src = "bool database_id_exists(unsigned int id);\nint main(int, char **);\n";
        let result = scan(src);
        assert!(result.defines.is_empty());
        assert_eq!(
            result.declares,
            vec!["database_id_exists".to_string(), "main".to_string()]
        );
    }

    #[test]
    fn file_scope_objects_and_extern_declarations() {
        let src = "static int counter = 0;\nextern int shared;\nint visible;\n";
        let result = scan(src);
        assert_eq!(
            result.defines,
            vec![
                SymbolDef {
                    name: "counter".into(),
                    kind: SymbolKind::Object,
                    visibility: Visibility::Private,
                },
                SymbolDef {
                    name: "visible".into(),
                    kind: SymbolKind::Object,
                    visibility: Visibility::Public,
                },
            ]
        );
        assert_eq!(result.declares, vec!["shared".to_string()]);
    }

    #[test]
    fn call_references_in_first_use_order() {
        let src = r"
            int check(int id) {
                if (database_id_exists(id))
                    return 0;
                log_result(id);
                return database_id_exists(id + 1);
            }
        ";
        let result = scan(src);
        assert_eq!(
            result.references,
            vec!["database_id_exists".to_string(), "log_result".to_string()]
        );
    }

    #[test]
    fn keywords_are_not_references() {
        let src = "int f(int x) { if (x) { while (x) { x = sizeof(int); } } return x; }\n";
        let result = scan(src);
        assert!(result.references.is_empty());
    }

    #[test]
    fn extern_object_use_is_a_reference() {
        let src = "extern int shared;\nint f(void) { return shared; }\n";
        let result = scan(src);
        assert_eq!(result.references, vec!["shared".to_string()]);
    }

    #[test]
    fn locally_defined_calls_are_not_references_even_when_defined_later() {
        let src = r"
            static int first(int x) { return second(x); }
            static int second(int x) { return x; }
        ";
        let result = scan(src);
        assert!(result.references.is_empty());
    }

    #[test]
    fn struct_definitions_do_not_define_symbols() {
        let src = "struct point { int x; int y; };\nstruct point origin;\n";
        let result = scan(src);
        assert_eq!(result.defines.len(), 1);
        assert_eq!(result.defines[0].name, "origin");
    }

    #[test]
    fn braced_initializer_defines_an_object() {
        let src = "static struct cfg defaults = { 1, 2 };\n";
        let result = scan(src);
        assert_eq!(
            result.defines,
            vec![SymbolDef {
                name: "defaults".into(),
                kind: SymbolKind::Object,
                visibility: Visibility::Private,
            }]
        );
    }

    #[test]
    fn compound_assignment_is_not_a_declarator_boundary() {
        let src = "int f(int x) { x += probe(); return x; }\n";
        let result = scan(src);
        assert_eq!(result.references, vec!["probe".to_string()]);
    }
}
