//! A minimal, line-oriented stand-in for a C preprocessor (§6's
//! `Flags::include_paths`/`predefined_macros`).
//!
//! This is deliberately not a real preprocessor: no macro parameters, no
//! conditional compilation, no recursive macro expansion, no token-paste
//! or stringize. It recognizes exactly two directives —
//! `#include "file"` (spliced from the first matching entry in
//! `include_paths`, one level deep, not recursively re-preprocessed) and
//! `#define NAME text` (object-like only) — and performs whole-word
//! literal substitution of every macro name (predefined or discovered
//! this way) over the rest of the unit. Neither `frontend::lexer` nor
//! `frontend::parser` know directives exist; by the time either sees the
//! source, every directive line has already been resolved away or
//! blanked out. Line numbers are preserved (a resolved directive becomes
//! an empty line, not a removed one) so syntax/parse error locations
//! still point at the original file.

use crate::error::{CompileError, CompileResult, Location};

/// Expand `#include`/`#define` directives and substitute predefined and
/// discovered macros through `source`, returning the text the lexer
/// should actually see.
pub fn run(source: &str, filename: &str, include_paths: &[String], predefined_macros: &[(String, String)]) -> CompileResult<String> {
    let mut macros: Vec<(String, String)> = predefined_macros.to_vec();
    let mut lines: Vec<String> = Vec::with_capacity(source.lines().count());

    for (row, line) in source.lines().enumerate() {
        let trimmed = line.trim_start();
        if let Some(rest) = trimmed.strip_prefix("#include") {
            let path = parse_quoted(rest).ok_or_else(|| {
                CompileError::syntax(
                    Location {
                        file: filename.to_string(),
                        row: row as u32 + 1,
                        col: 0,
                    },
                    "expected #include \"file\"".to_string(),
                )
            })?;
            let contents = resolve_include(&path, include_paths).ok_or_else(|| {
                CompileError::syntax(
                    Location {
                        file: filename.to_string(),
                        row: row as u32 + 1,
                        col: 0,
                    },
                    format!("cannot find included file `{path}`"),
                )
            })?;
            lines.push(contents);
        } else if let Some(rest) = trimmed.strip_prefix("#define") {
            let (name, value) = parse_define(rest);
            if !name.is_empty() {
                macros.push((name, value));
            }
            lines.push(String::new());
        } else {
            lines.push(line.to_string());
        }
    }

    let mut text = lines.join("\n");
    // Longer names first so e.g. `FOO_BAR` isn't shadowed by a `FOO` entry
    // substituting into the middle of it.
    macros.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    for (name, value) in &macros {
        text = substitute_word(&text, name, value);
    }
    Ok(text)
}

fn parse_quoted(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let rest = rest.strip_prefix('"')?;
    let end = rest.find('"')?;
    Some(rest[..end].to_string())
}

fn parse_define(rest: &str) -> (String, String) {
    let rest = rest.trim_start();
    let name_end = rest.find(|c: char| c.is_whitespace()).unwrap_or(rest.len());
    let name = rest[..name_end].to_string();
    let value = rest[name_end..].trim().to_string();
    (name, value)
}

fn resolve_include(path: &str, include_paths: &[String]) -> Option<String> {
    for dir in include_paths {
        let candidate = std::path::Path::new(dir).join(path);
        if let Ok(contents) = std::fs::read_to_string(&candidate) {
            return Some(contents);
        }
    }
    std::fs::read_to_string(path).ok()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Replace every whole-word occurrence of `name` in `text` with `value`,
/// skipping occurrences that are part of a longer identifier. Operates on
/// char boundaries throughout, so multi-byte UTF-8 in string/char
/// literals passes through untouched.
fn substitute_word(text: &str, name: &str, value: &str) -> String {
    if name.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len());
    let mut prev: Option<char> = None;
    let mut rest = text;
    while !rest.is_empty() {
        if rest.starts_with(name) {
            let before_ok = !prev.is_some_and(is_word_char);
            let after_ok = !rest[name.len()..].chars().next().is_some_and(is_word_char);
            if before_ok && after_ok {
                out.push_str(value);
                rest = &rest[name.len()..];
                prev = value.chars().last();
                continue;
            }
        }
        let c = rest.chars().next().unwrap();
        out.push(c);
        rest = &rest[c.len_utf8()..];
        prev = Some(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predefined_macro_is_substituted() {
        let out = run("int main(){return ANSWER;}", "<test>", &[], &[("ANSWER".into(), "42".into())]).unwrap();
        assert_eq!(out, "int main(){return 42;}");
    }

    #[test]
    fn define_directive_is_blanked_and_applied_after() {
        let out = run("#define TWO 2\nint main(){return TWO;}", "<test>", &[], &[]).unwrap();
        assert_eq!(out, "\nint main(){return 2;}");
    }

    #[test]
    fn macro_name_does_not_match_inside_longer_identifier() {
        let out = run("int main(){return TWOFOLD;}", "<test>", &[], &[("TWO".into(), "2".into())]).unwrap();
        assert_eq!(out, "int main(){return TWOFOLD;}");
    }

    #[test]
    fn missing_include_is_an_error() {
        let err = run("#include \"nope.h\"", "<test>", &[], &[]).unwrap_err();
        assert!(matches!(err, CompileError::Syntax { .. }));
    }
}
