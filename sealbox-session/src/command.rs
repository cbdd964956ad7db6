//! Command template handling.
//!
//! Templates name the staged plaintext with a `{filename}` or
//! `[ filename ]` placeholder (whitespace inside the delimiters is
//! tolerated). A template without any placeholder gets the path appended
//! as a trailing argument.

use std::path::Path;

/// Canonical placeholder inserted by normalization.
const PLACEHOLDER: &str = "{filename}";

/// Normalizes a template so it contains the canonical placeholder.
pub(crate) fn normalize_template(template: &str) -> String {
    let template = template.trim();

    let (normalized, found_braces) = replace_placeholder(template, '{', '}');
    let (normalized, found_brackets) = replace_placeholder(&normalized, '[', ']');

    if found_braces || found_brackets {
        normalized
    } else {
        format!("{normalized} {PLACEHOLDER}")
    }
}

/// Substitutes the staged path into a normalized template.
pub(crate) fn build_command(normalized: &str, staged: &Path) -> String {
    normalized.replace(PLACEHOLDER, &staged.display().to_string())
}

/// Replaces every `<open>filename<close>` group (inner whitespace
/// allowed) with the canonical placeholder.
fn replace_placeholder(input: &str, open: char, close: char) -> (String, bool) {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut found = false;

    while let Some(start) = rest.find(open) {
        let after_open = start + open.len_utf8();
        let Some(offset) = rest[after_open..].find(close) else {
            break;
        };
        let end = after_open + offset;

        if rest[after_open..end].trim() == "filename" {
            out.push_str(&rest[..start]);
            out.push_str(PLACEHOLDER);
            found = true;
        } else {
            out.push_str(&rest[..end + close.len_utf8()]);
        }
        rest = &rest[end + close.len_utf8()..];
    }

    out.push_str(rest);
    (out, found)
}
