//! Parameter list parsing.
//!
//! Turns a declared parameter list such as `a: number, b?: { x: string }`
//! into ordered [`ParamInfo`]s, compiling each annotation with
//! [`crate::parse_type`]. Like the type parser it never fails.

use crate::parser::parse_type;
use crate::scan::Scan;
use crate::scan::find_top_level;
use crate::scan::matching_close;
use crate::scan::split_top_level;
use crate::scan::strip_comments;
use crate::schema::ParamInfo;
use crate::schema::TypeSchema;

/// Parses a comma-separated parameter list, optionally wrapped in parens.
///
/// - `name?: T` and `name: T = default` are optional.
/// - `...rest: T[]` is optional and keeps its declared type.
/// - A missing annotation compiles to `any`.
pub fn parse_params(text: &str) -> Vec<ParamInfo> {
    let text = strip_comments(text);
    split_top_level(strip_parens(text.trim()), &[','])
        .into_iter()
        .filter(|entry| !entry.is_empty())
        .filter_map(parse_param)
        .collect()
}

fn strip_parens(text: &str) -> &str {
    if text.starts_with('(') && matching_close(text, ')') == Some(text.len() - 1) {
        return &text[1..text.len() - 1];
    }
    text
}

fn parse_param(entry: &str) -> Option<ParamInfo> {
    let (decl, has_default) = match find_initializer(entry) {
        Some(eq) => (entry[..eq].trim(), true),
        None => (entry, false),
    };

    let (raw_name, ty) = match find_top_level(decl, ':') {
        Some(colon) => (decl[..colon].trim(), parse_type(&decl[colon + 1..])),
        None => (decl.trim(), TypeSchema::any()),
    };

    let (raw_name, rest) = match raw_name.strip_prefix("...") {
        Some(name) => (name.trim_start(), true),
        None => (raw_name, false),
    };
    let (name, question) = match raw_name.strip_suffix('?') {
        Some(name) => (name.trim_end(), true),
        None => (raw_name, false),
    };

    if name.is_empty() {
        return None;
    }

    Some(ParamInfo::new(name, ty, question || has_default || rest))
}

/// Index of a top-level `=` that starts a default value (not `=>`, `==`).
fn find_initializer(entry: &str) -> Option<usize> {
    let bytes = entry.as_bytes();
    Scan::new(entry)
        .find(|&(idx, c, level)| {
            if level != Some(0) || c != '=' {
                return false;
            }
            let next = bytes.get(idx + 1).copied();
            let prev = idx.checked_sub(1).and_then(|i| bytes.get(i)).copied();
            !matches!(next, Some(b'>') | Some(b'='))
                && !matches!(prev, Some(b'=') | Some(b'!') | Some(b'<') | Some(b'>'))
        })
        .map(|(idx, _, _)| idx)
}
