//! # Type Annotation Parser
//!
//! Compiles the type text declared after a parameter's `:` into a
//! [`TypeSchema`].
//!
//! Only brace-delimited structural literals are decomposed. Everything else
//! (`T[]`, `Foo<Bar>`, `"a" | "b"`, `A & B`, bare names) comes back as an
//! opaque leaf holding the trimmed text.
//!
//! ## Invariants
//! - **Total**: parsing never fails. Malformed input yields a best-effort
//!   schema (an incomplete shape, or an opaque leaf).
//! - **Balanced scanning**: entries are split only at top-level `;`/`,`, so a
//!   nested literal, generic argument list or quoted string stays intact.
//! - **Bounded**: nesting beyond `MAX_NESTING_DEPTH` is kept opaque.

use crate::scan::find_top_level;
use crate::scan::matching_close;
use crate::scan::split_top_level;
use crate::scan::strip_comments;
use crate::schema::Field;
use crate::schema::ObjectShape;
use crate::schema::TypeSchema;

/// Literal nesting beyond this depth is left undecomposed.
const MAX_NESTING_DEPTH: usize = 64;

/// Compiles declared type text into a schema.
///
/// ```
/// use teleschema::{parse_type, ObjectShape, TypeSchema};
///
/// let schema = parse_type("{ user: { name: string }; roles: string[] }");
/// let expected = ObjectShape::new()
///     .with_field("user", ObjectShape::new().with_field("name", "string"))
///     .with_field("roles", "string[]");
/// assert_eq!(schema, TypeSchema::Object(expected));
///
/// assert_eq!(parse_type("Map<string, number>"), TypeSchema::opaque("Map<string, number>"));
/// ```
pub fn parse_type(text: &str) -> TypeSchema {
    parse_type_impl(&strip_comments(text), 0)
}

fn parse_type_impl(text: &str, depth: usize) -> TypeSchema {
    let text = text.trim();
    if depth > MAX_NESTING_DEPTH {
        return TypeSchema::Opaque(text.to_string());
    }

    match literal_body(text) {
        Some(body) => TypeSchema::Object(parse_body(body, depth)),
        None => TypeSchema::Opaque(text.to_string()),
    }
}

/// The text between the outer braces, if `text` is one structural literal.
///
/// `{ a: A } | { b: B }` starts and ends with braces but the first brace
/// closes early, so it is a union and stays opaque. A literal whose opening
/// brace never closes is still treated as a literal (best effort).
fn literal_body(text: &str) -> Option<&str> {
    if text.len() < 2 || !text.starts_with('{') || !text.ends_with('}') {
        return None;
    }

    let last = text.len() - 1;
    match matching_close(text, '}') {
        Some(close) if close == last => Some(&text[1..last]),
        Some(_) => None,
        None => Some(&text[1..last]),
    }
}

fn parse_body(body: &str, depth: usize) -> ObjectShape {
    let mut shape = ObjectShape::new();

    for entry in split_top_level(body, &[';', ',']) {
        if let Some((name, optional, value)) = split_entry(entry) {
            shape.insert_field(Field::new(name, parse_type_impl(value, depth + 1), optional));
        }
    }

    shape
}

/// Splits `name: value` (or `name?: value`), skipping entries that cannot
/// name a field.
///
/// Empty names or values, index signatures (`[key: string]: T`) and method
/// signatures (`run(): void`) are dropped.
fn split_entry(entry: &str) -> Option<(&str, bool, &str)> {
    let colon = find_top_level(entry, ':')?;
    let (name, optional) = field_name(&entry[..colon]);
    let value = entry[colon + 1..].trim();

    if name.is_empty() || value.is_empty() {
        return None;
    }
    if name.starts_with('[') || name.contains('(') {
        return None;
    }
    Some((name, optional, value))
}

/// Normalizes a declared property name: `readonly` and quotes removed, a
/// trailing `?` reported as optionality.
fn field_name(raw: &str) -> (&str, bool) {
    let mut name = raw.trim();
    if let Some(rest) = name.strip_prefix("readonly ") {
        name = rest.trim_start();
    }
    let optional = match name.strip_suffix('?') {
        Some(rest) => {
            name = rest.trim_end();
            true
        }
        None => false,
    };
    for quote in ['"', '\''] {
        if name.len() >= 2 && name.starts_with(quote) && name.ends_with(quote) {
            name = &name[1..name.len() - 1];
        }
    }
    (name, optional)
}
