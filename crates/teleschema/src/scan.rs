//! Delimiter-aware scanning over type text.
//!
//! Every splitter in this crate walks the text through `Scan`, which tracks
//! bracket nesting (`{}`, `<>`, `()`, `[]`) and skips quoted literals, so an
//! inner object's separators are never mistaken for top-level ones.
//!
//! Comments are removed up front with `strip_comments`, so an apostrophe in
//! `// user's name` never opens a quote.

use std::borrow::Cow;
use std::str::CharIndices;

/// Walks `text`, yielding `(byte_index, char, level)`.
///
/// `level` is `None` for characters inside (or delimiting) a quoted literal.
/// Otherwise it is the nesting level the character sits at: an opener reports
/// the level outside of it, a closer reports the level after it closes.
pub(crate) struct Scan<'a> {
    chars: CharIndices<'a>,
    depth: usize,
    quote: Option<char>,
    escaped: bool,
    prev: char,
}

impl<'a> Scan<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices(),
            depth: 0,
            quote: None,
            escaped: false,
            prev: ' ',
        }
    }
}

impl Iterator for Scan<'_> {
    type Item = (usize, char, Option<usize>);

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, c) = self.chars.next()?;
        let prev = std::mem::replace(&mut self.prev, c);

        if let Some(q) = self.quote {
            if self.escaped {
                self.escaped = false;
            } else if c == '\\' {
                self.escaped = true;
            } else if c == q {
                self.quote = None;
            }
            return Some((idx, c, None));
        }

        let level = match c {
            '"' | '\'' | '`' => {
                self.quote = Some(c);
                return Some((idx, c, None));
            }
            '{' | '<' | '(' | '[' => {
                let level = self.depth;
                self.depth += 1;
                level
            }
            // arrow in a function type, not a closing angle bracket
            '>' if prev == '=' => self.depth,
            '}' | '>' | ')' | ']' => {
                self.depth = self.depth.saturating_sub(1);
                self.depth
            }
            _ => self.depth,
        };

        Some((idx, c, Some(level)))
    }
}

/// Splits `text` at every top-level occurrence of one of `seps`.
///
/// Pieces are trimmed; empty pieces are kept so callers can decide whether a
/// stray separator matters.
pub(crate) fn split_top_level<'a>(text: &'a str, seps: &[char]) -> Vec<&'a str> {
    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, c, level) in Scan::new(text) {
        if level == Some(0) && seps.contains(&c) {
            pieces.push(text[start..idx].trim());
            start = idx + c.len_utf8();
        }
    }
    pieces.push(text[start..].trim());
    pieces
}

/// Byte index of the first top-level `target`.
pub(crate) fn find_top_level(text: &str, target: char) -> Option<usize> {
    Scan::new(text)
        .find(|&(_, c, level)| level == Some(0) && c == target)
        .map(|(idx, _, _)| idx)
}

/// Byte index of the delimiter closing the opener at index 0.
///
/// Returns `None` when the opener is never closed.
pub(crate) fn matching_close(text: &str, close: char) -> Option<usize> {
    Scan::new(text)
        .skip(1)
        .find(|&(_, c, level)| level == Some(0) && c == close)
        .map(|(idx, _, _)| idx)
}

/// Removes `//` line comments and `/* */` block comments outside quoted
/// literals. A block comment becomes one space; an unclosed one runs to the
/// end of the text.
pub(crate) fn strip_comments(text: &str) -> Cow<'_, str> {
    if !text.contains("//") && !text.contains("/*") {
        return Cow::Borrowed(text);
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    let mut quote: Option<char> = None;
    let mut escaped = false;

    while let Some(c) = chars.next() {
        if let Some(q) = quote {
            out.push(c);
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }

        match (c, chars.peek().copied()) {
            ('/', Some('/')) => {
                while chars.next_if(|&next| next != '\n').is_some() {}
            }
            ('/', Some('*')) => {
                chars.next();
                let mut prev = ' ';
                for next in chars.by_ref() {
                    if prev == '*' && next == '/' {
                        break;
                    }
                    prev = next;
                }
                out.push(' ');
            }
            ('"' | '\'' | '`', _) => {
                quote = Some(c);
                out.push(c);
            }
            _ => out.push(c),
        }
    }

    Cow::Owned(out)
}
