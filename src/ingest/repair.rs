// src/ingest/repair.rs
// =============================================================================
// Recovers the product JSON embedded in a saved listing page.
//
// The listing script carries a JSON document between two known markers:
//
//   ... {"rawResults": [ ...what we want... ] ,"state":{ ...
//
// Pages saved straight from the site are usually valid JSON already. They
// only carry legacy single-byte characters (U+0082 for an "é", ...) and a few
// private-use code points, which are mapped inside the decoded strings.
//
// Mis-escaped dumps are not valid JSON as-is. They contain quotes escaped at
// several nesting depths, the legacy characters written as \xNN escapes, and
// \UXXXXXXXX escapes for code points the parser rejects. Those are repaired
// with a fixed, ordered list of literal substitutions applied to the slice,
// followed by a strict parse.
//
// Rust concepts:
// - Raw string literals: r"\x82" is four characters, not one byte
// - Slices of &str: Must be cut on UTF-8 character boundaries
// =============================================================================

use serde_json::Value;
use tracing::error;

const START_MARKER: &str = r#"{"rawResults":"#;
const END_MARKER: &str = r#","state":{"#;

// Characters of context logged on each side of a parse error
const CONTEXT_RADIUS: usize = 40;

// Ordered (pattern, replacement) pairs
//
// Order matters: the longest escaped-quote sequences must go first, or the
// shorter patterns would leave stray backslashes behind.
pub const REPLACEMENTS: &[(&str, &str)] = &[
    // Escaped quotes, deepest nesting first
    (r#"\\\""#, ""),
    (r#"\\""#, ""),
    (r#"\""#, ""),
    (r"\'", "'"),
    // Legacy single-byte characters
    (r"\x80", ""),
    (r"\x81", ""),
    (r"\x82", "é"),
    (r"\x83", "â"),
    (r"\x84", ""),
    (r"\x85", "à"),
    (r"\x87", "ç"),
    (r"\x88", "à"),
    (r"\x89", ""),
    (r"\x8a", "è"),
    (r"\x8b", "_"),
    (r"\x8c", "_"),
    (r"\x8d", ""),
    (r"\x8e", ""),
    (r"\x8f", ""),
    (r"\x90", ""),
    (r"\x91", ""),
    (r"\x92", "'"),
    (r"\x93", ""),
    (r"\x94", ""),
    (r"\x95", ""),
    (r"\x96", ""),
    (r"\x97", ""),
    (r"\x98", ""),
    (r"\x99", ""),
    (r"\x9c", "oe"),
    (r"\x9d", "oe"),
    (r"\x9e", "u"),
    (r"\x9f", ""),
    (r"\xa0", " "),
    (r"\xad", ""),
    // Emojis and private-use code points
    (r"\U001000b6", "'"),
    (r"\U0001fa91", "_"),
    (r"\U0010fc00", "_"),
    (r"\U0010fc01", "_"),
    (r"\U0010fc04", "_"),
    (r"\U0010fc07", "_"),
    (r"\U0010fc08", "_"),
    (r"\U0010fc09", "_"),
    (r"\U0010fc14", "_"),
];

// Repairs and parses the payload of a saved page
//
// Returns: the rawResults array, or None if the page cannot be recovered.
// A failure is logged with the text around the parse error.
pub fn repair(raw: &str) -> Option<Value> {
    let Some(slice) = payload_slice(raw) else {
        error!("Payload markers not found");
        return None;
    };

    if let Ok(mut value) = serde_json::from_str::<Value>(slice) {
        map_strings(&mut value);
        return Some(value);
    }

    let cleaned = apply_replacements(slice);
    match serde_json::from_str(&cleaned) {
        Ok(value) => Some(value),
        Err(e) => {
            let offset = error_offset(&cleaned, e.line(), e.column());
            error!(
                "{} near: {}",
                e,
                context_window(&cleaned, offset, CONTEXT_RADIUS)
            );
            None
        }
    }
}

// The text between the start marker and the last end marker
fn payload_slice(raw: &str) -> Option<&str> {
    let start = raw.find(START_MARKER)? + START_MARKER.len();
    let end = raw.rfind(END_MARKER)?;
    raw.get(start..end)
}

pub fn apply_replacements(text: &str) -> String {
    REPLACEMENTS
        .iter()
        .fold(text.to_string(), |acc, (pattern, replacement)| {
            if acc.contains(pattern) {
                acc.replace(pattern, replacement)
            } else {
                acc
            }
        })
}

// Maps the legacy characters of every string in a decoded payload
fn map_strings(value: &mut Value) {
    match value {
        Value::String(text) if !text.is_ascii() => *text = map_legacy_chars(text),
        Value::Array(items) => items.iter_mut().for_each(map_strings),
        Value::Object(fields) => fields.values_mut().for_each(map_strings),
        _ => {}
    }
}

// Replaces the raw characters that the escape patterns of REPLACEMENTS stand for
fn map_legacy_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c.is_ascii() {
            out.push(c);
            continue;
        }
        let replacement = REPLACEMENTS
            .iter()
            .find(|(pattern, _)| escaped_char(pattern) == Some(c));
        match replacement {
            Some((_, replacement)) => out.push_str(replacement),
            None => out.push(c),
        }
    }
    out
}

// The character an escape pattern such as \x82 or \U0010fc00 stands for
fn escaped_char(pattern: &str) -> Option<char> {
    let hex = pattern
        .strip_prefix(r"\x")
        .or_else(|| pattern.strip_prefix(r"\U"))?;
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

// Converts serde_json's 1-based line/column into a byte offset
fn error_offset(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text
        .split('\n')
        .take(line.saturating_sub(1))
        .map(|l| l.len() + 1)
        .sum();
    (line_start + column.saturating_sub(1)).min(text.len())
}

// Up to `radius` bytes on each side of `offset`, widened to character boundaries
fn context_window(text: &str, offset: usize, radius: usize) -> &str {
    let mut start = offset.saturating_sub(radius);
    let mut end = (offset + radius).min(text.len());
    while !text.is_char_boundary(start) {
        start -= 1;
    }
    while !text.is_char_boundary(end) {
        end += 1;
    }
    &text[start..end]
}
