//! Error Canonicalization
//!
//! Raw error strings are noisy: line numbers, addresses, quoted values, and
//! stack traces make every occurrence unique. Recall needs the opposite - a
//! stable form that repeats. `normalize` strips the volatile parts while
//! preserving the human-readable core; `fingerprint` assigns a coarse
//! `TYPE|OPERATION` key so syntactically different errors of the same family
//! still find each other's fixes.
//!
//! The pattern tables are compile-time constants and part of the engine's
//! behavior: extending them changes which errors are considered related.

use serde::{Deserialize, Serialize};

/// Sentinel error type when no pattern matches
pub const UNKNOWN_ERROR_TYPE: &str = "UNKNOWN_ERROR";

/// Sentinel operation when no pattern matches
pub const GENERAL_OPERATION: &str = "general";

/// Maximum length of a normalized error string
const MAX_NORMALIZED_LEN: usize = 300;

// ============================================================================
// FINGERPRINT
// ============================================================================

/// Coarse classification of a raw error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorFingerprint {
    /// Error family, e.g. `TYPE_ERROR`
    pub error_type: String,
    /// What the program was doing, e.g. `property_access`
    pub operation: String,
    /// Content-addressed key `TYPE|OPERATION`
    pub key: String,
}

impl ErrorFingerprint {
    /// Whether any pattern matched at all
    pub fn is_recognized(&self) -> bool {
        self.error_type != UNKNOWN_ERROR_TYPE || self.operation != GENERAL_OPERATION
    }
}

/// Ordered first-match table: lowercase needle -> error type
///
/// Order matters: specific families sit above generic ones.
const ERROR_TYPE_PATTERNS: &[(&str, &str)] = &[
    // Connection / network
    ("econnrefused", "CONNECTION_ERROR"),
    ("econnreset", "CONNECTION_ERROR"),
    ("connection refused", "CONNECTION_ERROR"),
    ("socket hang up", "CONNECTION_ERROR"),
    ("network unreachable", "CONNECTION_ERROR"),
    // Filesystem
    ("enoent", "FILE_NOT_FOUND"),
    ("no such file", "FILE_NOT_FOUND"),
    ("filenotfound", "FILE_NOT_FOUND"),
    // Permissions
    ("eacces", "PERMISSION_ERROR"),
    ("eperm", "PERMISSION_ERROR"),
    ("permission denied", "PERMISSION_ERROR"),
    ("permissionerror", "PERMISSION_ERROR"),
    // HTTP
    ("500 internal server", "HTTP_5XX"),
    ("502 bad gateway", "HTTP_5XX"),
    ("503 service unavailable", "HTTP_5XX"),
    ("504 gateway", "HTTP_5XX"),
    ("http 5", "HTTP_5XX"),
    ("400 bad request", "HTTP_4XX"),
    ("401 unauthorized", "HTTP_4XX"),
    ("403 forbidden", "HTTP_4XX"),
    ("404 not found", "HTTP_4XX"),
    ("429 too many", "HTTP_4XX"),
    ("http 4", "HTTP_4XX"),
    // Language exception families
    ("typeerror", "TYPE_ERROR"),
    ("type error", "TYPE_ERROR"),
    ("mismatched types", "TYPE_ERROR"),
    ("type mismatch", "TYPE_ERROR"),
    ("referenceerror", "REFERENCE_ERROR"),
    ("is not defined", "REFERENCE_ERROR"),
    ("cannot find value", "REFERENCE_ERROR"),
    ("undefined variable", "REFERENCE_ERROR"),
    ("syntaxerror", "SYNTAX_ERROR"),
    ("syntax error", "SYNTAX_ERROR"),
    ("unexpected token", "SYNTAX_ERROR"),
    ("rangeerror", "RANGE_ERROR"),
    ("index out of range", "RANGE_ERROR"),
    ("out of bounds", "RANGE_ERROR"),
    ("attributeerror", "ATTRIBUTE_ERROR"),
    ("has no attribute", "ATTRIBUTE_ERROR"),
    ("keyerror", "KEY_ERROR"),
    ("valueerror", "VALUE_ERROR"),
    ("invalid value", "VALUE_ERROR"),
    ("modulenotfounderror", "MODULE_NOT_FOUND"),
    ("module not found", "MODULE_NOT_FOUND"),
    ("cannot find module", "MODULE_NOT_FOUND"),
    ("importerror", "IMPORT_ERROR"),
    ("unresolved import", "IMPORT_ERROR"),
    ("nullpointerexception", "NULL_REFERENCE"),
    ("nullreferenceexception", "NULL_REFERENCE"),
    ("null reference", "NULL_REFERENCE"),
    ("out of memory", "OUT_OF_MEMORY"),
    ("heap limit", "OUT_OF_MEMORY"),
    ("etimedout", "TIMEOUT"),
    ("timed out", "TIMEOUT"),
    ("timeout", "TIMEOUT"),
    ("assertionerror", "ASSERTION_ERROR"),
    ("assertion failed", "ASSERTION_ERROR"),
    // Compiler diagnostics (rustc-style codes and borrowck vocabulary)
    ("cannot borrow", "COMPILE_ERROR"),
    ("cannot move out", "COMPILE_ERROR"),
    ("lifetime may not live", "COMPILE_ERROR"),
    ("error[e0", "COMPILE_ERROR"),
];

/// Ordered first-match table: lowercase needle -> operation
const OPERATION_PATTERNS: &[(&str, &str)] = &[
    ("cannot read propert", "property_access"),
    ("cannot read", "property_access"),
    ("has no attribute", "property_access"),
    ("of undefined", "property_access"),
    ("of null", "property_access"),
    ("is not a function", "function_call"),
    ("not callable", "function_call"),
    ("too many arguments", "function_call"),
    ("missing argument", "function_call"),
    ("is not defined", "variable_lookup"),
    ("cannot find value", "variable_lookup"),
    ("undefined variable", "variable_lookup"),
    ("unresolved name", "variable_lookup"),
    ("import", "importing"),
    ("require", "importing"),
    ("module", "importing"),
    ("unexpected token", "parsing"),
    ("parse", "parsing"),
    ("parsing", "parsing"),
    ("deserialize", "parsing"),
    ("connect", "connecting"),
    ("socket", "connecting"),
    ("fetch", "connecting"),
    ("request", "connecting"),
    ("cannot borrow", "compiling"),
    ("mismatched types", "compiling"),
    ("lifetime", "compiling"),
    ("compile", "compiling"),
    ("write", "writing"),
    ("save", "writing"),
    ("read", "reading"),
    ("open", "reading"),
    ("delete", "deleting"),
    ("remove", "deleting"),
    ("unlink", "deleting"),
    ("query", "querying"),
    ("sql", "querying"),
    ("database", "querying"),
    ("spawn", "executing"),
    ("exit code", "executing"),
    ("command", "executing"),
    ("execut", "executing"),
];

/// Assign a coarse fingerprint to a raw error string
pub fn fingerprint(raw: &str) -> ErrorFingerprint {
    let lower = raw.to_lowercase();

    let error_type = ERROR_TYPE_PATTERNS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, t)| *t)
        .unwrap_or(UNKNOWN_ERROR_TYPE);

    let operation = OPERATION_PATTERNS
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, op)| *op)
        .unwrap_or(GENERAL_OPERATION);

    ErrorFingerprint {
        error_type: error_type.to_string(),
        operation: operation.to_string(),
        key: format!("{}|{}", error_type, operation),
    }
}

/// Heuristic used by recall phase 0: does this query read like an error?
pub fn looks_like_error(query: &str) -> bool {
    let lower = query.to_lowercase();
    fingerprint(query).error_type != UNKNOWN_ERROR_TYPE
        || lower.contains("error")
        || lower.contains("exception")
        || lower.contains("panic")
}

// ============================================================================
// NORMALIZATION
// ============================================================================

/// Normalize a raw error string to a stable form
///
/// Strips, in order: stack-frame tails, quoted literals, hex addresses, ISO
/// timestamps, epoch-looking integers, and line/column suffixes, then
/// collapses whitespace. The result is used both as a neuron path and as a
/// content-addressed key, so it must be deterministic.
pub fn normalize(raw: &str) -> String {
    let head = strip_stack_tail(raw);
    let mut out = String::with_capacity(head.len());

    for token in head.split_whitespace() {
        let token = strip_location_suffix(token);
        let token = if is_hex_address(token) {
            "0x_"
        } else if is_iso_timestamp(token) {
            "_"
        } else if is_epoch_integer(token) {
            "_"
        } else {
            token
        };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(token);
    }

    let mut out = mask_quoted(&out);
    if out.len() > MAX_NORMALIZED_LEN {
        // Truncate on a char boundary
        let mut cut = MAX_NORMALIZED_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out.trim().to_string()
}

/// Keep only the message lines before the stack trace begins
fn strip_stack_tail(raw: &str) -> String {
    let mut kept = Vec::new();
    for line in raw.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("at ")
            || trimmed.starts_with("File \"")
            || trimmed.starts_with("Traceback (")
            || trimmed.starts_with("stack backtrace:")
            || trimmed.starts_with("--> ")
        {
            break;
        }
        kept.push(line);
    }
    if kept.is_empty() {
        raw.lines().next().unwrap_or("").to_string()
    } else {
        kept.join(" ")
    }
}

/// Replace the contents of single- and double-quoted spans with `_`
fn mask_quoted(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        if c == '\'' || c == '"' || c == '`' {
            if let Some(close) = chars[i + 1..].iter().position(|&x| x == c) {
                out.push(c);
                out.push('_');
                out.push(c);
                i += close + 2;
                continue;
            }
        }
        out.push(c);
        i += 1;
    }
    out
}

/// Strip `:line` / `:line:col` suffixes from path-like tokens
fn strip_location_suffix(token: &str) -> &str {
    let mut end = token.len();
    // Peel up to two trailing ":<digits>" groups
    for _ in 0..2 {
        let head = &token[..end];
        if let Some(colon) = head.rfind(':') {
            let digits = &head[colon + 1..];
            if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
                end = colon;
                continue;
            }
        }
        break;
    }
    &token[..end]
}

fn is_hex_address(token: &str) -> bool {
    let body = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"));
    match body {
        Some(b) => b.len() >= 4 && b.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

fn is_iso_timestamp(token: &str) -> bool {
    let b = token.as_bytes();
    b.len() >= 10
        && b[..4].iter().all(|c| c.is_ascii_digit())
        && b[4] == b'-'
        && b[5..7].iter().all(|c| c.is_ascii_digit())
        && b[7] == b'-'
        && b[8..10].iter().all(|c| c.is_ascii_digit())
}

fn is_epoch_integer(token: &str) -> bool {
    token.len() >= 10 && token.chars().all(|c| c.is_ascii_digit())
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_type_error_property_access() {
        let fp = fingerprint("TypeError: cannot read 'token' of undefined");
        assert_eq!(fp.error_type, "TYPE_ERROR");
        assert_eq!(fp.operation, "property_access");
        assert_eq!(fp.key, "TYPE_ERROR|property_access");
    }

    #[test]
    fn test_fingerprint_same_family_different_text() {
        let a = fingerprint("TypeError: cannot read 'session' of undefined");
        let b = fingerprint("TypeError: Cannot read properties of undefined (reading 'id')");
        assert_eq!(a.key, b.key);
    }

    #[test]
    fn test_fingerprint_ordering_prefers_specific() {
        // Contains both "read" and "cannot read" - property_access wins
        let fp = fingerprint("TypeError: cannot read 'x' of null");
        assert_eq!(fp.operation, "property_access");
    }

    #[test]
    fn test_fingerprint_unknown_defaults() {
        let fp = fingerprint("something vague happened");
        assert_eq!(fp.error_type, UNKNOWN_ERROR_TYPE);
        assert_eq!(fp.operation, GENERAL_OPERATION);
        assert!(!fp.is_recognized());
    }

    #[test]
    fn test_fingerprint_connection() {
        let fp = fingerprint("Error: connect ECONNREFUSED 127.0.0.1:5432");
        assert_eq!(fp.error_type, "CONNECTION_ERROR");
        assert_eq!(fp.operation, "connecting");
    }

    #[test]
    fn test_fingerprint_rustc() {
        let fp = fingerprint("error[E0502]: cannot borrow `graph` as mutable");
        assert_eq!(fp.error_type, "COMPILE_ERROR");
        assert_eq!(fp.operation, "compiling");
    }

    #[test]
    fn test_normalize_strips_locations() {
        let n = normalize("Error at /src/auth.ts:42:17 failed");
        assert!(!n.contains(":42"));
        assert!(n.contains("/src/auth.ts"));
    }

    #[test]
    fn test_normalize_masks_quoted() {
        let n = normalize("TypeError: cannot read 'token' of undefined");
        assert_eq!(n, "TypeError: cannot read '_' of undefined");
    }

    #[test]
    fn test_normalize_is_stable() {
        let a = normalize("KeyError: 'user_id' at 2024-01-15T10:00:00Z");
        let b = normalize("KeyError: 'session' at 2025-11-02T09:30:00Z");
        assert_eq!(a, b);
    }

    #[test]
    fn test_normalize_strips_stack_tail() {
        let raw = "TypeError: x is not a function\n    at handler (/app/index.js:10:3)\n    at process";
        let n = normalize(raw);
        assert!(!n.contains("at handler"));
        assert!(n.starts_with("TypeError"));
    }

    #[test]
    fn test_normalize_hex_and_epoch() {
        let n = normalize("segfault at 0xDEADBEEF time 1736900000");
        assert!(n.contains("0x_"));
        assert!(!n.contains("1736900000"));
    }

    #[test]
    fn test_looks_like_error() {
        assert!(looks_like_error("TypeError: boom"));
        assert!(looks_like_error("some panic in worker"));
        assert!(!looks_like_error("authentication middleware"));
    }
}
