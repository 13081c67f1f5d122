//! Free-text sanitizing and one-way hashing helpers.

use sha2::{Digest, Sha256};

/// Strip markup tags from user-supplied text, keeping the text between them.
///
/// An unterminated `<` drops the rest of the input.
pub fn sanitize_input(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for ch in input.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag && (!ch.is_control() || ch == '\n') => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// SHA-256 hex digest of a sensitive value (64 lowercase hex chars).
pub fn hash_sensitive(value: &str) -> String {
    format!("{:x}", Sha256::digest(value.as_bytes()))
}

/// Categorical message for an error shown to callers.
pub fn sanitize_error<E: std::fmt::Display>(err: &E) -> &'static str {
    tracing::error!(error = %err, "Internal error suppressed from response");
    "internal error"
}
