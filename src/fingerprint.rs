//! Content fingerprints for source lines
//!
//! A fingerprint identifies the exact bytes of a source text, padding
//! included, so that any upstream edit to a line invalidates its cached
//! translation.

/// Compute the fingerprint of `text` as lowercase BLAKE3 hex
pub fn fingerprint(text: &str) -> String {
    blake3::hash(text.as_bytes()).to_hex().to_string()
}

/// Check whether `text` still produces `expected`
pub fn matches(text: &str, expected: &str) -> bool {
    fingerprint(text) == expected
}
