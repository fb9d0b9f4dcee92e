//! Core data structures for the translation pipeline
//!
//! [`SourceRecord`]s are parsed fresh from the game files on every run and are
//! never mutated. [`CacheRecord`]s are the durable unit of translation state and
//! are always replaced whole.

use crate::fingerprint::{self, fingerprint};
use serde::{Deserialize, Serialize};

/// One translatable line of a resource file
///
/// # Example
///
/// ```ignore
/// SourceRecord {
///     key: "电力".to_string(),
///     text: "Power".to_string(),
///     order: 12,
///     context: Some("电力".to_string()),
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceRecord {
    /// Unique within its file
    pub key: String,
    /// Exact source text, padding included
    pub text: String,
    /// Position of the line in the file
    pub order: usize,
    /// Source-language reference text used for disambiguation
    pub context: Option<String>,
}

impl SourceRecord {
    pub fn new(key: impl Into<String>, text: impl Into<String>, order: usize) -> Self {
        Self {
            key: key.into(),
            text: text.into(),
            order,
            context: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Length in Unicode scalar values, the unit used by every budget
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// Outcome stored alongside a cached translation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    /// Translation was validated and may be reused
    Ok,
    /// Translation failed; the source text stands in and the line is retried next run
    Fallback,
}

/// Durable translation state for one (file, key, target language)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRecord {
    pub key: String,
    pub source_fingerprint: String,
    pub source_text: String,
    pub translated_text: String,
    pub target_language: String,
    pub model_used: String,
    pub status: RecordStatus,
}

impl CacheRecord {
    /// Record for a validated translation
    pub fn accepted(
        source: &SourceRecord,
        translated_text: impl Into<String>,
        target_language: &str,
        model_used: &str,
    ) -> Self {
        Self {
            key: source.key.clone(),
            source_fingerprint: fingerprint(&source.text),
            source_text: source.text.clone(),
            translated_text: translated_text.into(),
            target_language: target_language.to_string(),
            model_used: model_used.to_string(),
            status: RecordStatus::Ok,
        }
    }

    /// Record for a rejected or failed translation: the source text stands in
    pub fn fallback(source: &SourceRecord, target_language: &str, model_used: &str) -> Self {
        Self {
            key: source.key.clone(),
            source_fingerprint: fingerprint(&source.text),
            source_text: source.text.clone(),
            translated_text: source.text.clone(),
            target_language: target_language.to_string(),
            model_used: model_used.to_string(),
            status: RecordStatus::Fallback,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == RecordStatus::Ok
    }

    /// True when the stored fingerprint no longer matches `current_text`
    pub fn is_stale_for(&self, current_text: &str) -> bool {
        !fingerprint::matches(current_text, &self.source_fingerprint)
    }
}

/// Final text for one key, handed to the resource writer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputRecord {
    pub key: String,
    pub text: String,
    pub order: usize,
}
