//! Change detection: decide, per source line, whether the cache can be reused
//!
//! A line is reused only when the cache holds an `OK` record for the same key,
//! the same target language, and the same source fingerprint. Everything else
//! goes back to the translator. Cached keys that no longer appear in the source
//! are reported as orphans and left untouched in the cache.

use crate::cache::FileCache;
use crate::record::{RecordStatus, SourceRecord};
use std::collections::HashSet;

/// Why a line has to be (re-)translated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslateReason {
    /// No cached record for this key
    New,
    /// The source text changed upstream since it was translated
    SourceChanged,
    /// The previous attempt fell back to the source text
    RetryFallback,
    /// The cached record belongs to another target language
    LanguageMismatch,
}

/// Classification of one source line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Reuse { text: String },
    Translate { reason: TranslateReason },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub record: SourceRecord,
    pub decision: Decision,
}

/// Work plan for one file, in source order
#[derive(Debug, Clone, Default)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
    /// Cached keys with no current source line
    pub orphans: Vec<String>,
}

impl Plan {
    /// Records that need translator work, in source order
    pub fn to_translate(&self) -> Vec<SourceRecord> {
        self.entries
            .iter()
            .filter(|e| matches!(e.decision, Decision::Translate { .. }))
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn reuse_count(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e.decision, Decision::Reuse { .. }))
            .count()
    }

    pub fn translate_count(&self) -> usize {
        self.entries.len() - self.reuse_count()
    }

    pub fn count_reason(&self, reason: TranslateReason) -> usize {
        self.entries
            .iter()
            .filter(|e| e.decision == Decision::Translate { reason })
            .count()
    }
}

/// Classify a single record against the cache
pub fn classify(record: &SourceRecord, cache: &FileCache, target_language: &str) -> Decision {
    let Some(cached) = cache.get(&record.key) else {
        return Decision::Translate {
            reason: TranslateReason::New,
        };
    };

    if cached.is_stale_for(&record.text) {
        return Decision::Translate {
            reason: TranslateReason::SourceChanged,
        };
    }
    if cached.target_language != target_language {
        return Decision::Translate {
            reason: TranslateReason::LanguageMismatch,
        };
    }

    match cached.status {
        RecordStatus::Ok => Decision::Reuse {
            text: cached.translated_text.clone(),
        },
        RecordStatus::Fallback => Decision::Translate {
            reason: TranslateReason::RetryFallback,
        },
    }
}

/// Build the plan for a file
pub fn plan(records: &[SourceRecord], cache: &FileCache, target_language: &str) -> Plan {
    let entries = records
        .iter()
        .map(|record| PlanEntry {
            record: record.clone(),
            decision: classify(record, cache, target_language),
        })
        .collect();

    let current: HashSet<&str> = records.iter().map(|r| r.key.as_str()).collect();
    let orphans = cache
        .keys()
        .filter(|key| !current.contains(key.as_str()))
        .cloned()
        .collect();

    Plan { entries, orphans }
}
