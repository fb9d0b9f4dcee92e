//! Folding validated results back into the cache and assembling output
//!
//! The committer is the only writer of a file's [`FileCache`] during a run.
//! Workers hand their results back to the coordinating task, which commits
//! them here one batch at a time.

use crate::cache::FileCache;
use crate::planner::{Decision, Plan};
use crate::record::{CacheRecord, OutputRecord};
use crate::validator::{TranslationResult, Verdict};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Per-file commit counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitStats {
    pub accepted: usize,
    pub fallback: usize,
}

pub struct Committer<'a> {
    cache: &'a mut FileCache,
    target_language: String,
    model: String,
    /// Final text of every line resolved during this run
    resolved: HashMap<String, String>,
    stats: CommitStats,
}

impl<'a> Committer<'a> {
    pub fn new(cache: &'a mut FileCache, target_language: &str, model: &str) -> Self {
        Self {
            cache,
            target_language: target_language.to_string(),
            model: model.to_string(),
            resolved: HashMap::new(),
            stats: CommitStats::default(),
        }
    }

    /// Upsert the cache record for one result
    pub fn commit(&mut self, result: TranslationResult) {
        let record = match &result.verdict {
            Verdict::Accepted => {
                self.stats.accepted += 1;
                CacheRecord::accepted(
                    &result.record,
                    result.translated_text.clone(),
                    &self.target_language,
                    &self.model,
                )
            }
            Verdict::Rejected(rejection) => {
                self.stats.fallback += 1;
                warn!(
                    file = self.cache.file_id(),
                    key = %result.record.key,
                    reason = %rejection,
                    "falling back to source text"
                );
                CacheRecord::fallback(&result.record, &self.target_language, &self.model)
            }
        };

        self.resolved
            .insert(result.record.key.clone(), record.translated_text.clone());
        self.cache.put(result.record.key.clone(), record);
    }

    pub fn commit_all(&mut self, results: impl IntoIterator<Item = TranslationResult>) {
        for result in results {
            self.commit(result);
        }
    }

    pub fn stats(&self) -> CommitStats {
        self.stats
    }

    /// Merge reused and newly committed lines, ordered by source position
    ///
    /// Lines that were planned for translation but never committed (an
    /// interrupted run) keep their source text.
    pub fn assemble(&self, plan: &Plan) -> Vec<OutputRecord> {
        let mut output: Vec<OutputRecord> = plan
            .entries
            .iter()
            .map(|entry| {
                let text = match &entry.decision {
                    Decision::Reuse { text } => text.clone(),
                    Decision::Translate { .. } => match self.resolved.get(&entry.record.key) {
                        Some(text) => text.clone(),
                        None => {
                            debug!(key = %entry.record.key, "unresolved line, using source text");
                            entry.record.text.clone()
                        }
                    },
                };
                OutputRecord {
                    key: entry.record.key.clone(),
                    text,
                    order: entry.record.order,
                }
            })
            .collect();

        output.sort_by_key(|r| r.order);
        output
    }

    /// Whether every line planned for translation has been committed
    pub fn is_complete(&self, plan: &Plan) -> bool {
        plan.entries.iter().all(|entry| match entry.decision {
            Decision::Reuse { .. } => true,
            Decision::Translate { .. } => self.resolved.contains_key(&entry.record.key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::plan;
    use crate::record::{RecordStatus, SourceRecord};
    use crate::validator::{Rejection, TranslationResult, Verdict};

    fn accepted(record: &SourceRecord, text: &str) -> TranslationResult {
        TranslationResult {
            record: record.clone(),
            translated_text: text.to_string(),
            verdict: Verdict::Accepted,
        }
    }

    fn refused(record: &SourceRecord, text: &str) -> TranslationResult {
        TranslationResult {
            record: record.clone(),
            translated_text: text.to_string(),
            verdict: Verdict::Rejected(Rejection::RefusalDetected {
                pattern: "cannot translate".to_string(),
            }),
        }
    }

    #[test]
    fn test_accepted_result_is_cached_ok() {
        let mut cache = FileCache::new("base.txt");
        let power = SourceRecord::new("k1", "Power", 0);
        {
            let mut committer = Committer::new(&mut cache, "it", "gpt-5-nano");
            committer.commit(accepted(&power, "Energia"));
            assert_eq!(committer.stats().accepted, 1);
        }

        let record = cache.get("k1").unwrap();
        assert_eq!(record.status, RecordStatus::Ok);
        assert_eq!(record.translated_text, "Energia");
        assert_eq!(record.model_used, "gpt-5-nano");
        assert!(!record.is_stale_for("Power"));
    }

    #[test]
    fn test_rejected_result_never_surfaces_model_output() {
        let mut cache = FileCache::new("base.txt");
        let power = SourceRecord::new("k1", "Power", 0);
        let plan = plan(&[power.clone()], &cache, "it");

        let output = {
            let mut committer = Committer::new(&mut cache, "it", "m");
            committer.commit(refused(&power, "I cannot translate this"));
            assert_eq!(committer.stats().fallback, 1);
            committer.assemble(&plan)
        };

        assert_eq!(output[0].text, "Power");
        let record = cache.get("k1").unwrap();
        assert_eq!(record.status, RecordStatus::Fallback);
        assert_eq!(record.translated_text, "Power");
    }

    #[test]
    fn test_assemble_orders_by_source_position() {
        let mut cache = FileCache::new("base.txt");
        let a = SourceRecord::new("a", "Alpha", 0);
        let b = SourceRecord::new("b", "Beta", 1);
        let c = SourceRecord::new("c", "Gamma", 2);
        cache.put("b", CacheRecord::accepted(&b, "Beta-it", "it", "m"));

        let plan = plan(&[a.clone(), b.clone(), c.clone()], &cache, "it");
        let mut committer = Committer::new(&mut cache, "it", "m");
        // Commit in reverse completion order
        committer.commit(accepted(&c, "Gamma-it"));
        committer.commit(accepted(&a, "Alpha-it"));

        let output = committer.assemble(&plan);
        let texts: Vec<_> = output.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["Alpha-it", "Beta-it", "Gamma-it"]);
        assert!(committer.is_complete(&plan));
    }

    #[test]
    fn test_uncommitted_lines_keep_source_text() {
        let mut cache = FileCache::new("base.txt");
        let a = SourceRecord::new("a", "Alpha", 0);
        let b = SourceRecord::new("b", "Beta", 1);
        let plan = plan(&[a.clone(), b.clone()], &cache, "it");

        let mut committer = Committer::new(&mut cache, "it", "m");
        committer.commit(accepted(&a, "Alpha-it"));

        assert!(!committer.is_complete(&plan));
        let output = committer.assemble(&plan);
        assert_eq!(output[1].text, "Beta");
    }

    #[test]
    fn test_retranslation_replaces_stale_record() {
        let mut cache = FileCache::new("base.txt");
        let old = SourceRecord::new("k1", "Power", 0);
        cache.put("k1", CacheRecord::accepted(&old, "Energia", "it", "m"));

        let new = SourceRecord::new("k1", "Electricity", 0);
        Committer::new(&mut cache, "it", "m").commit(accepted(&new, "Elettricità"));

        assert_eq!(cache.len(), 1);
        let record = cache.get("k1").unwrap();
        assert_eq!(record.source_text, "Electricity");
        assert!(!record.is_stale_for("Electricity"));
    }
}
