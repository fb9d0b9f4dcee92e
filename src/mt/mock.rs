//! Mock Machine Translator for testing
//!
//! This module provides a deterministic, API-free translator for exercising
//! the pipeline without API keys or network access. Every call is counted so
//! tests can assert how many requests a run made.
//!
//! # Example
//!
//! ```ignore
//! use dsp_l10n::mt::{MachineTranslator, MockTranslator, MockMode};
//!
//! #[tokio::test]
//! async fn test_translation() {
//!     let mock = MockTranslator::new(MockMode::Suffix);
//!     let result = mock.translate_batch(&request).await.unwrap();
//!     assert_eq!(result, vec!["Power_it"]);
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, TranslationRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Mock translation modes for testing different scenarios
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append language suffix: "Power" → "Power_it"
    Suffix,

    /// Use predefined mappings: (text, target_language) → translation,
    /// falling back to suffix mode for unknown texts
    Mappings(HashMap<(String, String), String>),

    /// Answer every line with a refusal
    Refuse,

    /// Simulate transport errors on every call
    Error(String),

    /// Fail the first `n` calls as unavailable, then behave like `Suffix`
    FailTimes(usize),

    /// Return one line fewer than requested
    DropLast,

    /// No-op: return input unchanged
    NoOp,
}

/// Mock translator that simulates various translation scenarios
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    /// Simulated network delay per call (in milliseconds), cycled by call number
    delays_ms: Vec<u64>,
    calls: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self {
            mode,
            delays_ms: Vec::new(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Create a MockTranslator with simulated network delay
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self::with_delays(mode, vec![delay_ms])
    }

    /// Create a MockTranslator whose n-th call sleeps `delays_ms[n % len]`
    ///
    /// Uneven delays make concurrent batches finish out of dispatch order.
    pub fn with_delays(mode: MockMode, delays_ms: Vec<u64>) -> Self {
        Self {
            delays_ms,
            ..Self::new(mode)
        }
    }

    /// Convenience constructor for `MockMode::Mappings`
    pub fn with_mappings<'a>(
        target_language: &str,
        pairs: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let map = pairs
            .into_iter()
            .map(|(from, to)| ((from.to_string(), target_language.to_string()), to.to_string()))
            .collect();
        Self::new(MockMode::Mappings(map))
    }

    /// Number of `translate_batch` calls made so far (clones share the count)
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn apply_delay(&self, call: usize) {
        if self.delays_ms.is_empty() {
            return;
        }
        let delay = self.delays_ms[call % self.delays_ms.len()];
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> String {
        match &self.mode {
            MockMode::Mappings(map) => map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target)),
            MockMode::Refuse => "I'm sorry, I cannot translate this text.".to_string(),
            MockMode::NoOp => text.to_string(),
            MockMode::Suffix
            | MockMode::FailTimes(_)
            | MockMode::DropLast
            | MockMode::Error(_) => format!("{}_{}", text, target),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate_batch(&self, request: &TranslationRequest) -> MtResult<Vec<String>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.apply_delay(call).await;

        match &self.mode {
            MockMode::Error(msg) => return Err(MtError::Unavailable(msg.clone())),
            MockMode::FailTimes(n) if call < *n => {
                return Err(MtError::Unavailable(format!("simulated failure #{}", call + 1)));
            }
            _ => {}
        }

        let mut results: Vec<String> = request
            .items
            .iter()
            .map(|item| self.apply_translation(&item.text, &request.target_language))
            .collect();

        if matches!(self.mode, MockMode::DropLast) {
            results.pop();
        }
        Ok(results)
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mt::translator::TranslationItem;

    fn request(texts: &[&str]) -> TranslationRequest {
        TranslationRequest {
            items: texts
                .iter()
                .enumerate()
                .map(|(i, t)| TranslationItem::new(i.to_string(), *t))
                .collect(),
            target_language: "it".to_string(),
            model: "mock".to_string(),
        }
    }

    #[tokio::test]
    async fn test_suffix_batch_translation() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let results = mock.translate_batch(&request(&["hello", "world"])).await.unwrap();
        assert_eq!(results, vec!["hello_it", "world_it"]);
    }

    #[tokio::test]
    async fn test_mapping_batch_translation() {
        let mock = MockTranslator::with_mappings("it", [("Power", "Energia"), ("Strength", "Forza")]);
        let results = mock
            .translate_batch(&request(&["Power", "Strength", "Iron"]))
            .await
            .unwrap();
        assert_eq!(results, vec!["Energia", "Forza", "Iron_it"]);
    }

    #[tokio::test]
    async fn test_refuse_mode() {
        let mock = MockTranslator::new(MockMode::Refuse);
        let results = mock.translate_batch(&request(&["Power"])).await.unwrap();
        assert!(results[0].contains("cannot translate"));
    }

    #[tokio::test]
    async fn test_error_mode_returns_error() {
        let mock = MockTranslator::new(MockMode::Error("API unavailable".to_string()));
        match mock.translate_batch(&request(&["hello"])).await {
            Err(MtError::Unavailable(msg)) => assert_eq!(msg, "API unavailable"),
            other => panic!("Expected Unavailable, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fail_times_then_recovers() {
        let mock = MockTranslator::new(MockMode::FailTimes(2));
        let req = request(&["hello"]);
        assert!(mock.translate_batch(&req).await.is_err());
        assert!(mock.translate_batch(&req).await.is_err());
        assert_eq!(mock.translate_batch(&req).await.unwrap(), vec!["hello_it"]);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test]
    async fn test_drop_last_is_misaligned() {
        let mock = MockTranslator::new(MockMode::DropLast);
        let results = mock.translate_batch(&request(&["a", "b"])).await.unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_noop_returns_unchanged() {
        let mock = MockTranslator::new(MockMode::NoOp);
        let results = mock.translate_batch(&request(&["Hello world"])).await.unwrap();
        assert_eq!(results, vec!["Hello world"]);
    }

    #[tokio::test]
    async fn test_clones_share_call_counter() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let clone = mock.clone();
        clone.translate_batch(&request(&["a"])).await.unwrap();
        mock.translate_batch(&request(&["b"])).await.unwrap();
        assert_eq!(mock.calls(), 2);
        assert_eq!(clone.calls(), 2);
    }

    #[tokio::test]
    async fn test_delay_adds_latency() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 50);
        let start = std::time::Instant::now();
        let _ = mock.translate_batch(&request(&["hello"])).await.unwrap();
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delays_cycle_by_call() {
        let mock = MockTranslator::with_delays(MockMode::Suffix, vec![30, 10]);
        let req = request(&["hello"]);
        let mut elapsed = Vec::new();
        for _ in 0..3 {
            let start = tokio::time::Instant::now();
            mock.translate_batch(&req).await.unwrap();
            elapsed.push(start.elapsed().as_millis());
        }
        assert_eq!(elapsed, vec![30, 10, 30]);
    }

    #[test]
    fn test_provider_name() {
        let mock = MockTranslator::new(MockMode::Suffix);
        assert_eq!(mock.provider_name(), "Mock Translator");
    }
}
