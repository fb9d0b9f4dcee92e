//! Screening of model output before it reaches the cache or the game files
//!
//! Every returned line goes through four checks, in order:
//!
//! 1. empty or whitespace-only output
//! 2. refusal / apology phrases ("I cannot translate…")
//! 3. the UI length budget derived from the source line
//! 4. leading/trailing padding and format placeholders
//!
//! A rejected line is never shown to the player: the committer stores the
//! source text with a `FALLBACK` status instead, and the line is retried on the
//! next run.

use crate::record::SourceRecord;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

/// `{0}`, `{name}`, `[1]`, printf-style conversions, `<color=…>` markup and
/// escaped control characters
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{[^{}\s]*\}|\[\d+\]|%(?:\d+\$)?[-+0#]*\d*(?:\.\d+)?[sdifxXuc%]|</?[A-Za-z][^<>]*>|\\[nrt]")
        .unwrap()
});

/// Phrases that mean the model declined instead of translating
pub const DEFAULT_REFUSAL_PATTERNS: &[&str] = &[
    "cannot translate",
    "unable to translate",
    "as an ai model",
    "as an ai language model",
    "i can't",
    "i cannot",
    "i'm sorry",
];

/// How the allowed output length is derived from the source line
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum BudgetRule {
    /// No length check
    Disabled,
    /// `ceil(source_len * ratio) + slack`
    Proportional { ratio: f64, slack: usize },
}

impl Default for BudgetRule {
    fn default() -> Self {
        BudgetRule::Proportional {
            ratio: 1.5,
            slack: 6,
        }
    }
}

impl BudgetRule {
    /// Allowed length for a source of `source_len` characters
    pub fn limit(&self, source_len: usize) -> Option<usize> {
        match *self {
            BudgetRule::Disabled => None,
            BudgetRule::Proportional { ratio, slack } => {
                Some((source_len as f64 * ratio).ceil() as usize + slack)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Case-insensitive substrings that mark a refusal
    pub refusal_patterns: Vec<String>,
    pub budget: BudgetRule,
    /// Whether leading/trailing padding counts toward the measured length
    pub count_padding: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            refusal_patterns: DEFAULT_REFUSAL_PATTERNS
                .iter()
                .map(|p| p.to_string())
                .collect(),
            budget: BudgetRule::default(),
            count_padding: false,
        }
    }
}

/// Coarse reason attached to every result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultReason {
    Accepted,
    RefusalDetected,
    EmptyResponse,
    BudgetExceeded,
    WhitespaceMismatch,
    /// The whole batch failed at the translator boundary
    BatchFailed,
}

/// Why a line was rejected, with the data needed to report it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    EmptyResponse,
    RefusalDetected { pattern: String },
    BudgetExceeded { limit: usize, actual: usize },
    WhitespaceMismatch { detail: String },
    BatchFailed { error: String },
}

impl Rejection {
    pub fn reason(&self) -> ResultReason {
        match self {
            Rejection::EmptyResponse => ResultReason::EmptyResponse,
            Rejection::RefusalDetected { .. } => ResultReason::RefusalDetected,
            Rejection::BudgetExceeded { .. } => ResultReason::BudgetExceeded,
            Rejection::WhitespaceMismatch { .. } => ResultReason::WhitespaceMismatch,
            Rejection::BatchFailed { .. } => ResultReason::BatchFailed,
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Rejection::EmptyResponse => write!(f, "empty response"),
            Rejection::RefusalDetected { pattern } => write!(f, "refusal detected ({})", pattern),
            Rejection::BudgetExceeded { limit, actual } => {
                write!(f, "over budget ({} > {})", actual, limit)
            }
            Rejection::WhitespaceMismatch { detail } => write!(f, "format mismatch: {}", detail),
            Rejection::BatchFailed { error } => write!(f, "batch failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected(Rejection),
}

/// Validated outcome for one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub record: SourceRecord,
    /// Raw model output (empty when the batch failed)
    pub translated_text: String,
    pub verdict: Verdict,
}

impl TranslationResult {
    pub fn key(&self) -> &str {
        &self.record.key
    }

    pub fn accepted(&self) -> bool {
        self.verdict == Verdict::Accepted
    }

    pub fn reason(&self) -> ResultReason {
        match &self.verdict {
            Verdict::Accepted => ResultReason::Accepted,
            Verdict::Rejected(rejection) => rejection.reason(),
        }
    }

    /// Result for a line whose batch never produced usable output
    pub fn batch_failed(record: SourceRecord, error: impl Into<String>) -> Self {
        Self {
            record,
            translated_text: String::new(),
            verdict: Verdict::Rejected(Rejection::BatchFailed {
                error: error.into(),
            }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(mut config: ValidationConfig) -> Self {
        for pattern in config.refusal_patterns.iter_mut() {
            *pattern = pattern.to_lowercase();
        }
        config.refusal_patterns.retain(|p| !p.trim().is_empty());
        Self { config }
    }

    /// Allowed output length for `source`, if the budget rule imposes one
    pub fn budget_for(&self, source: &str) -> Option<usize> {
        self.config.budget.limit(self.measure(source))
    }

    fn measure(&self, text: &str) -> usize {
        if self.config.count_padding {
            text.chars().count()
        } else {
            text.trim().chars().count()
        }
    }

    /// Run all checks on one (source, output) pair
    pub fn check(&self, source: &str, output: &str) -> Verdict {
        if output.trim().is_empty() {
            return Verdict::Rejected(Rejection::EmptyResponse);
        }

        let output_lower = output.to_lowercase();
        let source_lower = source.to_lowercase();
        if let Some(pattern) = self
            .config
            .refusal_patterns
            .iter()
            .find(|p| output_lower.contains(p.as_str()) && !source_lower.contains(p.as_str()))
        {
            return Verdict::Rejected(Rejection::RefusalDetected {
                pattern: pattern.clone(),
            });
        }

        if let Some(limit) = self.budget_for(source) {
            let actual = self.measure(output);
            if actual > limit {
                return Verdict::Rejected(Rejection::BudgetExceeded { limit, actual });
            }
        }

        if let Some(detail) = format_mismatch(source, output) {
            return Verdict::Rejected(Rejection::WhitespaceMismatch { detail });
        }

        Verdict::Accepted
    }

    /// Validate a whole batch response, pairing records with outputs by position
    pub fn validate_batch(
        &self,
        records: Vec<SourceRecord>,
        outputs: Vec<String>,
    ) -> Vec<TranslationResult> {
        records
            .into_iter()
            .zip(outputs)
            .map(|(record, translated_text)| {
                let verdict = self.check(&record.text, &translated_text);
                TranslationResult {
                    record,
                    translated_text,
                    verdict,
                }
            })
            .collect()
    }
}

fn leading_whitespace(text: &str) -> &str {
    &text[..text.len() - text.trim_start().len()]
}

fn trailing_whitespace(text: &str) -> &str {
    &text[text.trim_end().len()..]
}

/// Format placeholders found in `text`, sorted
pub fn placeholders(text: &str) -> Vec<&str> {
    let mut found: Vec<&str> = PLACEHOLDER_RE.find_iter(text).map(|m| m.as_str()).collect();
    found.sort_unstable();
    found
}

/// Describe the first structural difference between source and output
fn format_mismatch(source: &str, output: &str) -> Option<String> {
    if leading_whitespace(source) != leading_whitespace(output) {
        return Some(format!(
            "leading padding {:?} became {:?}",
            leading_whitespace(source),
            leading_whitespace(output)
        ));
    }
    if trailing_whitespace(source) != trailing_whitespace(output) {
        return Some(format!(
            "trailing padding {:?} became {:?}",
            trailing_whitespace(source),
            trailing_whitespace(output)
        ));
    }

    let expected = placeholders(source);
    let actual = placeholders(output);
    if expected != actual {
        return Some(format!("placeholders {:?} became {:?}", expected, actual));
    }
    None
}
