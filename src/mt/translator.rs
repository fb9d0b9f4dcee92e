//! Machine translation trait and request types
//!
//! This module defines the `MachineTranslator` trait, the boundary between the
//! pipeline and whatever service produces translations (an LLM API, a mock).
//!
//! # Example
//!
//! ```ignore
//! use dsp_l10n::mt::{MachineTranslator, OpenAiProvider, TranslationItem, TranslationRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAiProvider::from_env()?;
//!     let request = TranslationRequest {
//!         items: vec![TranslationItem::new("0", "Power").with_context("电力")],
//!         target_language: "it".to_string(),
//!         model: "gpt-5-nano".to_string(),
//!     };
//!     let results = provider.translate_batch(&request).await?;
//!     println!("{:?}", results); // ["Energia"]
//!     Ok(())
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use async_trait::async_trait;
use serde::Serialize;

/// One line of a batch as the translator sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranslationItem {
    /// Position-derived id, echoed back by structured-output providers
    pub id: String,
    pub text: String,
    /// Source-language original, for disambiguation only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Character budget the translation should stay within
    #[serde(rename = "len", skip_serializing_if = "Option::is_none")]
    pub budget: Option<usize>,
}

impl TranslationItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            context: None,
            budget: None,
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// A batch sent to the translator in one call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    pub items: Vec<TranslationItem>,
    pub target_language: String,
    pub model: String,
}

impl TranslationRequest {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Generic trait for machine translation providers
///
/// All methods are async to support I/O-bound operations like network requests.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate every item of `request`
    ///
    /// # Guarantees
    ///
    /// - Output order matches input order
    /// - Output length equals input length, otherwise
    ///   `MtError::BatchLengthMismatch` is returned
    async fn translate_batch(&self, request: &TranslationRequest) -> MtResult<Vec<String>>;

    /// Get the name of this translation provider
    ///
    /// Used for logging to identify which provider handled a batch.
    fn provider_name(&self) -> &str;
}

/// Reject responses that do not line up 1:1 with the request
pub fn ensure_aligned(request: &TranslationRequest, outputs: &[String]) -> MtResult<()> {
    if outputs.len() != request.len() {
        return Err(MtError::BatchLengthMismatch {
            expected: request.len(),
            actual: outputs.len(),
        });
    }
    Ok(())
}

/// Validate that a locale code is in acceptable format
///
/// Checks that the locale code contains only alphanumeric characters,
/// hyphens, and underscores.
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}
