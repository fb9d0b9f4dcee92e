//! OpenAI chat-completions provider for machine translation
//!
//! This module talks to any OpenAI-compatible `/chat/completions` endpoint and
//! asks for a strict JSON-schema response, so every line comes back tagged
//! with the id it was sent with.
//!
//! # Authentication
//!
//! The provider loads the API key from the `OPENAI_API_KEY` environment
//! variable (a `.env` file is honoured by the binary).
//!
//! # Example
//!
//! ```ignore
//! use dsp_l10n::mt::{MachineTranslator, OpenAiProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = OpenAiProvider::from_env()?
//!         .with_glossary(vec!["Icarus".to_string()]);
//!     let results = provider.translate_batch(&request).await?;
//!     println!("{:?}", results);
//!     Ok(())
//! }
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, TranslationRequest, ensure_aligned, validate_locale};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// OpenAI-compatible chat-completions provider
#[derive(Clone)]
pub struct OpenAiProvider {
    /// API key for authentication
    api_key: String,
    /// HTTP client for async requests
    client: reqwest::Client,
    /// Base URL, without the `/chat/completions` suffix
    base_url: String,
    /// Terms that must be left untranslated
    glossary: Vec<String>,
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("glossary", &self.glossary.len())
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemsPayload {
    items: Vec<TranslatedItem>,
}

#[derive(Debug, Deserialize)]
struct TranslatedItem {
    id: String,
    translated_text: String,
}

impl OpenAiProvider {
    /// Create a new provider with an explicit API key
    ///
    /// # Returns
    ///
    /// * `Ok(Self)` - New provider instance
    /// * `Err(MtError)` - If the API key is empty or the HTTP client cannot be built
    pub fn new(api_key: String) -> MtResult<Self> {
        Self::with_timeout(api_key, DEFAULT_TIMEOUT)
    }

    /// Same as [`OpenAiProvider::new`] with an explicit request timeout
    pub fn with_timeout(api_key: String, timeout: Duration) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::Config("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MtError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            glossary: Vec::new(),
        })
    }

    /// Create a provider from the `OPENAI_API_KEY` environment variable
    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
            MtError::Config("OPENAI_API_KEY environment variable not set".to_string())
        })?;

        Self::new(api_key)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_glossary(mut self, glossary: Vec<String>) -> Self {
        self.glossary = glossary;
        self
    }

    fn system_prompt(&self, target_language: &str) -> String {
        let mut lines = vec![
            format!(
                "You are an expert English-to-{} translator for the game 'Dyson Sphere Program'.",
                target_language
            ),
            "Your task is to translate the provided texts following these strict rules:".to_string(),
            String::new(),
            "1. **Translation Rules**:".to_string(),
            format!("   - Translate the 'text' field into {}.", target_language),
            "   - Use 'context' (Chinese original) ONLY as a reference for meaning.".to_string(),
            "   - Keep proper nouns (e.g. 'Dyson Sphere', 'Icarus') in the original; translate technical terms (e.g. 'Power', 'Iron') using the context.".to_string(),
            "   - NEVER return explanations like 'I cannot translate'.".to_string(),
            String::new(),
            "2. **Constraints**:".to_string(),
            "   - STRICTLY preserve leading and trailing whitespace padding.".to_string(),
            "   - **Character Budget**: game UIs have little room, stay within the 'len' value whenever possible.".to_string(),
            "   - Do NOT add spaces around variables like {0}, [1], %s.".to_string(),
            String::new(),
            "3. **Output Format**:".to_string(),
            "   - Return one item per input id, matching the strict JSON schema provided.".to_string(),
        ];

        if !self.glossary.is_empty() {
            lines.push(String::new());
            lines.push("**Glossary (Do Not Translate):**".to_string());
            lines.extend(self.glossary.iter().cloned());
        }

        lines.join("\n")
    }

    fn request_body(&self, request: &TranslationRequest) -> MtResult<Value> {
        let items = serde_json::to_string(&request.items)
            .map_err(|e| MtError::Config(format!("Failed to encode request items: {}", e)))?;

        Ok(json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": self.system_prompt(&request.target_language)},
                {
                    "role": "user",
                    "content": format!("Translate these items to {}: {}", request.target_language, items)
                }
            ],
            "response_format": response_schema(),
        }))
    }
}

fn response_schema() -> Value {
    json!({
        "type": "json_schema",
        "json_schema": {
            "name": "translation_response",
            "strict": true,
            "schema": {
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "id": {"type": "string", "description": "The input ID."},
                                "translated_text": {"type": "string", "description": "The translated content."}
                            },
                            "required": ["id", "translated_text"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["items"],
                "additionalProperties": false
            }
        }
    })
}

/// Extract the translations from a completion body, in request order
fn parse_completion(request: &TranslationRequest, body: &str) -> MtResult<Vec<String>> {
    let completion: Completion = serde_json::from_str(body)
        .map_err(|e| MtError::InvalidResponse(format!("Failed to parse completion: {}", e)))?;

    let content = completion
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| MtError::InvalidResponse("completion has no message content".to_string()))?;

    let payload: ItemsPayload = serde_json::from_str(&content)
        .map_err(|e| MtError::InvalidResponse(format!("Failed to parse items: {}", e)))?;

    let returned = payload.items.len();
    let mut by_id: HashMap<String, String> = payload
        .items
        .into_iter()
        .map(|item| (item.id, item.translated_text))
        .collect();

    let outputs: Vec<String> = request
        .items
        .iter()
        .filter_map(|item| by_id.remove(&item.id))
        .collect();

    if returned != request.len() {
        return Err(MtError::BatchLengthMismatch {
            expected: request.len(),
            actual: returned,
        });
    }
    // Duplicate or unknown ids leave holes
    ensure_aligned(request, &outputs)?;
    Ok(outputs)
}

#[async_trait]
impl MachineTranslator for OpenAiProvider {
    async fn translate_batch(&self, request: &TranslationRequest) -> MtResult<Vec<String>> {
        if request.is_empty() {
            return Ok(Vec::new());
        }
        validate_locale(&request.target_language)?;

        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(request)?;

        debug!(lines = request.len(), model = %request.model, "sending completion request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            // 401, 429 and 5xx alike: the run treats the service as unavailable
            return Err(MtError::Unavailable(format!(
                "API error ({}): {}",
                status,
                truncate(&text, 200)
            )));
        }

        parse_completion(request, &text)
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
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
                .map(|(i, t)| TranslationItem::new(i.to_string(), *t).with_budget(t.len() + 6))
                .collect(),
            target_language: "it".to_string(),
            model: "gpt-5-nano".to_string(),
        }
    }

    fn completion(content: &Value) -> String {
        json!({
            "choices": [{"message": {"role": "assistant", "content": content.to_string()}}]
        })
        .to_string()
    }

    #[test]
    fn test_empty_api_key() {
        let result = OpenAiProvider::new("".to_string());
        assert!(matches!(result, Err(MtError::Config(_))));
    }

    #[test]
    fn test_debug_masks_key() {
        let provider = OpenAiProvider::new("sk-secret".to_string()).unwrap();
        let debug = format!("{:?}", provider);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let provider = OpenAiProvider::new("k".to_string())
            .unwrap()
            .with_base_url("http://localhost:8080/v1/");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_system_prompt_mentions_language_and_glossary() {
        let provider = OpenAiProvider::new("k".to_string())
            .unwrap()
            .with_glossary(vec!["Icarus".to_string(), "Mecha".to_string()]);
        let prompt = provider.system_prompt("it");
        assert!(prompt.contains("English-to-it"));
        assert!(prompt.contains("Glossary"));
        assert!(prompt.ends_with("Icarus\nMecha"));

        let bare = OpenAiProvider::new("k".to_string()).unwrap().system_prompt("de");
        assert!(!bare.contains("Glossary"));
    }

    #[test]
    fn test_request_body_shape() {
        let provider = OpenAiProvider::new("k".to_string()).unwrap();
        let body = provider.request_body(&request(&["Power"])).unwrap();
        assert_eq!(body["model"], "gpt-5-nano");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        let user = body["messages"][1]["content"].as_str().unwrap();
        assert!(user.contains(r#""id":"0""#));
        assert!(user.contains(r#""len":11"#));
    }

    #[test]
    fn test_parse_completion_reorders_by_id() {
        let req = request(&["Power", "Strength"]);
        let body = completion(&json!({"items": [
            {"id": "1", "translated_text": "Forza"},
            {"id": "0", "translated_text": "Energia"}
        ]}));
        assert_eq!(parse_completion(&req, &body).unwrap(), vec!["Energia", "Forza"]);
    }

    #[test]
    fn test_parse_completion_missing_id_is_mismatch() {
        let req = request(&["Power", "Strength"]);
        let body = completion(&json!({"items": [
            {"id": "0", "translated_text": "Energia"}
        ]}));
        assert_eq!(
            parse_completion(&req, &body),
            Err(MtError::BatchLengthMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn test_parse_completion_extra_item_is_mismatch() {
        let req = request(&["Power"]);
        let body = completion(&json!({"items": [
            {"id": "0", "translated_text": "Energia"},
            {"id": "7", "translated_text": "???"}
        ]}));
        assert!(matches!(
            parse_completion(&req, &body),
            Err(MtError::BatchLengthMismatch { expected: 1, .. })
        ));
    }

    #[test]
    fn test_parse_completion_garbage_is_invalid_response() {
        let req = request(&["Power"]);
        assert!(matches!(
            parse_completion(&req, "<html>502</html>"),
            Err(MtError::InvalidResponse(_))
        ));
        let body = completion(&json!("not an object"));
        assert!(matches!(
            parse_completion(&req, &body),
            Err(MtError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[tokio::test]
    async fn test_unreachable_host_is_unavailable() {
        let provider = OpenAiProvider::with_timeout("k".to_string(), Duration::from_secs(2))
            .unwrap()
            .with_base_url("http://127.0.0.1:9");
        let result = provider.translate_batch(&request(&["Power"])).await;
        assert!(matches!(result, Err(MtError::Unavailable(_))));
    }

    #[tokio::test]
    #[ignore]
    async fn test_live_translation() {
        // Requires OPENAI_API_KEY
        let provider = OpenAiProvider::from_env().expect("OPENAI_API_KEY not set");
        let mut req = request(&["Power", "Strength"]);
        req.items[0] = req.items[0].clone().with_context("电力");
        req.items[1] = req.items[1].clone().with_context("力量");
        let results = provider.translate_batch(&req).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|t| !t.trim().is_empty()));
    }
}
