//! Run configuration
//!
//! Values come from defaults, then an optional TOML file, then CLI flags.
//!
//! ```toml
//! target_language = "it"
//! model = "gpt-5-nano"
//! batch_max_lines = 20
//! parallelism_limit = 4
//!
//! [validation.budget]
//! rule = "proportional"
//! ratio = 1.5
//! slack = 6
//! ```

use crate::batcher::BatchLimits;
use crate::error::{Error, Result};
use crate::mt::RetryPolicy;
use crate::resource::DEFAULT_FILES;
use crate::validator::{BudgetRule, ValidationConfig};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "dsp-l10n.toml";
pub const DEFAULT_MODEL: &str = "gpt-5-nano";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub target_language: String,
    pub model: String,
    pub batch_max_lines: usize,
    pub batch_max_chars: usize,
    pub retry_limit: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Concurrent translator calls across the whole run
    pub parallelism_limit: usize,
    /// Process only this file
    pub file_filter: Option<String>,
    pub files: Vec<String>,
    pub source_dir: PathBuf,
    pub output_dir: PathBuf,
    pub cache_dir: PathBuf,
    pub glossary_path: PathBuf,
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_language: String::new(),
            model: DEFAULT_MODEL.to_string(),
            batch_max_lines: 20,
            batch_max_chars: 4000,
            retry_limit: 3,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 30_000,
            parallelism_limit: 4,
            file_filter: None,
            files: DEFAULT_FILES.iter().map(|f| f.to_string()).collect(),
            source_dir: PathBuf::from("original"),
            output_dir: PathBuf::from("translated"),
            cache_dir: PathBuf::from(".translation-cache"),
            glossary_path: PathBuf::from("glossary.txt"),
            api_base_url: None,
            request_timeout_secs: 120,
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_toml_str(data: &str) -> Result<Self> {
        toml::from_str(data).map_err(|e| Error::Config(format!("toml parse error: {e}")))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&data)
    }

    pub fn validate(&self) -> Result<()> {
        if self.target_language.trim().is_empty() {
            return Err(Error::Config("target language is required".to_string()));
        }
        self.target_language
            .parse::<icu_locale::Locale>()
            .map_err(|e| {
                Error::Config(format!(
                    "invalid target language '{}': {e}",
                    self.target_language
                ))
            })?;

        for (name, value) in [
            ("batch_max_lines", self.batch_max_lines),
            ("batch_max_chars", self.batch_max_chars),
            ("parallelism_limit", self.parallelism_limit),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }
        if self.model.trim().is_empty() {
            return Err(Error::Config("model must not be empty".to_string()));
        }
        if let BudgetRule::Proportional { ratio, .. } = self.validation.budget {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(Error::Config(format!(
                    "budget ratio must be a positive finite number, got {ratio}"
                )));
            }
        }
        Ok(())
    }

    pub fn batch_limits(&self) -> BatchLimits {
        BatchLimits {
            max_lines: self.batch_max_lines,
            max_chars: self.batch_max_chars,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.retry_limit,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            max_delay: Duration::from_millis(self.retry_max_delay_ms.max(self.retry_base_delay_ms)),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// File names this run should process, in order
    pub fn files_to_process(&self) -> Vec<String> {
        match &self.file_filter {
            Some(file) => vec![file.clone()],
            None => self.files.clone(),
        }
    }

    pub fn source_path(&self, file: &str) -> PathBuf {
        self.source_dir.join(file)
    }

    pub fn output_path(&self, file: &str) -> PathBuf {
        self.output_dir.join(&self.target_language).join(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(lang: &str) -> PipelineConfig {
        PipelineConfig {
            target_language: lang.to_string(),
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_defaults() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.model, "gpt-5-nano");
        assert_eq!(cfg.batch_limits(), BatchLimits::default());
        assert_eq!(cfg.files.len(), DEFAULT_FILES.len());
    }

    #[test]
    fn test_toml_overrides_and_nested_validation() {
        let cfg = PipelineConfig::from_toml_str(
            r#"
            target_language = "de"
            batch_max_lines = 5
            files = ["base.txt"]

            [validation]
            count_padding = true

            [validation.budget]
            rule = "disabled"
            "#,
        )
        .unwrap();

        assert_eq!(cfg.target_language, "de");
        assert_eq!(cfg.batch_max_lines, 5);
        assert_eq!(cfg.batch_max_chars, 4000);
        assert_eq!(cfg.files, vec!["base.txt"]);
        assert!(cfg.validation.count_padding);
        assert_eq!(cfg.validation.budget, BudgetRule::Disabled);
        assert!(!cfg.validation.refusal_patterns.is_empty());
    }

    #[test]
    fn test_bad_toml_is_config_error() {
        assert!(matches!(
            PipelineConfig::from_toml_str("batch_max_lines = \"many\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(config("it").validate().is_ok());
        assert!(config("zh-Hans").validate().is_ok());
        assert!(config("").validate().is_err());
        assert!(config("not a language").validate().is_err());

        let mut zero = config("it");
        zero.parallelism_limit = 0;
        assert!(matches!(zero.validate(), Err(Error::Config(msg)) if msg.contains("parallelism_limit")));
    }

    #[test]
    fn test_validate_rejects_unusable_budget_ratio() {
        for ratio in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let mut cfg = config("it");
            cfg.validation.budget = BudgetRule::Proportional { ratio, slack: 6 };
            assert!(
                matches!(cfg.validate(), Err(Error::Config(msg)) if msg.contains("budget ratio")),
                "ratio {ratio} must be rejected"
            );
        }

        let from_toml = PipelineConfig::from_toml_str(
            r#"
            target_language = "it"

            [validation.budget]
            rule = "proportional"
            ratio = nan
            slack = 6
            "#,
        )
        .unwrap();
        assert!(from_toml.validate().is_err());

        let mut ok = config("it");
        ok.validation.budget = BudgetRule::Proportional { ratio: 0.5, slack: 0 };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_file_filter() {
        let mut cfg = config("it");
        assert_eq!(cfg.files_to_process().len(), DEFAULT_FILES.len());
        cfg.file_filter = Some("combat.txt".to_string());
        assert_eq!(cfg.files_to_process(), vec!["combat.txt"]);
        assert_eq!(
            cfg.output_path("combat.txt"),
            PathBuf::from("translated").join("it").join("combat.txt")
        );
    }

    #[test]
    fn test_retry_policy() {
        let mut cfg = config("it");
        cfg.retry_limit = 2;
        cfg.retry_base_delay_ms = 100;
        let policy = cfg.retry_policy();
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(100));
    }
}
