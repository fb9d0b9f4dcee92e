//! Cached, change-aware machine translation for Dyson Sphere Program string tables
//!
//! A run reads the game's UTF-16 string tables, reuses every line whose
//! source text is unchanged since it was last translated, sends the rest to
//! a translator in batches, validates each answer and writes translated
//! tables. Lines whose translation is rejected fall back to the source text
//! and are retried on the next run.
//!
//! # Example
//!
//! ```ignore
//! use dsp_l10n::{Pipeline, PipelineConfig};
//! use dsp_l10n::mt::{MockMode, MockTranslator};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = PipelineConfig {
//!         target_language: "it".to_string(),
//!         ..PipelineConfig::default()
//!     };
//!     let pipeline = Pipeline::new(config, Arc::new(MockTranslator::new(MockMode::Suffix)))?;
//!     let summary = pipeline.run().await;
//!     println!("{} accepted, {} fallback", summary.accepted(), summary.fallback());
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod cache;
pub mod committer;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod mt;
pub mod pipeline;
pub mod planner;
pub mod record;
pub mod resource;
pub mod validator;


pub use batcher::{Batch, BatchLimits, make_batches};
pub use cache::{CacheStore, FileCache};
pub use committer::{CommitStats, Committer};
pub use config::PipelineConfig;
pub use error::{Error, Result};
pub use pipeline::{FileReport, Pipeline, RunSummary};
pub use planner::{Decision, Plan, TranslateReason, plan};
pub use record::{CacheRecord, OutputRecord, RecordStatus, SourceRecord};
pub use resource::ResourceFile;
pub use validator::{
    BudgetRule, Rejection, ResultReason, TranslationResult, ValidationConfig, Validator, Verdict,
};
