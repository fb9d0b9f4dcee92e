/// Machine Translation Module
///
/// This module is the boundary between the pipeline and the services that
/// produce translations.
///
/// # Overview
///
/// 1. **MT Trait** - `MachineTranslator`, one ordered batch in, one ordered batch out
/// 2. **Providers** - `OpenAiProvider` for real runs, `MockTranslator` for tests and `--mock`
/// 3. **Retry** - exponential backoff for transient failures
/// 4. **Glossary** - do-not-translate terms fed into the system prompt
///
/// # Example
///
/// ```ignore
/// use dsp_l10n::mt::{OpenAiProvider, RetryPolicy, translate_with_retry};
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let provider = OpenAiProvider::from_env()?;
///     let translated = translate_with_retry(
///         &provider,
///         &request,
///         &RetryPolicy::default(),
///         &CancellationToken::new(),
///     )
///     .await?;
///
///     println!("{:?}", translated);
///     Ok(())
/// }
/// ```
pub mod error;
pub mod glossary;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod translator;

pub use error::{MtError, MtResult};
pub use glossary::load_glossary;
pub use mock::{MockMode, MockTranslator};
pub use openai::OpenAiProvider;
pub use retry::{RetryPolicy, translate_with_retry};
pub use translator::{
    MachineTranslator, TranslationItem, TranslationRequest, ensure_aligned, validate_locale,
};
