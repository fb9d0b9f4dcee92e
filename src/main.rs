use clap::{Arg, ArgAction, Command, value_parser};
use dsp_l10n::config::DEFAULT_CONFIG_FILE;
use dsp_l10n::mt::{MachineTranslator, MockMode, MockTranslator, OpenAiProvider, load_glossary};
use dsp_l10n::{Pipeline, PipelineConfig};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("dsp-l10n")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Translate Dyson Sphere Program string tables with a persistent cache")
        .arg(
            Arg::new("lang")
                .long("lang")
                .short('l')
                .help("Target language code (e.g., it, de, fr)")
                .required(true),
        )
        .arg(
            Arg::new("file")
                .long("file")
                .short('f')
                .help("Process only this file (e.g., base.txt)"),
        )
        .arg(
            Arg::new("model")
                .long("model")
                .help("Model identifier sent to the translator"),
        )
        .arg(
            Arg::new("batch-size")
                .long("batch-size")
                .help("Maximum lines per request")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("batch-chars")
                .long("batch-chars")
                .help("Maximum characters per request")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("retries")
                .long("retries")
                .help("Retries per batch on transient translator errors")
                .value_parser(value_parser!(u32)),
        )
        .arg(
            Arg::new("parallel")
                .long("parallel")
                .short('p')
                .help("Maximum concurrent translator requests")
                .value_parser(value_parser!(usize)),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("TOML configuration file (default: dsp-l10n.toml if present)")
                .value_parser(value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("mock")
                .long("mock")
                .short('m')
                .help("Use mock translator instead of the OpenAI API")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log every batch")
                .action(ArgAction::SetTrue),
        )
}

fn load_config(matches: &clap::ArgMatches) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => PipelineConfig::from_toml_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            PipelineConfig::from_toml_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => PipelineConfig::default(),
    };

    if let Some(lang) = matches.get_one::<String>("lang") {
        config.target_language = lang.clone();
    }
    if let Some(file) = matches.get_one::<String>("file") {
        config.file_filter = Some(file.clone());
    }
    if let Some(model) = matches.get_one::<String>("model") {
        config.model = model.clone();
    }
    if let Some(lines) = matches.get_one::<usize>("batch-size") {
        config.batch_max_lines = *lines;
    }
    if let Some(chars) = matches.get_one::<usize>("batch-chars") {
        config.batch_max_chars = *chars;
    }
    if let Some(retries) = matches.get_one::<u32>("retries") {
        config.retry_limit = *retries;
    }
    if let Some(parallel) = matches.get_one::<usize>("parallel") {
        config.parallelism_limit = *parallel;
    }

    config.validate()?;
    Ok(config)
}

fn build_translator(
    config: &PipelineConfig,
    use_mock: bool,
) -> Result<Arc<dyn MachineTranslator>, Box<dyn std::error::Error>> {
    if use_mock {
        return Ok(Arc::new(MockTranslator::new(MockMode::Suffix)));
    }

    let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| {
        "OPENAI_API_KEY environment variable not set (put it in .env or use --mock)"
    })?;
    let glossary = load_glossary(&config.glossary_path)?;
    if !glossary.is_empty() {
        info!(terms = glossary.len(), "glossary loaded");
    }

    let mut provider =
        OpenAiProvider::with_timeout(api_key, config.request_timeout())?.with_glossary(glossary);
    if let Some(url) = &config.api_base_url {
        provider = provider.with_base_url(url.clone());
    }
    Ok(Arc::new(provider))
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let matches = cli().get_matches();

    let default_level = if matches.get_flag("verbose") { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config = load_config(&matches)?;
    let translator = build_translator(&config, matches.get_flag("mock"))?;
    let cancel = CancellationToken::new();
    let pipeline = Pipeline::new(config, translator)?.with_cancel_token(cancel.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, finishing in-flight batches");
            cancel.cancel();
        }
    });

    let summary = pipeline.run().await;
    for report in &summary.files {
        println!("{}", report);
    }
    println!(
        "Done: {} reused, {} accepted, {} fallback",
        summary.reused(),
        summary.accepted(),
        summary.fallback()
    );

    let failed = summary.failed().count();
    if failed > 0 {
        return Err(format!("{} file(s) failed", failed).into());
    }
    Ok(())
}
