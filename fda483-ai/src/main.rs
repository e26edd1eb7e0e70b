//! fda483-ai - FDA 483 observation classifier
//!
//! Reads a JSON Lines dataset of inspection observations, classifies every
//! row through the Gemini API and writes the labeled dataset back out.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use fda483_ai::config::{resolve_api_key, BatchConfig};
use fda483_ai::dataset;
use fda483_ai::models::Schema;
use fda483_ai::services::{BatchOrchestrator, GeminiClient, GeminiSettings, ResultAggregator};
use fda483_common::config as common_config;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for fda483-ai
#[derive(Parser, Debug)]
#[command(name = "fda483-ai")]
#[command(about = "Classify FDA 483 observations with the Gemini API")]
#[command(version)]
struct Args {
    /// JSON Lines dataset to classify
    #[arg(short, long, env = "FDA483_INPUT")]
    input: PathBuf,

    /// Where to write the labeled JSON Lines dataset
    #[arg(short, long, env = "FDA483_OUTPUT")]
    output: PathBuf,

    /// TOML config file (falls back to FDA483_CONFIG, then the user config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Label schema: deficiency_categories or granular
    #[arg(short, long, env = "FDA483_SCHEMA")]
    schema: Option<String>,

    /// Maximum classification calls in flight
    #[arg(long, env = "FDA483_CONCURRENCY")]
    concurrency: Option<usize>,

    /// Classify every row regardless of product type
    #[arg(long)]
    no_filter: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is loaded before tracing so its log level can seed the filter
    let config_path = common_config::resolve_config_path(args.config.as_deref());
    let toml_config = common_config::load_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| toml_config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting fda483-ai {} ({} {}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE"),
        env!("BUILD_TIMESTAMP")
    );
    if let Some(path) = &config_path {
        info!("Config: {}", path.display());
    }

    let api_key = resolve_api_key(&toml_config).context("Failed to resolve Gemini API key")?;

    let mut section = toml_config.classifier.clone();
    if let Some(schema) = args.schema {
        section.schema = schema;
    }
    if let Some(concurrency) = args.concurrency {
        section.concurrency_cap = concurrency;
    }
    let batch_config = BatchConfig::from_section(&section).context("Invalid classifier settings")?;

    // Step 1: Load and filter the dataset
    let dataset_section = &toml_config.dataset;
    let mut rows = dataset::read_jsonl(&args.input, dataset_section)
        .with_context(|| format!("Failed to read dataset {}", args.input.display()))?;
    info!("Loaded {} rows from {}", rows.len(), args.input.display());
    if !args.no_filter {
        rows = dataset::filter_product_types(rows, dataset_section);
    }

    let batch = dataset::to_batch(&rows, &dataset_section.text_columns)
        .context("Dataset cannot be classified")?;

    // Step 2: Classify
    let client = GeminiClient::new(
        api_key,
        GeminiSettings {
            base_url: section.api_base_url.clone(),
            model: section.model.clone(),
            temperature: section.temperature,
            timeout: Duration::from_secs(section.call_timeout_secs),
        },
    )
    .context("Failed to create Gemini client")?;

    let schema: Schema = batch_config.schema.clone();
    let orchestrator = BatchOrchestrator::new(Arc::new(client), batch_config)
        .context("Failed to create orchestrator")?;
    let batch_result = orchestrator.run(&batch).await;

    // Step 3: Merge and write
    let labeled = ResultAggregator::new(&schema).merge(&rows, &batch_result);
    dataset::write_jsonl(&args.output, &labeled)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;

    let summary = batch_result.summary();
    info!(
        run_id = %batch_result.run_id(),
        "Classified {} rows: {} succeeded, {} skipped, {} parse failures, {} service failures ({} quota)",
        summary.total,
        summary.succeeded,
        summary.skipped,
        summary.parse_failures,
        summary.service_failures,
        summary.quota_failures
    );
    for (label, count) in labeled.flag_counts() {
        info!("  {}: {}", label, count);
    }
    info!("Output: {}", args.output.display());

    Ok(())
}
