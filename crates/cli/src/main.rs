use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use splitify_core::{calculate_summary, consumption_details, smart_split, ConsumptionDetail, Event, Settlement};
use splitify_scan::{CompressionBudget, ImageBlob, ScanConfig, ScanPipeline};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "splitify", author, version, about = "Receipt scanning and bill settlement")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Shrink a receipt photo to fit an upload budget.
    Compress(CompressArgs),
    /// Compress a receipt photo and send it to the OCR endpoint.
    Scan(ScanArgs),
    /// Work out who owes whom for an event described in JSON.
    Settle(SettleArgs),
}

#[derive(Args, Debug)]
struct CompressArgs {
    input: PathBuf,
    /// Defaults to the input name with a `.jpg` extension next to it, or
    /// `<name>-compressed.jpg` when that would overwrite the input.
    #[arg(short, long)]
    output: Option<PathBuf>,
    #[arg(long, default_value_t = CompressionBudget::DEFAULT_MAX_BYTES)]
    max_bytes: u64,
    #[arg(long, default_value_t = CompressionBudget::DEFAULT_MAX_DIMENSION)]
    max_dimension: u32,
}

#[derive(Args, Debug)]
struct ScanArgs {
    input: PathBuf,
    /// TOML config; `HF_API_URL` and `HF_API_TOKEN` override it.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SettleArgs {
    event: PathBuf,
    /// Use graph-optimised settlement instead of the greedy summary.
    #[arg(long)]
    smart: bool,
}

#[derive(Serialize)]
struct SmartSettlement {
    settlements: Vec<Settlement>,
    consumption_details: Vec<ConsumptionDetail>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    match Cli::parse().command {
        Command::Compress(args) => compress(args).await,
        Command::Scan(args) => scan(args).await,
        Command::Settle(args) => settle(args).await,
    }
}

async fn compress(args: CompressArgs) -> Result<()> {
    let budget = CompressionBudget::new(args.max_bytes, args.max_dimension)?;
    let image = ImageBlob::read(&args.input)
        .await
        .with_context(|| format!("Failed to read {}", args.input.display()))?;

    let normalized = splitify_scan::normalize_async(image, budget).await?;

    let output = args
        .output
        .unwrap_or_else(|| default_output(&args.input, &normalized.blob.file_name));
    tokio::fs::write(&output, &normalized.blob.bytes)
        .await
        .with_context(|| format!("Failed to write {}", output.display()))?;

    match normalized.quality {
        Some(quality) => tracing::info!(
            output = %output.display(),
            size = normalized.blob.byte_size(),
            %quality,
            "compressed"
        ),
        None => tracing::info!(output = %output.display(), "already within budget, copied"),
    }
    Ok(())
}

async fn scan(args: ScanArgs) -> Result<()> {
    let config = match &args.config {
        Some(path) => ScanConfig::load(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => ScanConfig::default(),
    }
    .with_env_overrides();

    let pipeline = ScanPipeline::from_config(config)?;
    let result = pipeline.scan_file(&args.input).await;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if let Some(reason) = result.reason() {
        anyhow::bail!("scan failed: {reason}");
    }
    Ok(())
}

async fn settle(args: SettleArgs) -> Result<()> {
    let raw = tokio::fs::read_to_string(&args.event)
        .await
        .with_context(|| format!("Failed to read {}", args.event.display()))?;
    let event: Event = serde_json::from_str(&raw).context("Invalid event JSON")?;

    let json = if args.smart {
        serde_json::to_string_pretty(&SmartSettlement {
            settlements: smart_split(&event.activities),
            consumption_details: consumption_details(&event.activities),
        })?
    } else {
        serde_json::to_string_pretty(&calculate_summary(&event))?
    };
    println!("{json}");
    Ok(())
}

/// `file_name` placed in the same directory as `input`.
fn sibling(input: &Path, file_name: &str) -> PathBuf {
    input
        .parent()
        .map(|dir| dir.join(file_name))
        .unwrap_or_else(|| PathBuf::from(file_name))
}

/// Sibling named `file_name`, suffixed with `-compressed` when it would land
/// on `input` itself. Compared case-insensitively for `.JPG` inputs.
fn default_output(input: &Path, file_name: &str) -> PathBuf {
    let candidate = sibling(input, file_name);
    let lower = |p: &Path| p.to_string_lossy().to_lowercase();
    if lower(&candidate) != lower(input) {
        return candidate;
    }

    let name = Path::new(file_name);
    let stem = name.file_stem().map(|s| s.to_string_lossy()).unwrap_or_default();
    let renamed = match name.extension() {
        Some(ext) => format!("{stem}-compressed.{}", ext.to_string_lossy()),
        None => format!("{stem}-compressed"),
    };
    sibling(input, &renamed)
}
