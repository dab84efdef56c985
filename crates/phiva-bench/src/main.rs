use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use phiva_bench::{BenchDataset, BenchRunner, ResultSink};
use phiva_core::BenchConfig;
use phiva_session::{ChatSession, EchoEngine};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "phiva-bench")]
#[command(about = "Replay an (image, prompt) dataset through a chat session", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the dataset and record per-entry timings
    Run {
        /// TOML config file with dataset/image-root/output settings
        #[arg(long)]
        config: Option<PathBuf>,
        /// Dataset JSON file (overrides the config file)
        #[arg(long)]
        dataset: Option<PathBuf>,
        /// Directory dataset image paths are resolved against
        #[arg(long)]
        image_root: Option<PathBuf>,
        /// Output file for JSON-lines results
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Parse the dataset and report its size without running anything
    Validate {
        /// Dataset JSON file
        dataset: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            dataset,
            image_root,
            output,
        } => run(config, dataset, image_root, output).await,
        Commands::Validate { dataset } => {
            let dataset = BenchDataset::load(&dataset).context("failed to load dataset")?;
            println!("dataset ok: {} entries", dataset.len());
            Ok(())
        }
    }
}

async fn run(
    config: Option<PathBuf>,
    dataset: Option<PathBuf>,
    image_root: Option<PathBuf>,
    output: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config {
        Some(path) => BenchConfig::load(&path).context("failed to load config")?,
        None => {
            let Some(dataset) = dataset.clone() else {
                bail!("either --config or --dataset is required");
            };
            BenchConfig {
                dataset,
                image_root: PathBuf::from("."),
                output: PathBuf::from("bench-results.jsonl"),
                image_size: phiva_core::DEFAULT_IMAGE_SIDE,
                token_delay_ms: 0,
            }
        }
    };
    if let Some(dataset) = dataset {
        config.dataset = dataset;
    }
    if let Some(image_root) = image_root {
        config.image_root = image_root;
    }
    if let Some(output) = output {
        config.output = output;
    }

    let dataset = BenchDataset::load(&config.dataset).context("failed to load dataset")?;
    if dataset.is_empty() {
        bail!("dataset {:?} has no entries", config.dataset);
    }

    let engine = Arc::new(EchoEngine::with_token_delay(Duration::from_millis(
        config.token_delay_ms,
    )));
    let session = ChatSession::new(engine);
    let mut sink = ResultSink::open(&config.output).context("failed to open output file")?;

    let runner = BenchRunner::new(session, config.clone());
    let summary = runner.run(&dataset, &mut sink).await?;
    runner.session().unload().await?;

    println!(
        "replayed {} entries: {} completed, {} skipped, {} ms total",
        summary.total, summary.completed, summary.skipped, summary.total_elapsed_ms
    );
    println!("results written to {}", sink.path().display());

    Ok(())
}
