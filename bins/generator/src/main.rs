//! Synthetic dataset generator.
//!
//! Writes accounts, plans, subscriptions, invoices, usage and support CSV
//! files for a fixed monthly range. The same seed always yields the same files.
//!
//! Usage: cargo run --bin generator -- [--accounts N] [--out-dir DIR] [--seed N]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use profitlens_core::generator::{GeneratorConfig, generate};
use profitlens_shared::PipelineConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Generate the synthetic SaaS dataset
#[derive(Parser, Debug)]
#[command(name = "generator", version, about, long_about = None)]
struct Cli {
    /// Number of accounts
    #[arg(long, default_value_t = GeneratorConfig::default().accounts)]
    accounts: usize,

    /// Output directory (defaults to PIPELINE_DATA_DIR)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Random seed
    #[arg(long, default_value_t = GeneratorConfig::default().seed)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profitlens=info,generator=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let out_dir = match cli.out_dir {
        Some(dir) => dir,
        None => PipelineConfig::from_env()?.data_dir,
    };

    let config = GeneratorConfig {
        accounts: cli.accounts,
        seed: cli.seed,
        ..GeneratorConfig::default()
    };
    let dataset = generate(&config).context("failed to generate dataset")?;
    let files = dataset
        .write_csv(&out_dir)
        .with_context(|| format!("failed to write {}", out_dir.display()))?;

    for file in &files {
        info!(path = %file.display(), "Wrote");
    }
    println!("Synthetic data written to {}", out_dir.display());
    Ok(())
}
