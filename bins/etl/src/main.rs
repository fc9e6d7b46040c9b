//! Profitlens ETL.
//!
//! Truncates every table, loads the six CSV sources in dependency order and
//! rebuilds `account_profitability` from the transform query.
//!
//! Usage: cargo run --bin etl -- [--dry-run] [--data-dir DIR] [--transform-sql FILE]

use std::path::PathBuf;

use clap::Parser;
use profitlens_core::{LoadPlan, MemoryStore, Pipeline, RollupTransform, RunSummary};
use profitlens_db::{PostgresStore, SqlTransform, connect};
use profitlens_shared::{AppConfig, PipelineConfig, PipelineResult};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Load the SaaS dataset and build account profitability
#[derive(Parser, Debug)]
#[command(name = "etl", version, about, long_about = None)]
struct Cli {
    /// Run against an in-memory store with the in-process rollup
    #[arg(long)]
    dry_run: bool,

    /// Directory holding the six CSV files (overrides PIPELINE_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Transform query file (overrides PIPELINE_TRANSFORM_SQL)
    #[arg(long)]
    transform_sql: Option<PathBuf>,
}

impl Cli {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        if let Some(sql) = &self.transform_sql {
            config.transform_sql.clone_from(sql);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profitlens=info,etl=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = if cli.dry_run {
        run_in_memory(&cli).await
    } else {
        run_postgres(&cli).await
    };

    match result {
        Ok(summary) => {
            println!("{summary}");
            info!("ETL complete");
            Ok(())
        }
        Err(err) => {
            error!(
                error_code = err.error_code(),
                stage = err.stage().unwrap_or("startup"),
                "ETL failed: {err}"
            );
            Err(err.into())
        }
    }
}

async fn run_in_memory(cli: &Cli) -> PipelineResult<RunSummary> {
    let paths = cli.apply(PipelineConfig::from_env()?);
    info!(data_dir = %paths.data_dir.display(), "Dry run against the in-memory store");

    let store = MemoryStore::with_catalog();
    Pipeline::new(&store, &RollupTransform, LoadPlan::standard()?, paths.data_dir)
        .run()
        .await
}

async fn run_postgres(cli: &Cli) -> PipelineResult<RunSummary> {
    let config = AppConfig::load()?;
    let paths = cli.apply(config.pipeline);

    let db = connect(&config.database).await?;
    let transform = SqlTransform::from_file(db.clone(), &paths.transform_sql)?;
    let store = PostgresStore::new(db);

    let result = Pipeline::new(&store, &transform, LoadPlan::standard()?, paths.data_dir)
        .run()
        .await;

    let closed = store.close().await;
    let summary = result?;
    closed?;
    Ok(summary)
}
