//! Account deterioration trainer.
//!
//! Reads `ml_account_training_data`, fits a logistic regression baseline and
//! a random forest, and prints a classification report for each plus the
//! forest's feature importances.
//!
//! Usage: cargo run --bin trainer -- [--test-size F] [--seed N]

use anyhow::Context;
use clap::Parser;
use profitlens_core::ml::{TrainingOptions, train_and_evaluate};
use profitlens_db::{connect, load_training_data};
use profitlens_shared::DatabaseConfig;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Train and evaluate the deterioration classifiers
#[derive(Parser, Debug)]
#[command(name = "trainer", version, about, long_about = None)]
struct Cli {
    /// Fraction of rows held out for evaluation
    #[arg(long, default_value_t = TrainingOptions::default().test_size)]
    test_size: f64,

    /// Seed for the split and the forest
    #[arg(long, default_value_t = TrainingOptions::default().seed)]
    seed: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profitlens=info,trainer=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let options = TrainingOptions {
        test_size: cli.test_size,
        seed: cli.seed,
    };

    let db = connect(&DatabaseConfig::from_env()?).await?;
    let rows = load_training_data(&db).await;
    db.close().await.context("failed to close database connection")?;
    let rows = rows?;

    let outcome = train_and_evaluate(&rows, &options).context("training failed")?;
    info!(
        train = outcome.train_rows,
        test = outcome.test_rows,
        "Training complete"
    );

    for evaluation in &outcome.evaluations {
        println!("\n=== {} ===", evaluation.model);
        println!("{}", evaluation.report);
    }
    println!("\nFeature importances (Random Forest):");
    println!("{}", outcome.importances);
    Ok(())
}
