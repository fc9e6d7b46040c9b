//! Database migration runner for Profitlens.
//!
//! Usage:
//!   migrator up        - Run all pending migrations
//!   migrator down [N]  - Rollback the last N migrations (default 1)
//!   migrator status    - Show migration status
//!   migrator fresh     - Drop all tables and re-run migrations
//!   migrator reset     - Rollback all applied migrations
//!
//! Connection parameters come from the same `DB_*` variables as the ETL.

use clap::{Parser, Subcommand};
use profitlens_db::connect;
use profitlens_db::migration::Migrator;
use profitlens_shared::DatabaseConfig;
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Apply or roll back the Profitlens schema
#[derive(Parser, Debug)]
#[command(name = "migrator", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run all pending migrations
    Up,
    /// Rollback applied migrations
    Down {
        /// Number of migrations to roll back
        #[arg(default_value_t = 1)]
        steps: u32,
    },
    /// Show migration status
    Status,
    /// Drop all tables and re-run migrations
    Fresh,
    /// Rollback all applied migrations
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "profitlens=info,migrator=info,sea_orm_migration=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let db = connect(&DatabaseConfig::from_env()?).await?;

    match cli.command {
        Command::Up => Migrator::up(&db, None).await?,
        Command::Down { steps } => Migrator::down(&db, Some(steps)).await?,
        Command::Status => Migrator::status(&db).await?,
        Command::Fresh => Migrator::fresh(&db).await?,
        Command::Reset => Migrator::reset(&db).await?,
    }
    info!(command = ?cli.command, "Migration command finished");

    db.close().await?;
    Ok(())
}
