//! Reset, load and transform orchestration.
//!
//! Stages run strictly in sequence against a caller-owned [`Store`]:
//! 1. reset: one atomic truncate of every target table
//! 2. load: each base table from its CSV, in [`LoadPlan`] order
//! 3. transform: rebuild `account_profitability`, refusing an empty result
//!
//! The first failure aborts the run. Tables loaded before the failure keep
//! their rows; re-running from scratch is the recovery path.

mod types;

#[cfg(test)]
mod tests;

use std::path::{Path, PathBuf};

use profitlens_shared::{PipelineError, PipelineResult};
use tracing::{debug, info};

use crate::catalog::{DERIVED_TABLE, TableSpec};
use crate::plan::LoadPlan;
use crate::source::read_csv;
use crate::store::Store;
use crate::transform::Transform;

pub use types::{LoadSummary, RunSummary, TableLoad};

/// Truncates the derived table and every base table in one store call.
///
/// # Errors
///
/// Returns the store error wrapped in the `reset` stage. No table is
/// modified when this fails.
pub async fn reset(store: &dyn Store, plan: &LoadPlan) -> PipelineResult<()> {
    let tables = plan.reset_order();
    info!(tables = ?tables, "Resetting tables");
    store
        .truncate_all(&tables)
        .await
        .map_err(|e| e.in_stage("reset"))
}

/// Loads one table from a CSV file and returns the number of rows appended.
///
/// # Errors
///
/// Returns a source error if the file is missing or malformed, or a store
/// error if the append is rejected.
pub async fn load_table(
    store: &dyn Store,
    table_name: &str,
    source_file: &Path,
    date_columns: &[&str],
) -> PipelineResult<u64> {
    info!("Loading {table_name}...");
    let rows = read_csv(source_file, date_columns)?;
    debug!(table = table_name, rows = rows.len(), "Read source");

    let written = store.append(table_name, &rows).await?;
    if written != rows.len() as u64 {
        return Err(PipelineError::Store(format!(
            "{table_name}: wrote {written} of {} rows",
            rows.len()
        )));
    }
    Ok(written)
}

/// Loads every base table of the plan from `data_dir`.
///
/// # Errors
///
/// Stops at the first failing table; the error names its `load <table>` stage.
pub async fn load_all(
    store: &dyn Store,
    plan: &LoadPlan,
    data_dir: &Path,
) -> PipelineResult<LoadSummary> {
    let mut summary = LoadSummary::default();
    for spec in plan.tables() {
        let rows = load_spec(store, spec, data_dir)
            .await
            .map_err(|e| e.in_stage(format!("load {}", spec.name)))?;
        info!(table = spec.name, rows, "Loaded");
        summary.tables.push(TableLoad {
            table: spec.name,
            rows,
        });
    }
    Ok(summary)
}

async fn load_spec(store: &dyn Store, spec: &TableSpec, data_dir: &Path) -> PipelineResult<u64> {
    load_table(
        store,
        spec.name,
        &data_dir.join(spec.source_file),
        spec.date_columns,
    )
    .await
}

/// Rebuilds the derived table from the current base tables.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyTransform`] (wrapped in the `transform`
/// stage) when the transform yields no rows; the derived table is then left
/// empty.
pub async fn build_profitability(
    store: &dyn Store,
    transform: &dyn Transform,
) -> PipelineResult<u64> {
    async {
        store.truncate_all(&[DERIVED_TABLE]).await?;

        let rows = transform.produce(store).await?;
        info!("Rows generated for profitability: {}", rows.len());
        if rows.is_empty() {
            return Err(PipelineError::EmptyTransform);
        }

        store.append(DERIVED_TABLE, &rows).await
    }
    .await
    .map_err(|e| e.in_stage("transform"))
}

/// A configured pipeline run.
pub struct Pipeline<'a> {
    store: &'a dyn Store,
    transform: &'a dyn Transform,
    plan: LoadPlan,
    data_dir: PathBuf,
}

impl<'a> Pipeline<'a> {
    /// Creates a pipeline over a store and transform.
    #[must_use]
    pub fn new(
        store: &'a dyn Store,
        transform: &'a dyn Transform,
        plan: LoadPlan,
        data_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            transform,
            plan,
            data_dir: data_dir.into(),
        }
    }

    /// Load plan used by this pipeline.
    #[must_use]
    pub fn plan(&self) -> &LoadPlan {
        &self.plan
    }

    /// Runs reset, load and transform.
    ///
    /// # Errors
    ///
    /// Returns the first stage error.
    pub async fn run(&self) -> PipelineResult<RunSummary> {
        info!(
            data_dir = %self.data_dir.display(),
            transform = self.transform.name(),
            "Starting pipeline"
        );

        reset(self.store, &self.plan).await?;
        let load = load_all(self.store, &self.plan, &self.data_dir).await?;
        let profitability_rows = build_profitability(self.store, self.transform).await?;

        info!(
            base_rows = load.total_rows(),
            profitability_rows, "Pipeline finished"
        );
        Ok(RunSummary {
            load,
            profitability_rows,
        })
    }
}
