//! Reads the feature view used for model training.

use profitlens_core::RowSet;
use profitlens_core::catalog::TRAINING_VIEW;
use profitlens_shared::{PipelineError, PipelineResult};
use sea_orm::DatabaseConnection;
use tracing::info;

use crate::decode;

/// Columns of the training view, in select order.
pub const TRAINING_COLUMNS: [&str; 9] = [
    "account_id",
    "month",
    "revenue",
    "profit",
    "support_cost",
    "margin",
    "active_users",
    "api_calls",
    "deteriorating_label",
];

/// Fetches every row of the training view, ordered by account and month so
/// that a seeded split sees the same sequence on every run.
///
/// # Errors
///
/// Returns `PipelineError::Store` if the view is missing or the query fails.
pub async fn load_training_data(db: &DatabaseConnection) -> PipelineResult<RowSet> {
    let sql = format!(
        "SELECT {} FROM {TRAINING_VIEW} ORDER BY account_id, month",
        TRAINING_COLUMNS.join(", ")
    );
    let rows = sqlx::query(&sql)
        .fetch_all(db.get_postgres_connection_pool())
        .await
        .map_err(|e| PipelineError::Store(format!("cannot read {TRAINING_VIEW}: {e}")))?;
    info!(rows = rows.len(), "Loaded training data");

    decode::row_set(TRAINING_COLUMNS.iter().map(ToString::to_string).collect(), &rows)
}
