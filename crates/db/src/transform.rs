//! Profitability transform backed by a SQL query file.

use std::path::Path;

use async_trait::async_trait;
use profitlens_core::catalog::PROFITABILITY_COLUMNS;
use profitlens_core::{RowSet, Store, Transform};
use profitlens_shared::{PipelineError, PipelineResult};
use sea_orm::DatabaseConnection;
use tracing::debug;

use crate::decode;

/// Runs a SELECT against the database and returns its rows.
///
/// The query must return the columns of `account_profitability` in table
/// order. The store handed to [`Transform::produce`] is not consulted; the
/// query reads the base tables through its own connection.
#[derive(Debug, Clone)]
pub struct SqlTransform {
    db: DatabaseConnection,
    sql: String,
}

impl SqlTransform {
    /// Creates a transform from query text.
    #[must_use]
    pub fn new(db: DatabaseConnection, sql: impl Into<String>) -> Self {
        Self {
            db,
            sql: sql.into(),
        }
    }

    /// Reads the query from a file.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if the file cannot be read or is blank.
    pub fn from_file(db: DatabaseConnection, path: &Path) -> PipelineResult<Self> {
        let sql = read_sql(path)?;
        Ok(Self::new(db, sql))
    }
}

fn read_sql(path: &Path) -> PipelineResult<String> {
    let sql = std::fs::read_to_string(path).map_err(|e| {
        PipelineError::Config(format!("cannot read transform {}: {e}", path.display()))
    })?;
    if sql.trim().is_empty() {
        return Err(PipelineError::Config(format!(
            "transform {} is empty",
            path.display()
        )));
    }
    Ok(sql)
}

#[async_trait]
impl Transform for SqlTransform {
    fn name(&self) -> &str {
        "sql"
    }

    async fn produce(&self, _store: &dyn Store) -> PipelineResult<RowSet> {
        let rows = sqlx::query(&self.sql)
            .fetch_all(self.db.get_postgres_connection_pool())
            .await
            .map_err(|e| PipelineError::Store(format!("transform query failed: {e}")))?;
        debug!(rows = rows.len(), "Transform query returned");

        match rows.first() {
            Some(row) => decode::row_set(decode::column_names(row), &rows),
            None => Ok(RowSet::new(PROFITABILITY_COLUMNS)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_sql(&dir.path().join("missing.sql")).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_blank_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.sql");
        std::fs::write(&path, "  \n").unwrap();
        assert!(matches!(read_sql(&path), Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_reads_query_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.sql");
        std::fs::write(&path, "SELECT 1").unwrap();
        assert_eq!(read_sql(&path).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_bundled_query_selects_profitability_columns() {
        let sql = include_str!("../../../sql/transforms.sql");
        for column in PROFITABILITY_COLUMNS {
            assert!(sql.contains(column), "{column} missing");
        }
    }
}
