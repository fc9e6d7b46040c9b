//! PostgreSQL implementation of the pipeline store.
//!
//! Writes go through SeaORM transactions with statements built by
//! `sea_query`; reads go straight to the underlying sqlx pool so that
//! column types can be decoded dynamically.

use async_trait::async_trait;
use profitlens_core::{RowSet, Store, Value};
use profitlens_shared::{PipelineError, PipelineResult};
use sea_orm::sea_query::{Alias, Keyword, Query, SimpleExpr};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr, TransactionTrait};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::decode;

/// Postgres caps bind parameters per statement at `u16::MAX`.
const MAX_BIND_PARAMS: usize = 65_535;

/// `Store` backed by a PostgreSQL database.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    db: DatabaseConnection,
}

impl PostgresStore {
    /// Wraps an open connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Closes the connection pool.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Store` if the pool fails to close cleanly.
    pub async fn close(self) -> PipelineResult<()> {
        self.db.close().await.map_err(store_err)
    }

    fn pool(&self) -> &PgPool {
        self.db.get_postgres_connection_pool()
    }

    async fn column_names(&self, table: &str) -> PipelineResult<Vec<String>> {
        sqlx::query_scalar::<_, String>(
            "SELECT column_name::TEXT FROM information_schema.columns \
             WHERE table_schema = current_schema() AND table_name = $1 \
             ORDER BY ordinal_position",
        )
        .bind(table)
        .fetch_all(self.pool())
        .await
        .map_err(sqlx_err)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn truncate_all(&self, tables: &[&str]) -> PipelineResult<()> {
        if tables.is_empty() {
            return Ok(());
        }
        let sql = truncate_sql(tables);
        debug!(%sql, "Truncating");

        let txn = self.db.begin().await.map_err(store_err)?;
        txn.execute_unprepared(&sql).await.map_err(store_err)?;
        txn.commit().await.map_err(store_err)?;

        info!(tables = tables.len(), "Truncated tables");
        Ok(())
    }

    async fn append(&self, table: &str, rows: &RowSet) -> PipelineResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let columns: Vec<Alias> = rows.columns().iter().map(Alias::new).collect();
        let chunk_size = rows_per_statement(columns.len());

        let txn = self.db.begin().await.map_err(store_err)?;
        let mut written = 0;
        for chunk in rows.rows().chunks(chunk_size) {
            let mut insert = Query::insert();
            insert
                .into_table(Alias::new(table))
                .columns(columns.iter().cloned());
            for row in chunk {
                insert
                    .values(row.iter().map(to_expr))
                    .map_err(|e| PipelineError::Store(format!("cannot build insert: {e}")))?;
            }
            let stmt = txn.get_database_backend().build(&insert);
            written += txn.execute(stmt).await.map_err(store_err)?.rows_affected();
        }
        txn.commit().await.map_err(store_err)?;

        debug!(table, rows = written, "Appended rows");
        Ok(written)
    }

    async fn fetch(&self, table: &str) -> PipelineResult<RowSet> {
        let sql = format!("SELECT * FROM {}", quote_ident(table));
        let rows = sqlx::query(&sql)
            .fetch_all(self.pool())
            .await
            .map_err(sqlx_err)?;

        let columns = match rows.first() {
            Some(row) => decode::column_names(row),
            None => self.column_names(table).await?,
        };
        decode::row_set(columns, &rows)
    }

    async fn count(&self, table: &str) -> PipelineResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_ident(table));
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(self.pool())
            .await
            .map_err(sqlx_err)?;
        u64::try_from(count).map_err(|e| PipelineError::Store(e.to_string()))
    }
}

fn to_expr(value: &Value) -> SimpleExpr {
    match value {
        Value::Null => SimpleExpr::Keyword(Keyword::Null),
        Value::Int(v) => (*v).into(),
        Value::Decimal(v) => (*v).into(),
        Value::Text(v) => v.clone().into(),
        Value::Date(v) => (*v).into(),
    }
}

fn rows_per_statement(columns: usize) -> usize {
    (MAX_BIND_PARAMS / columns.max(1)).max(1)
}

fn truncate_sql(tables: &[&str]) -> String {
    let list = tables
        .iter()
        .map(|t| quote_ident(t))
        .collect::<Vec<_>>()
        .join(", ");
    format!("TRUNCATE TABLE {list} RESTART IDENTITY CASCADE")
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[allow(clippy::needless_pass_by_value)]
fn store_err(err: DbErr) -> PipelineError {
    PipelineError::Store(err.to_string())
}

#[allow(clippy::needless_pass_by_value)]
fn sqlx_err(err: sqlx::Error) -> PipelineError {
    PipelineError::Store(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_sql_lists_every_table() {
        assert_eq!(
            truncate_sql(&["invoices", "accounts"]),
            r#"TRUNCATE TABLE "invoices", "accounts" RESTART IDENTITY CASCADE"#
        );
    }

    #[test]
    fn test_quote_ident_escapes_quotes() {
        assert_eq!(quote_ident("plans"), r#""plans""#);
        assert_eq!(quote_ident(r#"a"b"#), r#""a""b""#);
    }

    #[test]
    fn test_rows_per_statement_stays_under_bind_limit() {
        assert_eq!(rows_per_statement(10), 6553);
        assert!(rows_per_statement(8) * 8 <= MAX_BIND_PARAMS);
        assert_eq!(rows_per_statement(0), MAX_BIND_PARAMS);
    }
}
