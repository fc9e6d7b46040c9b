//! Store abstraction.
//!
//! The pipeline never talks to a database directly; it receives a `Store`
//! handle owned by the caller. `profitlens-db` implements it for PostgreSQL
//! and [`MemoryStore`] implements it in process.

pub mod memory;

use async_trait::async_trait;
use profitlens_shared::PipelineResult;

use crate::rows::RowSet;

pub use memory::{FailPoint, MemoryStore};

/// Relational store used by the pipeline.
#[async_trait]
pub trait Store: Send + Sync {
    /// Removes all rows from every listed table and restarts identities.
    ///
    /// Atomic: either all listed tables end empty or none are modified.
    /// Tables referencing a listed table are truncated too.
    async fn truncate_all(&self, tables: &[&str]) -> PipelineResult<()>;

    /// Appends rows to a table, matching columns by name.
    ///
    /// Atomic per call. Returns the number of rows written.
    async fn append(&self, table: &str, rows: &RowSet) -> PipelineResult<u64>;

    /// Reads every row of a table or view.
    async fn fetch(&self, table: &str) -> PipelineResult<RowSet>;

    /// Counts the rows of a table or view.
    async fn count(&self, table: &str) -> PipelineResult<u64>;
}
