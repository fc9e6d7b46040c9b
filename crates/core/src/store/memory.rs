//! In-process store.
//!
//! Behaves like the PostgreSQL schema where the pipeline can observe it:
//! named tables with fixed columns, foreign keys checked on insert, cascading
//! all-or-nothing truncation, all-or-nothing appends. Used by `etl --dry-run`
//! and by tests, which can also inject one-shot failures.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use profitlens_shared::{PipelineError, PipelineResult};
use tracing::debug;

use super::Store;
use crate::catalog::{
    BASE_TABLES, DERIVED_TABLE, ForeignKey, PROFITABILITY_COLUMNS, PROFITABILITY_FOREIGN_KEYS,
};
use crate::rows::{RowSet, Value};

/// Operation that should fail the next time it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailPoint {
    /// The next `truncate_all` call.
    Truncate,
    /// The next `append` into the named table.
    Append(String),
    /// The next `fetch` of the named table.
    Fetch(String),
}

#[derive(Debug)]
struct Table {
    columns: Vec<String>,
    foreign_keys: Vec<ForeignKey>,
    rows: Vec<Vec<Value>>,
    identity_restarts: u64,
}

/// In-memory `Store` implementation.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<String, Table>>,
    failures: Mutex<Vec<FailPoint>>,
}

impl MemoryStore {
    /// Creates an empty store with no tables.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store with the six base tables and the derived table.
    #[must_use]
    pub fn with_catalog() -> Self {
        let store = Self::new();
        if let Ok(mut tables) = store.tables.lock() {
            for spec in &BASE_TABLES {
                tables.insert(
                    spec.name.to_string(),
                    Table::new(spec.columns, spec.foreign_keys),
                );
            }
            tables.insert(
                DERIVED_TABLE.to_string(),
                Table::new(&PROFITABILITY_COLUMNS, &PROFITABILITY_FOREIGN_KEYS),
            );
        }
        store
    }

    /// Registers (or replaces) a table.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn register(
        &self,
        name: &str,
        columns: &[&str],
        foreign_keys: &[ForeignKey],
    ) -> PipelineResult<()> {
        self.tables()?
            .insert(name.to_string(), Table::new(columns, foreign_keys));
        Ok(())
    }

    /// Makes the next matching operation fail with a store error.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lock is poisoned.
    pub fn inject_failure(&self, point: FailPoint) -> PipelineResult<()> {
        self.failures
            .lock()
            .map_err(|_| poisoned())?
            .push(point);
        Ok(())
    }

    /// Number of times a table's identity has been restarted.
    ///
    /// # Errors
    ///
    /// Returns an error if the table does not exist.
    pub fn identity_restarts(&self, table: &str) -> PipelineResult<u64> {
        self.tables()?
            .get(table)
            .map(|t| t.identity_restarts)
            .ok_or_else(|| missing_relation(table))
    }

    fn tables(&self) -> PipelineResult<MutexGuard<'_, BTreeMap<String, Table>>> {
        self.tables.lock().map_err(|_| poisoned())
    }

    fn take_failure(&self, point: &FailPoint) -> PipelineResult<()> {
        let mut failures = self.failures.lock().map_err(|_| poisoned())?;
        if let Some(pos) = failures.iter().position(|f| f == point) {
            failures.remove(pos);
            return Err(PipelineError::Store(format!(
                "injected failure at {point:?}"
            )));
        }
        Ok(())
    }
}

impl Table {
    fn new(columns: &[&str], foreign_keys: &[ForeignKey]) -> Self {
        Self {
            columns: columns.iter().map(|c| (*c).to_string()).collect(),
            foreign_keys: foreign_keys.to_vec(),
            rows: Vec::new(),
            identity_restarts: 0,
        }
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

fn poisoned() -> PipelineError {
    PipelineError::Store("memory store lock poisoned".to_string())
}

fn missing_relation(table: &str) -> PipelineError {
    PipelineError::Store(format!("relation \"{table}\" does not exist"))
}

/// Tables referencing any table in `targets`, transitively.
fn cascade(tables: &BTreeMap<String, Table>, targets: &[&str]) -> BTreeSet<String> {
    let mut closure: BTreeSet<String> = targets.iter().map(|t| (*t).to_string()).collect();
    loop {
        let added: Vec<String> = tables
            .iter()
            .filter(|(name, _)| !closure.contains(*name))
            .filter(|(_, table)| {
                table
                    .foreign_keys
                    .iter()
                    .any(|fk| closure.contains(fk.references))
            })
            .map(|(name, _)| name.clone())
            .collect();
        if added.is_empty() {
            return closure;
        }
        closure.extend(added);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn truncate_all(&self, tables: &[&str]) -> PipelineResult<()> {
        self.take_failure(&FailPoint::Truncate)?;
        let mut state = self.tables()?;

        if let Some(missing) = tables.iter().find(|t| !state.contains_key(**t)) {
            return Err(missing_relation(missing));
        }

        for name in cascade(&state, tables) {
            if let Some(table) = state.get_mut(&name) {
                table.rows.clear();
                table.identity_restarts += 1;
                debug!(table = %name, "Truncated");
            }
        }
        Ok(())
    }

    async fn append(&self, table: &str, rows: &RowSet) -> PipelineResult<u64> {
        self.take_failure(&FailPoint::Append(table.to_string()))?;
        let mut state = self.tables()?;
        let target = state.get(table).ok_or_else(|| missing_relation(table))?;

        let mut mapping = Vec::with_capacity(rows.columns().len());
        for column in rows.columns() {
            let idx = target.column_index(column).ok_or_else(|| {
                PipelineError::Store(format!(
                    "column \"{column}\" of relation \"{table}\" does not exist"
                ))
            })?;
            mapping.push(idx);
        }

        let mut staged = Vec::with_capacity(rows.len());
        for source in rows.rows() {
            let mut row = vec![Value::Null; target.columns.len()];
            for (value, &idx) in source.iter().zip(&mapping) {
                row[idx] = value.clone();
            }
            staged.push(row);
        }

        for fk in &target.foreign_keys {
            let parent = state
                .get(fk.references)
                .ok_or_else(|| missing_relation(fk.references))?;
            let (Some(child_idx), Some(parent_idx)) = (
                target.column_index(fk.column),
                parent.column_index(fk.referenced_column),
            ) else {
                continue;
            };
            let keys: HashSet<&Value> = parent.rows.iter().map(|r| &r[parent_idx]).collect();
            if let Some(orphan) = staged
                .iter()
                .map(|r| &r[child_idx])
                .find(|v| !v.is_null() && !keys.contains(v))
            {
                return Err(PipelineError::Store(format!(
                    "insert on table \"{table}\" violates foreign key: {}={orphan} is not present in table \"{}\"",
                    fk.column, fk.references
                )));
            }
        }

        let written = staged.len() as u64;
        if let Some(target) = state.get_mut(table) {
            target.rows.extend(staged);
        }
        Ok(written)
    }

    async fn fetch(&self, table: &str) -> PipelineResult<RowSet> {
        self.take_failure(&FailPoint::Fetch(table.to_string()))?;
        let state = self.tables()?;
        let source = state.get(table).ok_or_else(|| missing_relation(table))?;

        let mut rows = RowSet::new(source.columns.iter().cloned());
        for row in &source.rows {
            rows.push(row.clone())?;
        }
        Ok(rows)
    }

    async fn count(&self, table: &str) -> PipelineResult<u64> {
        let state = self.tables()?;
        state
            .get(table)
            .map(|t| t.rows.len() as u64)
            .ok_or_else(|| missing_relation(table))
    }
}
