//! Pipeline run summaries.

use std::fmt;

/// Rows loaded into one base table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLoad {
    /// Table name.
    pub table: &'static str,
    /// Rows appended (equals rows read from the CSV).
    pub rows: u64,
}

/// Result of loading every base table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    /// Per-table counts in load order.
    pub tables: Vec<TableLoad>,
}

impl LoadSummary {
    /// Row count for a table, if it was loaded.
    #[must_use]
    pub fn rows_for(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|load| load.table == table)
            .map(|load| load.rows)
    }

    /// Total rows across all tables.
    #[must_use]
    pub fn total_rows(&self) -> u64 {
        self.tables.iter().map(|load| load.rows).sum()
    }
}

/// Result of a full reset, load and transform run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Base table counts.
    pub load: LoadSummary,
    /// Rows written to the derived table.
    pub profitability_rows: u64,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for load in &self.load.tables {
            writeln!(f, "{:<24}{:>8}", load.table, load.rows)?;
        }
        write!(
            f,
            "{:<24}{:>8}",
            crate::catalog::DERIVED_TABLE,
            self.profitability_rows
        )
    }
}
