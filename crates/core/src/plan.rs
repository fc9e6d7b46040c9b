//! Load plan derived from the declared table dependencies.
//!
//! Tables form a DAG (edge parent -> child). The load order is a topological
//! sort of that graph; ties are broken by declaration order so the result is
//! stable across runs. The reset order is the derived table followed by the
//! base tables in reverse load order.

use std::collections::{BTreeSet, HashMap};

use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use profitlens_shared::PipelineError;
use thiserror::Error;

use crate::catalog::{BASE_TABLES, DERIVED_TABLE, TableSpec};

/// Errors raised while building a load plan.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    /// A table declares a dependency on a table that is not in the plan.
    #[error("table `{table}` depends on unknown table `{dependency}`")]
    UnknownDependency {
        /// Declaring table.
        table: String,
        /// Missing dependency.
        dependency: String,
    },

    /// The same table name appears twice.
    #[error("table `{0}` is declared twice")]
    DuplicateTable(String),

    /// The dependency graph has a cycle.
    #[error("circular table dependency involving: {0}")]
    Cycle(String),
}

impl From<PlanError> for PipelineError {
    fn from(err: PlanError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Ordered list of base tables to load.
#[derive(Debug, Clone)]
pub struct LoadPlan {
    tables: Vec<TableSpec>,
}

impl LoadPlan {
    /// Builds the plan for the standard catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog dependencies are inconsistent.
    pub fn standard() -> Result<Self, PlanError> {
        Self::from_specs(&BASE_TABLES)
    }

    /// Builds a plan from arbitrary table specs.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate names, unknown dependencies or cycles.
    pub fn from_specs(specs: &[TableSpec]) -> Result<Self, PlanError> {
        let mut graph: DiGraph<usize, ()> = DiGraph::new();
        let mut nodes: HashMap<&str, NodeIndex> = HashMap::new();

        for (position, spec) in specs.iter().enumerate() {
            let node = graph.add_node(position);
            if nodes.insert(spec.name, node).is_some() {
                return Err(PlanError::DuplicateTable(spec.name.to_string()));
            }
        }

        for spec in specs {
            let child = nodes[spec.name];
            for dependency in spec.depends_on {
                let parent =
                    nodes
                        .get(dependency)
                        .ok_or_else(|| PlanError::UnknownDependency {
                            table: spec.name.to_string(),
                            dependency: (*dependency).to_string(),
                        })?;
                graph.add_edge(*parent, child, ());
            }
        }

        if let Err(cycle) = toposort(&graph, None) {
            let name = specs[graph[cycle.node_id()]].name;
            return Err(PlanError::Cycle(name.to_string()));
        }

        // Kahn's algorithm; the ready set is ordered by declaration position.
        let mut in_degree: Vec<usize> = graph
            .node_indices()
            .map(|n| graph.neighbors_directed(n, Direction::Incoming).count())
            .collect();
        let mut ready: BTreeSet<usize> = graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(|n| graph[n])
            .collect();

        let mut tables = Vec::with_capacity(specs.len());
        while let Some(position) = ready.pop_first() {
            tables.push(specs[position]);
            let node = nodes[specs[position].name];
            for child in graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[child.index()] -= 1;
                if in_degree[child.index()] == 0 {
                    ready.insert(graph[child]);
                }
            }
        }

        Ok(Self { tables })
    }

    /// Tables in load order.
    #[must_use]
    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    /// Table names in load order.
    #[must_use]
    pub fn order(&self) -> Vec<&'static str> {
        self.tables.iter().map(|spec| spec.name).collect()
    }

    /// Table names in truncate order: derived table, then children before parents.
    #[must_use]
    pub fn reset_order(&self) -> Vec<&'static str> {
        std::iter::once(DERIVED_TABLE)
            .chain(self.tables.iter().rev().map(|spec| spec.name))
            .collect()
    }

    /// Position of a table in the load order.
    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.tables.iter().position(|spec| spec.name == name)
    }
}
