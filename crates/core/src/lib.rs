//! Core pipeline logic for Profitlens.
//!
//! This crate contains pure logic with ZERO database dependencies. The
//! relational store is reached only through the [`store::Store`] trait.
//!
//! # Modules
//!
//! - `catalog` - Base table definitions and the derived table
//! - `plan` - Load order from declared table dependencies
//! - `source` - CSV reading with date coercion
//! - `store` - Store trait and the in-memory implementation
//! - `transform` - Profitability transform strategies
//! - `pipeline` - Reset, load and transform orchestration
//! - `generator` - Synthetic SaaS dataset
//! - `ml` - Deterioration classifiers and metrics

pub mod catalog;
pub mod generator;
pub mod ml;
pub mod pipeline;
pub mod plan;
pub mod rows;
pub mod source;
pub mod store;
pub mod transform;

pub use pipeline::{LoadSummary, Pipeline, RunSummary};
pub use plan::LoadPlan;
pub use rows::{RowSet, Value};
pub use store::{MemoryStore, Store};
pub use transform::{RollupTransform, Transform};
