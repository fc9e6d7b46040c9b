//! Shared errors and configuration for Profitlens.
//!
//! This crate provides the pieces every other crate agrees on:
//! - The pipeline error taxonomy (configuration, source, store, validation)
//! - Environment-driven configuration for the database and the pipeline

pub mod config;
pub mod error;

pub use config::{AppConfig, DatabaseConfig, PipelineConfig};
pub use error::{ErrorCategory, PipelineError, PipelineResult};
