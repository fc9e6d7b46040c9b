//! Application configuration management.
//!
//! Connection parameters come from `DB_*` environment variables (the same
//! names the generator and trainer use), pipeline paths from `PIPELINE_*`.
//! A `.env` file in the working directory is honored.

use std::path::PathBuf;

use serde::Deserialize;

use crate::error::PipelineResult;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Pipeline file locations.
    pub pipeline: PipelineConfig,
}

/// Database configuration.
#[derive(Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Host name.
    pub host: String,
    /// Port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Database name.
    pub name: String,
    /// User name.
    pub user: String,
    /// Password.
    pub password: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Pipeline file locations.
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Directory holding the six source CSV files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Path of the profitability transform query.
    #[serde(default = "default_transform_sql")]
    pub transform_sql: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/raw")
}

fn default_transform_sql() -> PathBuf {
    PathBuf::from("sql/transforms.sql")
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            transform_sql: default_transform_sql(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `.env`, optional config files and the environment.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if a required connection parameter is
    /// missing or a value cannot be parsed.
    pub fn load() -> PipelineResult<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            pipeline: PipelineConfig::from_env()?,
        })
    }
}

impl DatabaseConfig {
    /// Reads `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if a required value is missing.
    pub fn from_env() -> PipelineResult<Self> {
        let config = ::config::Config::builder()
            .add_source(::config::File::with_name("config/database").required(false))
            .add_source(::config::Environment::with_prefix("DB").try_parsing(true))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

impl PipelineConfig {
    /// Reads `PIPELINE_DATA_DIR` and `PIPELINE_TRANSFORM_SQL`.
    ///
    /// # Errors
    ///
    /// Returns `PipelineError::Config` if a value cannot be parsed.
    pub fn from_env() -> PipelineResult<Self> {
        let config = ::config::Config::builder()
            .add_source(::config::File::with_name("config/pipeline").required(false))
            .add_source(::config::Environment::with_prefix("PIPELINE"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}
