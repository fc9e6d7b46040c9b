//! Pipeline-wide error types.

use thiserror::Error;

/// Result type alias using `PipelineError`.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Pipeline error types.
///
/// Every variant is fatal to a pipeline run. The category decides which part
/// of the system the operator has to look at.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing or malformed CSV input, or an unparseable date column.
    #[error("Source error: {0}")]
    Source(String),

    /// The relational store rejected a statement or the connection failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A business-level check failed on otherwise valid data.
    #[error("Validation error: {0}")]
    Validation(String),

    /// The profitability transform produced no rows.
    #[error("Profitability transform returned 0 rows, check the transform logic")]
    EmptyTransform,

    /// An error raised inside a named pipeline stage.
    #[error("Stage `{stage}` failed: {source}")]
    Stage {
        /// Stage name (`reset`, `load accounts`, `transform`, ...).
        stage: String,
        /// Underlying error.
        #[source]
        source: Box<PipelineError>,
    },
}

/// Coarse error taxonomy used for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection parameters or other settings.
    Configuration,
    /// CSV inputs.
    Source,
    /// Database statements.
    Store,
    /// Business guards, including the empty transform check.
    Validation,
}

impl PipelineError {
    /// Wraps the error with the name of the stage it happened in.
    ///
    /// Wrapping an already wrapped error keeps the innermost stage.
    #[must_use]
    pub fn in_stage(self, stage: impl Into<String>) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage: stage.into(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the stage name if the error was raised inside one.
    #[must_use]
    pub fn stage(&self) -> Option<&str> {
        match self {
            Self::Stage { stage, .. } => Some(stage),
            _ => None,
        }
    }

    /// Returns the error with any stage wrapper removed.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the taxonomy category of this error.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self.root() {
            Self::Config(_) => ErrorCategory::Configuration,
            Self::Source(_) => ErrorCategory::Source,
            Self::Store(_) => ErrorCategory::Store,
            Self::Validation(_) | Self::EmptyTransform | Self::Stage { .. } => {
                ErrorCategory::Validation
            }
        }
    }

    /// Returns the error code printed on fatal exit.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self.root() {
            Self::Config(_) => "CONFIG_ERROR",
            Self::Source(_) => "SOURCE_ERROR",
            Self::Store(_) => "STORE_ERROR",
            Self::Validation(_) | Self::Stage { .. } => "VALIDATION_ERROR",
            Self::EmptyTransform => "EMPTY_TRANSFORM",
        }
    }
}

impl From<::config::ConfigError> for PipelineError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
