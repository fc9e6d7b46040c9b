//! Model training error types.

use profitlens_shared::PipelineError;
use thiserror::Error;

/// Training and evaluation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    /// The training data lacks a required column.
    #[error("Training data has no column `{0}`")]
    MissingColumn(String),

    /// The training data has no rows.
    #[error("Training data is empty")]
    EmptyDataset,

    /// The target has a value other than 0 or 1.
    #[error("Row {row}: label {value} is not 0 or 1")]
    InvalidLabel {
        /// Row index.
        row: usize,
        /// Offending value.
        value: String,
    },

    /// The target has fewer than two classes.
    #[error("Target needs two classes, found {0}")]
    SingleClass(usize),

    /// A class is too small to appear in both splits.
    #[error("Class {class} has {count} rows, at least 2 are needed to stratify")]
    ClassTooSmall {
        /// Class label.
        class: u8,
        /// Rows with that label.
        count: usize,
    },

    /// A hyperparameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Prediction was requested before fitting.
    #[error("Model has not been fitted")]
    NotFitted,

    /// Feature rows do not have the width the model was fitted on.
    #[error("Expected {expected} features, got {got}")]
    DimensionMismatch {
        /// Width seen at fit time.
        expected: usize,
        /// Width passed in.
        got: usize,
    },
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        Self::Validation(err.to_string())
    }
}
