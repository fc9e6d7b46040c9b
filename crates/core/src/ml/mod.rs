//! Account deterioration classifiers.
//!
//! Reads rows of the `ml_account_training_data` view, splits them with
//! stratification, fits a logistic regression baseline and a random forest,
//! and reports per-class metrics for both.

#![allow(clippy::float_arithmetic, clippy::float_cmp)]

pub mod dataset;
pub mod error;
pub mod forest;
pub mod logistic;
pub mod report;

use tracing::{debug, info};

pub use dataset::{FEATURES, TARGET, TrainingSet};
pub use error::ModelError;
pub use forest::RandomForest;
pub use logistic::LogisticRegression;
pub use report::{ClassMetrics, ClassificationReport, FeatureRanking};

use crate::rows::RowSet;

/// A binary classifier.
pub trait Classifier {
    /// Display name used in reports.
    fn name(&self) -> &'static str;

    /// Fits the model on a feature matrix and 0/1 labels.
    ///
    /// # Errors
    ///
    /// Returns an error on empty input, ragged rows or bad hyperparameters.
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ModelError>;

    /// Predicts 0/1 labels.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unfitted or a row has the wrong width.
    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, ModelError>;
}

/// Split and model parameters for a training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingOptions {
    /// Fraction of rows held out for evaluation.
    pub test_size: f64,
    /// Seed for the split and the forest.
    pub seed: u64,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            test_size: 0.25,
            seed: 42,
        }
    }
}

/// Evaluation of one fitted model on the held-out rows.
#[derive(Debug, Clone)]
pub struct ModelEvaluation {
    /// Model display name.
    pub model: &'static str,
    /// Test-set metrics.
    pub report: ClassificationReport,
}

/// Output of [`train_and_evaluate`].
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    /// Rows in the training split.
    pub train_rows: usize,
    /// Rows in the test split.
    pub test_rows: usize,
    /// One entry per model, baseline first.
    pub evaluations: Vec<ModelEvaluation>,
    /// Forest feature importances, largest first.
    pub importances: FeatureRanking,
}

/// Fits a classifier on `train` and scores it on `test`.
///
/// # Errors
///
/// Returns the model's fit or predict error.
pub fn evaluate(
    model: &mut dyn Classifier,
    train: &TrainingSet,
    test: &TrainingSet,
) -> Result<ModelEvaluation, ModelError> {
    model.fit(&train.features, &train.labels)?;
    let predicted = model.predict(&test.features)?;
    Ok(ModelEvaluation {
        model: model.name(),
        report: ClassificationReport::new(&test.labels, &predicted),
    })
}

/// Extracts features, splits, and evaluates both models.
///
/// # Errors
///
/// Returns an error if the rows cannot form a two-class training set or a
/// model fails to fit.
pub fn train_and_evaluate(
    rows: &RowSet,
    options: &TrainingOptions,
) -> Result<TrainingOutcome, ModelError> {
    let data = TrainingSet::from_rows(rows)?;
    let (train, test) = data.stratified_split(options.test_size, options.seed)?;
    info!(train = train.len(), test = test.len(), "Split training data");

    let mut baseline = LogisticRegression::new();
    let mut forest = RandomForest::with_seed(options.seed);

    let evaluations = vec![
        evaluate(&mut baseline, &train, &test)?,
        evaluate(&mut forest, &train, &test)?,
    ];
    debug!(
        iterations = ?baseline.iterations(),
        "Logistic regression stopped"
    );
    for evaluation in &evaluations {
        info!(
            model = evaluation.model,
            accuracy = evaluation.report.accuracy,
            "Evaluated"
        );
    }

    Ok(TrainingOutcome {
        train_rows: train.len(),
        test_rows: test.len(),
        evaluations,
        importances: FeatureRanking::new(&data.feature_names, forest.feature_importances()),
    })
}
