//! Feature extraction and train/test splitting.

use std::collections::BTreeMap;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::error::ModelError;
use crate::rows::RowSet;

/// Feature columns read from the training view, in model input order.
pub const FEATURES: [&str; 6] = [
    "revenue",
    "profit",
    "support_cost",
    "margin",
    "active_users",
    "api_calls",
];

/// Target column.
pub const TARGET: &str = "deteriorating_label";

/// Feature matrix and binary labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSet {
    /// Feature names, one per column of `features`.
    pub feature_names: Vec<String>,
    /// Row-major feature matrix.
    pub features: Vec<Vec<f64>>,
    /// Labels, 0 or 1.
    pub labels: Vec<u8>,
}

impl TrainingSet {
    /// Extracts [`FEATURES`] and [`TARGET`] from a row set. NULL features are 0.
    ///
    /// # Errors
    ///
    /// Returns an error if a column is missing, a label is not 0/1, or the
    /// target has fewer than two classes.
    pub fn from_rows(rows: &RowSet) -> Result<Self, ModelError> {
        let column = |name: &str| {
            rows.column_index(name)
                .ok_or_else(|| ModelError::MissingColumn(name.to_string()))
        };
        let feature_idx = FEATURES
            .iter()
            .map(|name| column(name))
            .collect::<Result<Vec<_>, _>>()?;
        let target_idx = column(TARGET)?;

        let mut features = Vec::with_capacity(rows.len());
        let mut labels = Vec::with_capacity(rows.len());
        for (i, row) in rows.rows().iter().enumerate() {
            features.push(
                feature_idx
                    .iter()
                    .map(|&idx| row[idx].as_f64().unwrap_or(0.0))
                    .collect(),
            );
            let label = match row[target_idx].as_i64() {
                Some(0) => 0,
                Some(1) => 1,
                _ => {
                    return Err(ModelError::InvalidLabel {
                        row: i,
                        value: row[target_idx].to_string(),
                    });
                }
            };
            labels.push(label);
        }

        let set = Self {
            feature_names: FEATURES.iter().map(|f| (*f).to_string()).collect(),
            features,
            labels,
        };
        if set.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        let classes = set.class_counts().len();
        if classes < 2 {
            return Err(ModelError::SingleClass(classes));
        }
        Ok(set)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Returns true if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Rows per class label.
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<u8, usize> {
        let mut counts = BTreeMap::new();
        for label in &self.labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        counts
    }

    fn subset(&self, indices: &[usize]) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            features: indices.iter().map(|&i| self.features[i].clone()).collect(),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Splits into (train, test), keeping class proportions.
    ///
    /// Each class contributes `round(test_size * count)` rows to the test
    /// set, at least one and never all of them.
    ///
    /// # Errors
    ///
    /// Returns an error if `test_size` is not in (0, 1) or a class has fewer
    /// than two rows.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss,
        clippy::float_arithmetic
    )]
    pub fn stratified_split(&self, test_size: f64, seed: u64) -> Result<(Self, Self), ModelError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ModelError::InvalidParameter(format!(
                "test_size must be in (0, 1), got {test_size}"
            )));
        }

        let mut by_class: BTreeMap<u8, Vec<usize>> = BTreeMap::new();
        for (i, label) in self.labels.iter().enumerate() {
            by_class.entry(*label).or_default().push(i);
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();
        for (class, mut indices) in by_class {
            let count = indices.len();
            if count < 2 {
                return Err(ModelError::ClassTooSmall { class, count });
            }
            indices.shuffle(&mut rng);
            let n_test = ((test_size * count as f64).round() as usize).clamp(1, count - 1);
            test.extend_from_slice(&indices[..n_test]);
            train.extend_from_slice(&indices[n_test..]);
        }

        train.shuffle(&mut rng);
        test.shuffle(&mut rng);
        Ok((self.subset(&train), self.subset(&test)))
    }
}
