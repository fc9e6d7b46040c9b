//! Random forest of CART trees with Gini impurity.
//!
//! Trees are grown independently on bootstrap samples and fitted in
//! parallel. Tree `i` draws from its own RNG seeded with `seed + i`, so the
//! forest is deterministic regardless of thread scheduling.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use rayon::prelude::*;
use tracing::debug;

use super::Classifier;
use super::error::ModelError;

#[derive(Debug, Clone)]
enum Node {
    Leaf {
        /// P(class 1) among the training rows that reached this leaf.
        positive: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

struct Split {
    feature: usize,
    threshold: f64,
    decrease: f64,
}

/// Gini impurity of a node with `pos` positives out of `n`.
#[allow(clippy::cast_precision_loss)]
fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

struct Grower<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    max_depth: usize,
    max_features: usize,
    total: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
}

impl Grower<'_> {
    #[allow(clippy::cast_precision_loss)]
    fn grow(&mut self, rows: &mut [usize], depth: usize, rng: &mut StdRng) -> usize {
        let n = rows.len();
        let pos = rows.iter().filter(|&&i| self.y[i] == 1).count();
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            positive: if n == 0 { 0.0 } else { pos as f64 / n as f64 },
        });

        if depth >= self.max_depth || n < 2 || pos == 0 || pos == n {
            return id;
        }
        let Some(split) = self.best_split(rows, pos, rng) else {
            return id;
        };

        self.importances[split.feature] += n as f64 / self.total as f64 * split.decrease;

        let mid = partition(rows, |&i| self.x[i][split.feature] <= split.threshold);
        let (left_rows, right_rows) = rows.split_at_mut(mid);
        let left = self.grow(left_rows, depth + 1, rng);
        let right = self.grow(right_rows, depth + 1, rng);
        self.nodes[id] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        id
    }

    #[allow(clippy::cast_precision_loss)]
    fn best_split(&self, rows: &[usize], pos: usize, rng: &mut StdRng) -> Option<Split> {
        let n = rows.len();
        let parent = gini(pos, n);
        let d = self.x[rows[0]].len();
        let mut best: Option<Split> = None;

        for feature in sample(rng, d, self.max_features.min(d)).into_iter() {
            let mut sorted: Vec<(f64, u8)> = rows
                .iter()
                .map(|&i| (self.x[i][feature], self.y[i]))
                .collect();
            sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_pos = 0;
            for k in 1..n {
                left_pos += usize::from(sorted[k - 1].1);
                if sorted[k - 1].0 >= sorted[k].0 {
                    continue;
                }
                let weighted = (k as f64 * gini(left_pos, k)
                    + (n - k) as f64 * gini(pos - left_pos, n - k))
                    / n as f64;
                let decrease = parent - weighted;
                if decrease > best.as_ref().map_or(0.0, |b| b.decrease) {
                    best = Some(Split {
                        feature,
                        threshold: (sorted[k - 1].0 + sorted[k].0) / 2.0,
                        decrease,
                    });
                }
            }
        }
        best
    }
}

/// Moves rows matching `pred` to the front; returns how many matched.
fn partition(rows: &mut [usize], pred: impl Fn(&usize) -> bool) -> usize {
    let mut mid = 0;
    for k in 0..rows.len() {
        if pred(&rows[k]) {
            rows.swap(mid, k);
            mid += 1;
        }
    }
    mid
}

impl Tree {
    fn positive(&self, row: &[f64]) -> f64 {
        let mut id = 0;
        loop {
            match &self.nodes[id] {
                Node::Leaf { positive } => return *positive,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    id = if row[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Bagged ensemble of decision trees.
#[derive(Debug, Clone)]
pub struct RandomForest {
    /// Number of trees.
    pub n_trees: usize,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Base RNG seed.
    pub seed: u64,
    trees: Vec<Tree>,
    importances: Vec<f64>,
    width: usize,
}

impl Default for RandomForest {
    fn default() -> Self {
        Self {
            n_trees: 200,
            max_depth: 6,
            seed: 42,
            trees: Vec::new(),
            importances: Vec::new(),
            width: 0,
        }
    }
}

impl RandomForest {
    /// Creates an unfitted forest with default hyperparameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an unfitted forest with default hyperparameters and the given seed.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed,
            ..Self::default()
        }
    }

    /// Impurity-based importances, one per feature, summing to 1 (or all 0
    /// when no tree split).
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.importances
    }

    /// Mean P(class 1) over all trees for each row.
    ///
    /// # Errors
    ///
    /// Returns an error if the forest is unfitted or a row has the wrong width.
    #[allow(clippy::cast_precision_loss)]
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        x.iter()
            .map(|row| {
                if row.len() != self.width {
                    return Err(ModelError::DimensionMismatch {
                        expected: self.width,
                        got: row.len(),
                    });
                }
                let total: f64 = self.trees.iter().map(|t| t.positive(row)).sum();
                Ok(total / self.trees.len() as f64)
            })
            .collect()
    }

    fn fit_tree(&self, x: &[Vec<f64>], y: &[u8], index: usize) -> (Tree, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(index as u64));
        let n = x.len();
        let width = x[0].len();
        let mut rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

        let mut grower = Grower {
            x,
            y,
            max_depth: self.max_depth,
            max_features: max_features(width),
            total: n,
            nodes: Vec::new(),
            importances: vec![0.0; width],
        };
        grower.grow(&mut rows, 0, &mut rng);
        (
            Tree {
                nodes: grower.nodes,
            },
            normalized(grower.importances),
        )
    }
}

/// Features tried per split: `sqrt(d)`, at least 1.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss
)]
fn max_features(width: usize) -> usize {
    ((width as f64).sqrt() as usize).max(1)
}

fn normalized(mut values: Vec<f64>) -> Vec<f64> {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in &mut values {
            *v /= total;
        }
    }
    values
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "Random Forest"
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ModelError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ModelError::EmptyDataset);
        }
        if self.n_trees == 0 || self.max_depth == 0 {
            return Err(ModelError::InvalidParameter(
                "n_trees and max_depth must be at least 1".into(),
            ));
        }
        let width = x[0].len();
        if let Some(row) = x.iter().find(|row| row.len() != width) {
            return Err(ModelError::DimensionMismatch {
                expected: width,
                got: row.len(),
            });
        }

        let fitted: Vec<(Tree, Vec<f64>)> = (0..self.n_trees)
            .into_par_iter()
            .map(|i| self.fit_tree(x, y, i))
            .collect();

        let mut importances = vec![0.0; width];
        for (_, tree_importances) in &fitted {
            for (total, v) in importances.iter_mut().zip(tree_importances) {
                *total += v / self.n_trees as f64;
            }
        }

        self.trees = fitted.into_iter().map(|(tree, _)| tree).collect();
        self.importances = normalized(importances);
        self.width = width;
        debug!(trees = self.trees.len(), "Random forest fitted");
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Label depends only on feature 1; features 0 and 2 are noise.
    fn data() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut rng = StdRng::seed_from_u64(1);
        let mut x = Vec::new();
        let mut y = Vec::new();
        for _ in 0..200 {
            let signal: f64 = rng.gen_range(0.0..1.0);
            x.push(vec![rng.gen_range(0.0..1.0), signal, rng.gen_range(0.0..1.0)]);
            y.push(u8::from(signal > 0.6));
        }
        (x, y)
    }

    fn small_forest() -> RandomForest {
        RandomForest {
            n_trees: 25,
            ..RandomForest::default()
        }
    }

    #[test]
    fn test_fits_training_data() {
        let (x, y) = data();
        let mut forest = small_forest();
        forest.fit(&x, &y).unwrap();

        let predicted = forest.predict(&x).unwrap();
        let correct = predicted.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 180, "only {correct} of 200 correct");
    }

    #[test]
    fn test_importances_find_signal() {
        let (x, y) = data();
        let mut forest = small_forest();
        forest.fit(&x, &y).unwrap();

        let imp = forest.feature_importances();
        assert_eq!(imp.len(), 3);
        assert!((imp.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(imp[1] > imp[0] && imp[1] > imp[2]);
    }

    #[test]
    fn test_same_seed_same_forest() {
        let (x, y) = data();
        let mut a = small_forest();
        let mut b = small_forest();
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a.predict_proba(&x).unwrap(), b.predict_proba(&x).unwrap());
        assert_eq!(a.feature_importances(), b.feature_importances());
    }

    #[test]
    fn test_depth_limit() {
        let (x, y) = data();
        let mut forest = RandomForest {
            n_trees: 3,
            max_depth: 1,
            ..RandomForest::default()
        };
        forest.fit(&x, &y).unwrap();
        // a stump has at most one split and two leaves
        assert!(forest.trees.iter().all(|t| t.nodes.len() <= 3));
    }

    #[test]
    fn test_gini() {
        assert!((gini(5, 10) - 0.5).abs() < 1e-12);
        assert!(gini(0, 10).abs() < 1e-12);
        assert!(gini(0, 0).abs() < 1e-12);
    }

    #[test]
    fn test_with_seed_keeps_default_hyperparameters() {
        let forest = RandomForest::with_seed(7);
        assert_eq!(forest.seed, 7);
        assert_eq!(forest.n_trees, 200);
        assert_eq!(forest.max_depth, 6);
        assert!(forest.trees.is_empty());
    }

    #[test]
    fn test_unfitted_forest() {
        assert_eq!(
            RandomForest::new().predict(&[vec![0.0]]).unwrap_err(),
            ModelError::NotFitted
        );
    }
}
