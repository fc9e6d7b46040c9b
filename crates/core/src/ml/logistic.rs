//! L2-regularized logistic regression on standardized features.

use tracing::debug;

use super::Classifier;
use super::error::ModelError;

/// Binary logistic regression fitted by full-batch gradient descent.
///
/// Minimizes mean log-loss plus `||w||^2 / (2 * C * n)`, which has the same
/// minimizer as `C * sum(log-loss) + ||w||^2 / 2`. Inputs are standardized
/// with the training mean and standard deviation.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    /// Inverse regularization strength.
    pub c: f64,
    /// Iteration cap.
    pub max_iter: usize,
    /// Stops once every gradient component is below this.
    pub tol: f64,
    /// Gradient step size.
    pub learning_rate: f64,
    state: Option<Fitted>,
}

#[derive(Debug, Clone)]
struct Fitted {
    means: Vec<f64>,
    scales: Vec<f64>,
    weights: Vec<f64>,
    bias: f64,
    iterations: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            tol: 1e-4,
            learning_rate: 0.1,
            state: None,
        }
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

fn width(x: &[Vec<f64>]) -> usize {
    x.first().map_or(0, Vec::len)
}

impl LogisticRegression {
    /// Creates an unfitted model with default hyperparameters.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Learned weights in standardized feature space.
    #[must_use]
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.state.as_ref().map(|s| s.weights.as_slice())
    }

    /// Gradient steps taken by the last fit.
    #[must_use]
    pub fn iterations(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.iterations)
    }

    fn standardize(state: &Fitted, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(state.means.iter().zip(&state.scales))
            .map(|(v, (mean, scale))| (v - mean) / scale)
            .collect()
    }

    fn decision(state: &Fitted, row: &[f64]) -> f64 {
        Self::standardize(state, row)
            .iter()
            .zip(&state.weights)
            .map(|(v, w)| v * w)
            .sum::<f64>()
            + state.bias
    }

    /// Probability of class 1 for each row.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is unfitted or a row has the wrong width.
    pub fn predict_proba(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        let state = self.state.as_ref().ok_or(ModelError::NotFitted)?;
        x.iter()
            .map(|row| {
                if row.len() == state.weights.len() {
                    Ok(sigmoid(Self::decision(state, row)))
                } else {
                    Err(ModelError::DimensionMismatch {
                        expected: state.weights.len(),
                        got: row.len(),
                    })
                }
            })
            .collect()
    }
}

impl Classifier for LogisticRegression {
    fn name(&self) -> &'static str {
        "Logistic Regression"
    }

    #[allow(clippy::cast_precision_loss)]
    fn fit(&mut self, x: &[Vec<f64>], y: &[u8]) -> Result<(), ModelError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ModelError::EmptyDataset);
        }
        if self.c <= 0.0 || self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidParameter(
                "C and learning_rate must be positive".into(),
            ));
        }

        let n = x.len() as f64;
        let d = width(x);
        if let Some(row) = x.iter().find(|row| row.len() != d) {
            return Err(ModelError::DimensionMismatch {
                expected: d,
                got: row.len(),
            });
        }

        let means: Vec<f64> = (0..d)
            .map(|j| x.iter().map(|row| row[j]).sum::<f64>() / n)
            .collect();
        let scales: Vec<f64> = (0..d)
            .map(|j| {
                let var = x.iter().map(|row| (row[j] - means[j]).powi(2)).sum::<f64>() / n;
                // constant columns pass through centered
                if var > 0.0 { var.sqrt() } else { 1.0 }
            })
            .collect();

        let mut state = Fitted {
            means,
            scales,
            weights: vec![0.0; d],
            bias: 0.0,
            iterations: 0,
        };
        let z: Vec<Vec<f64>> = x.iter().map(|row| Self::standardize(&state, row)).collect();

        for iteration in 1..=self.max_iter {
            let mut grad_w = vec![0.0; d];
            let mut grad_b = 0.0;
            for (row, label) in z.iter().zip(y) {
                let logit = row
                    .iter()
                    .zip(&state.weights)
                    .map(|(v, w)| v * w)
                    .sum::<f64>()
                    + state.bias;
                let err = sigmoid(logit) - f64::from(*label);
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }
            for (g, w) in grad_w.iter_mut().zip(&state.weights) {
                *g = *g / n + w / (self.c * n);
            }
            grad_b /= n;

            for (w, g) in state.weights.iter_mut().zip(&grad_w) {
                *w -= self.learning_rate * g;
            }
            state.bias -= self.learning_rate * grad_b;
            state.iterations = iteration;

            let largest = grad_w.iter().fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            if largest < self.tol {
                break;
            }
        }

        debug!(iterations = state.iterations, "Logistic regression fitted");
        self.state = Some(state);
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_proba(x)?
            .into_iter()
            .map(|p| u8::from(p >= 0.5))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<u8>) {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..40 {
            let v = f64::from(i);
            x.push(vec![v * 100.0, 7.0]);
            y.push(u8::from(i >= 20));
        }
        (x, y)
    }

    #[test]
    fn test_learns_separable_data() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.coefficients().unwrap()[0] > 0.0);
        // constant column carries no signal
        assert!(model.coefficients().unwrap()[1].abs() < 1e-9);
    }

    #[test]
    fn test_probabilities_are_monotonic() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();

        let p = model.predict_proba(&x).unwrap();
        assert!(p.windows(2).all(|w| w[0] <= w[1]));
        assert!(p.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn test_respects_max_iter() {
        let (x, y) = separable();
        let mut model = LogisticRegression {
            max_iter: 5,
            ..LogisticRegression::default()
        };
        model.fit(&x, &y).unwrap();
        assert_eq!(model.iterations(), Some(5));
    }

    #[test]
    fn test_unfitted_model() {
        let model = LogisticRegression::new();
        assert_eq!(
            model.predict(&[vec![1.0]]).unwrap_err(),
            ModelError::NotFitted
        );
    }

    #[test]
    fn test_width_mismatch() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert_eq!(
            model.predict(&[vec![1.0]]).unwrap_err(),
            ModelError::DimensionMismatch {
                expected: 2,
                got: 1
            }
        );
    }
}
