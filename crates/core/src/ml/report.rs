//! Classification metrics and their text rendering.

use std::fmt;

use serde::Serialize;

/// Precision, recall, F1 and support for one class or average.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    /// TP / (TP + FP), 0 when nothing was predicted for the class.
    pub precision: f64,
    /// TP / (TP + FN), 0 when the class is absent.
    pub recall: f64,
    /// Harmonic mean of precision and recall.
    pub f1: f64,
    /// True rows of the class.
    pub support: usize,
}

/// Per-class metrics plus accuracy and averages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    /// Metrics per class label, ascending.
    pub classes: Vec<(u8, ClassMetrics)>,
    /// Fraction of correct predictions.
    pub accuracy: f64,
    /// Unweighted mean over classes.
    pub macro_avg: ClassMetrics,
    /// Support-weighted mean over classes.
    pub weighted_avg: ClassMetrics,
}

#[allow(clippy::cast_precision_loss)]
fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

fn f1(precision: f64, recall: f64) -> f64 {
    let sum = precision + recall;
    if sum > 0.0 {
        2.0 * precision * recall / sum
    } else {
        0.0
    }
}

impl ClassificationReport {
    /// Builds the report for binary labels.
    ///
    /// Both class 0 and class 1 are always listed.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(y_true: &[u8], y_pred: &[u8]) -> Self {
        let total = y_true.len();
        let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();

        let classes: Vec<(u8, ClassMetrics)> = [0_u8, 1]
            .into_iter()
            .map(|class| {
                let pairs = || y_true.iter().zip(y_pred);
                let tp = pairs().filter(|(t, p)| **t == class && **p == class).count();
                let predicted = y_pred.iter().filter(|p| **p == class).count();
                let support = y_true.iter().filter(|t| **t == class).count();
                let precision = ratio(tp, predicted);
                let recall = ratio(tp, support);
                (
                    class,
                    ClassMetrics {
                        precision,
                        recall,
                        f1: f1(precision, recall),
                        support,
                    },
                )
            })
            .collect();

        let n_classes = classes.len() as f64;
        let macro_avg = ClassMetrics {
            precision: classes.iter().map(|(_, m)| m.precision).sum::<f64>() / n_classes,
            recall: classes.iter().map(|(_, m)| m.recall).sum::<f64>() / n_classes,
            f1: classes.iter().map(|(_, m)| m.f1).sum::<f64>() / n_classes,
            support: total,
        };

        let weighted = |pick: fn(&ClassMetrics) -> f64| {
            if total == 0 {
                return 0.0;
            }
            classes
                .iter()
                .map(|(_, m)| pick(m) * m.support as f64)
                .sum::<f64>()
                / total as f64
        };
        let weighted_avg = ClassMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1: weighted(|m| m.f1),
            support: total,
        };

        Self {
            classes,
            accuracy: ratio(correct, total),
            macro_avg,
            weighted_avg,
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |f: &mut fmt::Formatter<'_>, label: &str, m: &ClassMetrics| {
            writeln!(
                f,
                "{label:>12} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.precision, m.recall, m.f1, m.support
            )
        };

        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (class, metrics) in &self.classes {
            row(f, &class.to_string(), metrics)?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>12} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.macro_avg.support
        )?;
        row(f, "macro avg", &self.macro_avg)?;
        row(f, "weighted avg", &self.weighted_avg)
    }
}

/// Feature importances sorted descending.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRanking(pub Vec<(String, f64)>);

impl FeatureRanking {
    /// Pairs names with importances and sorts by importance, largest first.
    #[must_use]
    pub fn new(names: &[String], importances: &[f64]) -> Self {
        let mut ranked: Vec<(String, f64)> = names
            .iter()
            .cloned()
            .zip(importances.iter().copied())
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        Self(ranked)
    }
}

impl fmt::Display for FeatureRanking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<14} {:>10}", "feature", "importance")?;
        for (name, importance) in &self.0 {
            writeln!(f, "{name:<14} {importance:>10.6}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_binary_metrics() {
        let y_true = [0, 0, 0, 0, 1, 1];
        let y_pred = [0, 0, 0, 1, 1, 0];
        let report = ClassificationReport::new(&y_true, &y_pred);

        let (_, zero) = report.classes[0];
        assert!(close(zero.precision, 0.75));
        assert!(close(zero.recall, 0.75));
        assert_eq!(zero.support, 4);

        let (_, one) = report.classes[1];
        assert!(close(one.precision, 0.5));
        assert!(close(one.recall, 0.5));
        assert!(close(one.f1, 0.5));

        assert!(close(report.accuracy, 4.0 / 6.0));
        assert!(close(report.macro_avg.f1, 0.625));
        assert!(close(report.weighted_avg.f1, (0.75 * 4.0 + 0.5 * 2.0) / 6.0));
    }

    #[test]
    fn test_never_predicted_class_scores_zero() {
        let report = ClassificationReport::new(&[0, 1, 1], &[0, 0, 0]);
        let (_, one) = report.classes[1];
        assert!(close(one.precision, 0.0));
        assert!(close(one.f1, 0.0));
        assert_eq!(one.support, 2);
    }

    #[test]
    fn test_rendering() {
        let report = ClassificationReport::new(&[0, 1, 1, 0], &[0, 1, 0, 0]);
        let text = report.to_string();

        assert!(text.contains("precision"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("weighted avg"));
        assert!(text.lines().any(|l| l.trim_start().starts_with("accuracy") && l.contains("0.75")));
    }

    #[test]
    fn test_feature_ranking_sorted() {
        let names = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let ranking = FeatureRanking::new(&names, &[0.2, 0.5, 0.3]);
        let order: Vec<&str> = ranking.0.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(order, ["b", "c", "a"]);
    }
}
