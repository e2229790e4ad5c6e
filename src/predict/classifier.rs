/// Binary logistic-regression classifier over standardized features.
///
/// Trained with full-batch gradient descent and a small L2 penalty. There
/// is no randomness anywhere in training: the same data always produces
/// the same weights, fold assignment included.

use serde::{Deserialize, Serialize};

use super::scaler::StandardScaler;
use crate::error::ModelError;

// ---------------------------------------------------------------------------
// Hyperparameters
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            learning_rate: 0.5,
            epochs: 1500,
            l2: 1e-3,
        }
    }
}

impl TrainingParams {
    /// Rejects settings that cannot produce a usable fit.
    pub fn validate(&self) -> Result<(), ModelError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(ModelError::InvalidParams(format!(
                "learning rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if !self.l2.is_finite() || self.l2 < 0.0 {
            return Err(ModelError::InvalidParams(format!(
                "l2 penalty must be a non-negative number, got {}",
                self.l2
            )));
        }
        if self.epochs == 0 {
            return Err(ModelError::InvalidParams("epochs must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Upper bound on cross-validation folds.
pub const MAX_FOLDS: usize = 5;

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    pub weights: Vec<f64>,
    pub bias: f64,
}

pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

impl LogisticClassifier {
    /// Fits on already-standardized rows.
    pub fn fit(x: &[Vec<f64>], y: &[bool], params: &TrainingParams) -> Self {
        let width = x.first().map_or(0, Vec::len);
        let n = x.len().max(1) as f64;
        let mut weights = vec![0.0; width];
        let mut bias = 0.0;

        for _ in 0..params.epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;

            for (row, &label) in x.iter().zip(y) {
                let z = bias + dot(&weights, row);
                let err = sigmoid(z) - if label { 1.0 } else { 0.0 };
                for (g, v) in grad_w.iter_mut().zip(row) {
                    *g += err * v;
                }
                grad_b += err;
            }

            for (w, g) in weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * (g / n + params.l2 * *w);
            }
            bias -= params.learning_rate * grad_b / n;
        }

        Self { weights, bias }
    }

    pub fn width(&self) -> usize {
        self.weights.len()
    }

    /// Probability of the positive (flood) class for one standardized row.
    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.bias + dot(&self.weights, row))
    }

    /// Fraction of rows classified correctly at the 0.5 cut.
    pub fn accuracy(&self, x: &[Vec<f64>], y: &[bool]) -> f64 {
        if x.is_empty() {
            return 0.0;
        }
        let correct = x
            .iter()
            .zip(y)
            .filter(|(row, label)| (self.predict_proba(row) >= 0.5) == **label)
            .count();
        correct as f64 / x.len() as f64
    }

    /// Relative weight magnitude per feature, summing to 1.
    pub fn feature_importance(&self) -> Vec<f64> {
        let total: f64 = self.weights.iter().map(|w| w.abs()).sum();
        if total < f64::EPSILON {
            let share = 1.0 / self.weights.len().max(1) as f64;
            return vec![share; self.weights.len()];
        }
        self.weights.iter().map(|w| w.abs() / total).collect()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

// ---------------------------------------------------------------------------
// Cross-validation
// ---------------------------------------------------------------------------

/// Number of folds used for `n` samples.
pub fn fold_count(n: usize) -> usize {
    n.min(MAX_FOLDS)
}

/// k-fold accuracy on raw (unscaled) rows. Row `i` lands in fold `i % k`.
/// The scaler is refit on each training split so test folds never leak
/// into the standardization.
pub fn cross_validate(rows: &[Vec<f64>], labels: &[bool], params: &TrainingParams) -> Vec<f64> {
    let k = fold_count(rows.len());
    if k < 2 {
        return Vec::new();
    }

    (0..k)
        .map(|fold| {
            let (mut train_x, mut train_y, mut test_x, mut test_y) =
                (Vec::new(), Vec::new(), Vec::new(), Vec::new());
            for (i, (row, &label)) in rows.iter().zip(labels).enumerate() {
                if i % k == fold {
                    test_x.push(row.clone());
                    test_y.push(label);
                } else {
                    train_x.push(row.clone());
                    train_y.push(label);
                }
            }

            let scaler = StandardScaler::fit(&train_x);
            let model = LogisticClassifier::fit(&scaler.transform(&train_x), &train_y, params);
            model.accuracy(&scaler.transform(&test_x), &test_y)
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn separable() -> (Vec<Vec<f64>>, Vec<bool>) {
        let x: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 5.0]).collect();
        let y: Vec<bool> = (0..20).map(|i| i >= 10).collect();
        (x, y)
    }

    #[test]
    fn test_sigmoid_is_stable_at_extremes() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(1000.0) <= 1.0 && sigmoid(1000.0) > 0.999);
        assert!(sigmoid(-1000.0) >= 0.0 && sigmoid(-1000.0) < 0.001);
        assert!(!sigmoid(-1000.0).is_nan());
    }

    #[test]
    fn test_fit_learns_separable_data() {
        let (x, y) = separable();
        let scaler = StandardScaler::fit(&x);
        let model = LogisticClassifier::fit(&scaler.transform(&x), &y, &TrainingParams::default());

        assert_eq!(model.accuracy(&scaler.transform(&x), &y), 1.0);
        assert!(model.predict_proba(&scaler.transform_row(&[19.0, 5.0])) > 0.9);
        assert!(model.predict_proba(&scaler.transform_row(&[0.0, 5.0])) < 0.1);
    }

    #[test]
    fn test_constant_feature_gets_no_importance() {
        let (x, y) = separable();
        let scaler = StandardScaler::fit(&x);
        let model = LogisticClassifier::fit(&scaler.transform(&x), &y, &TrainingParams::default());
        let importance = model.feature_importance();

        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        assert!(importance[0] > 0.99, "the informative column should dominate: {:?}", importance);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let (x, y) = separable();
        let a = LogisticClassifier::fit(&x, &y, &TrainingParams::default());
        let b = LogisticClassifier::fit(&x, &y, &TrainingParams::default());
        assert_eq!(a, b);
    }

    #[test]
    fn test_cross_validate_uses_at_most_five_folds() {
        let (x, y) = separable();
        let scores = cross_validate(&x, &y, &TrainingParams::default());
        assert_eq!(scores.len(), 5);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));

        let small = cross_validate(&x[..3], &y[..3], &TrainingParams::default());
        assert_eq!(small.len(), 3);
    }

    #[test]
    fn test_params_reject_non_finite_and_out_of_range_values() {
        assert!(TrainingParams::default().validate().is_ok());

        let bad = [
            (f64::NAN, 1e-3, 1500),
            (f64::INFINITY, 1e-3, 1500),
            (0.0, 1e-3, 1500),
            (0.5, -1e-3, 1500),
            (0.5, f64::NAN, 1500),
            (0.5, 1e-3, 0),
        ]
        .map(|(learning_rate, l2, epochs)| TrainingParams {
            learning_rate,
            epochs,
            l2,
        });
        for params in bad {
            assert!(
                matches!(params.validate(), Err(ModelError::InvalidParams(_))),
                "{:?} should be rejected",
                params
            );
        }
    }
}
