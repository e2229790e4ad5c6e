/// Per-column standardization: `(x - mean) / scale`.
///
/// `scale` is the population standard deviation of the column. Constant
/// columns get a scale of 1.0 so they standardize to zero instead of NaN.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl StandardScaler {
    /// Fits column statistics. `rows` must be non-empty and rectangular;
    /// the caller validates that before getting here.
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;

        let mut mean = vec![0.0; width];
        for row in rows {
            for (m, x) in mean.iter_mut().zip(row) {
                *m += x;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut scale = vec![0.0; width];
        for row in rows {
            for ((s, x), m) in scale.iter_mut().zip(row).zip(&mean) {
                *s += (x - m).powi(2);
            }
        }
        for s in &mut scale {
            *s = (*s / n).sqrt();
            if *s < f64::EPSILON {
                *s = 1.0;
            }
        }

        Self { mean, scale }
    }

    pub fn width(&self) -> usize {
        self.mean.len()
    }

    pub fn transform_row(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(&self.mean)
            .zip(&self.scale)
            .map(|((x, m), s)| (x - m) / s)
            .collect()
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter().map(|r| self.transform_row(r)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_computes_population_mean_and_std() {
        let scaler = StandardScaler::fit(&[vec![1.0, 10.0], vec![3.0, 10.0]]);
        assert_eq!(scaler.mean, vec![2.0, 10.0]);
        assert!((scaler.scale[0] - 1.0).abs() < 1e-12);
        assert_eq!(scaler.scale[1], 1.0, "constant column should fall back to unit scale");
    }

    #[test]
    fn test_transform_centers_and_scales() {
        let rows = vec![vec![2.0], vec![4.0], vec![6.0]];
        let scaler = StandardScaler::fit(&rows);
        let out = scaler.transform(&rows);
        let sum: f64 = out.iter().map(|r| r[0]).sum();
        assert!(sum.abs() < 1e-12, "standardized column should be zero-mean");
        assert!(out[0][0] < 0.0 && out[2][0] > 0.0);
    }
}
