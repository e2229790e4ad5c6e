/// Flood probability model.
///
/// `RiskModel` owns a fitted (scaler, classifier, column order) triple and
/// moves through two states:
///
/// ```text
/// Unfitted ──fit/load──▶ Fitted ──fit/load──▶ Fitted (replaced)
/// ```
///
/// The fitted triple lives behind `RwLock<Option<Arc<FittedModel>>>`.
/// Training and artifact parsing happen outside the lock; the write lock is
/// only held for the pointer swap, so a concurrent `predict` sees either the
/// old model or the new one in full.
///
/// Predicting on an unfitted model returns probability 0.5 / medium with
/// `degraded = true` and logs a warning. That is the only silent fallback in
/// the engine.
///
/// Submodules:
/// - `scaler`     — per-column standardization
/// - `classifier` — logistic regression + k-fold cross validation
/// - `artifact`   — single-document persistence

pub mod artifact;
pub mod classifier;
pub mod scaler;

use std::fs;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::ModelError;
use crate::model::{Field, Reading, RiskLevel};
use classifier::LogisticClassifier;
use scaler::StandardScaler;

pub use classifier::TrainingParams;

/// Probability reported when no model is fitted.
pub const DEGRADED_PROBABILITY: f64 = 0.5;

// ---------------------------------------------------------------------------
// Training data
// ---------------------------------------------------------------------------

/// Feature matrix with its column order and flood labels.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingData {
    pub columns: Vec<Field>,
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<bool>,
}

impl TrainingData {
    pub fn new(columns: Vec<Field>, rows: Vec<Vec<f64>>, labels: Vec<bool>) -> Self {
        Self { columns, rows, labels }
    }

    /// Builds rows from readings in `columns` order.
    pub fn from_labeled_readings(
        columns: Vec<Field>,
        samples: &[(Reading, bool)],
    ) -> Result<Self, ModelError> {
        let mut rows = Vec::with_capacity(samples.len());
        let mut labels = Vec::with_capacity(samples.len());
        for (reading, label) in samples {
            rows.push(feature_vector(&columns, reading)?);
            labels.push(*label);
        }
        Ok(Self { columns, rows, labels })
    }

    /// Parses a JSON array of labeled readings:
    /// `[{"temperature": 88.0, ..., "flood_occurred": true}, ...]`.
    pub fn from_json(columns: Vec<Field>, contents: &str) -> Result<Self, ModelError> {
        let doc: Value = serde_json::from_str(contents)
            .map_err(|e| ModelError::TrainingData(e.to_string()))?;
        let items = doc
            .as_array()
            .ok_or_else(|| ModelError::TrainingData("expected a JSON array of samples".to_string()))?;

        let mut samples = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            let mut object = item
                .as_object()
                .cloned()
                .ok_or_else(|| ModelError::TrainingData(format!("sample {} is not an object", i)))?;
            let label = object
                .remove("flood_occurred")
                .and_then(|v| v.as_bool())
                .ok_or_else(|| {
                    ModelError::TrainingData(format!("sample {} lacks a boolean flood_occurred", i))
                })?;
            let reading = Reading::from_json(&Value::Object(object))
                .map_err(|e| ModelError::TrainingData(format!("sample {}: {}", i, e)))?;
            samples.push((reading, label));
        }

        Self::from_labeled_readings(columns, &samples)
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.columns.is_empty() {
            return Err(ModelError::NoFeatures);
        }
        for (i, col) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(col) {
                return Err(ModelError::DuplicateFeature(col.to_string()));
            }
        }
        if self.rows.len() != self.labels.len() {
            return Err(ModelError::LabelMismatch {
                rows: self.rows.len(),
                labels: self.labels.len(),
            });
        }
        let needed = min_samples(self.columns.len());
        if self.rows.len() < needed {
            return Err(ModelError::InsufficientData {
                needed,
                have: self.rows.len(),
            });
        }
        for (r, row) in self.rows.iter().enumerate() {
            if row.len() != self.columns.len() {
                return Err(ModelError::RaggedRow {
                    row: r,
                    expected: self.columns.len(),
                    found: row.len(),
                });
            }
            if let Some(c) = row.iter().position(|v| !v.is_finite()) {
                return Err(ModelError::NonFiniteValue {
                    row: r,
                    column: self.columns[c].to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Minimum sample count for `features` columns.
pub fn min_samples(features: usize) -> usize {
    2 * features
}

fn feature_vector(columns: &[Field], reading: &Reading) -> Result<Vec<f64>, ModelError> {
    columns
        .iter()
        .map(|f| match reading.get(*f) {
            Some(v) if v.is_finite() => Ok(v),
            Some(_) => Err(ModelError::NonFiniteFeature(f.to_string())),
            None => Err(ModelError::FeatureMissing(f.to_string())),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Fitted state and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub field: Field,
    pub importance: f64,
}

/// Summary of one `fit` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    pub samples: usize,
    pub positive_samples: usize,
    pub cv_folds: usize,
    pub cv_scores: Vec<f64>,
    /// Mean cross-validation accuracy.
    pub cv_accuracy: f64,
    pub training_accuracy: f64,
    /// Sorted by descending importance.
    pub feature_importance: Vec<FeatureImportance>,
    pub trained_at: Option<DateTime<Utc>>,
}

/// Everything needed to score a reading. Always complete; never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub columns: Vec<Field>,
    pub scaler: StandardScaler,
    pub classifier: LogisticClassifier,
    pub report: TrainingReport,
}

impl FittedModel {
    fn score(&self, row: &[f64]) -> Result<f64, ModelError> {
        let p = self
            .classifier
            .predict_proba(&self.scaler.transform_row(row));
        if p.is_nan() {
            return Err(ModelError::NonFiniteScore);
        }
        Ok(p.clamp(0.0, 1.0))
    }
}

/// Result of `RiskModel::predict`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub probability: f64,
    pub level: RiskLevel,
    /// True when no model was fitted and the neutral fallback was used.
    pub degraded: bool,
}

impl Prediction {
    pub fn degraded() -> Self {
        Self {
            probability: DEGRADED_PROBABILITY,
            level: RiskLevel::from_probability(DEGRADED_PROBABILITY),
            degraded: true,
        }
    }

    fn from_probability(probability: f64) -> Self {
        Self {
            probability,
            level: RiskLevel::from_probability(probability),
            degraded: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelState {
    Unfitted,
    Fitted,
}

// ---------------------------------------------------------------------------
// RiskModel
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct RiskModel {
    fitted: RwLock<Option<Arc<FittedModel>>>,
    params: TrainingParams,
}

impl RiskModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_params(params: TrainingParams) -> Self {
        Self {
            fitted: RwLock::new(None),
            params,
        }
    }

    /// Builds a model from an artifact on disk.
    pub fn from_artifact(path: &Path) -> Result<Self, ModelError> {
        let model = Self::new();
        model.load(path)?;
        Ok(model)
    }

    // Every write is a single assignment, so a poisoned lock still guards a
    // consistent value.
    fn snapshot(&self) -> Option<Arc<FittedModel>> {
        self.fitted
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn install(&self, model: FittedModel) {
        *self.fitted.write().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(model));
    }

    pub fn state(&self) -> ModelState {
        if self.snapshot().is_some() {
            ModelState::Fitted
        } else {
            ModelState::Unfitted
        }
    }

    pub fn is_fitted(&self) -> bool {
        self.state() == ModelState::Fitted
    }

    /// Column order recorded at fit time, if fitted.
    pub fn feature_columns(&self) -> Option<Vec<Field>> {
        self.snapshot().map(|m| m.columns.clone())
    }

    pub fn report(&self) -> Option<TrainingReport> {
        self.snapshot().map(|m| m.report.clone())
    }

    /// Trains a new model and swaps it in. On error the previous model (if
    /// any) stays in place.
    pub fn fit(&self, data: &TrainingData) -> Result<TrainingReport, ModelError> {
        self.params.validate()?;
        data.validate()?;

        let cv_scores = classifier::cross_validate(&data.rows, &data.labels, &self.params);
        let cv_accuracy = if cv_scores.is_empty() {
            0.0
        } else {
            cv_scores.iter().sum::<f64>() / cv_scores.len() as f64
        };

        let scaler = StandardScaler::fit(&data.rows);
        let scaled = scaler.transform(&data.rows);
        let classifier = LogisticClassifier::fit(&scaled, &data.labels, &self.params);
        let training_accuracy = classifier.accuracy(&scaled, &data.labels);

        let mut feature_importance: Vec<FeatureImportance> = data
            .columns
            .iter()
            .zip(classifier.feature_importance())
            .map(|(f, importance)| FeatureImportance {
                field: *f,
                importance,
            })
            .collect();
        feature_importance.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let report = TrainingReport {
            samples: data.rows.len(),
            positive_samples: data.labels.iter().filter(|l| **l).count(),
            cv_folds: cv_scores.len(),
            cv_scores,
            cv_accuracy,
            training_accuracy,
            feature_importance,
            trained_at: Some(Utc::now()),
        };

        let candidate = FittedModel {
            columns: data.columns.clone(),
            scaler,
            classifier,
            report: report.clone(),
        };
        if !artifact::parameters_finite(&candidate) {
            warn!(
                learning_rate = self.params.learning_rate,
                epochs = self.params.epochs,
                "risk model fit diverged; keeping previous model"
            );
            return Err(ModelError::Diverged);
        }

        info!(
            samples = report.samples,
            folds = report.cv_folds,
            cv_accuracy = report.cv_accuracy,
            training_accuracy = report.training_accuracy,
            "risk model fitted"
        );
        self.install(candidate);
        Ok(report)
    }

    /// Scores a reading. Falls back to the degraded prediction when
    /// unfitted; a reading missing a fitted column is an error.
    pub fn predict(&self, reading: &Reading) -> Result<Prediction, ModelError> {
        let Some(model) = self.snapshot() else {
            warn!(
                probability = DEGRADED_PROBABILITY,
                "risk model not fitted; returning degraded prediction"
            );
            return Ok(Prediction::degraded());
        };

        let row = feature_vector(&model.columns, reading)?;
        let prediction = Prediction::from_probability(model.score(&row)?);
        debug!(probability = prediction.probability, level = %prediction.level, "risk predicted");
        Ok(prediction)
    }

    /// Scores a pre-built feature vector. `columns` must match the fitted
    /// order exactly.
    pub fn predict_vector(&self, columns: &[Field], row: &[f64]) -> Result<Prediction, ModelError> {
        let Some(model) = self.snapshot() else {
            warn!("risk model not fitted; returning degraded prediction");
            return Ok(Prediction::degraded());
        };

        if columns != model.columns.as_slice() || row.len() != columns.len() {
            return Err(ModelError::FeatureOrderMismatch {
                fitted: model.columns.iter().map(|f| f.to_string()).collect(),
                supplied: columns.iter().map(|f| f.to_string()).collect(),
            });
        }
        if let Some(c) = row.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteFeature(columns[c].to_string()));
        }
        Ok(Prediction::from_probability(model.score(row)?))
    }

    /// Persists scaler, classifier and column order as one artifact.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let model = self.snapshot().ok_or(ModelError::NotFitted)?;
        artifact::write(path, &model)?;
        info!(path = %path.display(), "risk model saved");
        Ok(())
    }

    /// Replaces the current model with the artifact at `path`. A corrupt
    /// artifact leaves the current model untouched.
    pub fn load(&self, path: &Path) -> Result<(), ModelError> {
        let model = artifact::read(path)?;
        info!(
            path = %path.display(),
            columns = model.columns.len(),
            "risk model loaded"
        );
        self.install(model);
        Ok(())
    }

    /// Loads `path` if it exists. Returns whether a model was loaded. A path
    /// whose existence cannot be determined is an error, not a missing file.
    pub fn load_if_present(&self, path: &Path) -> Result<bool, ModelError> {
        let exists = path.try_exists().map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if !exists {
            warn!(path = %path.display(), "no model artifact found; predictions will run degraded");
            return Ok(false);
        }
        self.load(path).map(|_| true)
    }
}

/// Reads a training file from disk. See `TrainingData::from_json`.
pub fn load_training_file(path: &Path, columns: Vec<Field>) -> Result<TrainingData, ModelError> {
    let contents = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    TrainingData::from_json(columns, &contents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
