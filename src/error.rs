/// Error types for the flood risk engine.
///
/// Each concern gets its own enum so callers can match on exactly the
/// failures a given operation can produce. `EngineError` tags any of them
/// with the assessment stage that raised it.
///
/// The one sanctioned non-error is the unfitted-model fallback, which is
/// reported through `Prediction::degraded` rather than through this module.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Malformed configuration: threshold tables, config files, safe house.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown threshold field '{0}'")]
    UnknownField(String),

    #[error("threshold key must not be empty")]
    EmptyKey,

    #[error("threshold for '{key}' has a non-finite limit ({limit})")]
    InvalidLimit { key: String, limit: f64 },

    #[error("field '{0}' is configured more than once in the threshold table")]
    DuplicateField(String),

    #[error("history match radius must be a non-negative number of km, got {0}")]
    InvalidRadius(f64),

    #[error("invalid {what}: {source}")]
    InvalidLocation {
        what: &'static str,
        #[source]
        source: InputError,
    },
}

// ---------------------------------------------------------------------------
// Input (readings, locations, device lines)
// ---------------------------------------------------------------------------

/// A reading, location or device payload that failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InputError {
    #[error("unknown measurement field '{0}'")]
    UnknownField(String),

    #[error("required measurement field '{0}' is missing")]
    MissingField(&'static str),

    #[error("measurement field '{0}' is not a number")]
    NotNumeric(String),

    #[error("measurement field '{field}' is not finite ({value})")]
    NonFinite { field: String, value: f64 },

    #[error("reading payload must be a JSON object")]
    NotAnObject,

    #[error("coordinates out of range: latitude {latitude}, longitude {longitude}")]
    InvalidLocation { latitude: f64, longitude: f64 },

    #[error("malformed sensor line '{line}': {reason}")]
    MalformedLine { line: String, reason: String },
}

// ---------------------------------------------------------------------------
// Risk model
// ---------------------------------------------------------------------------

/// Training, prediction and artifact failures of the risk model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("insufficient training data: need {needed} samples, have {have}")]
    InsufficientData { needed: usize, have: usize },

    #[error("feature matrix has {rows} rows but {labels} labels were supplied")]
    LabelMismatch { rows: usize, labels: usize },

    #[error("training data must name at least one feature column")]
    NoFeatures,

    #[error("feature column '{0}' appears more than once")]
    DuplicateFeature(String),

    #[error("row {row} has {found} values, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("row {row}, column '{column}' is not finite")]
    NonFiniteValue { row: usize, column: String },

    #[error("required feature '{0}' is missing from the reading")]
    FeatureMissing(String),

    #[error("feature '{0}' is not a finite number")]
    NonFiniteFeature(String),

    #[error("model produced a non-finite probability")]
    NonFiniteScore,

    #[error("invalid training parameters: {0}")]
    InvalidParams(String),

    #[error("training diverged: fitted parameters are not finite")]
    Diverged,

    #[error("feature order {supplied:?} does not match fitted order {fitted:?}")]
    FeatureOrderMismatch {
        fitted: Vec<String>,
        supplied: Vec<String>,
    },

    #[error("no fitted model to save")]
    NotFitted,

    #[error("model artifact is corrupt: {0}")]
    ArtifactCorrupt(String),

    #[error("model artifact I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read training data: {0}")]
    TrainingData(String),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The stage of an engine operation that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Configuration,
    ModelLoad,
    Training,
    Prediction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Configuration => write!(f, "configuration"),
            Stage::ModelLoad => write!(f, "model load"),
            Stage::Training => write!(f, "training"),
            Stage::Prediction => write!(f, "prediction"),
        }
    }
}

/// Underlying failure carried by an `EngineError`.
#[derive(Debug, Error)]
pub enum StageCause {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Input(#[from] InputError),
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Error raised from inside `FloodRiskEngine`, tagged with its stage.
#[derive(Debug, Error)]
#[error("{stage} stage failed: {cause}")]
pub struct EngineError {
    pub stage: Stage,
    #[source]
    pub cause: StageCause,
}

impl EngineError {
    pub fn new(stage: Stage, cause: impl Into<StageCause>) -> Self {
        Self {
            stage,
            cause: cause.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
