/// Model artifact persistence.
///
/// A fitted model is stored as one JSON document holding the feature column
/// order, the scaler and the classifier together. There is no way to write
/// or read one part without the others: `read` rejects any document whose
/// parts disagree on width.
///
/// Writes go to a temporary sibling file which is then renamed over the
/// destination, so a reader never sees a half-written artifact.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::FittedModel;
use crate::error::ModelError;

pub const ARTIFACT_FORMAT: &str = "floodrisk-model";
pub const ARTIFACT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct ModelArtifact {
    format: String,
    version: u32,
    model: FittedModel,
}

/// Serializes a fitted model into the versioned artifact envelope.
pub fn encode(model: &FittedModel) -> Result<String, ModelError> {
    let artifact = ModelArtifact {
        format: ARTIFACT_FORMAT.to_string(),
        version: ARTIFACT_VERSION,
        model: model.clone(),
    };
    serde_json::to_string_pretty(&artifact)
        .map_err(|e| ModelError::ArtifactCorrupt(format!("failed to encode artifact: {}", e)))
}

/// Parses and validates an artifact document.
pub fn decode(contents: &str) -> Result<FittedModel, ModelError> {
    let artifact: ModelArtifact = serde_json::from_str(contents)
        .map_err(|e| ModelError::ArtifactCorrupt(format!("unreadable artifact: {}", e)))?;

    if artifact.format != ARTIFACT_FORMAT {
        return Err(ModelError::ArtifactCorrupt(format!(
            "unexpected format tag '{}'",
            artifact.format
        )));
    }
    if artifact.version != ARTIFACT_VERSION {
        return Err(ModelError::ArtifactCorrupt(format!(
            "unsupported artifact version {} (expected {})",
            artifact.version, ARTIFACT_VERSION
        )));
    }

    validate(&artifact.model)?;
    Ok(artifact.model)
}

fn validate(model: &FittedModel) -> Result<(), ModelError> {
    let columns = model.columns.len();
    if columns == 0 {
        return Err(ModelError::ArtifactCorrupt("artifact has no feature columns".to_string()));
    }
    if model.scaler.width() != columns || model.scaler.scale.len() != columns {
        return Err(ModelError::ArtifactCorrupt(format!(
            "scaler covers {} columns, artifact names {}",
            model.scaler.width(),
            columns
        )));
    }
    if model.classifier.width() != columns {
        return Err(ModelError::ArtifactCorrupt(format!(
            "classifier has {} weights, artifact names {} columns",
            model.classifier.width(),
            columns
        )));
    }
    if !parameters_finite(model) || model.scaler.scale.iter().any(|s| *s == 0.0) {
        return Err(ModelError::ArtifactCorrupt("artifact contains invalid parameters".to_string()));
    }
    for (i, col) in model.columns.iter().enumerate() {
        if model.columns[..i].contains(col) {
            return Err(ModelError::ArtifactCorrupt(format!("column '{}' listed twice", col)));
        }
    }
    Ok(())
}

/// True when every scaler and classifier parameter is a finite number.
pub(crate) fn parameters_finite(model: &FittedModel) -> bool {
    model
        .scaler
        .mean
        .iter()
        .chain(&model.scaler.scale)
        .chain(&model.classifier.weights)
        .chain(std::iter::once(&model.classifier.bias))
        .all(|v| v.is_finite())
}

/// Writes the artifact to `path`, creating parent directories as needed.
pub fn write(path: &Path, model: &FittedModel) -> Result<(), ModelError> {
    let io_err = |source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let contents = encode(model)?;
    let tmp = temp_path(path);
    fs::write(&tmp, contents).map_err(io_err)?;
    fs::rename(&tmp, path).map_err(io_err)
}

/// Reads and validates the artifact at `path`.
pub fn read(path: &Path) -> Result<FittedModel, ModelError> {
    let contents = fs::read_to_string(path).map_err(|source| ModelError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&contents)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    use crate::model::Field;
    use crate::predict::classifier::LogisticClassifier;
    use crate::predict::scaler::StandardScaler;
    use crate::predict::{FittedModel, TrainingReport};

    fn tiny_model() -> FittedModel {
        FittedModel {
            columns: vec![Field::Humidity, Field::Pressure],
            scaler: StandardScaler {
                mean: vec![70.0, 1005.0],
                scale: vec![10.0, 8.0],
            },
            classifier: LogisticClassifier {
                weights: vec![1.2, -0.8],
                bias: -0.1,
            },
            report: TrainingReport::default(),
        }
    }

    #[test]
    fn test_decode_accepts_encoded_model() {
        let model = tiny_model();
        let decoded = decode(&encode(&model).unwrap()).expect("own encoding should decode");
        assert_eq!(decoded.columns, model.columns);
        assert_eq!(decoded.classifier, model.classifier);
    }

    #[test]
    fn test_decode_rejects_scaler_classifier_width_mismatch() {
        let mut doc: Value = serde_json::from_str(&encode(&tiny_model()).unwrap()).unwrap();
        doc["model"]["scaler"]["mean"] = serde_json::json!([70.0]);
        doc["model"]["scaler"]["scale"] = serde_json::json!([10.0]);

        let err = decode(&doc.to_string()).unwrap_err();
        assert!(matches!(err, ModelError::ArtifactCorrupt(_)), "got {:?}", err);
    }

    #[test]
    fn test_decode_rejects_missing_scaler() {
        let mut doc: Value = serde_json::from_str(&encode(&tiny_model()).unwrap()).unwrap();
        doc["model"].as_object_mut().unwrap().remove("scaler");
        assert!(matches!(decode(&doc.to_string()), Err(ModelError::ArtifactCorrupt(_))));
    }

    #[test]
    fn test_decode_rejects_wrong_version_and_format() {
        let mut doc: Value = serde_json::from_str(&encode(&tiny_model()).unwrap()).unwrap();
        doc["version"] = serde_json::json!(99);
        assert!(matches!(decode(&doc.to_string()), Err(ModelError::ArtifactCorrupt(_))));

        let mut doc: Value = serde_json::from_str(&encode(&tiny_model()).unwrap()).unwrap();
        doc["format"] = serde_json::json!("joblib");
        assert!(matches!(decode(&doc.to_string()), Err(ModelError::ArtifactCorrupt(_))));
    }

    #[test]
    fn test_non_finite_parameters_are_detected() {
        assert!(parameters_finite(&tiny_model()));

        let mut nan_weight = tiny_model();
        nan_weight.classifier.weights[1] = f64::NAN;
        assert!(!parameters_finite(&nan_weight));

        let mut inf_mean = tiny_model();
        inf_mean.scaler.mean[0] = f64::INFINITY;
        assert!(!parameters_finite(&inf_mean));
        assert!(matches!(
            decode(&encode(&inf_mean).unwrap()),
            Err(ModelError::ArtifactCorrupt(_))
        ));
    }

    #[test]
    fn test_temp_path_is_a_sibling() {
        let tmp = temp_path(Path::new("models/flood_risk_model.json"));
        assert_eq!(tmp, PathBuf::from("models/flood_risk_model.json.tmp"));
    }
}
