/// Engine configuration loader - parses floodrisk.toml
///
/// Keeps thresholds, the safe-house coordinate and the model artifact
/// location out of the code so they can be tuned per deployment without
/// recompiling.
///
/// Path resolution, first match wins:
///   1. an explicit path (CLI flag)
///   2. the `FLOODRISK_CONFIG` environment variable (`.env` is honored)
///   3. `floodrisk.toml` in the working directory
///
/// Unlike a missing model artifact, a malformed config is always an error.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::alert::thresholds::{Direction, Threshold, ThresholdTable};
use crate::analysis::history::LocationMatch;
use crate::error::ConfigError;
use crate::model::Location;

pub const CONFIG_ENV_VAR: &str = "FLOODRISK_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "floodrisk.toml";
pub const DEFAULT_ARTIFACT_PATH: &str = "models/flood_risk_model.json";
pub const DEFAULT_WINDOW_DAYS: u32 = 30;

/// Kuching evacuation centre.
pub const DEFAULT_SAFE_HOUSE: Location = match Location::checked(1.5304, 110.3442) {
    Some(location) => location,
    None => panic!("default safe house coordinates are out of range"),
};

// ---------------------------------------------------------------------------
// TOML shape
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SafeHouseConfig {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_artifact_path")]
    pub artifact_path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_window_days")]
    pub window_days: u32,
    /// Absent means exact coordinate matching.
    pub match_radius_km: Option<f64>,
}

/// One `[[threshold]]` entry. `direction` falls back to the field default.
#[derive(Debug, Clone, Deserialize)]
pub struct ThresholdConfig {
    pub field: String,
    pub direction: Option<Direction>,
    pub limit: f64,
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    safe_house: Option<SafeHouseConfig>,
    model: Option<ModelConfig>,
    history: Option<HistoryConfig>,
    #[serde(default, rename = "threshold")]
    thresholds: Option<Vec<ThresholdConfig>>,
}

fn default_artifact_path() -> PathBuf {
    PathBuf::from(DEFAULT_ARTIFACT_PATH)
}

fn default_window_days() -> u32 {
    DEFAULT_WINDOW_DAYS
}

// ---------------------------------------------------------------------------
// Validated configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub safe_house: Location,
    pub thresholds: ThresholdTable,
    pub artifact_path: PathBuf,
    pub history_window_days: u32,
    pub location_match: LocationMatch,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            safe_house: DEFAULT_SAFE_HOUSE,
            thresholds: ThresholdTable::storm_defaults(),
            artifact_path: default_artifact_path(),
            history_window_days: DEFAULT_WINDOW_DAYS,
            location_match: LocationMatch::Exact,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a TOML document. Sections that are left out
    /// keep their defaults; a `[[threshold]]` list, when present, replaces
    /// the default table entirely.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(contents)?;
        let mut config = EngineConfig::default();

        if let Some(sh) = raw.safe_house {
            config.safe_house = Location::new(sh.latitude, sh.longitude).map_err(|source| {
                ConfigError::InvalidLocation {
                    what: "safe house",
                    source,
                }
            })?;
        }

        if let Some(model) = raw.model {
            config.artifact_path = model.artifact_path;
        }

        if let Some(history) = raw.history {
            config.history_window_days = history.window_days;
            config.location_match = match history.match_radius_km {
                None => LocationMatch::Exact,
                Some(r) if r.is_finite() && r >= 0.0 => LocationMatch::WithinKm { radius_km: r },
                Some(r) => return Err(ConfigError::InvalidRadius(r)),
            };
        }

        if let Some(entries) = raw.thresholds {
            config.thresholds = threshold_table(&entries)?;
        }

        Ok(config)
    }

    /// Reads and parses the config file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    /// Loads from the resolved path (see module docs).
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load(&resolve_path(explicit))
    }
}

/// Builds a validated table from config entries, keeping file order.
pub fn threshold_table(entries: &[ThresholdConfig]) -> Result<ThresholdTable, ConfigError> {
    let thresholds = entries
        .iter()
        .map(|e| match e.direction {
            Some(direction) => Threshold::new(e.field.clone(), direction, e.limit),
            None => Threshold::with_default_direction(e.field.clone(), e.limit),
        })
        .collect::<Result<Vec<_>, _>>()?;
    ThresholdTable::new(thresholds)
}

/// Resolves which config file to read.
pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    dotenv::dotenv().ok();
    env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Field;

    const SAMPLE: &str = r#"
        [safe_house]
        latitude = 2.3421
        longitude = 111.8434

        [model]
        artifact_path = "var/model.json"

        [history]
        window_days = 14
        match_radius_km = 2.5

        [[threshold]]
        field = "Pre"
        limit = 29.7

        [[threshold]]
        field = "humidity"
        direction = "above"
        limit = 80.0
    "#;

    #[test]
    fn test_load_bundled_config_succeeds() {
        let config = EngineConfig::load(Path::new(DEFAULT_CONFIG_PATH))
            .expect("floodrisk.toml at the crate root should parse");
        assert!(config.thresholds.len() >= 4, "should configure at least four thresholds");
        assert_eq!(config.safe_house, DEFAULT_SAFE_HOUSE);
    }

    #[test]
    fn test_from_toml_str_reads_every_section() {
        let config = EngineConfig::from_toml_str(SAMPLE).expect("sample should parse");

        assert_eq!(config.safe_house.longitude(), 111.8434);
        assert_eq!(config.artifact_path, PathBuf::from("var/model.json"));
        assert_eq!(config.history_window_days, 14);
        assert_eq!(config.location_match, LocationMatch::WithinKm { radius_km: 2.5 });

        let fields: Vec<_> = config.thresholds.iter().map(|t| t.field).collect();
        assert_eq!(fields, vec![Field::Pressure, Field::Humidity], "file order is kept");
        let pre = config.thresholds.get(Field::Pressure).unwrap();
        assert_eq!(pre.key, "Pre");
        assert_eq!(pre.direction, Direction::Below, "pressure defaults to below");
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_unknown_threshold_field_fails_loudly() {
        let err = EngineConfig::from_toml_str("[[threshold]]\nfield = \"dew_point\"\nlimit = 3.0\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownField(ref f) if f == "dew_point"));
    }

    #[test]
    fn test_duplicate_threshold_field_fails_loudly() {
        let doc = "[[threshold]]\nfield = \"pressure\"\nlimit = 1000.0\n\n\
                   [[threshold]]\nfield = \"Pre\"\nlimit = 990.0\n";
        assert!(matches!(
            EngineConfig::from_toml_str(doc),
            Err(ConfigError::DuplicateField(_))
        ));
    }

    #[test]
    fn test_bad_direction_is_a_parse_error() {
        let doc = "[[threshold]]\nfield = \"humidity\"\ndirection = \"sideways\"\nlimit = 80.0\n";
        assert!(matches!(EngineConfig::from_toml_str(doc), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_out_of_range_safe_house_is_rejected() {
        let doc = "[safe_house]\nlatitude = 123.0\nlongitude = 0.0\n";
        assert!(matches!(
            EngineConfig::from_toml_str(doc),
            Err(ConfigError::InvalidLocation { what: "safe house", .. })
        ));
    }

    #[test]
    fn test_default_safe_house_is_a_validated_location() {
        let expected = Location::new(1.5304, 110.3442).unwrap();
        assert_eq!(DEFAULT_SAFE_HOUSE, expected);
        assert_eq!(EngineConfig::default().safe_house, expected);
    }

    #[test]
    fn test_negative_radius_is_rejected() {
        let doc = "[history]\nmatch_radius_km = -1.0\n";
        assert!(matches!(EngineConfig::from_toml_str(doc), Err(ConfigError::InvalidRadius(_))));
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = EngineConfig::load(Path::new("does/not/exist.toml")).unwrap_err();
        assert!(err.to_string().contains("does/not/exist.toml"), "got: {}", err);
    }

    #[test]
    fn test_explicit_path_wins_resolution() {
        let explicit = Path::new("custom.toml");
        assert_eq!(resolve_path(Some(explicit)), PathBuf::from("custom.toml"));
    }
}
