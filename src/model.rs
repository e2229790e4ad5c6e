/// Field, Reading, Location, HistoricalRecord, RiskLevel
/// core data structures shared by every stage of the engine
///
/// Core data types for the flood risk engine.
///
/// This module defines the shared domain model imported by all other modules.
/// Validation lives on the constructors so that a `Reading` or `Location`
/// that exists is always well formed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::InputError;

// ---------------------------------------------------------------------------
// Measurement fields
// ---------------------------------------------------------------------------

/// A named measurement a device or weather source can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Temperature,
    Humidity,
    WindSpeed,
    Pressure,
    SoilMoisture,
    Rainfall,
    WaterLevel,
}

impl Field {
    pub const ALL: [Field; 7] = [
        Field::Temperature,
        Field::Humidity,
        Field::WindSpeed,
        Field::Pressure,
        Field::SoilMoisture,
        Field::Rainfall,
        Field::WaterLevel,
    ];

    /// Fields every ingested reading must carry.
    pub const CORE: [Field; 4] = [
        Field::Temperature,
        Field::Humidity,
        Field::WindSpeed,
        Field::Pressure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::WindSpeed => "wind_speed",
            Field::Pressure => "pressure",
            Field::SoilMoisture => "soil_moisture",
            Field::Rainfall => "rainfall",
            Field::WaterLevel => "water_level",
        }
    }

    /// Threshold direction used when a config entry doesn't name one.
    /// Low barometric pressure signals storms; every other field is
    /// dangerous when it climbs.
    pub fn default_direction(&self) -> crate::alert::thresholds::Direction {
        use crate::alert::thresholds::Direction;
        match self {
            Field::Pressure => Direction::Below,
            _ => Direction::Above,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = InputError;

    /// Accepts canonical names plus the spreadsheet column labels the
    /// device firmware and training sheets use ("Pre", "Humidity (%)", ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "temperature" | "Temperature" | "Temperature (°F)" | "temp" => Ok(Field::Temperature),
            "humidity" | "Humidity" | "Humidity (%)" => Ok(Field::Humidity),
            "wind_speed" | "Wind Speed" | "Wind Speed (mph)" => Ok(Field::WindSpeed),
            "pressure" | "Pressure" | "Pre" | "pre" => Ok(Field::Pressure),
            "soil_moisture" => Ok(Field::SoilMoisture),
            "rainfall" => Ok(Field::Rainfall),
            "water_level" => Ok(Field::WaterLevel),
            other => Err(InputError::UnknownField(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Readings
// ---------------------------------------------------------------------------

/// One timestamped set of environmental measurements.
///
/// Built either through the strict `from_json` constructor (ingest path) or
/// the `with` builder (programmatic / test path). Values are immutable once
/// the reading is handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub captured_at: DateTime<Utc>,
    values: BTreeMap<Field, f64>,
}

impl Reading {
    /// An empty reading stamped with the current time.
    pub fn new() -> Self {
        Self {
            captured_at: Utc::now(),
            values: BTreeMap::new(),
        }
    }

    /// Builder: sets one field. Later calls for the same field win.
    pub fn with(mut self, field: Field, value: f64) -> Self {
        self.values.insert(field, value);
        self
    }

    pub fn with_captured_at(mut self, at: DateTime<Utc>) -> Self {
        self.captured_at = at;
        self
    }

    pub fn get(&self, field: Field) -> Option<f64> {
        self.values.get(&field).copied()
    }

    pub fn contains(&self, field: Field) -> bool {
        self.values.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Strict extraction from an untyped JSON object.
    ///
    /// Every key must name a known field, every value must be a finite
    /// number, and the four core fields must be present. `null` is accepted
    /// for optional fields and treated as absent.
    pub fn from_json(value: &Value) -> Result<Self, InputError> {
        let object = value.as_object().ok_or(InputError::NotAnObject)?;
        let mut reading = Reading::new();

        for (key, raw) in object {
            let field: Field = key.parse()?;
            match raw {
                Value::Null if !Field::CORE.contains(&field) => continue,
                Value::Number(n) => {
                    let v = n.as_f64().ok_or_else(|| InputError::NotNumeric(key.clone()))?;
                    if !v.is_finite() {
                        return Err(InputError::NonFinite { field: key.clone(), value: v });
                    }
                    reading.values.insert(field, v);
                }
                _ => return Err(InputError::NotNumeric(key.clone())),
            }
        }

        for field in Field::CORE {
            if !reading.contains(field) {
                return Err(InputError::MissingField(field.as_str()));
            }
        }

        Ok(reading)
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize)]
struct RawLocation {
    latitude: f64,
    longitude: f64,
}

impl TryFrom<RawLocation> for Location {
    type Error = InputError;

    fn try_from(raw: RawLocation) -> Result<Self, Self::Error> {
        Location::new(raw.latitude, raw.longitude)
    }
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, InputError> {
        Self::checked(latitude, longitude).ok_or(InputError::InvalidLocation {
            latitude,
            longitude,
        })
    }

    /// Range-checked constructor usable in constants. NaN fails every
    /// comparison, so non-finite coordinates are rejected too.
    pub const fn checked(latitude: f64, longitude: f64) -> Option<Self> {
        if latitude >= -90.0 && latitude <= 90.0 && longitude >= -180.0 && longitude <= 180.0 {
            Some(Self { latitude, longitude })
        } else {
            None
        }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

// ---------------------------------------------------------------------------
// Historical records
// ---------------------------------------------------------------------------

/// A past observation at a location: rainfall, river level, and whether a
/// flood occurred. Records are append-only; nothing in the engine mutates
/// them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoricalRecord {
    pub location: Location,
    pub date: NaiveDate,
    #[serde(default)]
    pub rainfall: Option<f64>,
    #[serde(default)]
    pub river_level: Option<f64>,
    pub flood_occurred: bool,
    #[serde(default)]
    pub weather_conditions: serde_json::Map<String, Value>,
    #[serde(default)]
    pub affected_areas: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

// ---------------------------------------------------------------------------
// Risk levels
// ---------------------------------------------------------------------------

/// Upper bound (exclusive) of the low band.
pub const LOW_RISK_UPPER: f64 = 0.3;
/// Upper bound (exclusive) of the medium band.
pub const MEDIUM_RISK_UPPER: f64 = 0.6;

/// Discretized flood probability band.
///
/// `p < 0.3` is low, `0.3 <= p < 0.6` is medium, `p >= 0.6` is high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_probability(probability: f64) -> Self {
        if probability < LOW_RISK_UPPER {
            RiskLevel::Low
        } else if probability < MEDIUM_RISK_UPPER {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "low"),
            RiskLevel::Medium => write!(f, "medium"),
            RiskLevel::High => write!(f, "high"),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
