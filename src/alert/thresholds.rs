//! Threshold evaluation.
//!
//! A `ThresholdTable` is an ordered list of per-field limits. `evaluate`
//! walks the table in insertion order and emits one `Alert` for every field
//! that is present in the reading and on the wrong side of its limit.
//! Fields missing from the reading are skipped, not errors.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::model::{Field, Reading};

/// Which side of the limit is dangerous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Must not exceed: alert when `value > limit`.
    Above,
    /// Must not fall below: alert when `value < limit`.
    Below,
}

impl Direction {
    pub fn is_violated(&self, value: f64, limit: f64) -> bool {
        match self {
            Direction::Above => value > limit,
            Direction::Below => value < limit,
        }
    }

    fn symbol(&self) -> &'static str {
        match self {
            Direction::Above => ">",
            Direction::Below => "<",
        }
    }

    fn word(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.word())
    }
}

/// One configured limit. `key` is the name exactly as configured (e.g.
/// `"Pre"`), `field` is what it resolves to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Threshold {
    pub key: String,
    pub field: Field,
    pub direction: Direction,
    pub limit: f64,
}

impl Threshold {
    pub fn new(key: impl Into<String>, direction: Direction, limit: f64) -> Result<Self, ConfigError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(ConfigError::EmptyKey);
        }
        let field: Field = key
            .parse()
            .map_err(|_| ConfigError::UnknownField(key.clone()))?;
        if !limit.is_finite() {
            return Err(ConfigError::InvalidLimit { key, limit });
        }
        Ok(Self {
            key,
            field,
            direction,
            limit,
        })
    }

    /// Like `new`, using the field's conventional direction.
    pub fn with_default_direction(key: impl Into<String>, limit: f64) -> Result<Self, ConfigError> {
        let key = key.into();
        let direction = key
            .parse::<Field>()
            .map(|f| f.default_direction())
            .map_err(|_| ConfigError::UnknownField(key.clone()))?;
        Self::new(key, direction, limit)
    }
}

/// Ordered, validated set of thresholds. At most one entry per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ThresholdTable {
    entries: Vec<Threshold>,
}

impl ThresholdTable {
    pub fn new(entries: Vec<Threshold>) -> Result<Self, ConfigError> {
        for (i, entry) in entries.iter().enumerate() {
            if entries[..i].iter().any(|prev| prev.field == entry.field) {
                return Err(ConfigError::DuplicateField(entry.field.to_string()));
            }
        }
        Ok(Self { entries })
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Storm limits used when no configuration is supplied.
    pub fn storm_defaults() -> Self {
        let entry = |key: &str, field, direction, limit| Threshold {
            key: key.to_string(),
            field,
            direction,
            limit,
        };
        Self {
            entries: vec![
                entry("temperature", Field::Temperature, Direction::Above, 90.0),
                entry("humidity", Field::Humidity, Direction::Above, 80.0),
                entry("wind_speed", Field::WindSpeed, Direction::Above, 20.0),
                entry("pressure", Field::Pressure, Direction::Below, 1000.0),
            ],
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Threshold> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, field: Field) -> Option<&Threshold> {
        self.entries.iter().find(|t| t.field == field)
    }

    /// Returns a new table with `updates` applied: entries for fields that
    /// already exist are replaced in place, new fields are appended.
    pub fn merged(&self, updates: &ThresholdTable) -> ThresholdTable {
        let mut entries = self.entries.clone();
        for update in &updates.entries {
            match entries.iter_mut().find(|t| t.field == update.field) {
                Some(existing) => *existing = update.clone(),
                None => entries.push(update.clone()),
            }
        }
        ThresholdTable { entries }
    }
}

/// A violated threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub key: String,
    pub field: Field,
    pub direction: Direction,
    pub limit: f64,
    pub value: f64,
    pub message: String,
}

/// Compares `reading` against every threshold, in table order.
pub fn evaluate(reading: &Reading, thresholds: &ThresholdTable) -> Vec<Alert> {
    thresholds
        .iter()
        .filter_map(|t| {
            let value = reading.get(t.field)?;
            if !t.direction.is_violated(value, t.limit) {
                return None;
            }
            Some(Alert {
                key: t.key.clone(),
                field: t.field,
                direction: t.direction,
                limit: t.limit,
                value,
                message: format!(
                    "{} {} threshold: {} {} {}",
                    t.key,
                    t.direction.word(),
                    value,
                    t.direction.symbol(),
                    t.limit
                ),
            })
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
