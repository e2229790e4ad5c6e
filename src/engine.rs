/// FloodRiskEngine: the orchestrator collaborators call.
///
/// `assess` runs the threshold evaluator, the risk model and (when any
/// alert fired) the safe-house navigator, and composes a `RiskAssessment`.
///
/// Shared state is the threshold table and the fitted model. Both are held
/// as `Arc` snapshots behind a lock: readers clone the `Arc` and work on a
/// frozen copy, writers build a complete replacement and swap it in. A
/// single `assess` call therefore never sees a half-updated table.

use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::alert::thresholds::{self, Alert, ThresholdTable};
use crate::analysis::history::{HistoricalAggregator, HistoricalStatistics};
use crate::config::{DEFAULT_WINDOW_DAYS, EngineConfig};
use crate::error::{EngineError, Stage};
use crate::model::{HistoricalRecord, Location, Reading, RiskLevel};
use crate::navigation::{NavigationDirective, SafeHouseNavigator};
use crate::predict::{RiskModel, TrainingData, TrainingReport};

// ---------------------------------------------------------------------------
// Assessment result
// ---------------------------------------------------------------------------

/// Everything the engine has to say about one reading at one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub location: Location,
    pub probability: f64,
    pub risk_level: RiskLevel,
    /// Violations in threshold-table order.
    pub alerts: Vec<Alert>,
    /// True iff at least one alert fired.
    pub should_navigate: bool,
    /// Present iff `should_navigate`.
    pub navigation: Option<NavigationDirective>,
    /// The model was unfitted and the neutral fallback was used.
    pub degraded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoricalStatistics>,
    pub assessed_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct FloodRiskEngine {
    thresholds: RwLock<Arc<ThresholdTable>>,
    model: RiskModel,
    navigator: SafeHouseNavigator,
    aggregator: HistoricalAggregator,
    history_window_days: u32,
}

impl FloodRiskEngine {
    /// Engine with an unfitted model and exact history matching.
    pub fn new(thresholds: ThresholdTable, safe_house: Location) -> Self {
        Self {
            thresholds: RwLock::new(Arc::new(thresholds)),
            model: RiskModel::new(),
            navigator: SafeHouseNavigator::new(safe_house),
            aggregator: HistoricalAggregator::default(),
            history_window_days: DEFAULT_WINDOW_DAYS,
        }
    }

    pub fn with_model(mut self, model: RiskModel) -> Self {
        self.model = model;
        self
    }

    pub fn with_history(mut self, aggregator: HistoricalAggregator, window_days: u32) -> Self {
        self.aggregator = aggregator;
        self.history_window_days = window_days;
        self
    }

    /// Builds an engine from configuration, loading the model artifact if
    /// one exists. A missing artifact leaves the engine degraded; a corrupt
    /// one is an error.
    pub fn from_config(config: &EngineConfig) -> Result<Self, EngineError> {
        let engine = Self::new(config.thresholds.clone(), config.safe_house).with_history(
            HistoricalAggregator::new(config.location_match),
            config.history_window_days,
        );
        let loaded = engine
            .model
            .load_if_present(&config.artifact_path)
            .map_err(|e| EngineError::new(Stage::ModelLoad, e))?;

        info!(
            thresholds = config.thresholds.len(),
            safe_house = %config.safe_house,
            model_loaded = loaded,
            "flood risk engine ready"
        );
        Ok(engine)
    }

    // -- thresholds ---------------------------------------------------------

    /// Current threshold table snapshot.
    pub fn thresholds(&self) -> Arc<ThresholdTable> {
        self.thresholds
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the whole table.
    pub fn set_thresholds(&self, table: ThresholdTable) {
        let len = table.len();
        *self.thresholds.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(table);
        info!(thresholds = len, "threshold table replaced");
    }

    /// Merges `updates` into the current table and swaps the result in.
    /// The read-merge-write happens under one write lock so concurrent
    /// updates are not lost.
    pub fn update_thresholds(&self, updates: &ThresholdTable) {
        let mut guard = self.thresholds.write().unwrap_or_else(PoisonError::into_inner);
        let merged = guard.merged(updates);
        let len = merged.len();
        *guard = Arc::new(merged);
        drop(guard);
        info!(updated = updates.len(), thresholds = len, "threshold table updated");
    }

    /// Evaluates `reading` against the current table.
    pub fn evaluate(&self, reading: &Reading) -> Vec<Alert> {
        thresholds::evaluate(reading, &self.thresholds())
    }

    // -- model --------------------------------------------------------------

    pub fn model(&self) -> &RiskModel {
        &self.model
    }

    pub fn fit(&self, data: &TrainingData) -> Result<TrainingReport, EngineError> {
        self.model
            .fit(data)
            .map_err(|e| EngineError::new(Stage::Training, e))
    }

    pub fn load_model(&self, path: &Path) -> Result<(), EngineError> {
        self.model
            .load(path)
            .map_err(|e| EngineError::new(Stage::ModelLoad, e))
    }

    pub fn safe_house(&self) -> Location {
        self.navigator.safe_house()
    }

    // -- assessment ---------------------------------------------------------

    /// Assesses one reading at one location.
    pub fn assess(&self, reading: &Reading, location: &Location) -> Result<RiskAssessment, EngineError> {
        let alerts = self.evaluate(reading);
        let prediction = self
            .model
            .predict(reading)
            .map_err(|e| EngineError::new(Stage::Prediction, e))?;

        let should_navigate = !alerts.is_empty();
        let navigation = should_navigate.then(|| NavigationDirective {
            should_navigate: true,
            ..self.navigator.route(location)
        });

        debug!(
            location = %location,
            alerts = alerts.len(),
            probability = prediction.probability,
            level = %prediction.level,
            degraded = prediction.degraded,
            "reading assessed"
        );

        Ok(RiskAssessment {
            location: *location,
            probability: prediction.probability,
            risk_level: prediction.level,
            alerts,
            should_navigate,
            navigation,
            degraded: prediction.degraded,
            history: None,
            assessed_at: Utc::now(),
        })
    }

    /// `assess` with the location's window statistics attached.
    pub fn assess_with_history(
        &self,
        reading: &Reading,
        location: &Location,
        records: &[HistoricalRecord],
    ) -> Result<RiskAssessment, EngineError> {
        let mut assessment = self.assess(reading, location)?;
        assessment.history = Some(self.historical_statistics(records, location));
        Ok(assessment)
    }

    /// Window statistics using the configured window and match policy.
    pub fn historical_statistics(
        &self,
        records: &[HistoricalRecord],
        location: &Location,
    ) -> HistoricalStatistics {
        self.aggregator
            .aggregate(records, location, self.history_window_days)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
