/// floodrisk_service: flood risk assessment engine for field weather devices.
///
/// # Module structure
///
/// ```text
/// floodrisk_service
/// ├── model       — shared data types (Field, Reading, Location, HistoricalRecord, RiskLevel)
/// ├── error       — ConfigError, InputError, ModelError, EngineError{stage, cause}
/// ├── config      — engine configuration loader (floodrisk.toml)
/// ├── engine      — FloodRiskEngine orchestrator and RiskAssessment
/// ├── navigation  — great-circle routing to the safe house
/// ├── daemon      — monitor loop: thread pool draining device readings
/// ├── ingest
/// │   ├── sensor  — device CSV lines / JSON envelopes → channel producer
/// │   └── fixtures (test only) — training samples and flood history
/// ├── alert
/// │   └── thresholds — per-field limit evaluation
/// ├── predict
/// │   ├── scaler     — standard scaler
/// │   ├── classifier — logistic regression + k-fold cross validation
/// │   └── artifact   — single-file model persistence
/// └── analysis
///     └── history    — windowed flood statistics per location
/// ```

/// Public modules
pub mod alert;
pub mod analysis;
pub mod config;
pub mod daemon;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod model;
pub mod navigation;
pub mod predict;
