/// Alerting for the flood risk engine.
///
/// Submodules:
/// - `thresholds` — per-field threshold table and the evaluator that turns a
///   reading into a list of violated-threshold alerts.
///
/// Delivery (push notifications, SMS, dashboards) is handled by the
/// collaborators that consume `RiskAssessment`; nothing here sends anything.

pub mod thresholds;
