/// Data analysis for the flood risk engine.
///
/// Submodules:
/// - `history` — location/window statistics over historical flood records.
///
/// Reporting collaborators call into `history` directly for analytics
/// views; the engine uses it to attach context to an assessment.

pub mod history;
