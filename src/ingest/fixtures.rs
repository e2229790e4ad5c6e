/// the training/history fixture data, cfg(test) gated
///
/// Test fixtures: representative payloads handed to the engine by its
/// collaborators.
///
/// - Training samples mirror the spreadsheet export the model is trained
///   from: the four core weather columns plus a `flood_occurred` label.
///   Flood rows are humid, windy and low-pressure; calm rows are not, so a
///   correctly trained model separates them cleanly.
/// - Historical records follow the flood-record upload shape: a location
///   object, an ISO date, optional rainfall / river level, and the label.

use chrono::NaiveDate;

use crate::model::{HistoricalRecord, Location, Reading};

/// Twenty labeled readings, alternating flood / no flood.
pub(crate) fn fixture_training_json() -> &'static str {
    include_str!("../../data/training_sample.json")
}

/// `fixture_training_json` parsed into (reading, label) pairs.
pub(crate) fn training_samples() -> Vec<(Reading, bool)> {
    let doc: serde_json::Value =
        serde_json::from_str(fixture_training_json()).expect("fixture JSON is valid");
    doc.as_array()
        .expect("fixture is an array")
        .iter()
        .map(|item| {
            let mut object = item.as_object().expect("sample is an object").clone();
            let label = object
                .remove("flood_occurred")
                .and_then(|v| v.as_bool())
                .expect("sample has a label");
            let reading = Reading::from_json(&serde_json::Value::Object(object))
                .expect("sample has every core field");
            (reading, label)
        })
        .collect()
}

/// Kuching gauge location used by the history fixtures.
pub(crate) fn kuching() -> Location {
    Location::new(1.56, 110.34).expect("valid coordinates")
}

/// Sibu gauge location used by the history fixtures.
pub(crate) fn sibu() -> Location {
    Location::new(2.30, 111.83).expect("valid coordinates")
}

fn record(
    location: Location,
    date: (i32, u32, u32),
    rainfall: Option<f64>,
    river_level: Option<f64>,
    flood_occurred: bool,
) -> HistoricalRecord {
    HistoricalRecord {
        location,
        date: NaiveDate::from_ymd_opt(date.0, date.1, date.2).expect("valid fixture date"),
        rainfall,
        river_level,
        flood_occurred,
        weather_conditions: serde_json::Map::new(),
        affected_areas: None,
        comments: None,
    }
}

/// Mixed history for Kuching and Sibu. Relative to an "as of" date of
/// 2024-05-31 with a 30-day window, Kuching has four records in window
/// (two floods) and one older record; Sibu has one record in window.
pub(crate) fn fixture_history() -> Vec<HistoricalRecord> {
    vec![
        record(kuching(), (2024, 5, 2), Some(40.0), Some(1.0), true),
        record(kuching(), (2024, 5, 10), Some(10.0), None, false),
        record(kuching(), (2024, 5, 20), None, Some(3.0), true),
        record(kuching(), (2024, 5, 31), Some(25.0), Some(2.0), false),
        record(kuching(), (2024, 3, 1), Some(120.0), Some(4.5), true),
        record(sibu(), (2024, 5, 15), Some(70.0), Some(0.8), true),
    ]
}

/// The "as of" date the history fixture is designed around.
pub(crate) fn fixture_as_of() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 31).expect("valid date")
}
