/// Historical flood statistics.
///
/// `HistoricalAggregator` filters a slice of `HistoricalRecord`s down to one
/// location and a trailing window of days, then reports how often floods
/// occurred there and the mean rainfall / river level.
///
/// Location matching defaults to exact coordinate equality, which is what
/// the record store has always keyed on. A radius match can be configured
/// for stores where the same gauge is recorded with slightly different
/// coordinates; it changes which records count, so it is opt-in.
///
/// Records are only ever borrowed. Empty windows produce zeros, never NaN.

use chrono::{Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{HistoricalRecord, Location};
use crate::navigation::great_circle_km;

// ---------------------------------------------------------------------------
// Location matching
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum LocationMatch {
    /// Latitude and longitude must be bit-for-bit equal.
    #[default]
    Exact,
    /// Great-circle distance must be at most `radius_km`.
    WithinKm { radius_km: f64 },
}

impl LocationMatch {
    pub fn matches(&self, query: &Location, candidate: &Location) -> bool {
        match self {
            LocationMatch::Exact => {
                query.latitude() == candidate.latitude() && query.longitude() == candidate.longitude()
            }
            LocationMatch::WithinKm { radius_km } => great_circle_km(query, candidate) <= *radius_km,
        }
    }
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

/// Window statistics for one location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoricalStatistics {
    pub location: Location,
    pub window_days: u32,
    pub window_start: NaiveDate,
    pub as_of: NaiveDate,
    pub total_records: usize,
    pub flood_count: usize,
    /// `flood_count / total_records`, or 0 for an empty window.
    pub flood_probability: f64,
    /// Mean over records that report rainfall, or 0 if none do.
    pub average_rainfall: f64,
    /// Mean over records that report river level, or 0 if none do.
    pub average_river_level: f64,
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

// ---------------------------------------------------------------------------
// Aggregator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct HistoricalAggregator {
    matching: LocationMatch,
}

impl HistoricalAggregator {
    pub fn new(matching: LocationMatch) -> Self {
        Self { matching }
    }

    pub fn matching(&self) -> LocationMatch {
        self.matching
    }

    /// Statistics for the `window_days` days up to and including today (UTC).
    pub fn aggregate(
        &self,
        records: &[HistoricalRecord],
        location: &Location,
        window_days: u32,
    ) -> HistoricalStatistics {
        self.aggregate_as_of(records, location, window_days, Utc::now().date_naive())
    }

    /// Same as `aggregate` with an explicit "today".
    pub fn aggregate_as_of(
        &self,
        records: &[HistoricalRecord],
        location: &Location,
        window_days: u32,
        today: NaiveDate,
    ) -> HistoricalStatistics {
        let window_start = today
            .checked_sub_days(Days::new(u64::from(window_days)))
            .unwrap_or(NaiveDate::MIN);

        let in_window: Vec<&HistoricalRecord> = records
            .iter()
            .filter(|r| self.matching.matches(location, &r.location))
            .filter(|r| r.date >= window_start)
            .collect();

        let total_records = in_window.len();
        let flood_count = in_window.iter().filter(|r| r.flood_occurred).count();
        let flood_probability = if total_records == 0 {
            0.0
        } else {
            flood_count as f64 / total_records as f64
        };

        let stats = HistoricalStatistics {
            location: *location,
            window_days,
            window_start,
            as_of: today,
            total_records,
            flood_count,
            flood_probability,
            average_rainfall: mean(in_window.iter().filter_map(|r| r.rainfall)),
            average_river_level: mean(in_window.iter().filter_map(|r| r.river_level)),
        };

        debug!(
            location = %location,
            window_days,
            total_records,
            flood_count,
            "historical statistics computed"
        );
        stats
    }

    /// All records at `location`, newest first.
    pub fn location_history<'a>(
        &self,
        records: &'a [HistoricalRecord],
        location: &Location,
    ) -> Vec<&'a HistoricalRecord> {
        let mut matched: Vec<&HistoricalRecord> = records
            .iter()
            .filter(|r| self.matching.matches(location, &r.location))
            .collect();
        matched.sort_by(|a, b| b.date.cmp(&a.date));
        matched
    }
}

/// Parses a JSON array of historical records.
pub fn parse_history_json(contents: &str) -> Result<Vec<HistoricalRecord>, serde_json::Error> {
    serde_json::from_str(contents)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::{fixture_as_of, fixture_history, kuching, sibu};

    #[test]
    fn test_aggregate_kuching_thirty_day_window() {
        let stats = HistoricalAggregator::default().aggregate_as_of(
            &fixture_history(),
            &kuching(),
            30,
            fixture_as_of(),
        );

        assert_eq!(stats.total_records, 4, "the March record is outside the window");
        assert_eq!(stats.flood_count, 2);
        assert!((stats.flood_probability - 0.5).abs() < 1e-12);
        assert!((stats.average_rainfall - 25.0).abs() < 1e-12, "mean of 40, 10, 25");
        assert!((stats.average_river_level - 2.0).abs() < 1e-12, "mean of 1, 3, 2");
        assert_eq!(stats.window_start, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
    }

    #[test]
    fn test_aggregate_empty_window_is_all_zero() {
        let nowhere = Location::new(-33.86, 151.21).unwrap();
        let stats = HistoricalAggregator::default().aggregate_as_of(
            &fixture_history(),
            &nowhere,
            30,
            fixture_as_of(),
        );

        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.flood_probability, 0.0);
        assert_eq!(stats.average_rainfall, 0.0);
        assert_eq!(stats.average_river_level, 0.0);
        assert!(!stats.flood_probability.is_nan());
    }

    #[test]
    fn test_aggregate_with_no_records_at_all() {
        let stats = HistoricalAggregator::default().aggregate_as_of(&[], &kuching(), 7, fixture_as_of());
        assert_eq!(stats.total_records, 0);
        assert_eq!(stats.flood_probability, 0.0);
    }

    #[test]
    fn test_wider_window_includes_older_records() {
        let stats = HistoricalAggregator::default().aggregate_as_of(
            &fixture_history(),
            &kuching(),
            120,
            fixture_as_of(),
        );
        assert_eq!(stats.total_records, 5);
        assert_eq!(stats.flood_count, 3);
    }

    #[test]
    fn test_exact_match_ignores_nearby_coordinates() {
        let nearby = Location::new(1.5601, 110.3401).unwrap();
        let stats = HistoricalAggregator::default().aggregate_as_of(
            &fixture_history(),
            &nearby,
            30,
            fixture_as_of(),
        );
        assert_eq!(stats.total_records, 0);
    }

    #[test]
    fn test_radius_match_picks_up_nearby_coordinates_only() {
        let nearby = Location::new(1.5601, 110.3401).unwrap();
        let aggregator = HistoricalAggregator::new(LocationMatch::WithinKm { radius_km: 1.0 });
        let stats = aggregator.aggregate_as_of(&fixture_history(), &nearby, 30, fixture_as_of());
        assert_eq!(stats.total_records, 4, "Kuching records are ~15 m away");

        // Sibu is ~200 km from Kuching, well outside the radius.
        assert!(!aggregator.matching().matches(&kuching(), &sibu()));
    }

    #[test]
    fn test_aggregate_does_not_touch_records() {
        let records = fixture_history();
        let before = records.clone();
        let _ = HistoricalAggregator::default().aggregate_as_of(&records, &kuching(), 30, fixture_as_of());
        assert_eq!(records, before);
    }

    #[test]
    fn test_location_history_is_newest_first() {
        let records = fixture_history();
        let history = HistoricalAggregator::default().location_history(&records, &kuching());
        assert_eq!(history.len(), 5);
        assert!(history.windows(2).all(|w| w[0].date >= w[1].date));
    }

    #[test]
    fn test_parse_history_json_reads_upload_shape() {
        let records = parse_history_json(include_str!("../../data/sarawak_history.json"))
            .expect("bundled history file should parse");
        assert!(records.len() >= 9);
        assert!(records.iter().any(|r| r.rainfall.is_some()));
        assert!(records.iter().all(|r| r.location.latitude() > 0.0));
    }
}
