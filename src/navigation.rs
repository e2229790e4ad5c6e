/// Safe-house routing.
///
/// Computes the great-circle distance from the current position to the
/// fixed evacuation point and packages it as a `NavigationDirective`.
/// Whether the user should actually go is the engine's call; the navigator
/// always returns `should_navigate = false` and lets the caller set it.

use serde::Serialize;

use crate::model::Location;

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometres.
///
/// Identical points give exactly 0. The intermediate term is clamped so
/// floating-point drift near antipodal points can't produce NaN.
pub fn great_circle_km(from: &Location, to: &Location) -> f64 {
    let lat1 = from.latitude().to_radians();
    let lat2 = to.latitude().to_radians();
    let dlat = (to.latitude() - from.latitude()).to_radians();
    let dlon = (to.longitude() - from.longitude()).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.clamp(0.0, 1.0).sqrt().asin();

    EARTH_RADIUS_KM * c
}

fn round_km(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// Where to go and how far it is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NavigationDirective {
    /// Distance in km, rounded to two decimal places.
    pub distance_km: f64,
    pub destination: Location,
    pub should_navigate: bool,
    /// Directions link for the alerting collaborators.
    pub maps_url: String,
}

/// Route from `current` to `safe_house`.
pub fn route(current: &Location, safe_house: &Location) -> NavigationDirective {
    NavigationDirective {
        distance_km: round_km(great_circle_km(current, safe_house)),
        destination: *safe_house,
        should_navigate: false,
        maps_url: format!(
            "https://www.google.com/maps/dir/?api=1&destination={},{}",
            safe_house.latitude(), safe_house.longitude()
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SafeHouseNavigator {
    safe_house: Location,
}

impl SafeHouseNavigator {
    pub fn new(safe_house: Location) -> Self {
        Self { safe_house }
    }

    pub fn safe_house(&self) -> Location {
        self.safe_house
    }

    pub fn route(&self, current: &Location) -> NavigationDirective {
        route(current, &self.safe_house)
    }
}
