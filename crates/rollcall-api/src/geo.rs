//! Geographic primitives

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 coordinate in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Great-circle distance in meters (haversine).
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
        EARTH_RADIUS_METERS * c
    }
}

/// A single position fix reported by the location service
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub coordinate: Coordinate,

    /// Horizontal accuracy radius in meters. Negative means the fix is invalid.
    pub horizontal_accuracy: f64,

    /// Ground speed in meters per second. Negative means unknown.
    #[serde(default = "unknown_speed")]
    pub speed: f64,
}

fn unknown_speed() -> f64 {
    -1.0
}

impl LocationSample {
    pub fn new(coordinate: Coordinate, horizontal_accuracy: f64, speed: f64) -> Self {
        Self {
            coordinate,
            horizontal_accuracy,
            speed,
        }
    }

    /// Whether this fix is precise and slow enough to place the device.
    ///
    /// Negative accuracy marks an invalid fix. Negative speed means unknown
    /// and passes.
    pub fn is_usable(&self, limits: &SampleLimits) -> bool {
        self.horizontal_accuracy >= 0.0
            && self.horizontal_accuracy <= limits.accuracy_max_meters
            && self.speed <= limits.speed_max_meters_per_second
            && self.coordinate.is_valid()
    }
}

/// Thresholds a sample must meet before it can count as "here"
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampleLimits {
    pub accuracy_max_meters: f64,
    pub speed_max_meters_per_second: f64,
}
