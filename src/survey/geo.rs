use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::GeoPoint;
use crate::settings::DistanceConfig;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// One reading from the position source.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    pub timestamp: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
    pub speed_mps: f64,
    pub accuracy_m: f64,
}

impl LocationFix {
    pub fn position(&self) -> GeoPoint {
        GeoPoint {
            lat: self.lat,
            lon: self.lon,
            altitude: self.altitude,
        }
    }
}

/// Great-circle distance in meters.
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let to_rad = |deg: f64| deg.to_radians();
    let dlat = to_rad(lat2 - lat1);
    let dlon = to_rad(lon2 - lon1);
    let a = (dlat / 2.0).sin().powi(2)
        + to_rad(lat1).cos() * to_rad(lat2).cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// What a new fix does to the distance odometer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistanceStep {
    /// First usable fix; becomes the anchor without adding distance.
    Anchored,
    /// Moved far enough; add `meters` and re-anchor.
    Moved { meters: f64 },
    /// Below the jitter floor; the anchor stays put.
    Jitter { meters: f64 },
    /// Accuracy too poor to trust.
    Inaccurate,
}

pub fn distance_step(
    anchor: Option<&LocationFix>,
    fix: &LocationFix,
    config: &DistanceConfig,
) -> DistanceStep {
    if !(fix.accuracy_m <= config.max_accuracy_m) {
        return DistanceStep::Inaccurate;
    }
    let Some(anchor) = anchor else {
        return DistanceStep::Anchored;
    };
    let meters = haversine_distance(anchor.lat, anchor.lon, fix.lat, fix.lon);
    if !meters.is_finite() || meters < config.min_step_m {
        DistanceStep::Jitter { meters }
    } else {
        DistanceStep::Moved { meters }
    }
}
