use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::GeoPoint;

/// One location fix enriched with the motion state at capture time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub position: GeoPoint,
    pub speed_mps: f64,
    /// Gravity-removed acceleration in g.
    pub accel_x: f64,
    pub accel_y: f64,
    pub accel_z: f64,
    pub gps_accuracy_m: f64,
    /// Session distance when the sample was captured.
    pub distance_m: f64,
}
