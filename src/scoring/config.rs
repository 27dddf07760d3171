/// Weights for the four confidence factors. They sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceWeights {
    pub gps_availability: f64,
    pub gps_accuracy: f64,
    pub roughness_consistency: f64,
    pub speed: f64,
}

impl ConfidenceWeights {
    pub fn sum(&self) -> f64 {
        self.gps_availability + self.gps_accuracy + self.roughness_consistency + self.speed
    }
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            gps_availability: 0.35,
            gps_accuracy: 0.30,
            roughness_consistency: 0.20,
            speed: 0.15,
        }
    }
}

/// Score bands for the qualitative confidence level.
pub const HIGH_CONFIDENCE_MIN: u8 = 70;
pub const MEDIUM_CONFIDENCE_MIN: u8 = 45;

/// Speed band (km/h) that earns full marks.
pub const IDEAL_SPEED_MIN_KMH: f64 = 10.0;
pub const IDEAL_SPEED_MAX_KMH: f64 = 70.0;
/// Below this the vehicle is considered stationary.
pub const MOVING_SPEED_MIN_KMH: f64 = 5.0;

/// Sub-scores below this raise an advisory.
pub const ADVISORY_SUBSCORE: u8 = 60;
