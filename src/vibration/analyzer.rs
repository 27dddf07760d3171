use crate::settings::ConditionThresholds;

use super::RoadCondition;

/// Per-segment statistics over collected roughness values.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoughnessAnalyzer {
    thresholds: ConditionThresholds,
}

impl RoughnessAnalyzer {
    pub fn new(thresholds: ConditionThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> ConditionThresholds {
        self.thresholds
    }

    /// Root mean square; 0 for empty input.
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let mean_square = samples.iter().map(|s| s * s).sum::<f64>() / samples.len() as f64;
        mean_square.sqrt()
    }

    /// RMS of per-index vector magnitudes. Axes are truncated to the
    /// shortest input.
    pub fn magnitude_rms(x: &[f64], y: &[f64], z: &[f64]) -> f64 {
        let magnitudes: Vec<f64> = x
            .iter()
            .zip(y)
            .zip(z)
            .map(|((x, y), z)| (x * x + y * y + z * z).sqrt())
            .collect();
        Self::rms(&magnitudes)
    }

    /// `1 / (1 + stddev)`, in (0, 1]. 0 for empty input.
    pub fn consistency(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let n = samples.len() as f64;
        let mean = samples.iter().sum::<f64>() / n;
        let variance = samples.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        1.0 / (1.0 + variance.sqrt())
    }

    pub fn classify(&self, rms: f64) -> RoadCondition {
        let t = &self.thresholds;
        if rms < t.fair {
            RoadCondition::Good
        } else if rms < t.lightly_damaged {
            RoadCondition::Fair
        } else if rms < t.severely_damaged {
            RoadCondition::LightlyDamaged
        } else {
            RoadCondition::SeverelyDamaged
        }
    }
}
