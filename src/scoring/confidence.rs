use std::fmt;

use serde::{Deserialize, Serialize};

use super::config::{
    ConfidenceWeights, ADVISORY_SUBSCORE, HIGH_CONFIDENCE_MIN, IDEAL_SPEED_MAX_KMH,
    IDEAL_SPEED_MIN_KMH, MEDIUM_CONFIDENCE_MIN, MOVING_SPEED_MIN_KMH,
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

impl ConfidenceLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= HIGH_CONFIDENCE_MIN {
            ConfidenceLevel::High
        } else if score >= MEDIUM_CONFIDENCE_MIN {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

/// Non-fatal diagnostics explaining a confidence score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ConfidenceAdvice {
    GpsUnavailable,
    LowGpsAccuracy { accuracy_m: f64 },
    InconsistentRoughness { consistency: f64 },
    VehicleTooSlow { speed_kmh: f64 },
    VehicleTooFast { speed_kmh: f64 },
    GoodData,
}

impl fmt::Display for ConfidenceAdvice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfidenceAdvice::GpsUnavailable => {
                write!(f, "GPS signal unavailable; distances may be unreliable")
            }
            ConfidenceAdvice::LowGpsAccuracy { accuracy_m } => {
                write!(f, "Low GPS accuracy ({accuracy_m:.1} m)")
            }
            ConfidenceAdvice::InconsistentRoughness { consistency } => write!(
                f,
                "Vibration readings are inconsistent (consistency {consistency:.2})"
            ),
            ConfidenceAdvice::VehicleTooSlow { speed_kmh } => write!(
                f,
                "Vehicle too slow ({speed_kmh:.0} km/h); keep between {IDEAL_SPEED_MIN_KMH:.0} and {IDEAL_SPEED_MAX_KMH:.0} km/h"
            ),
            ConfidenceAdvice::VehicleTooFast { speed_kmh } => write!(
                f,
                "Vehicle too fast ({speed_kmh:.0} km/h); keep between {IDEAL_SPEED_MIN_KMH:.0} and {IDEAL_SPEED_MAX_KMH:.0} km/h"
            ),
            ConfidenceAdvice::GoodData => write!(f, "Data quality is good"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceBreakdown {
    pub gps_availability: u8,
    pub gps_accuracy: u8,
    pub roughness_consistency: u8,
    pub speed: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConfidenceReport {
    pub score: u8,
    pub level: ConfidenceLevel,
    pub breakdown: ConfidenceBreakdown,
    pub advisories: Vec<ConfidenceAdvice>,
}

impl ConfidenceReport {
    pub fn messages(&self) -> Vec<String> {
        self.advisories.iter().map(ToString::to_string).collect()
    }
}

/// Inputs collected over a segment (or the latest fix).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceInputs {
    pub gps_available: bool,
    pub gps_accuracy_m: f64,
    pub roughness_consistency: f64,
    pub speed_mps: f64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> ConfidenceWeights {
        self.weights
    }

    pub fn score(&self, inputs: ConfidenceInputs) -> ConfidenceReport {
        let speed_kmh = inputs.speed_mps * 3.6;
        let breakdown = ConfidenceBreakdown {
            gps_availability: score_availability(inputs.gps_available),
            gps_accuracy: score_accuracy(inputs.gps_accuracy_m),
            roughness_consistency: score_consistency(inputs.roughness_consistency),
            speed: score_speed(speed_kmh),
        };

        let w = &self.weights;
        let weighted = w.gps_availability * f64::from(breakdown.gps_availability)
            + w.gps_accuracy * f64::from(breakdown.gps_accuracy)
            + w.roughness_consistency * f64::from(breakdown.roughness_consistency)
            + w.speed * f64::from(breakdown.speed);
        // float noise
        let score = (weighted + 1e-9).trunc().clamp(0.0, 100.0) as u8;

        let mut advisories = Vec::new();
        if breakdown.gps_availability == 0 {
            advisories.push(ConfidenceAdvice::GpsUnavailable);
        }
        if breakdown.gps_accuracy < ADVISORY_SUBSCORE {
            advisories.push(ConfidenceAdvice::LowGpsAccuracy {
                accuracy_m: inputs.gps_accuracy_m,
            });
        }
        if breakdown.roughness_consistency < ADVISORY_SUBSCORE {
            advisories.push(ConfidenceAdvice::InconsistentRoughness {
                consistency: inputs.roughness_consistency,
            });
        }
        if speed_kmh < IDEAL_SPEED_MIN_KMH {
            advisories.push(ConfidenceAdvice::VehicleTooSlow { speed_kmh });
        } else if speed_kmh > IDEAL_SPEED_MAX_KMH {
            advisories.push(ConfidenceAdvice::VehicleTooFast { speed_kmh });
        }
        if advisories.is_empty() {
            advisories.push(ConfidenceAdvice::GoodData);
        }

        ConfidenceReport {
            score,
            level: ConfidenceLevel::from_score(score),
            breakdown,
            advisories,
        }
    }
}

fn score_availability(available: bool) -> u8 {
    if available {
        100
    } else {
        0
    }
}

fn score_accuracy(accuracy_m: f64) -> u8 {
    match accuracy_m {
        a if a <= 5.0 => 100,
        a if a <= 10.0 => 80,
        a if a <= 15.0 => 60,
        a if a <= 20.0 => 40,
        a if a <= 30.0 => 20,
        // also NaN
        _ => 0,
    }
}

fn score_consistency(consistency: f64) -> u8 {
    match consistency {
        c if c > 0.8 => 100,
        c if c > 0.6 => 80,
        c if c > 0.4 => 60,
        c if c > 0.2 => 40,
        _ => 20,
    }
}

fn score_speed(speed_kmh: f64) -> u8 {
    if (IDEAL_SPEED_MIN_KMH..=IDEAL_SPEED_MAX_KMH).contains(&speed_kmh) {
        100
    } else if speed_kmh > MOVING_SPEED_MIN_KMH {
        60
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ideal() -> ConfidenceInputs {
        ConfidenceInputs {
            gps_available: true,
            gps_accuracy_m: 3.0,
            roughness_consistency: 0.95,
            speed_mps: 40.0 / 3.6,
        }
    }

    #[test]
    fn test_weights_sum_to_one() {
        assert!((ConfidenceWeights::default().sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_ideal_inputs_score_full_marks() {
        let report = ConfidenceScorer::default().score(ideal());
        assert_eq!(report.score, 100);
        assert_eq!(report.level, ConfidenceLevel::High);
        assert_eq!(report.advisories, vec![ConfidenceAdvice::GoodData]);
    }

    #[test]
    fn test_accuracy_steps() {
        assert_eq!(score_accuracy(5.0), 100);
        assert_eq!(score_accuracy(5.1), 80);
        assert_eq!(score_accuracy(10.0), 80);
        assert_eq!(score_accuracy(15.0), 60);
        assert_eq!(score_accuracy(20.0), 40);
        assert_eq!(score_accuracy(30.0), 20);
        assert_eq!(score_accuracy(30.5), 0);
        assert_eq!(score_accuracy(f64::NAN), 0);
    }

    #[test]
    fn test_consistency_steps() {
        assert_eq!(score_consistency(0.81), 100);
        assert_eq!(score_consistency(0.8), 80);
        assert_eq!(score_consistency(0.5), 60);
        assert_eq!(score_consistency(0.3), 40);
        assert_eq!(score_consistency(0.2), 20);
        assert_eq!(score_consistency(0.0), 20);
    }

    #[test]
    fn test_speed_band() {
        assert_eq!(score_speed(10.0), 100);
        assert_eq!(score_speed(70.0), 100);
        assert_eq!(score_speed(8.0), 60);
        assert_eq!(score_speed(90.0), 60);
        assert_eq!(score_speed(5.0), 0);
        assert_eq!(score_speed(0.0), 0);
    }

    #[test]
    fn test_weighted_score_truncates() {
        // 35 + 0.30*80 + 0.20*60 + 0.15*60 = 35 + 24 + 12 + 9 = 80
        let report = ConfidenceScorer::default().score(ConfidenceInputs {
            gps_available: true,
            gps_accuracy_m: 8.0,
            roughness_consistency: 0.5,
            speed_mps: 80.0 / 3.6,
        });
        assert_eq!(report.score, 80);
        assert_eq!(
            report.advisories,
            vec![ConfidenceAdvice::VehicleTooFast {
                speed_kmh: 80.0 / 3.6 * 3.6
            }]
        );
    }

    #[test]
    fn test_no_gps_is_low_confidence_with_multiple_advisories() {
        let report = ConfidenceScorer::default().score(ConfidenceInputs {
            gps_available: false,
            gps_accuracy_m: 50.0,
            roughness_consistency: 0.1,
            speed_mps: 0.0,
        });
        // 0 + 0 + 0.20*20 + 0 = 4
        assert_eq!(report.score, 4);
        assert_eq!(report.level, ConfidenceLevel::Low);
        assert_eq!(report.advisories.len(), 4);
        assert!(report.advisories.contains(&ConfidenceAdvice::GpsUnavailable));
        assert!(!report.advisories.contains(&ConfidenceAdvice::GoodData));
        assert_eq!(report.messages().len(), 4);
    }

    #[test]
    fn test_medium_band() {
        assert_eq!(ConfidenceLevel::from_score(69), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(45), ConfidenceLevel::Medium);
        assert_eq!(ConfidenceLevel::from_score(44), ConfidenceLevel::Low);
    }

    #[test]
    fn test_score_always_in_range() {
        let scorer = ConfidenceScorer::default();
        for available in [false, true] {
            for accuracy in [0.0, 7.0, 12.0, 18.0, 25.0, 100.0] {
                for consistency in [0.0, 0.3, 0.5, 0.7, 1.0] {
                    for speed in [0.0, 2.0, 5.0, 20.0, 30.0] {
                        let report = scorer.score(ConfidenceInputs {
                            gps_available: available,
                            gps_accuracy_m: accuracy,
                            roughness_consistency: consistency,
                            speed_mps: speed,
                        });
                        assert!(report.score <= 100);
                        assert!(!report.advisories.is_empty());
                    }
                }
            }
        }
    }
}
