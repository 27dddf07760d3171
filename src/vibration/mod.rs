pub mod analyzer;
pub mod processor;

use serde::{Deserialize, Serialize};

pub use analyzer::RoughnessAnalyzer;
pub use processor::{
    magnitude, RawAcceleration, VibrationReading, VibrationSignalProcessor, STANDARD_GRAVITY,
};

/// Ride-quality label derived from roughness RMS. Ordered best to worst.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "camelCase")]
pub enum RoadCondition {
    Good,
    Fair,
    LightlyDamaged,
    SeverelyDamaged,
}

impl RoadCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoadCondition::Good => "good",
            RoadCondition::Fair => "fair",
            RoadCondition::LightlyDamaged => "lightly_damaged",
            RoadCondition::SeverelyDamaged => "severely_damaged",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "good" => Some(RoadCondition::Good),
            "fair" => Some(RoadCondition::Fair),
            "lightly_damaged" => Some(RoadCondition::LightlyDamaged),
            "severely_damaged" => Some(RoadCondition::SeverelyDamaged),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RoadCondition::Good => "Good",
            RoadCondition::Fair => "Fair",
            RoadCondition::LightlyDamaged => "Lightly Damaged",
            RoadCondition::SeverelyDamaged => "Severely Damaged",
        }
    }
}
