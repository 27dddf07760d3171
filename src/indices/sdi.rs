//! Surface Distress Index: weighted scoring of distress observations over a
//! fixed-length segment. Higher scores mean more distress.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use super::Severity;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum SdiDistressType {
    Crack,
    Spalling,
    Pothole,
    Rutting,
    Patching,
    Raveling,
    Depression,
}

impl SdiDistressType {
    pub const ALL: [SdiDistressType; 7] = [
        SdiDistressType::Crack,
        SdiDistressType::Spalling,
        SdiDistressType::Pothole,
        SdiDistressType::Rutting,
        SdiDistressType::Patching,
        SdiDistressType::Raveling,
        SdiDistressType::Depression,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SdiDistressType::Crack => "crack",
            SdiDistressType::Spalling => "spalling",
            SdiDistressType::Pothole => "pothole",
            SdiDistressType::Rutting => "rutting",
            SdiDistressType::Patching => "patching",
            SdiDistressType::Raveling => "raveling",
            SdiDistressType::Depression => "depression",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SdiDistressItem {
    pub distress_type: SdiDistressType,
    pub severity: Severity,
    /// Affected length along the segment, in meters.
    pub extent_m: f64,
}

impl SdiDistressItem {
    pub fn new(distress_type: SdiDistressType, severity: Severity, extent_m: f64) -> Self {
        Self {
            distress_type,
            severity,
            extent_m,
        }
    }
}

/// Weight tables. Kept as data so a survey authority can ship its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SdiWeights {
    pub types: Vec<(SdiDistressType, f64)>,
    pub severities: Vec<(Severity, f64)>,
}

impl Default for SdiWeights {
    fn default() -> Self {
        Self {
            types: vec![
                (SdiDistressType::Crack, 1.0),
                (SdiDistressType::Spalling, 2.0),
                (SdiDistressType::Pothole, 3.0),
                (SdiDistressType::Rutting, 2.0),
                (SdiDistressType::Patching, 1.0),
                (SdiDistressType::Raveling, 1.0),
                (SdiDistressType::Depression, 2.0),
            ],
            severities: vec![
                (Severity::Low, 1.0),
                (Severity::Medium, 2.0),
                (Severity::High, 3.0),
            ],
        }
    }
}

impl SdiWeights {
    pub fn type_weight(&self, distress_type: SdiDistressType) -> Result<f64> {
        self.types
            .iter()
            .find(|(t, _)| *t == distress_type)
            .map(|(_, w)| *w)
            .ok_or_else(|| anyhow!("no SDI weight for distress type {}", distress_type.as_str()))
    }

    pub fn severity_weight(&self, severity: Severity) -> Result<f64> {
        self.severities
            .iter()
            .find(|(s, _)| *s == severity)
            .map(|(_, w)| *w)
            .ok_or_else(|| anyhow!("no SDI weight for severity {}", severity.as_str()))
    }

    /// Errors on the first catalog entry without a weight.
    pub fn check_complete(&self) -> Result<()> {
        for distress_type in SdiDistressType::ALL {
            self.type_weight(distress_type)?;
        }
        for severity in Severity::ALL {
            self.severity_weight(severity)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub enum SdiCategory {
    VeryGood,
    Good,
    Fair,
    Poor,
    SeverelyDamaged,
}

impl SdiCategory {
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=20 => SdiCategory::VeryGood,
            21..=40 => SdiCategory::Good,
            41..=60 => SdiCategory::Fair,
            61..=80 => SdiCategory::Poor,
            _ => SdiCategory::SeverelyDamaged,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SdiCategory::VeryGood => "Very Good",
            SdiCategory::Good => "Good",
            SdiCategory::Fair => "Fair",
            SdiCategory::Poor => "Poor",
            SdiCategory::SeverelyDamaged => "Severely Damaged",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SdiCalculator {
    weights: SdiWeights,
}

impl SdiCalculator {
    pub fn new(weights: SdiWeights) -> Self {
        Self { weights }
    }

    /// `floor(10 x sum(typeWeight x severityWeight x clamp(extent / length, 0, 1)))`,
    /// clamped to [0, 100]. A missing weight is an error, not a zero.
    pub fn calculate(&self, items: &[SdiDistressItem], segment_length_m: f64) -> Result<u8> {
        if items.is_empty() || !(segment_length_m > 0.0) {
            return Ok(0);
        }

        let mut total = 0.0;
        for item in items {
            let type_weight = self.weights.type_weight(item.distress_type)?;
            let severity_weight = self.weights.severity_weight(item.severity)?;
            let ratio = (item.extent_m / segment_length_m).clamp(0.0, 1.0);
            let ratio = if ratio.is_nan() { 0.0 } else { ratio };
            total += type_weight * severity_weight * ratio;
        }

        Ok((total * 10.0 + 1e-9).floor().clamp(0.0, 100.0) as u8)
    }

    pub fn classify(score: u8) -> SdiCategory {
        SdiCategory::from_score(score)
    }
}
