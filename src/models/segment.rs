use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indices::{ConditionIndex, PciDistressItem, SdiDistressItem};
use crate::scoring::ConfidenceLevel;
use crate::vibration::RoadCondition;

use super::GeoPoint;

/// Distress survey attached to a segment, scored with one of the two methods.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum DistressAssessment {
    #[serde(rename_all = "camelCase")]
    Sdi {
        items: Vec<SdiDistressItem>,
        segment_length_m: f64,
    },
    #[serde(rename_all = "camelCase")]
    Pci {
        items: Vec<PciDistressItem>,
        sample_area_m2: f64,
    },
}

/// Caller-supplied details for a segment being committed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SegmentMetadata {
    pub name: Option<String>,
    pub surface_type: Option<String>,
    pub notes: Option<String>,
    /// Photo / audio references.
    pub media: Vec<String>,
    /// Wins over the roughness classification when set.
    pub manual_condition: Option<RoadCondition>,
    pub assessment: Option<DistressAssessment>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoadSegment {
    pub id: String,
    pub session_id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub start_distance_m: f64,
    pub end_distance_m: f64,
    pub start_location: Option<GeoPoint>,
    pub end_location: Option<GeoPoint>,
    pub roughness_rms: f64,
    pub consistency: f64,
    pub confidence: u8,
    pub confidence_level: ConfidenceLevel,
    pub auto_condition: RoadCondition,
    pub manual_condition: Option<RoadCondition>,
    pub index: Option<ConditionIndex>,
    pub sample_count: u32,
    pub name: Option<String>,
    pub surface_type: Option<String>,
    pub notes: Option<String>,
    pub media: Vec<String>,
    pub assessment: Option<DistressAssessment>,
}

impl RoadSegment {
    pub fn condition(&self) -> RoadCondition {
        self.manual_condition.unwrap_or(self.auto_condition)
    }

    pub fn length_m(&self) -> f64 {
        self.end_distance_m - self.start_distance_m
    }
}
