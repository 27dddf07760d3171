use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "Active",
            SessionStatus::Paused => "Paused",
            SessionStatus::Completed => "Completed",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub altitude: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveySession {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    /// Accumulated travel in meters. Never decreases while active.
    pub distance_m: f64,
    /// Mean segment confidence, filled in when the session ends.
    pub average_confidence: u8,
    /// Mean PCI over PCI-assessed segments, if any.
    pub average_pci: Option<u8>,
    pub segment_count: u32,
    pub device: Option<String>,
    pub start_location: Option<GeoPoint>,
    pub end_location: Option<GeoPoint>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SurveySession {
    pub fn new(id: String, started_at: DateTime<Utc>, device: Option<String>) -> Self {
        Self {
            id,
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
            distance_m: 0.0,
            average_confidence: 0,
            average_pci: None,
            segment_count: 0,
            device,
            start_location: None,
            end_location: None,
            created_at: started_at,
            updated_at: started_at,
        }
    }
}
