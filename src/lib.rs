//! Road-survey engine: turns vehicle accelerometer and GPS streams into
//! roughness-classified road segments, and scores manual distress surveys
//! with the SDI and PCI methods.

pub mod db;
pub mod indices;
pub mod models;
pub mod scoring;
pub mod settings;
pub mod store;
pub mod survey;
pub mod utils;
pub mod vibration;

pub use db::Database;
pub use indices::{ConditionIndex, PciCalculator, SdiCalculator, Severity};
pub use models::{RoadSegment, SegmentMetadata, SurveySession, TelemetrySample};
pub use scoring::{ConfidenceLevel, ConfidenceReport, ConfidenceScorer};
pub use settings::{EngineConfig, SettingsStore};
pub use store::{MemoryStore, SurveyStore};
pub use survey::{LocationFix, SessionPhase, SurveySessionEngine, SurveySnapshot, Transition};
pub use utils::init_logging;
pub use vibration::{RawAcceleration, RoadCondition, RoughnessAnalyzer, VibrationSignalProcessor};
