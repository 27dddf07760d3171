pub mod segment;
pub mod session;
pub mod telemetry;

pub use segment::{DistressAssessment, RoadSegment, SegmentMetadata};
pub use session::{GeoPoint, SessionStatus, SurveySession};
pub use telemetry::TelemetrySample;
