pub mod engine;
pub mod geo;
pub mod state;
pub mod telemetry;

pub use engine::{LocationUpdate, MotionFeed, SurveySessionEngine, SurveySnapshot};
pub use geo::{distance_step, haversine_distance, DistanceStep, LocationFix};
pub use state::{
    SegmentDraft, SegmentScore, SegmentState, SessionPhase, SurveyState, Transition,
};
pub use telemetry::{StoreFlusher, TelemetryBuffer};
