//! Durable store collaborator consumed by the survey engine.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{RoadSegment, SurveySession, TelemetrySample};
use crate::vibration::RoadCondition;

pub use memory::MemoryStore;

/// Every call may fail; the engine decides whether a failure is retried,
/// re-queued or reported.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn create_session(&self, session: &SurveySession) -> Result<()>;

    async fn update_session(&self, session: &SurveySession) -> Result<()>;

    async fn get_session(&self, session_id: &str) -> Result<Option<SurveySession>>;

    /// Removes a session together with its telemetry and segments.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    /// Inserts samples in order, all or nothing.
    async fn insert_telemetry_batch(&self, samples: &[TelemetrySample]) -> Result<()>;

    async fn get_telemetry_for_session(&self, session_id: &str) -> Result<Vec<TelemetrySample>>;

    async fn insert_segment(&self, segment: &RoadSegment) -> Result<()>;

    /// Segments ordered by start distance.
    async fn get_segments_for_session(&self, session_id: &str) -> Result<Vec<RoadSegment>>;

    /// The only mutation allowed on a persisted segment.
    async fn update_segment_condition(
        &self,
        segment_id: &str,
        manual_condition: Option<RoadCondition>,
    ) -> Result<()>;
}
