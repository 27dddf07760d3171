mod segments;
mod sessions;
mod telemetry;

pub(crate) use telemetry::write_samples;

use anyhow::Result;
use async_trait::async_trait;

use crate::db::connection::Database;
use crate::models::{RoadSegment, SurveySession, TelemetrySample};
use crate::store::SurveyStore;
use crate::vibration::RoadCondition;

#[async_trait]
impl SurveyStore for Database {
    async fn create_session(&self, session: &SurveySession) -> Result<()> {
        self.insert_session(session).await
    }

    async fn update_session(&self, session: &SurveySession) -> Result<()> {
        self.update_session_record(session).await
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SurveySession>> {
        self.find_session(session_id).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.remove_session(session_id).await
    }

    async fn insert_telemetry_batch(&self, samples: &[TelemetrySample]) -> Result<()> {
        self.append_telemetry(samples.to_vec()).await
    }

    async fn get_telemetry_for_session(&self, session_id: &str) -> Result<Vec<TelemetrySample>> {
        self.telemetry_for_session(session_id).await
    }

    async fn insert_segment(&self, segment: &RoadSegment) -> Result<()> {
        self.insert_road_segment(segment).await
    }

    async fn get_segments_for_session(&self, session_id: &str) -> Result<Vec<RoadSegment>> {
        self.segments_for_session(session_id).await
    }

    async fn update_segment_condition(
        &self,
        segment_id: &str,
        manual_condition: Option<RoadCondition>,
    ) -> Result<()> {
        self.set_manual_condition(segment_id, manual_condition).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indices::{ConditionIndex, SdiCategory};
    use crate::models::{GeoPoint, SessionStatus};
    use crate::scoring::ConfidenceLevel;
    use chrono::Utc;

    fn open() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("survey.sqlite3")).unwrap();
        (dir, db)
    }

    fn point(lat: f64) -> GeoPoint {
        GeoPoint {
            lat,
            lon: 106.8,
            altitude: 12.0,
        }
    }

    fn segment(session_id: &str, id: &str, start: f64) -> RoadSegment {
        RoadSegment {
            id: id.into(),
            session_id: session_id.into(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            start_distance_m: start,
            end_distance_m: start + 100.0,
            start_location: Some(point(-6.2)),
            end_location: Some(point(-6.201)),
            roughness_rms: 0.42,
            consistency: 0.8,
            confidence: 77,
            confidence_level: ConfidenceLevel::High,
            auto_condition: RoadCondition::Fair,
            manual_condition: None,
            index: Some(ConditionIndex::Sdi {
                score: 9,
                category: SdiCategory::from_score(9),
            }),
            sample_count: 12,
            name: Some("Jl. Sudirman".into()),
            surface_type: Some("asphalt".into()),
            notes: None,
            media: vec!["photo-1.jpg".into()],
            assessment: None,
        }
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let (_dir, db) = open();
        let mut session = SurveySession::new("s1".into(), Utc::now(), Some("pixel".into()));
        db.create_session(&session).await.unwrap();
        assert!(db.create_session(&session).await.is_err());

        session.status = SessionStatus::Completed;
        session.distance_m = 1234.5;
        session.average_confidence = 66;
        session.average_pci = Some(71);
        session.segment_count = 3;
        session.ended_at = Some(Utc::now());
        session.start_location = Some(point(-6.2));
        db.update_session(&session).await.unwrap();

        let stored = db.get_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.status, SessionStatus::Completed);
        assert_eq!(stored.distance_m, 1234.5);
        assert_eq!(stored.average_pci, Some(71));
        assert_eq!(stored.start_location, Some(point(-6.2)));
        assert!(db.get_session("missing").await.unwrap().is_none());
        assert_eq!(db.list_sessions().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_segments_ordered_and_condition_override() {
        let (_dir, db) = open();
        db.create_session(&SurveySession::new("s1".into(), Utc::now(), None))
            .await
            .unwrap();
        db.insert_segment(&segment("s1", "b", 200.0)).await.unwrap();
        db.insert_segment(&segment("s1", "a", 0.0)).await.unwrap();

        let segments = db.get_segments_for_session("s1").await.unwrap();
        let ids: Vec<&str> = segments.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(segments[0], segment("s1", "a", 0.0).with_times(&segments[0]));

        db.update_segment_condition("a", Some(RoadCondition::SeverelyDamaged))
            .await
            .unwrap();
        let overridden = &db.get_segments_for_session("s1").await.unwrap()[0];
        assert_eq!(overridden.condition(), RoadCondition::SeverelyDamaged);
        assert_eq!(overridden.auto_condition, RoadCondition::Fair);
        assert!(db.update_segment_condition("zzz", None).await.is_err());
    }

    #[tokio::test]
    async fn test_telemetry_and_delete_cascade() {
        let (_dir, db) = open();
        db.create_session(&SurveySession::new("s1".into(), Utc::now(), None))
            .await
            .unwrap();
        let samples: Vec<TelemetrySample> = (0..3)
            .map(|i| TelemetrySample {
                session_id: "s1".into(),
                timestamp: Utc::now(),
                position: point(-6.2),
                speed_mps: 8.0,
                accel_x: 0.01,
                accel_y: -0.02,
                accel_z: 0.3,
                gps_accuracy_m: 4.0,
                distance_m: f64::from(i) * 10.0,
            })
            .collect();
        db.insert_telemetry_batch(&samples).await.unwrap();
        db.insert_segment(&segment("s1", "a", 0.0)).await.unwrap();

        let stored = db.get_telemetry_for_session("s1").await.unwrap();
        let distances: Vec<f64> = stored.iter().map(|s| s.distance_m).collect();
        assert_eq!(distances, vec![0.0, 10.0, 20.0]);

        db.delete_session("s1").await.unwrap();
        assert!(db.get_session("s1").await.unwrap().is_none());
        assert!(db.get_telemetry_for_session("s1").await.unwrap().is_empty());
        assert!(db.get_segments_for_session("s1").await.unwrap().is_empty());
    }

    fn samples(session_id: &str, from: u32, count: u32) -> Vec<TelemetrySample> {
        (from..from + count)
            .map(|i| TelemetrySample {
                session_id: session_id.into(),
                timestamp: Utc::now(),
                position: point(-6.2),
                speed_mps: 8.0,
                accel_x: 0.0,
                accel_y: 0.0,
                accel_z: 0.1,
                gps_accuracy_m: 4.0,
                distance_m: f64::from(i),
            })
            .collect()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_telemetry_batches_all_land() {
        let (_dir, db) = open();
        db.create_session(&SurveySession::new("s1".into(), Utc::now(), None))
            .await
            .unwrap();

        let writers: Vec<_> = (0..8)
            .map(|batch| {
                let db = db.clone();
                tokio::spawn(async move {
                    db.insert_telemetry_batch(&samples("s1", batch * 5, 5)).await
                })
            })
            .collect();
        for writer in writers {
            writer.await.unwrap().unwrap();
        }

        let stored = db.get_telemetry_for_session("s1").await.unwrap();
        assert_eq!(stored.len(), 40);
        // each batch stays contiguous and ordered
        for chunk in stored.chunks(5) {
            assert!(chunk.windows(2).all(|p| p[1].distance_m == p[0].distance_m + 1.0));
        }
    }

    #[tokio::test]
    async fn test_rejected_telemetry_batch_writes_nothing() {
        let (_dir, db) = open();
        db.create_session(&SurveySession::new("s1".into(), Utc::now(), None))
            .await
            .unwrap();
        // unknown session violates the foreign key
        assert!(db.insert_telemetry_batch(&samples("ghost", 0, 3)).await.is_err());
        db.insert_telemetry_batch(&samples("s1", 0, 2)).await.unwrap();
        db.insert_telemetry_batch(&[]).await.unwrap();

        assert!(db.get_telemetry_for_session("ghost").await.unwrap().is_empty());
        assert_eq!(db.get_telemetry_for_session("s1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_negative_segment_length() {
        let (_dir, db) = open();
        db.create_session(&SurveySession::new("s1".into(), Utc::now(), None))
            .await
            .unwrap();
        let mut bad = segment("s1", "a", 50.0);
        bad.end_distance_m = 10.0;
        assert!(db.insert_segment(&bad).await.is_err());
    }

    impl RoadSegment {
        fn with_times(mut self, other: &RoadSegment) -> Self {
            self.started_at = other.started_at;
            self.ended_at = other.ended_at;
            self
        }
    }
}
