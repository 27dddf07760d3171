use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard,
    },
    time::Duration,
};

use anyhow::Result;
use tokio::time::Instant;

use crate::models::{RoadSegment, SurveySession, TelemetrySample};
use crate::settings::FlushConfig;
use crate::store::SurveyStore;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

struct BufferInner {
    samples: VecDeque<TelemetrySample>,
    last_flush: Instant,
}

/// Telemetry awaiting persistence, in capture order. Every
/// read-modify-write happens under one lock.
pub struct TelemetryBuffer {
    config: FlushConfig,
    inner: Mutex<BufferInner>,
}

impl TelemetryBuffer {
    pub fn new(config: FlushConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BufferInner {
                samples: VecDeque::new(),
                last_flush: Instant::now(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Appends a sample; returns true when a flush is due.
    pub fn push(&self, sample: TelemetrySample) -> bool {
        let mut inner = self.lock();
        inner.samples.push_back(sample);
        inner.samples.len() >= self.config.max_batch
            || inner.last_flush.elapsed() >= Duration::from_millis(self.config.max_interval_ms)
    }

    /// Takes everything buffered and restarts the flush interval.
    pub fn drain(&self) -> Vec<TelemetrySample> {
        let mut inner = self.lock();
        inner.last_flush = Instant::now();
        inner.samples.drain(..).collect()
    }

    /// Returns an unpersisted batch to the front, ahead of newer samples.
    pub fn requeue_front(&self, batch: Vec<TelemetrySample>) {
        let mut inner = self.lock();
        for sample in batch.into_iter().rev() {
            inner.samples.push_front(sample);
        }
    }

    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.samples.clear();
        inner.last_flush = Instant::now();
    }

    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Default)]
struct PendingWrites {
    segments: VecDeque<RoadSegment>,
    session: Option<SurveySession>,
}

/// Write-behind path to the store. Buffered telemetry, committed segments
/// and the final session record go out in that order; whatever the store
/// rejects is kept and retried on the next flush. Flushes are serialised so
/// batches land in capture order.
pub struct StoreFlusher {
    store: Arc<dyn SurveyStore>,
    buffer: Arc<TelemetryBuffer>,
    pending: Mutex<PendingWrites>,
    gate: tokio::sync::Mutex<()>,
    scheduled: AtomicBool,
}

impl StoreFlusher {
    pub fn new(store: Arc<dyn SurveyStore>, buffer: Arc<TelemetryBuffer>) -> Self {
        Self {
            store,
            buffer,
            pending: Mutex::new(PendingWrites::default()),
            gate: tokio::sync::Mutex::new(()),
            scheduled: AtomicBool::new(false),
        }
    }

    fn pending(&self) -> MutexGuard<'_, PendingWrites> {
        match self.pending.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Flushes now, waiting for any in-flight flush first. Returns the number
    /// of telemetry samples persisted; the first store error is returned
    /// after every queue has been tried.
    pub async fn flush(&self) -> Result<usize> {
        let _gate = self.gate.lock().await;
        let telemetry = self.flush_telemetry().await;
        let segments = self.flush_segments().await;
        let session = self.flush_session().await;
        let written = telemetry?;
        segments?;
        session?;
        Ok(written)
    }

    async fn flush_telemetry(&self) -> Result<usize> {
        let batch = self.buffer.drain();
        if batch.is_empty() {
            return Ok(0);
        }
        let count = batch.len();
        match self.store.insert_telemetry_batch(&batch).await {
            Ok(()) => {
                log_debug!("Flushed {} telemetry samples", count);
                Ok(count)
            }
            Err(err) => {
                log_warn!("Telemetry flush of {} samples failed, re-queued: {err:#}", count);
                self.buffer.requeue_front(batch);
                Err(err)
            }
        }
    }

    async fn flush_segments(&self) -> Result<()> {
        let mut segments = std::mem::take(&mut self.pending().segments);
        while let Some(segment) = segments.pop_front() {
            if let Err(err) = self.store.insert_segment(&segment).await {
                log_warn!("Segment {} not persisted, re-queued: {err:#}", segment.id);
                segments.push_front(segment);
                let mut pending = self.pending();
                while let Some(segment) = segments.pop_back() {
                    pending.segments.push_front(segment);
                }
                return Err(err);
            }
            log_debug!("Persisted segment {}", segment.id);
        }
        Ok(())
    }

    async fn flush_session(&self) -> Result<()> {
        let Some(session) = self.pending().session.take() else {
            return Ok(());
        };
        match self.store.update_session(&session).await {
            Ok(()) => Ok(()),
            Err(err) => {
                log_warn!("Session {} not finalised, re-queued: {err:#}", session.id);
                self.pending().session.get_or_insert(session);
                Err(err)
            }
        }
    }

    /// Queues a committed segment behind the buffered telemetry and flushes.
    pub async fn persist_segment(&self, segment: RoadSegment) -> Result<usize> {
        self.pending().segments.push_back(segment);
        self.flush().await
    }

    /// Queues the final session record and flushes.
    pub async fn persist_session(&self, session: SurveySession) -> Result<usize> {
        self.pending().session = Some(session);
        self.flush().await
    }

    /// Segments and session records still waiting for the store.
    pub fn pending_records(&self) -> usize {
        let pending = self.pending();
        pending.segments.len() + usize::from(pending.session.is_some())
    }

    /// Fire-and-forget flush on `runtime`. At most one background flush is
    /// pending at a time.
    pub fn schedule(self: &Arc<Self>, runtime: &tokio::runtime::Handle) {
        if self.scheduled.swap(true, Ordering::AcqRel) {
            return;
        }
        let flusher = Arc::clone(self);
        runtime.spawn(async move {
            // failures are already logged and re-queued
            let _ = flusher.flush().await;
            flusher.scheduled.store(false, Ordering::Release);
        });
    }

    /// Waits for an in-flight flush, then drops everything still queued.
    pub async fn abandon(&self) {
        let _gate = self.gate.lock().await;
        self.buffer.clear();
        *self.pending() = PendingWrites::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::scoring::ConfidenceLevel;
    use crate::store::MemoryStore;
    use crate::vibration::RoadCondition;
    use chrono::Utc;

    fn store_segment(id: &str) -> RoadSegment {
        RoadSegment {
            id: id.into(),
            session_id: "s1".into(),
            started_at: Utc::now(),
            ended_at: Utc::now(),
            start_distance_m: 0.0,
            end_distance_m: 40.0,
            start_location: None,
            end_location: None,
            roughness_rms: 0.1,
            consistency: 1.0,
            confidence: 70,
            confidence_level: ConfidenceLevel::from_score(70),
            auto_condition: RoadCondition::Good,
            manual_condition: None,
            index: None,
            sample_count: 4,
            name: None,
            surface_type: None,
            notes: None,
            media: Vec::new(),
            assessment: None,
        }
    }

    fn sample(distance_m: f64) -> TelemetrySample {
        TelemetrySample {
            session_id: "s1".into(),
            timestamp: Utc::now(),
            position: GeoPoint {
                lat: 0.0,
                lon: 0.0,
                altitude: 0.0,
            },
            speed_mps: 10.0,
            accel_x: 0.0,
            accel_y: 0.0,
            accel_z: 0.1,
            gps_accuracy_m: 4.0,
            distance_m,
        }
    }

    #[tokio::test]
    async fn test_push_signals_at_batch_size() {
        let buffer = TelemetryBuffer::new(FlushConfig::default());
        for i in 0..9 {
            assert!(!buffer.push(sample(i as f64)));
        }
        assert!(buffer.push(sample(9.0)));
        assert_eq!(buffer.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_push_signals_after_interval() {
        let buffer = TelemetryBuffer::new(FlushConfig::default());
        assert!(!buffer.push(sample(0.0)));
        tokio::time::advance(Duration::from_millis(2001)).await;
        assert!(buffer.push(sample(1.0)));
        buffer.drain();
        assert!(!buffer.push(sample(2.0)));
    }

    #[tokio::test]
    async fn test_requeue_keeps_order() {
        let buffer = TelemetryBuffer::new(FlushConfig::default());
        buffer.push(sample(0.0));
        buffer.push(sample(1.0));
        let batch = buffer.drain();
        buffer.push(sample(2.0));
        buffer.requeue_front(batch);
        let order: Vec<f64> = buffer.drain().iter().map(|s| s.distance_m).collect();
        assert_eq!(order, vec![0.0, 1.0, 2.0]);
    }

    #[tokio::test]
    async fn test_failed_flush_requeues_then_succeeds() {
        let store = Arc::new(MemoryStore::new());
        let buffer = Arc::new(TelemetryBuffer::new(FlushConfig::default()));
        let flusher = StoreFlusher::new(store.clone(), buffer.clone());

        buffer.push(sample(0.0));
        buffer.push(sample(1.0));
        store.set_failing(true);
        assert!(flusher.flush().await.is_err());
        assert_eq!(buffer.len(), 2);

        store.set_failing(false);
        assert_eq!(flusher.flush().await.unwrap(), 2);
        assert!(buffer.is_empty());
        let stored = store.get_telemetry_for_session("s1").await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].distance_m, 0.0);
    }

    #[tokio::test]
    async fn test_rejected_records_wait_for_next_flush() {
        let store = Arc::new(MemoryStore::new());
        let buffer = Arc::new(TelemetryBuffer::new(FlushConfig::default()));
        let flusher = StoreFlusher::new(store.clone(), buffer.clone());
        let mut session = SurveySession::new("s1".into(), Utc::now(), None);
        store.create_session(&session).await.unwrap();

        store.set_failing(true);
        buffer.push(sample(0.0));
        let mut segment = store_segment("a");
        assert!(flusher.persist_segment(segment.clone()).await.is_err());
        segment.id = "b".into();
        assert!(flusher.persist_segment(segment).await.is_err());
        session.segment_count = 2;
        assert!(flusher.persist_session(session).await.is_err());
        assert_eq!(flusher.pending_records(), 3);
        assert_eq!(buffer.len(), 1);

        store.set_failing(false);
        assert_eq!(flusher.flush().await.unwrap(), 1);
        assert_eq!(flusher.pending_records(), 0);
        let ids: Vec<String> = store
            .get_segments_for_session("s1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "b".to_string()]);
        let stored = store.get_session("s1").await.unwrap().unwrap();
        assert_eq!(stored.segment_count, 2);
    }

    #[tokio::test]
    async fn test_abandon_drops_queued_records() {
        let store = Arc::new(MemoryStore::new());
        let buffer = Arc::new(TelemetryBuffer::new(FlushConfig::default()));
        let flusher = StoreFlusher::new(store.clone(), buffer.clone());
        store.set_failing(true);
        buffer.push(sample(0.0));
        assert!(flusher.persist_segment(store_segment("a")).await.is_err());

        flusher.abandon().await;
        assert!(buffer.is_empty());
        assert_eq!(flusher.pending_records(), 0);
    }

    #[tokio::test]
    async fn test_empty_flush_is_noop() {
        let store = Arc::new(MemoryStore::new());
        let buffer = Arc::new(TelemetryBuffer::new(FlushConfig::default()));
        let flusher = StoreFlusher::new(store.clone(), buffer);
        assert_eq!(flusher.flush().await.unwrap(), 0);
        assert_eq!(store.telemetry_batches(), 0);
    }
}
