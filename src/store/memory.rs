use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::models::{RoadSegment, SurveySession, TelemetrySample};
use crate::vibration::RoadCondition;

use super::SurveyStore;

#[derive(Default)]
struct Tables {
    sessions: HashMap<String, SurveySession>,
    telemetry: Vec<TelemetrySample>,
    segments: Vec<RoadSegment>,
}

/// In-process store. `set_failing(true)` makes every call fail, which is how
/// an unreachable backend is simulated.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    failing: AtomicBool,
    telemetry_batches: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of successful telemetry batch inserts.
    pub fn telemetry_batches(&self) -> usize {
        self.telemetry_batches.load(Ordering::SeqCst)
    }

    pub fn session_count(&self) -> usize {
        self.lock().sessions.len()
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("store unavailable");
        }
        Ok(())
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        match self.tables.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait]
impl SurveyStore for MemoryStore {
    async fn create_session(&self, session: &SurveySession) -> Result<()> {
        self.check()?;
        let mut tables = self.lock();
        if tables.sessions.contains_key(&session.id) {
            bail!("session {} already exists", session.id);
        }
        tables.sessions.insert(session.id.clone(), session.clone());
        Ok(())
    }

    async fn update_session(&self, session: &SurveySession) -> Result<()> {
        self.check()?;
        let mut tables = self.lock();
        let slot = tables
            .sessions
            .get_mut(&session.id)
            .ok_or_else(|| anyhow!("session {} not found", session.id))?;
        *slot = session.clone();
        Ok(())
    }

    async fn get_session(&self, session_id: &str) -> Result<Option<SurveySession>> {
        self.check()?;
        Ok(self.lock().sessions.get(session_id).cloned())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.check()?;
        let mut tables = self.lock();
        tables.sessions.remove(session_id);
        tables.telemetry.retain(|s| s.session_id != session_id);
        tables.segments.retain(|s| s.session_id != session_id);
        Ok(())
    }

    async fn insert_telemetry_batch(&self, samples: &[TelemetrySample]) -> Result<()> {
        self.check()?;
        self.lock().telemetry.extend_from_slice(samples);
        self.telemetry_batches.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_telemetry_for_session(&self, session_id: &str) -> Result<Vec<TelemetrySample>> {
        self.check()?;
        Ok(self
            .lock()
            .telemetry
            .iter()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_segment(&self, segment: &RoadSegment) -> Result<()> {
        self.check()?;
        self.lock().segments.push(segment.clone());
        Ok(())
    }

    async fn get_segments_for_session(&self, session_id: &str) -> Result<Vec<RoadSegment>> {
        self.check()?;
        let mut segments: Vec<RoadSegment> = self
            .lock()
            .segments
            .iter()
            .filter(|s| s.session_id == session_id)
            .cloned()
            .collect();
        segments.sort_by(|a, b| a.start_distance_m.total_cmp(&b.start_distance_m));
        Ok(segments)
    }

    async fn update_segment_condition(
        &self,
        segment_id: &str,
        manual_condition: Option<RoadCondition>,
    ) -> Result<()> {
        self.check()?;
        let mut tables = self.lock();
        let segment = tables
            .segments
            .iter_mut()
            .find(|s| s.id == segment_id)
            .ok_or_else(|| anyhow!("segment {segment_id} not found"))?;
        segment.manual_condition = manual_condition;
        Ok(())
    }
}
