use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;
use tokio::{runtime::Handle, sync::watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::indices::{
    average_pci, ConditionIndex, PciCalculator, PciDistressItem, SdiCalculator, SdiWeights,
};
use crate::models::{
    DistressAssessment, RoadSegment, SegmentMetadata, SessionStatus, SurveySession,
    TelemetrySample,
};
use crate::scoring::{ConfidenceInputs, ConfidenceReport, ConfidenceScorer};
use crate::settings::EngineConfig;
use crate::utils::truncated_mean;
use crate::store::SurveyStore;
use crate::vibration::{
    RawAcceleration, RoadCondition, RoughnessAnalyzer, VibrationReading, VibrationSignalProcessor,
};

use super::geo::{distance_step, DistanceStep, LocationFix};
use super::state::{
    SegmentDraft, SegmentScore, SegmentState, SessionPhase, SurveyState, Transition,
};
use super::telemetry::{TelemetryBuffer, StoreFlusher};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Latest observable values, readable without blocking.
#[derive(Debug, Clone, Copy, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SurveySnapshot {
    pub phase: SessionPhase,
    pub distance_m: f64,
    pub roughness_g: f64,
    pub confidence: u8,
    pub segment_active: bool,
}

impl Default for SurveySnapshot {
    fn default() -> Self {
        Self {
            phase: SessionPhase::NotStarted,
            distance_m: 0.0,
            roughness_g: 0.0,
            confidence: 0,
            segment_active: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationUpdate {
    pub distance_m: f64,
    pub step: DistanceStep,
}

/// Handle for the accelerometer producer. Cheap to clone and usable from
/// any thread.
#[derive(Clone)]
pub struct MotionFeed {
    processor: Arc<Mutex<VibrationSignalProcessor>>,
    snapshot: Arc<watch::Sender<SurveySnapshot>>,
    acceptance: CancellationToken,
}

impl MotionFeed {
    /// Processes one sample. Once the session stops accepting samples the
    /// reading is all zeros and nothing is updated.
    pub fn push(&self, raw: RawAcceleration) -> VibrationReading {
        if self.acceptance.is_cancelled() {
            return VibrationReading {
                linear_g: [0.0; 3],
                magnitude_g: 0.0,
                roughness_g: 0.0,
            };
        }
        let reading = lock(&self.processor).process(raw);
        self.snapshot.send_if_modified(|snapshot| {
            if snapshot.roughness_g == reading.roughness_g {
                return false;
            }
            snapshot.roughness_g = reading.roughness_g;
            true
        });
        reading
    }

    /// The motion source went away; roughness reads as zero from now on.
    pub fn mark_unavailable(&self) {
        lock(&self.processor).mark_unavailable();
        self.snapshot.send_modify(|snapshot| snapshot.roughness_g = 0.0);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Orchestrates one survey session and its road segments.
///
/// Location fixes and accelerometer samples may arrive on different threads.
/// `update_location` never waits on storage: telemetry is buffered and
/// flushed in the background. `end_segment` and `end` flush synchronously.
pub struct SurveySessionEngine {
    config: EngineConfig,
    store: Arc<dyn SurveyStore>,
    runtime: Handle,
    state: Mutex<SurveyState>,
    processor: Arc<Mutex<VibrationSignalProcessor>>,
    telemetry: Arc<TelemetryBuffer>,
    flusher: Arc<StoreFlusher>,
    analyzer: RoughnessAnalyzer,
    scorer: ConfidenceScorer,
    sdi: SdiCalculator,
    snapshot: Arc<watch::Sender<SurveySnapshot>>,
    acceptance: CancellationToken,
    device: Option<String>,
}

impl SurveySessionEngine {
    /// Must be called from within a tokio runtime.
    pub fn new(config: EngineConfig, store: Arc<dyn SurveyStore>) -> Result<Self> {
        let processor = VibrationSignalProcessor::new(config.vibration.clone());
        Self::with_processor(config, store, processor)
    }

    pub fn with_processor(
        config: EngineConfig,
        store: Arc<dyn SurveyStore>,
        processor: VibrationSignalProcessor,
    ) -> Result<Self> {
        config.validate().context("invalid engine configuration")?;
        let runtime =
            Handle::try_current().context("survey engine must be created inside a tokio runtime")?;

        let telemetry = Arc::new(TelemetryBuffer::new(config.flush.clone()));
        let flusher = Arc::new(StoreFlusher::new(store.clone(), telemetry.clone()));
        let (snapshot, _) = watch::channel(SurveySnapshot::default());

        Ok(Self {
            analyzer: RoughnessAnalyzer::new(config.thresholds),
            scorer: ConfidenceScorer::default(),
            sdi: SdiCalculator::default(),
            config,
            store,
            runtime,
            state: Mutex::new(SurveyState::default()),
            processor: Arc::new(Mutex::new(processor)),
            telemetry,
            flusher,
            snapshot: Arc::new(snapshot),
            acceptance: CancellationToken::new(),
            device: None,
        })
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_sdi_weights(mut self, weights: SdiWeights) -> Result<Self> {
        weights.check_complete()?;
        self.sdi = SdiCalculator::new(weights);
        Ok(self)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn motion_feed(&self) -> MotionFeed {
        MotionFeed {
            processor: self.processor.clone(),
            snapshot: self.snapshot.clone(),
            acceptance: self.acceptance.clone(),
        }
    }

    pub fn observe(&self) -> watch::Receiver<SurveySnapshot> {
        self.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> SurveySnapshot {
        *self.snapshot.borrow()
    }

    /// Cancelled once the session stops accepting samples.
    pub fn acceptance_token(&self) -> CancellationToken {
        self.acceptance.clone()
    }

    pub fn phase(&self) -> SessionPhase {
        lock(&self.state).phase()
    }

    pub fn session(&self) -> Option<SurveySession> {
        lock(&self.state).session().cloned()
    }

    pub fn distance_m(&self) -> f64 {
        lock(&self.state)
            .session()
            .map(|s| s.distance_m)
            .unwrap_or(0.0)
    }

    pub fn segment_active(&self) -> bool {
        lock(&self.state)
            .survey()
            .map(|s| s.segment_active())
            .unwrap_or(false)
    }

    pub fn roughness_history(&self) -> Vec<f64> {
        lock(&self.processor).history()
    }

    /// Samples not yet persisted.
    pub fn pending_telemetry(&self) -> usize {
        self.telemetry.len()
    }

    fn publish(&self, update: impl FnOnce(&mut SurveySnapshot)) {
        self.snapshot.send_modify(update);
    }

    fn publish_state(&self) {
        let (phase, distance_m, segment_active) = {
            let state = lock(&self.state);
            (
                state.phase(),
                state.session().map(|s| s.distance_m).unwrap_or(0.0),
                state.survey().map(|s| s.segment_active()).unwrap_or(false),
            )
        };
        self.publish(|snapshot| {
            snapshot.phase = phase;
            snapshot.distance_m = distance_m;
            snapshot.segment_active = segment_active;
        });
    }

    pub async fn start(&self) -> Result<Transition<SurveySession>> {
        if let Transition::Ignored { phase } = lock(&self.state).begin_start() {
            return Ok(Transition::Ignored { phase });
        }

        let now = Utc::now();
        let session = SurveySession::new(Uuid::new_v4().to_string(), now, self.device.clone());

        if let Err(err) = self.store.create_session(&session).await {
            log_error!("Failed to create survey session: {err:#}");
            lock(&self.state).finish_start(None);
            return Err(err.context("failed to create survey session"));
        }

        self.telemetry.clear();
        lock(&self.state).finish_start(Some(session.clone()));
        self.publish(|snapshot| {
            *snapshot = SurveySnapshot {
                phase: SessionPhase::Active,
                ..SurveySnapshot::default()
            }
        });

        log_info!("Survey session {} started", session.id);
        Ok(Transition::Applied(session))
    }

    pub fn pause(&self) -> Transition<()> {
        let transition = lock(&self.state).pause();
        if transition.is_applied() {
            log_info!("Survey paused");
            self.publish_state();
        }
        transition
    }

    pub fn resume(&self) -> Transition<()> {
        let transition = lock(&self.state).resume();
        if transition.is_applied() {
            log_info!("Survey resumed");
            self.publish_state();
        }
        transition
    }

    /// Accepts a fix while Active: accumulates distance, buffers telemetry and
    /// feeds the open segment. Never waits on storage.
    pub fn update_location(&self, fix: LocationFix) -> Transition<LocationUpdate> {
        let (sample, update, consistency) = {
            let mut state = lock(&self.state);
            let phase = state.phase();
            let SurveyState::Active(survey) = &mut *state else {
                return Transition::Ignored { phase };
            };

            let step = distance_step(survey.anchor.as_ref(), &fix, &self.config.distance);
            match step {
                DistanceStep::Anchored => survey.anchor = Some(fix),
                DistanceStep::Moved { meters } => {
                    survey.session.distance_m += meters;
                    survey.anchor = Some(fix);
                }
                DistanceStep::Jitter { meters } => {
                    log_debug!("Ignoring {:.2} m GPS jitter", meters);
                }
                DistanceStep::Inaccurate => {
                    log_debug!("Ignoring fix with {:.1} m accuracy", fix.accuracy_m);
                }
            }
            if survey.session.start_location.is_none() {
                survey.session.start_location = Some(fix.position());
            }
            survey.last_fix = Some(fix);

            let (linear, roughness, history) = {
                let processor = lock(&self.processor);
                (
                    processor.last_linear(),
                    processor.current_roughness(),
                    processor.history(),
                )
            };
            if let SegmentState::Recording(draft) = &mut survey.segment {
                draft.record(roughness, fix.speed_mps);
            }

            let distance_m = survey.session.distance_m;
            let sample = TelemetrySample {
                session_id: survey.session.id.clone(),
                timestamp: fix.timestamp,
                position: fix.position(),
                speed_mps: fix.speed_mps,
                accel_x: linear[0],
                accel_y: linear[1],
                accel_z: linear[2],
                gps_accuracy_m: fix.accuracy_m,
                distance_m,
            };
            (
                sample,
                LocationUpdate { distance_m, step },
                RoughnessAnalyzer::consistency(&history),
            )
        };

        let confidence = self.scorer.score(ConfidenceInputs {
            gps_available: true,
            gps_accuracy_m: fix.accuracy_m,
            roughness_consistency: consistency,
            speed_mps: fix.speed_mps,
        });
        self.publish(|snapshot| {
            snapshot.distance_m = update.distance_m;
            snapshot.confidence = confidence.score;
        });

        if self.telemetry.push(sample) {
            self.flusher.schedule(&self.runtime);
        }

        Transition::Applied(update)
    }

    pub fn start_segment(&self) -> Transition<SegmentDraft> {
        let transition = lock(&self.state).start_segment(Utc::now());
        if let Transition::Applied(draft) = &transition {
            log_info!("Segment started at {:.1} m", draft.start_distance_m);
            self.publish(|snapshot| snapshot.segment_active = true);
        }
        transition
    }

    pub fn cancel_segment(&self) -> Transition<()> {
        let transition = lock(&self.state).cancel_segment();
        if transition.is_applied() {
            log_info!("Segment cancelled");
            self.publish(|snapshot| snapshot.segment_active = false);
        }
        transition
    }

    /// Commits the recording segment. Buffered telemetry is flushed first;
    /// a segment the store rejects stays queued and is retried on later
    /// flushes. Only an unscorable assessment fails, leaving the segment open.
    pub async fn end_segment(&self, metadata: SegmentMetadata) -> Result<Transition<RoadSegment>> {
        let (draft, session_id, last_fix, end_distance_m) = {
            let mut state = lock(&self.state);
            let phase = state.phase();
            let draft = match state.take_segment() {
                Transition::Applied(draft) => draft,
                Transition::Ignored { phase } => return Ok(Transition::Ignored { phase }),
            };
            let Some(survey) = state.survey() else {
                return Ok(Transition::Ignored { phase });
            };
            (
                draft,
                survey.session.id.clone(),
                survey.last_fix,
                survey.session.distance_m,
            )
        };

        let built = self.build_segment(&draft, session_id, last_fix, end_distance_m, metadata);
        let segment = match built {
            Ok(segment) => segment,
            Err(err) => {
                lock(&self.state).restore_segment(draft);
                return Err(err);
            }
        };

        lock(&self.state).finish_segment(&segment);
        self.publish(|snapshot| snapshot.segment_active = false);
        log_info!(
            "Segment {} committed: {:.1}-{:.1} m, rms {:.3} g, confidence {}, condition {}",
            segment.id,
            segment.start_distance_m,
            segment.end_distance_m,
            segment.roughness_rms,
            segment.confidence,
            segment.condition().as_str()
        );

        if let Err(err) = self.flusher.persist_segment(segment.clone()).await {
            log_warn!("Segment {} queued until the store recovers: {err:#}", segment.id);
        }
        Ok(Transition::Applied(segment))
    }

    fn build_segment(
        &self,
        draft: &SegmentDraft,
        session_id: String,
        last_fix: Option<LocationFix>,
        end_distance_m: f64,
        metadata: SegmentMetadata,
    ) -> Result<RoadSegment> {
        let roughness_rms = RoughnessAnalyzer::rms(&draft.roughness);
        let consistency = RoughnessAnalyzer::consistency(&draft.roughness);
        let confidence = self.segment_confidence(draft, last_fix.as_ref(), consistency);
        let auto_condition = self.analyzer.classify(roughness_rms);

        let (assessment, index) = match metadata.assessment {
            Some(assessment) => {
                let (assessment, index) = self.assess(assessment)?;
                (Some(assessment), Some(index))
            }
            None => (None, None),
        };

        Ok(RoadSegment {
            id: Uuid::new_v4().to_string(),
            session_id,
            started_at: draft.started_at,
            ended_at: Utc::now(),
            start_distance_m: draft.start_distance_m,
            end_distance_m: end_distance_m.max(draft.start_distance_m),
            start_location: draft.start_location,
            end_location: last_fix.map(|fix| fix.position()),
            roughness_rms,
            consistency,
            confidence: confidence.score,
            confidence_level: confidence.level,
            auto_condition,
            manual_condition: metadata.manual_condition,
            index,
            sample_count: draft.roughness.len() as u32,
            name: metadata.name,
            surface_type: metadata.surface_type,
            notes: metadata.notes,
            media: metadata.media,
            assessment,
        })
    }

    fn segment_confidence(
        &self,
        draft: &SegmentDraft,
        last_fix: Option<&LocationFix>,
        consistency: f64,
    ) -> ConfidenceReport {
        let speed_mps = draft
            .mean_speed()
            .or_else(|| last_fix.map(|fix| fix.speed_mps))
            .unwrap_or(0.0);
        self.scorer.score(ConfidenceInputs {
            gps_available: last_fix.is_some(),
            gps_accuracy_m: last_fix.map(|fix| fix.accuracy_m).unwrap_or(f64::INFINITY),
            roughness_consistency: consistency,
            speed_mps,
        })
    }

    fn assess(
        &self,
        assessment: DistressAssessment,
    ) -> Result<(DistressAssessment, ConditionIndex)> {
        let indices = &self.config.indices;
        match assessment {
            DistressAssessment::Sdi {
                items,
                segment_length_m,
            } => {
                let segment_length_m = if segment_length_m > 0.0 {
                    segment_length_m
                } else {
                    indices.sdi_segment_length_m
                };
                let score = self.sdi.calculate(&items, segment_length_m)?;
                let index = ConditionIndex::Sdi {
                    score,
                    category: SdiCalculator::classify(score),
                };
                Ok((
                    DistressAssessment::Sdi {
                        items,
                        segment_length_m,
                    },
                    index,
                ))
            }
            DistressAssessment::Pci {
                items,
                sample_area_m2,
            } => {
                let sample_area_m2 = if sample_area_m2 > 0.0 {
                    sample_area_m2
                } else {
                    indices.pci_sample_area_m2
                };
                let items: Vec<PciDistressItem> = items
                    .into_iter()
                    .map(|mut item| {
                        item.set_sample_area(sample_area_m2);
                        item
                    })
                    .collect();
                let result = PciCalculator::evaluate(items);
                let index = ConditionIndex::Pci {
                    score: result.pci,
                    rating: result.rating,
                };
                Ok((
                    DistressAssessment::Pci {
                        items: result.breakdown,
                        sample_area_m2,
                    },
                    index,
                ))
            }
        }
    }

    /// Sets or clears the manual condition of an already persisted segment.
    pub async fn override_condition(
        &self,
        segment_id: &str,
        condition: Option<RoadCondition>,
    ) -> Result<()> {
        self.store
            .update_segment_condition(segment_id, condition)
            .await
            .with_context(|| format!("failed to override condition of segment {segment_id}"))
    }

    /// Persists buffered telemetry and any queued segment or session
    /// records now.
    pub async fn flush_now(&self) -> Result<usize> {
        self.flusher.flush().await
    }

    /// Segment and session records the store has not accepted yet.
    pub fn pending_records(&self) -> usize {
        self.flusher.pending_records()
    }

    /// Flushes telemetry, summarises the committed segments and finalises
    /// the session. Ignored while a segment commit is in flight. Storage
    /// failures do not hold the session open: unpersisted writes stay queued
    /// for `flush_now`.
    pub async fn end(&self) -> Transition<SurveySession> {
        let (mut session, committed) = {
            let mut state = lock(&self.state);
            match state.begin_end() {
                Transition::Applied(dropped_segment) => {
                    if dropped_segment {
                        log_warn!("Survey ended with an open segment; it was discarded");
                    }
                }
                Transition::Ignored { phase } => return Transition::Ignored { phase },
            }
            let Some(survey) = state.survey() else {
                return Transition::Ignored {
                    phase: state.phase(),
                };
            };
            let mut session = survey.session.clone();
            session.end_location = survey.last_fix.map(|fix| fix.position());
            (session, survey.committed.clone())
        };

        if let Err(err) = self.flusher.flush().await {
            log_warn!("Ending with telemetry still queued: {err:#}");
        }
        let scores = match self.store.get_segments_for_session(&session.id).await {
            Ok(segments) => segments.iter().map(SegmentScore::of).collect(),
            Err(err) => {
                log_warn!("Summarising from committed segments, store unavailable: {err:#}");
                committed
            }
        };
        summarise(&mut session, &scores);

        self.acceptance.cancel();
        lock(&self.state).finish_end(session.clone());
        self.publish_state();

        if let Err(err) = self.flusher.persist_session(session.clone()).await {
            log_error!(
                "Survey session {} ended with writes still queued: {err:#}",
                session.id
            );
        }
        log_info!(
            "Survey session {} ended: {:.1} m, {} segments, average confidence {}",
            session.id,
            session.distance_m,
            session.segment_count,
            session.average_confidence
        );
        Transition::Applied(session)
    }

    /// Abandons the session. Its stored record and telemetry are removed and
    /// nothing further is persisted.
    pub async fn discard(&self) -> Transition<()> {
        let session = match lock(&self.state).discard() {
            Transition::Applied(session) => session,
            Transition::Ignored { phase } => return Transition::Ignored { phase },
        };
        self.acceptance.cancel();
        self.telemetry.clear();
        self.publish_state();

        self.flusher.abandon().await;
        if let Err(err) = self.store.delete_session(&session.id).await {
            log_warn!("Failed to remove discarded session {}: {err:#}", session.id);
        }
        log_info!("Survey session {} discarded", session.id);
        Transition::Applied(())
    }
}

fn summarise(session: &mut SurveySession, scores: &[SegmentScore]) {
    let confidences: Vec<u8> = scores.iter().map(|s| s.confidence).collect();
    let pci_scores: Vec<u8> = scores.iter().filter_map(|s| s.pci).collect();

    let now = Utc::now();
    session.average_confidence = truncated_mean(&confidences);
    session.average_pci = if pci_scores.is_empty() {
        None
    } else {
        Some(average_pci(&pci_scores))
    };
    session.segment_count = scores.len() as u32;
    session.ended_at = Some(now);
    session.updated_at = now;
    session.status = SessionStatus::Completed;
}
