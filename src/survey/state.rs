use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::indices::ConditionIndex;
use crate::models::{GeoPoint, RoadSegment, SessionStatus, SurveySession};

use super::geo::LocationFix;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    NotStarted,
    Starting,
    Active,
    Paused,
    Ending,
    Ended,
    Discarded,
}

/// Outcome of a state-machine call. Calls made in the wrong state are
/// ignored, never an error.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    Applied(T),
    Ignored { phase: SessionPhase },
}

impl<T> Transition<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Transition::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Transition::Applied(value) => Some(value),
            Transition::Ignored { .. } => None,
        }
    }
}

/// Segment being recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDraft {
    pub started_at: DateTime<Utc>,
    pub start_distance_m: f64,
    pub start_location: Option<GeoPoint>,
    /// Roughness sampled at each location update.
    pub roughness: Vec<f64>,
    speed_sum: f64,
    speed_count: u32,
}

impl SegmentDraft {
    pub fn new(
        started_at: DateTime<Utc>,
        start_distance_m: f64,
        start_location: Option<GeoPoint>,
    ) -> Self {
        Self {
            started_at,
            start_distance_m,
            start_location,
            roughness: Vec::new(),
            speed_sum: 0.0,
            speed_count: 0,
        }
    }

    pub fn record(&mut self, roughness_g: f64, speed_mps: f64) {
        self.roughness.push(roughness_g);
        if speed_mps.is_finite() && speed_mps >= 0.0 {
            self.speed_sum += speed_mps;
            self.speed_count += 1;
        }
    }

    pub fn mean_speed(&self) -> Option<f64> {
        if self.speed_count == 0 {
            None
        } else {
            Some(self.speed_sum / f64::from(self.speed_count))
        }
    }
}

/// Scores of a committed segment, kept for the session summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentScore {
    pub confidence: u8,
    pub pci: Option<u8>,
}

impl SegmentScore {
    pub fn of(segment: &RoadSegment) -> Self {
        Self {
            confidence: segment.confidence,
            pci: match segment.index {
                Some(ConditionIndex::Pci { score, .. }) => Some(score),
                _ => None,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SegmentState {
    Idle,
    Recording(SegmentDraft),
    /// Draft handed to `end_segment`, persistence in flight.
    Committing,
}

/// Live state of a started session.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSurvey {
    pub session: SurveySession,
    pub segment: SegmentState,
    /// Last fix that moved the odometer.
    pub anchor: Option<LocationFix>,
    pub last_fix: Option<LocationFix>,
    pub committed: Vec<SegmentScore>,
}

impl ActiveSurvey {
    pub fn new(session: SurveySession) -> Self {
        Self {
            session,
            segment: SegmentState::Idle,
            anchor: None,
            last_fix: None,
            committed: Vec::new(),
        }
    }

    pub fn segment_active(&self) -> bool {
        !matches!(self.segment, SegmentState::Idle)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum SurveyState {
    #[default]
    NotStarted,
    /// Session record being created.
    Starting,
    Active(ActiveSurvey),
    Paused(ActiveSurvey),
    /// Final flush and summary in flight.
    Ending(ActiveSurvey),
    Ended(SurveySession),
    Discarded,
}

impl SurveyState {
    pub fn phase(&self) -> SessionPhase {
        match self {
            SurveyState::NotStarted => SessionPhase::NotStarted,
            SurveyState::Starting => SessionPhase::Starting,
            SurveyState::Active(_) => SessionPhase::Active,
            SurveyState::Paused(_) => SessionPhase::Paused,
            SurveyState::Ending(_) => SessionPhase::Ending,
            SurveyState::Ended(_) => SessionPhase::Ended,
            SurveyState::Discarded => SessionPhase::Discarded,
        }
    }

    pub fn survey(&self) -> Option<&ActiveSurvey> {
        match self {
            SurveyState::Active(survey)
            | SurveyState::Paused(survey)
            | SurveyState::Ending(survey) => Some(survey),
            _ => None,
        }
    }

    /// Active or Paused.
    pub fn open_survey_mut(&mut self) -> Option<&mut ActiveSurvey> {
        match self {
            SurveyState::Active(survey) | SurveyState::Paused(survey) => Some(survey),
            _ => None,
        }
    }

    pub fn session(&self) -> Option<&SurveySession> {
        match self {
            SurveyState::Ended(session) => Some(session),
            other => other.survey().map(|s| &s.session),
        }
    }

    fn ignored<T>(&self) -> Transition<T> {
        Transition::Ignored {
            phase: self.phase(),
        }
    }

    pub fn begin_start(&mut self) -> Transition<()> {
        if !matches!(self, SurveyState::NotStarted) {
            return self.ignored();
        }
        *self = SurveyState::Starting;
        Transition::Applied(())
    }

    /// Completes `begin_start`; `None` rolls back to NotStarted.
    pub fn finish_start(&mut self, session: Option<SurveySession>) {
        if !matches!(self, SurveyState::Starting) {
            return;
        }
        *self = match session {
            Some(session) => SurveyState::Active(ActiveSurvey::new(session)),
            None => SurveyState::NotStarted,
        };
    }

    pub fn pause(&mut self) -> Transition<()> {
        match std::mem::take(self) {
            SurveyState::Active(mut survey) => {
                survey.session.status = SessionStatus::Paused;
                *self = SurveyState::Paused(survey);
                Transition::Applied(())
            }
            other => {
                *self = other;
                self.ignored()
            }
        }
    }

    pub fn resume(&mut self) -> Transition<()> {
        match std::mem::take(self) {
            SurveyState::Paused(mut survey) => {
                // travel while paused is not surveyed
                survey.anchor = None;
                survey.session.status = SessionStatus::Active;
                *self = SurveyState::Active(survey);
                Transition::Applied(())
            }
            other => {
                *self = other;
                self.ignored()
            }
        }
    }

    pub fn start_segment(&mut self, now: DateTime<Utc>) -> Transition<SegmentDraft> {
        let SurveyState::Active(survey) = self else {
            return self.ignored();
        };
        if survey.segment != SegmentState::Idle {
            return self.ignored();
        }
        let draft = SegmentDraft::new(
            now,
            survey.session.distance_m,
            survey.last_fix.map(|fix| fix.position()),
        );
        survey.segment = SegmentState::Recording(draft.clone());
        Transition::Applied(draft)
    }

    /// Takes the recording draft out, leaving the segment in Committing.
    pub fn take_segment(&mut self) -> Transition<SegmentDraft> {
        let Some(survey) = self.open_survey_mut() else {
            return self.ignored();
        };
        match std::mem::replace(&mut survey.segment, SegmentState::Committing) {
            SegmentState::Recording(draft) => Transition::Applied(draft),
            other => {
                survey.segment = other;
                self.ignored()
            }
        }
    }

    /// Puts a draft back after a failed commit.
    pub fn restore_segment(&mut self, draft: SegmentDraft) {
        if let Some(survey) = self.open_survey_mut() {
            if survey.segment == SegmentState::Committing {
                survey.segment = SegmentState::Recording(draft);
            }
        }
    }

    pub fn finish_segment(&mut self, segment: &RoadSegment) {
        if let Some(survey) = self.open_survey_mut() {
            if survey.segment == SegmentState::Committing {
                survey.segment = SegmentState::Idle;
                survey.session.segment_count += 1;
                survey.committed.push(SegmentScore::of(segment));
            }
        }
    }

    pub fn cancel_segment(&mut self) -> Transition<()> {
        let Some(survey) = self.open_survey_mut() else {
            return self.ignored();
        };
        if let SegmentState::Recording(_) = survey.segment {
            survey.segment = SegmentState::Idle;
            Transition::Applied(())
        } else {
            self.ignored()
        }
    }

    /// Moves Active/Paused into Ending. Returns whether a segment was still
    /// recording; it is dropped. Ignored while a segment is being committed.
    pub fn begin_end(&mut self) -> Transition<bool> {
        let Some(survey) = self.open_survey_mut() else {
            return self.ignored();
        };
        if survey.segment == SegmentState::Committing {
            return self.ignored();
        }
        let dropped = matches!(survey.segment, SegmentState::Recording(_));
        survey.segment = SegmentState::Idle;
        *self = match std::mem::take(self) {
            SurveyState::Active(survey) | SurveyState::Paused(survey) => SurveyState::Ending(survey),
            other => other,
        };
        Transition::Applied(dropped)
    }

    pub fn finish_end(&mut self, session: SurveySession) {
        if let SurveyState::Ending(_) = self {
            *self = SurveyState::Ended(session);
        }
    }

    /// Active/Paused (or a stalled Ending) to Discarded. Returns the
    /// abandoned session.
    pub fn discard(&mut self) -> Transition<SurveySession> {
        match std::mem::take(self) {
            SurveyState::Active(survey)
            | SurveyState::Paused(survey)
            | SurveyState::Ending(survey) => {
                *self = SurveyState::Discarded;
                Transition::Applied(survey.session)
            }
            other => {
                *self = other;
                self.ignored()
            }
        }
    }
}
