//! Window assignment.
//!
//! Every guide frame, guide event and acquisition event is assigned to the
//! exposure window containing its instant, or recorded as an orphan with its
//! distance to the nearest window. Assignment is a binary search per record
//! against the sorted window starts, at most once per record, and fully
//! deterministic for identical inputs.

use session_core::models::{AcquisitionEvent, GuideEvent, GuideFrame, Timestamped};
use session_core::timevalue::TimeValue;

use crate::timeline::SessionTimeline;

// ── Output shapes ─────────────────────────────────────────────────────────────

/// A record that fell outside every exposure window, kept for diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct Orphan<T> {
    pub record: T,
    pub nearest_exposure_id: String,
    /// Seconds between the record and the nearest window boundary.
    pub distance_seconds: f64,
}

/// All records that landed inside one exposure's window, in stream order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExposureAssociation {
    pub exposure_id: String,
    pub guide_frames: Vec<GuideFrame>,
    pub guide_events: Vec<GuideEvent>,
    pub acquisition_events: Vec<AcquisitionEvent>,
}

/// The complete correlation result: one association per exposure (in
/// timeline order) plus every orphan.
#[derive(Debug, Default)]
pub struct Associations {
    pub by_exposure: Vec<ExposureAssociation>,
    pub orphan_guide_frames: Vec<Orphan<GuideFrame>>,
    pub orphan_guide_events: Vec<Orphan<GuideEvent>>,
    pub orphan_acquisition_events: Vec<Orphan<AcquisitionEvent>>,
}

impl Associations {
    /// Association lookup by exposure id.
    pub fn association_for(&self, exposure_id: &str) -> Option<&ExposureAssociation> {
        self.by_exposure
            .iter()
            .find(|a| a.exposure_id == exposure_id)
    }
}

// ── Correlator ────────────────────────────────────────────────────────────────

/// Assigns merged record streams into the timeline's exposure windows.
pub struct Correlator<'a> {
    timeline: &'a SessionTimeline,
}

impl<'a> Correlator<'a> {
    pub fn new(timeline: &'a SessionTimeline) -> Self {
        Self { timeline }
    }

    /// Distribute all three streams. Each record ends up in exactly one
    /// association or one orphan list.
    pub fn correlate(
        &self,
        guide_frames: Vec<GuideFrame>,
        guide_events: Vec<GuideEvent>,
        acquisition_events: Vec<AcquisitionEvent>,
    ) -> Associations {
        let mut out = Associations {
            by_exposure: self
                .timeline
                .exposures()
                .iter()
                .map(|e| ExposureAssociation {
                    exposure_id: e.id().to_string(),
                    ..Default::default()
                })
                .collect(),
            ..Default::default()
        };

        for frame in guide_frames {
            match self.assign(&frame.timestamp()) {
                Some(idx) => out.by_exposure[idx].guide_frames.push(frame),
                None => out.orphan_guide_frames.push(self.orphan(frame)),
            }
        }
        for event in guide_events {
            match self.assign(&event.timestamp()) {
                Some(idx) => out.by_exposure[idx].guide_events.push(event),
                None => out.orphan_guide_events.push(self.orphan(event)),
            }
        }
        for event in acquisition_events {
            match self.assign(&event.timestamp()) {
                Some(idx) => out.by_exposure[idx].acquisition_events.push(event),
                None => out.orphan_acquisition_events.push(self.orphan(event)),
            }
        }

        out
    }

    /// Which exposure owns instant `t`, if any.
    ///
    /// The candidate is the last exposure starting at or before `t`. An
    /// instant strictly inside the candidate's half-open window belongs to
    /// it. An instant exactly at the candidate's end belongs to the window
    /// starting there when one exists (the search already lands on it);
    /// reaching the equality arm therefore means no adjacent successor, and
    /// the ending exposure keeps the instant (closed-at-end fallback).
    fn assign(&self, t: &TimeValue) -> Option<usize> {
        let idx = self.timeline.candidate_index(t)?;
        let candidate = &self.timeline.exposures()[idx];
        if candidate.contains(t) || *t == candidate.end() {
            Some(idx)
        } else {
            None
        }
    }

    /// Wrap an unassignable record with its nearest-window distance.
    fn orphan<T: Timestamped>(&self, record: T) -> Orphan<T> {
        let t = record.timestamp();
        let exposures = self.timeline.exposures();

        let (nearest_exposure_id, distance_seconds) = match self.timeline.candidate_index(&t) {
            // Before the first exposure starts.
            None => {
                let first = &exposures[0];
                (first.id().to_string(), first.start().seconds_since(&t))
            }
            Some(idx) => {
                let prev = &exposures[idx];
                let behind = t.seconds_since(&prev.end());
                match exposures.get(idx + 1) {
                    Some(next) => {
                        let ahead = next.start().seconds_since(&t);
                        if ahead < behind {
                            (next.id().to_string(), ahead)
                        } else {
                            (prev.id().to_string(), behind)
                        }
                    }
                    None => (prev.id().to_string(), behind),
                }
            }
        };

        Orphan {
            record,
            nearest_exposure_id,
            distance_seconds,
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
