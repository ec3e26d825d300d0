//! Ordered exposure timeline.
//!
//! Holds the night's image frames sorted by start time with their resolved,
//! non-overlapping windows. Overlaps in the input (duplicate or corrected
//! exposure start times) are resolved by truncating the earlier window to
//! the later window's start, never by dropping an exposure silently.

use session_core::error::{Result, SessionError};
use session_core::models::ImageFrame;
use session_core::timevalue::TimeValue;
use tracing::warn;

// ── Exposure ──────────────────────────────────────────────────────────────────

/// One image frame plus its resolved half-open window `[start, end)`.
///
/// `end` is normally `start + duration` but may have been truncated during
/// overlap resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Exposure {
    pub frame: ImageFrame,
    end: TimeValue,
}

impl Exposure {
    pub fn start(&self) -> TimeValue {
        self.frame.start
    }

    pub fn end(&self) -> TimeValue {
        self.end
    }

    pub fn id(&self) -> &str {
        &self.frame.id
    }

    /// Whether `t` falls inside the resolved half-open window.
    pub fn contains(&self, t: &TimeValue) -> bool {
        *t >= self.start() && *t < self.end
    }

    /// Whether overlap resolution shortened this window.
    pub fn truncated(&self) -> bool {
        self.end < self.frame.end()
    }
}

// ── SessionTimeline ───────────────────────────────────────────────────────────

/// The ordered sequence of exposures, used as the windowing reference for
/// correlation.
#[derive(Debug)]
pub struct SessionTimeline {
    exposures: Vec<Exposure>,
    overlap_resolutions: u64,
}

impl SessionTimeline {
    /// Build the timeline from the full image-frame list.
    ///
    /// Frames are stably sorted by start time, so frames declaring the same
    /// start keep their declaration order and the later-declared one wins
    /// the overlapping region. Fails only when no frame exists at all.
    pub fn build(mut frames: Vec<ImageFrame>) -> Result<Self> {
        if frames.is_empty() {
            return Err(SessionError::NoImageFrames);
        }

        frames.sort_by(|a, b| a.start.cmp(&b.start));

        let mut exposures: Vec<Exposure> = frames
            .into_iter()
            .map(|frame| {
                let end = frame.end();
                Exposure { frame, end }
            })
            .collect();

        let mut overlap_resolutions = 0u64;
        for i in 0..exposures.len().saturating_sub(1) {
            let next_start = exposures[i + 1].start();
            if exposures[i].end > next_start {
                warn!(
                    "Exposure {} overlaps {}; truncating earlier window at {}",
                    exposures[i].id(),
                    exposures[i + 1].id(),
                    next_start
                );
                exposures[i].end = next_start;
                overlap_resolutions += 1;
            }
        }

        Ok(Self {
            exposures,
            overlap_resolutions,
        })
    }

    /// The exposures in chronological order.
    pub fn exposures(&self) -> &[Exposure] {
        &self.exposures
    }

    pub fn len(&self) -> usize {
        self.exposures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exposures.is_empty()
    }

    /// How many overlapping windows were truncated while building.
    pub fn overlap_resolutions(&self) -> u64 {
        self.overlap_resolutions
    }

    /// Index of the last exposure whose start is at or before `t`, if any.
    ///
    /// Binary search over the sorted start times; the candidate for "which
    /// window contains `t`".
    pub fn candidate_index(&self, t: &TimeValue) -> Option<usize> {
        let idx = self.exposures.partition_point(|e| e.start() <= *t);
        idx.checked_sub(1)
    }

    /// The exposure whose window contains `t`, if any.
    pub fn window_containing(&self, t: &TimeValue) -> Option<&Exposure> {
        let candidate = &self.exposures[self.candidate_index(t)?];
        candidate.contains(t).then_some(candidate)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use session_core::timevalue::TimePrecision;
    use chrono::{TimeZone, Utc};

    fn tv(secs: i64) -> TimeValue {
        TimeValue::new(
            Utc.with_ymd_and_hms(2025, 4, 16, 20, 0, 0).unwrap()
                + chrono::Duration::seconds(secs),
            TimePrecision::Second,
        )
    }

    fn frame(id: &str, start_secs: i64, duration: f64) -> ImageFrame {
        ImageFrame {
            id: id.to_string(),
            start: tv(start_secs),
            duration_seconds: duration,
            header_fields: Vec::new(),
        }
    }

    #[test]
    fn test_empty_input_is_fatal() {
        let result = SessionTimeline::build(Vec::new());
        assert!(matches!(result, Err(SessionError::NoImageFrames)));
    }

    #[test]
    fn test_frames_sorted_by_start() {
        let timeline = SessionTimeline::build(vec![
            frame("c", 600, 300.0),
            frame("a", 0, 300.0),
            frame("b", 300, 300.0),
        ])
        .unwrap();
        let ids: Vec<&str> = timeline.exposures().iter().map(|e| e.id()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(timeline.overlap_resolutions(), 0);
    }

    #[test]
    fn test_overlap_truncates_earlier_window() {
        // "a" runs 0..300 but "b" starts at 200.
        let timeline =
            SessionTimeline::build(vec![frame("a", 0, 300.0), frame("b", 200, 300.0)]).unwrap();

        let a = &timeline.exposures()[0];
        assert_eq!(a.end(), tv(200));
        assert!(a.truncated());
        assert_eq!(timeline.overlap_resolutions(), 1);
        // The later-declared exposure keeps the overlapping region.
        assert_eq!(timeline.window_containing(&tv(250)).unwrap().id(), "b");
    }

    #[test]
    fn test_duplicate_start_later_declared_wins() {
        let timeline =
            SessionTimeline::build(vec![frame("first", 0, 300.0), frame("second", 0, 300.0)])
                .unwrap();
        // Stable sort keeps declaration order; the earlier frame's window is
        // truncated to zero width.
        assert_eq!(timeline.window_containing(&tv(100)).unwrap().id(), "second");
        assert_eq!(timeline.overlap_resolutions(), 1);
    }

    #[test]
    fn test_window_lookup_inside_and_outside() {
        let timeline =
            SessionTimeline::build(vec![frame("a", 0, 300.0), frame("b", 400, 300.0)]).unwrap();

        assert_eq!(timeline.window_containing(&tv(150)).unwrap().id(), "a");
        assert_eq!(timeline.window_containing(&tv(450)).unwrap().id(), "b");
        // Dead time between the windows.
        assert!(timeline.window_containing(&tv(350)).is_none());
        // Before the first start.
        assert!(timeline.window_containing(&tv(-10)).is_none());
        // After the last end.
        assert!(timeline.window_containing(&tv(800)).is_none());
    }

    #[test]
    fn test_candidate_index_boundaries() {
        let timeline =
            SessionTimeline::build(vec![frame("a", 0, 300.0), frame("b", 400, 300.0)]).unwrap();
        assert_eq!(timeline.candidate_index(&tv(-1)), None);
        assert_eq!(timeline.candidate_index(&tv(0)), Some(0));
        assert_eq!(timeline.candidate_index(&tv(399)), Some(0));
        assert_eq!(timeline.candidate_index(&tv(400)), Some(1));
    }
}
