//! Statistic aggregation over correlated records.
//!
//! Folds each exposure's associated guide frames into a per-exposure summary,
//! the full guide stream into one session-wide summary, and the discrete
//! events into categorized counts.

use std::collections::BTreeMap;

use serde::Serialize;
use session_core::config::CorrelationConfig;
use session_core::models::{AcquisitionEvent, GuideEvent, GuideFrame};
use session_core::stats::{GuideStatsCalculator, PerExposureStats, SessionStats};

use crate::correlator::Associations;

// ── EventSummary ──────────────────────────────────────────────────────────────

/// Session-wide event counts grouped by kind.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EventSummary {
    pub guide_events: BTreeMap<String, u64>,
    pub acquisition_events: BTreeMap<String, u64>,
}

// ── Aggregator ────────────────────────────────────────────────────────────────

/// Derives read-only statistics from correlation output. Never mutates the
/// upstream records.
pub struct Aggregator {
    calculator: GuideStatsCalculator,
}

impl Aggregator {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            calculator: GuideStatsCalculator::new(config),
        }
    }

    /// One stat record per exposure, in timeline order. Exposures with no
    /// associated frames report "no data" rather than zeros.
    pub fn per_exposure_stats(&self, associations: &Associations) -> Vec<PerExposureStats> {
        associations
            .by_exposure
            .iter()
            .map(|assoc| {
                self.calculator
                    .exposure_stats(&assoc.exposure_id, &assoc.guide_frames)
            })
            .collect()
    }

    /// Session-wide statistics over the complete guide stream, independent of
    /// exposure boundaries.
    pub fn session_stats(&self, frames: &[GuideFrame]) -> SessionStats {
        self.calculator.session_stats(frames)
    }

    /// Count discrete events per kind across the whole session.
    pub fn summarize_events<'a>(
        guide_events: impl IntoIterator<Item = &'a GuideEvent>,
        acquisition_events: impl IntoIterator<Item = &'a AcquisitionEvent>,
    ) -> EventSummary {
        let mut summary = EventSummary::default();
        for event in guide_events {
            *summary.guide_events.entry(event.kind.to_string()).or_default() += 1;
        }
        for event in acquisition_events {
            *summary
                .acquisition_events
                .entry(event.kind.to_string())
                .or_default() += 1;
        }
        summary
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
