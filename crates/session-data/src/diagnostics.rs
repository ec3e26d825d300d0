use std::collections::BTreeMap;

use serde::Serialize;
use session_core::models::SourceKind;

/// Counters describing everything the pipeline skipped, resolved or flagged
/// during one run.
///
/// Returned alongside the normal output so callers can audit data quality
/// without the engine relying on process-wide flags or log scraping.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Diagnostics {
    /// Timestamp parse failures keyed by source kind.
    pub parse_failures: BTreeMap<String, u64>,
    /// Records dropped for a malformed shape (missing field, bad duration).
    pub skipped_records: u64,
    /// Exact timestamp+payload duplicates removed during merging.
    pub dropped_duplicates: u64,
    /// Same-timestamp records with differing payloads that were kept.
    pub near_duplicate_warnings: u64,
    /// Temporal gaps flagged as session boundaries across all merged streams.
    pub session_boundaries: u64,
    /// Overlapping exposure windows that were truncated.
    pub overlap_resolutions: u64,
    /// Exposures whose combined RMS was suppressed by mixed units.
    pub unit_mismatches: u64,
    /// Guide frames that fell outside every exposure window.
    pub orphan_guide_frames: u64,
    /// Guide events that fell outside every exposure window.
    pub orphan_guide_events: u64,
    /// Acquisition events that fell outside every exposure window.
    pub orphan_acquisition_events: u64,
}

impl Diagnostics {
    /// Bump the parse-failure counter for one source kind.
    pub fn record_parse_failure(&mut self, kind: SourceKind) {
        *self.parse_failures.entry(kind.to_string()).or_default() += 1;
    }

    /// Parse failures recorded for one source kind.
    pub fn parse_failures_for(&self, kind: SourceKind) -> u64 {
        self.parse_failures
            .get(&kind.to_string())
            .copied()
            .unwrap_or(0)
    }

    /// Total records that did not make it into the correlated output.
    pub fn total_skipped(&self) -> u64 {
        self.parse_failures.values().sum::<u64>() + self.skipped_records
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_failures_keyed_by_source() {
        let mut diag = Diagnostics::default();
        diag.record_parse_failure(SourceKind::GuideLog);
        diag.record_parse_failure(SourceKind::GuideLog);
        diag.record_parse_failure(SourceKind::ImageHeader);

        assert_eq!(diag.parse_failures_for(SourceKind::GuideLog), 2);
        assert_eq!(diag.parse_failures_for(SourceKind::ImageHeader), 1);
        assert_eq!(diag.parse_failures_for(SourceKind::AcquisitionLog), 0);
    }

    #[test]
    fn test_total_skipped_sums_failures_and_shape_skips() {
        let mut diag = Diagnostics::default();
        diag.record_parse_failure(SourceKind::AcquisitionLog);
        diag.skipped_records = 3;
        assert_eq!(diag.total_skipped(), 4);
    }
}
