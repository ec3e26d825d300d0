//! Multi-file stream merging.
//!
//! A night of imaging routinely produces several same-kind log files
//! (guiding restarts, log rollover). The merger concatenates their already
//! normalized records into one chronologically ordered stream, drops exact
//! duplicates from overlapping captures and flags suspicious temporal gaps
//! as session boundaries without splitting the stream.

use serde::Serialize;
use session_core::models::Timestamped;
use tracing::debug;

// ── Output shapes ─────────────────────────────────────────────────────────────

/// A flagged gap between two consecutive records in a merged stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionBoundary {
    /// Index (in the merged record vector) of the first record after the gap.
    pub index: usize,
    pub gap_seconds: f64,
}

/// One merged, chronologically sorted stream with its merge diagnostics.
#[derive(Debug)]
pub struct MergedStream<T> {
    pub records: Vec<T>,
    pub boundaries: Vec<SessionBoundary>,
    /// Exact timestamp+payload duplicates that were removed.
    pub dropped_duplicates: u64,
    /// Same-timestamp records with differing payloads that were kept.
    pub near_duplicates: u64,
}

// ── MultiLogMerger ────────────────────────────────────────────────────────────

/// Merges per-file record lists into one ordered stream.
pub struct MultiLogMerger {
    gap_multiplier: f64,
}

impl MultiLogMerger {
    pub fn new(gap_multiplier: f64) -> Self {
        Self { gap_multiplier }
    }

    /// Merge the per-file lists (given in file order) into one stream.
    ///
    /// The sort is stable, so records sharing an instant keep their arrival
    /// order.
    pub fn merge<T>(&self, per_file: Vec<Vec<T>>) -> MergedStream<T>
    where
        T: Timestamped + PartialEq,
    {
        let mut records: Vec<T> = per_file.into_iter().flatten().collect();
        records.sort_by(|a, b| a.timestamp().cmp(&b.timestamp()));

        let (records, dropped_duplicates, near_duplicates) = dedup_sorted(records);
        let boundaries = detect_boundaries(&records, self.gap_multiplier);

        if !boundaries.is_empty() {
            debug!(
                "MultiLogMerger: flagged {} boundary gap(s) in {} records",
                boundaries.len(),
                records.len()
            );
        }

        MergedStream {
            records,
            boundaries,
            dropped_duplicates,
            near_duplicates,
        }
    }
}

/// Remove exact duplicates within runs of equal timestamps.
///
/// Two records are exact duplicates when their instants and payloads are both
/// equal; such pairs come from the same event captured in overlapping files.
/// Same-instant records with different payloads are genuine data and are
/// kept, but counted so the caller can surface a warning.
fn dedup_sorted<T>(records: Vec<T>) -> (Vec<T>, u64, u64)
where
    T: Timestamped + PartialEq,
{
    let mut kept: Vec<T> = Vec::with_capacity(records.len());
    let mut dropped = 0u64;
    let mut near = 0u64;
    // Index in `kept` where the run of the current timestamp begins.
    let mut run_start = 0usize;

    for record in records {
        let same_run = kept
            .last()
            .is_some_and(|last| last.timestamp() == record.timestamp());
        if !same_run {
            run_start = kept.len();
            kept.push(record);
            continue;
        }
        if kept[run_start..].iter().any(|k| *k == record) {
            dropped += 1;
        } else {
            near += 1;
            kept.push(record);
        }
    }

    (kept, dropped, near)
}

/// Flag gaps larger than `multiplier` times the typical (median) positive
/// inter-record interval.
fn detect_boundaries<T: Timestamped>(records: &[T], multiplier: f64) -> Vec<SessionBoundary> {
    let mut deltas: Vec<f64> = records
        .windows(2)
        .map(|w| w[1].timestamp().seconds_since(&w[0].timestamp()))
        .filter(|d| *d > 0.0)
        .collect();
    if deltas.is_empty() {
        return Vec::new();
    }

    deltas.sort_by(|a, b| a.partial_cmp(b).expect("intervals are finite"));
    let mid = deltas.len() / 2;
    let median = if deltas.len() % 2 == 0 {
        (deltas[mid - 1] + deltas[mid]) / 2.0
    } else {
        deltas[mid]
    };
    let threshold = multiplier * median;

    records
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let gap = w[1].timestamp().seconds_since(&w[0].timestamp());
            (gap > threshold).then_some(SessionBoundary {
                index: i + 1,
                gap_seconds: gap,
            })
        })
        .collect()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
