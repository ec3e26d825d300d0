//! Top-level correlation pipeline.
//!
//! Orchestrates discovery, parsing, normalization, merging, timeline
//! construction, correlation and aggregation, returning a [`SessionReport`]
//! ready for the report emitters. Individual bad records never abort the
//! run; only a missing session directory or the complete absence of usable
//! image frames is fatal.

use std::path::Path;

use rayon::prelude::*;
use session_core::config::CorrelationConfig;
use session_core::error::{Result, SessionError};
use session_core::models::{
    AcquisitionEvent, GuideEvent, GuideFrame, ImageFrame, RawAcquisitionEvent, RawImageHeader,
    SourceKind,
};
use session_core::normalizer::TimestampNormalizer;
use session_core::stats::{PerExposureStats, SessionStats};
use tracing::{debug, warn};

use crate::adapters::{self, acquisition, guide, image};
use crate::aggregator::{Aggregator, EventSummary};
use crate::correlator::{Associations, Correlator};
use crate::diagnostics::Diagnostics;
use crate::merger::{MultiLogMerger, SessionBoundary};
use crate::timeline::SessionTimeline;

// ── File-naming conventions ───────────────────────────────────────────────────

pub const GUIDE_LOG_PREFIX: &str = "PHD2_GuideLog";
pub const ACQUISITION_LOG_PREFIX: &str = "Autorun_Log";
pub const LOG_EXTENSION: &str = ".txt";
pub const HEADER_DUMP_EXTENSION: &str = ".jsonl";

// ── Input / output shapes ─────────────────────────────────────────────────────

/// Already-parsed raw record streams, ready for normalization. This is the
/// in-process boundary for callers that do their own file handling.
#[derive(Debug, Default)]
pub struct RawStreams {
    pub image_headers: Vec<RawImageHeader>,
    /// One entry per guide-log file, segments preserved.
    pub guide_logs: Vec<guide::GuideLog>,
    /// One entry per acquisition-log file.
    pub acquisition_logs: Vec<Vec<RawAcquisitionEvent>>,
    /// Lines the adapters could not parse (fed into the diagnostics).
    pub skipped_lines: u64,
}

/// Everything one run produces.
#[derive(Debug)]
pub struct SessionReport {
    pub timeline: SessionTimeline,
    pub associations: Associations,
    pub per_exposure: Vec<PerExposureStats>,
    pub session_stats: SessionStats,
    pub event_summary: EventSummary,
    /// Flagged gaps in the merged guide-frame stream.
    pub guide_boundaries: Vec<SessionBoundary>,
    pub diagnostics: Diagnostics,
}

// ── Entry points ──────────────────────────────────────────────────────────────

/// Discover and parse all session files under `dir`, then correlate.
///
/// File parsing is per-file independent and runs in parallel; the merge is
/// the single synchronization point. A file that cannot be read is logged
/// and skipped, which can only become fatal if no image frames remain.
pub fn correlate_session(dir: &Path, config: &CorrelationConfig) -> Result<SessionReport> {
    if !dir.exists() {
        return Err(SessionError::SessionDirNotFound(dir.to_path_buf()));
    }

    let header_files = adapters::find_files_with_extension(dir, HEADER_DUMP_EXTENSION);
    if header_files.is_empty() {
        return Err(SessionError::NoLogFiles {
            kind: SourceKind::ImageHeader,
            path: dir.to_path_buf(),
        });
    }
    let guide_files = adapters::find_files_with_prefix(dir, GUIDE_LOG_PREFIX, LOG_EXTENSION);
    let acquisition_files =
        adapters::find_files_with_prefix(dir, ACQUISITION_LOG_PREFIX, LOG_EXTENSION);

    debug!(
        "Session {}: {} header dump(s), {} guide log(s), {} acquisition log(s)",
        dir.display(),
        header_files.len(),
        guide_files.len(),
        acquisition_files.len()
    );

    let mut streams = RawStreams::default();

    let header_parsed: Vec<_> = header_files
        .par_iter()
        .filter_map(|path| log_and_skip(image::read_header_dump(path)))
        .collect();
    for parsed in header_parsed {
        streams.skipped_lines += parsed.skipped_lines;
        streams.image_headers.extend(parsed.records);
    }

    let guide_parsed: Vec<_> = guide_files
        .par_iter()
        .filter_map(|path| log_and_skip(guide::parse_guide_log(path)))
        .collect();
    for log in guide_parsed {
        streams.skipped_lines += log.skipped_lines;
        streams.guide_logs.push(log);
    }

    let acquisition_parsed: Vec<_> = acquisition_files
        .par_iter()
        .filter_map(|path| log_and_skip(acquisition::parse_acquisition_log(path)))
        .collect();
    for parsed in acquisition_parsed {
        streams.skipped_lines += parsed.skipped_lines;
        streams.acquisition_logs.push(parsed.records);
    }

    correlate_streams(streams, config)
}

/// Normalize, merge, correlate and aggregate already-parsed streams.
pub fn correlate_streams(
    streams: RawStreams,
    config: &CorrelationConfig,
) -> Result<SessionReport> {
    let normalizer = TimestampNormalizer::new(config);
    let mut diagnostics = Diagnostics::default();
    diagnostics.skipped_records += streams.skipped_lines;

    // ── Step 1: Normalize ─────────────────────────────────────────────────────
    let image_frames = normalize_images(streams.image_headers, &normalizer, &mut diagnostics);
    let (guide_frame_files, guide_event_files) =
        normalize_guide_logs(streams.guide_logs, &normalizer, &mut diagnostics);
    let acquisition_files =
        normalize_acquisition_logs(streams.acquisition_logs, &normalizer, &mut diagnostics);

    // ── Step 2: Merge per-kind streams ────────────────────────────────────────
    let merger = MultiLogMerger::new(config.gap_multiplier);
    let guide_frames = merger.merge(guide_frame_files);
    let guide_events = merger.merge(guide_event_files);
    let acquisition_events = merger.merge(acquisition_files);

    for merged_counts in [
        (&guide_frames.boundaries, guide_frames.dropped_duplicates, guide_frames.near_duplicates),
        (&guide_events.boundaries, guide_events.dropped_duplicates, guide_events.near_duplicates),
        (
            &acquisition_events.boundaries,
            acquisition_events.dropped_duplicates,
            acquisition_events.near_duplicates,
        ),
    ] {
        diagnostics.session_boundaries += merged_counts.0.len() as u64;
        diagnostics.dropped_duplicates += merged_counts.1;
        diagnostics.near_duplicate_warnings += merged_counts.2;
    }

    // ── Step 3: Timeline (fatal when no exposure survived) ────────────────────
    let timeline = SessionTimeline::build(image_frames)?;
    diagnostics.overlap_resolutions = timeline.overlap_resolutions();

    // ── Step 4: Session-wide figures before correlation consumes the streams ──
    let aggregator = Aggregator::new(config);
    let session_stats = aggregator.session_stats(&guide_frames.records);
    let event_summary =
        Aggregator::summarize_events(&guide_events.records, &acquisition_events.records);
    let guide_boundaries = guide_frames.boundaries;

    // ── Step 5: Correlate ─────────────────────────────────────────────────────
    let associations = Correlator::new(&timeline).correlate(
        guide_frames.records,
        guide_events.records,
        acquisition_events.records,
    );
    diagnostics.orphan_guide_frames = associations.orphan_guide_frames.len() as u64;
    diagnostics.orphan_guide_events = associations.orphan_guide_events.len() as u64;
    diagnostics.orphan_acquisition_events = associations.orphan_acquisition_events.len() as u64;

    // ── Step 6: Per-exposure aggregation ──────────────────────────────────────
    let per_exposure = aggregator.per_exposure_stats(&associations);
    diagnostics.unit_mismatches = per_exposure.iter().filter(|s| s.unit_mismatch).count() as u64;

    Ok(SessionReport {
        timeline,
        associations,
        per_exposure,
        session_stats,
        event_summary,
        guide_boundaries,
        diagnostics,
    })
}

// ── Normalization helpers ─────────────────────────────────────────────────────

fn normalize_images(
    raw: Vec<RawImageHeader>,
    normalizer: &TimestampNormalizer,
    diagnostics: &mut Diagnostics,
) -> Vec<ImageFrame> {
    let mut frames = Vec::with_capacity(raw.len());
    for header in raw {
        if !header.duration_seconds.is_finite() || header.duration_seconds <= 0.0 {
            warn!(
                "Skipping exposure {}: non-positive duration {}",
                header.id, header.duration_seconds
            );
            diagnostics.skipped_records += 1;
            continue;
        }
        match normalizer.parse(&header.raw_start_timestamp, SourceKind::ImageHeader) {
            Ok(start) => frames.push(ImageFrame {
                id: header.id,
                start,
                duration_seconds: header.duration_seconds,
                header_fields: header.header_fields,
            }),
            Err(_) => diagnostics.record_parse_failure(SourceKind::ImageHeader),
        }
    }
    frames
}

fn normalize_guide_logs(
    logs: Vec<guide::GuideLog>,
    normalizer: &TimestampNormalizer,
    diagnostics: &mut Diagnostics,
) -> (Vec<Vec<GuideFrame>>, Vec<Vec<GuideEvent>>) {
    let mut frame_files = Vec::with_capacity(logs.len());
    let mut event_files = Vec::with_capacity(logs.len());

    for log in logs {
        let mut frames = Vec::new();
        let mut events = Vec::new();

        for segment in log.segments {
            // A lost anchor fails each relative sample individually below.
            let anchor = segment.anchor.as_deref().and_then(|raw| {
                match normalizer.parse(raw, SourceKind::GuideLog) {
                    Ok(tv) => Some(tv),
                    Err(_) => {
                        diagnostics.record_parse_failure(SourceKind::GuideLog);
                        None
                    }
                }
            });

            for raw in segment.frames {
                match normalizer.parse_with_anchor(
                    &raw.raw_timestamp,
                    SourceKind::GuideLog,
                    anchor.as_ref(),
                ) {
                    Ok(time) => frames.push(GuideFrame {
                        time,
                        ra_error: raw.ra_error,
                        dec_error: raw.dec_error,
                        unit: raw.unit,
                        star_lost: raw.star_lost,
                        snr: raw.snr,
                    }),
                    Err(_) => diagnostics.record_parse_failure(SourceKind::GuideLog),
                }
            }

            for raw in segment.events {
                match normalizer.parse(&raw.raw_timestamp, SourceKind::GuideLog) {
                    Ok(time) => events.push(GuideEvent {
                        time,
                        kind: raw.kind,
                        payload: raw.payload,
                    }),
                    Err(_) => diagnostics.record_parse_failure(SourceKind::GuideLog),
                }
            }
        }

        frame_files.push(frames);
        event_files.push(events);
    }

    (frame_files, event_files)
}

fn normalize_acquisition_logs(
    logs: Vec<Vec<RawAcquisitionEvent>>,
    normalizer: &TimestampNormalizer,
    diagnostics: &mut Diagnostics,
) -> Vec<Vec<AcquisitionEvent>> {
    logs.into_iter()
        .map(|raw_events| {
            let mut events = Vec::with_capacity(raw_events.len());
            for raw in raw_events {
                match normalizer.parse(&raw.raw_timestamp, SourceKind::AcquisitionLog) {
                    Ok(time) => events.push(AcquisitionEvent {
                        time,
                        kind: raw.kind,
                        payload: raw.payload,
                    }),
                    Err(_) => diagnostics.record_parse_failure(SourceKind::AcquisitionLog),
                }
            }
            events
        })
        .collect()
}

fn log_and_skip<T>(result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Skipping unreadable session file: {}", e);
            None
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(dir: &Path, name: &str, lines: &[&str]) {
        let path = dir.join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
    }

    fn header_line(id: &str, ts: &str, duration: f64) -> String {
        serde_json::json!({
            "id": id,
            "raw_start_timestamp": ts,
            "duration_seconds": duration,
        })
        .to_string()
    }

    /// Two adjacent 300s exposures starting 20:00:00Z plus guide and
    /// acquisition logs exercising association, orphaning and events.
    fn write_session(dir: &Path) {
        write_file(
            dir,
            "frames.jsonl",
            &[
                &header_line("Light_0001", "2025-04-16T20:00:00Z", 300.0),
                &header_line("Light_0002", "2025-04-16T20:05:00Z", 300.0),
            ],
        );
        write_file(
            dir,
            "PHD2_GuideLog_2025-04-16_200000.txt",
            &[
                "Guiding Begins at 2025-04-16 20:00:00",
                r#"1,10.000,"Mount",0.30,-0.40,0.30,-0.40,0.30,-0.40,30,E,40,N,0,0,31000,40.0,0"#,
                r#"2,150.000,"Mount",-0.30,0.40,-0.30,0.40,-0.30,0.40,30,W,40,S,0,0,31000,40.0,0"#,
                r#"3,400.000,"Mount",0.10,0.10,0.10,0.10,0.10,0.10,10,E,10,N,0,0,31000,40.0,0"#,
                r#"4,700.000,"Mount",0.20,0.20,0.20,0.20,0.20,0.20,10,E,10,N,0,0,31000,40.0,0"#,
                "2025-04-16 20:02:00 Guide star lost",
            ],
        );
        write_file(
            dir,
            "Autorun_Log_2025-04-16_195000.txt",
            &[
                "2025/04/16 19:50:00 [AutoFocus|Begin] Running auto focus",
                "2025/04/16 20:06:00 Exposure 300.0s image 2#",
            ],
        );
    }

    #[test]
    fn test_full_session_correlation() {
        let dir = TempDir::new().unwrap();
        write_session(dir.path());

        let report = correlate_session(dir.path(), &CorrelationConfig::default()).unwrap();

        assert_eq!(report.timeline.len(), 2);

        // Frames at +10s and +150s land in the first window, +400s in the
        // second, +700s (20:11:40) is past the last end (20:10:00).
        assert_eq!(report.associations.by_exposure[0].guide_frames.len(), 2);
        assert_eq!(report.associations.by_exposure[1].guide_frames.len(), 1);
        assert_eq!(report.associations.orphan_guide_frames.len(), 1);
        let orphan = &report.associations.orphan_guide_frames[0];
        assert_eq!(orphan.nearest_exposure_id, "Light_0002");
        assert!((orphan.distance_seconds - 100.0).abs() < 1e-6);

        // The star-lost event at 20:02 belongs to the first exposure.
        let first = report.associations.association_for("Light_0001").unwrap();
        assert_eq!(first.guide_events.len(), 1);

        // Autofocus at 19:50 precedes every window; the 20:06 line lands in
        // the second window.
        assert_eq!(report.associations.orphan_acquisition_events.len(), 1);
        assert_eq!(
            report.associations.by_exposure[1].acquisition_events.len(),
            1
        );

        // Stats follow the association counts.
        assert_eq!(report.per_exposure[0].sample_count, 2);
        assert_eq!(report.per_exposure[1].sample_count, 1);
        assert_eq!(report.session_stats.sample_count, 4);

        // Diagnostics mirror the orphan counts.
        assert_eq!(report.diagnostics.orphan_guide_frames, 1);
        assert_eq!(report.diagnostics.orphan_acquisition_events, 1);
        assert_eq!(report.diagnostics.parse_failures.values().sum::<u64>(), 0);
    }

    #[test]
    fn test_rerun_is_identical() {
        let dir = TempDir::new().unwrap();
        write_session(dir.path());
        let config = CorrelationConfig::default();

        let a = correlate_session(dir.path(), &config).unwrap();
        let b = correlate_session(dir.path(), &config).unwrap();

        assert_eq!(a.associations.by_exposure, b.associations.by_exposure);
        assert_eq!(a.per_exposure, b.per_exposure);
        assert_eq!(a.session_stats, b.session_stats);
        assert_eq!(a.guide_boundaries, b.guide_boundaries);
    }

    #[test]
    fn test_missing_session_dir_is_fatal() {
        let result = correlate_session(
            Path::new("/no/such/session-dir"),
            &CorrelationConfig::default(),
        );
        assert!(matches!(result, Err(SessionError::SessionDirNotFound(_))));
    }

    #[test]
    fn test_no_header_dumps_is_fatal() {
        let dir = TempDir::new().unwrap();
        write_file(dir.path(), "PHD2_GuideLog_x.txt", &["Guiding Begins at 2025-04-16 20:00:00"]);

        let result = correlate_session(dir.path(), &CorrelationConfig::default());
        assert!(matches!(
            result,
            Err(SessionError::NoLogFiles {
                kind: SourceKind::ImageHeader,
                ..
            })
        ));
    }

    #[test]
    fn test_no_usable_image_frames_is_fatal() {
        // The dump exists but every record is malformed.
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "frames.jsonl",
            &[&header_line("Light_0001", "not-a-timestamp", 300.0)],
        );

        let result = correlate_session(dir.path(), &CorrelationConfig::default());
        assert!(matches!(result, Err(SessionError::NoImageFrames)));
    }

    #[test]
    fn test_bad_records_skipped_and_counted() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "frames.jsonl",
            &[
                &header_line("Light_0001", "2025-04-16T20:00:00Z", 300.0),
                &header_line("Light_0002", "garbage", 300.0),
                &header_line("Light_0003", "2025-04-16T20:05:00Z", -5.0),
            ],
        );

        let report = correlate_session(dir.path(), &CorrelationConfig::default()).unwrap();
        assert_eq!(report.timeline.len(), 1);
        assert_eq!(
            report.diagnostics.parse_failures_for(SourceKind::ImageHeader),
            1
        );
        assert_eq!(report.diagnostics.skipped_records, 1);
    }

    #[test]
    fn test_streams_without_guiding_produce_no_data_stats() {
        let dir = TempDir::new().unwrap();
        write_file(
            dir.path(),
            "frames.jsonl",
            &[&header_line("Light_0001", "2025-04-16T20:00:00Z", 300.0)],
        );

        let report = correlate_session(dir.path(), &CorrelationConfig::default()).unwrap();
        assert_eq!(report.per_exposure[0].sample_count, 0);
        assert!(report.per_exposure[0].rms_combined.is_none());
        assert_eq!(report.session_stats.sample_count, 0);
    }
}
