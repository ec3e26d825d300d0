//! PHD2-style guiding-log adapter.
//!
//! A guide log is line-oriented: a "Guiding Begins at <timestamp>" anchor
//! opens a guiding segment, mount correction samples follow as CSV rows timed
//! in fractional seconds since the anchor, and discrete events appear as
//! timestamp-prefixed info lines. One file may contain several segments when
//! guiding restarted during the night.

use std::io::BufRead;
use std::path::Path;

use regex::Regex;
use session_core::error::{Result, SessionError};
use session_core::models::{ErrorUnit, GuideEventKind, RawGuideEvent, RawGuideFrame};
use tracing::debug;

// ── Output shapes ─────────────────────────────────────────────────────────────

/// One guiding segment: everything between two "Guiding Begins" anchors.
///
/// Frame timestamps are relative seconds and must be resolved against
/// `anchor`; event timestamps are absolute text.
#[derive(Debug, Default)]
pub struct GuideLogSegment {
    pub anchor: Option<String>,
    pub frames: Vec<RawGuideFrame>,
    pub events: Vec<RawGuideEvent>,
}

impl GuideLogSegment {
    fn is_empty(&self) -> bool {
        self.anchor.is_none() && self.frames.is_empty() && self.events.is_empty()
    }
}

/// The parsed content of one guide-log file.
#[derive(Debug, Default)]
pub struct GuideLog {
    pub segments: Vec<GuideLogSegment>,
    pub skipped_lines: u64,
}

// ── Parser ────────────────────────────────────────────────────────────────────

/// Parse one guide-log file into its segments.
///
/// Lines that look like records but fail to parse are counted and skipped;
/// header chatter is ignored silently.
pub fn parse_guide_log(path: &Path) -> Result<GuideLog> {
    let file = std::fs::File::open(path).map_err(|source| SessionError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let begins =
        Regex::new(r"Guiding Begins at (\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})").expect("regex is valid");
    let event_line =
        Regex::new(r"^(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2}(?:\.\d+)?)\s+(.+)$").expect("regex is valid");

    let mut log = GuideLog::default();
    let mut segment = GuideLogSegment::default();

    let reader = std::io::BufReader::new(file);
    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => {
                log.skipped_lines += 1;
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(cap) = begins.captures(line) {
            if !segment.is_empty() {
                log.segments.push(std::mem::take(&mut segment));
            }
            segment.anchor = Some(cap[1].to_string());
            continue;
        }

        if is_mount_row(line) || is_drop_row(line) {
            match parse_data_row(line) {
                Some(frame) => segment.frames.push(frame),
                None => {
                    debug!("Skipping malformed guide row in {}: {}", path.display(), line);
                    log.skipped_lines += 1;
                }
            }
            continue;
        }

        if let Some(cap) = event_line.captures(line) {
            let message = cap[2].trim();
            segment.events.push(RawGuideEvent {
                raw_timestamp: cap[1].to_string(),
                kind: classify_message(message),
                payload: message.to_string(),
            });
            continue;
        }

        // Anything else that starts like a record but matched nothing.
        if line.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            log.skipped_lines += 1;
        }
    }

    if !segment.is_empty() {
        log.segments.push(segment);
    }

    Ok(log)
}

// ── Row helpers ───────────────────────────────────────────────────────────────

fn is_mount_row(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_digit()) && line.contains(",\"Mount\",")
}

fn is_drop_row(line: &str) -> bool {
    line.chars().next().is_some_and(|c| c.is_ascii_digit()) && line.contains(",\"DROP\"")
}

/// Parse one CSV sample row.
///
/// Columns: frame, time, mount, dx, dy, raw/guide distances, ..., star mass,
/// SNR, error code. Correction distances are in guide-camera pixels. A
/// "DROP" row marks a frame where the guide star was not usable.
fn parse_data_row(line: &str) -> Option<RawGuideFrame> {
    let fields: Vec<&str> = line.split(',').collect();
    let raw_timestamp = fields.get(1)?.trim().to_string();
    // Relative-seconds field must at least look numeric.
    raw_timestamp.parse::<f64>().ok()?;

    if is_drop_row(line) {
        return Some(RawGuideFrame {
            raw_timestamp,
            ra_error: 0.0,
            dec_error: 0.0,
            unit: ErrorUnit::Pixel,
            star_lost: true,
            snr: None,
        });
    }

    let ra_error = fields.get(3)?.trim().parse::<f64>().ok()?;
    let dec_error = fields.get(4)?.trim().parse::<f64>().ok()?;
    let snr = fields
        .get(16)
        .and_then(|s| s.trim().parse::<f64>().ok());

    Some(RawGuideFrame {
        raw_timestamp,
        ra_error,
        dec_error,
        unit: ErrorUnit::Pixel,
        star_lost: false,
        snr,
    })
}

fn classify_message(message: &str) -> GuideEventKind {
    let lower = message.to_lowercase();
    if lower.contains("guide star lost") {
        GuideEventKind::StarLost
    } else if lower.contains("settling started") || lower.contains("settle begin") {
        GuideEventKind::SettleBegin
    } else if lower.contains("settling complete") || lower.contains("settle done") {
        GuideEventKind::SettleDone
    } else if lower.contains("dither") {
        GuideEventKind::Dither
    } else if lower.contains("calibration") {
        GuideEventKind::Calibration
    } else {
        GuideEventKind::Other
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_log(lines: &[&str]) -> (TempDir, std::path::PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("PHD2_GuideLog_2025-04-16_200000.txt");
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        (dir, path)
    }

    #[test]
    fn test_parse_anchor_and_mount_rows() {
        let (_dir, path) = write_log(&[
            "PHD2 version 2.6.13, Log version 2.5.",
            "Guiding Begins at 2025-04-16 20:00:00",
            r#"1,1.520,"Mount",0.120,-0.340,0.118,-0.335,0.118,-0.335,120,E,95,N,0,0,31500,42.1,0"#,
            r#"2,3.540,"Mount",-0.080,0.210,-0.079,0.208,-0.079,0.208,80,W,60,S,0,0,31420,41.8,0"#,
        ]);

        let log = parse_guide_log(&path).unwrap();
        assert_eq!(log.segments.len(), 1);
        let seg = &log.segments[0];
        assert_eq!(seg.anchor.as_deref(), Some("2025-04-16 20:00:00"));
        assert_eq!(seg.frames.len(), 2);
        assert_eq!(seg.frames[0].raw_timestamp, "1.520");
        assert!((seg.frames[0].ra_error - 0.120).abs() < 1e-9);
        assert!((seg.frames[0].dec_error + 0.340).abs() < 1e-9);
        assert_eq!(seg.frames[0].unit, ErrorUnit::Pixel);
        assert!(!seg.frames[0].star_lost);
        assert!((seg.frames[0].snr.unwrap() - 42.1).abs() < 1e-9);
    }

    #[test]
    fn test_drop_row_marks_star_lost() {
        let (_dir, path) = write_log(&[
            "Guiding Begins at 2025-04-16 20:00:00",
            r#"3,5.560,"DROP",,,,,,,,,,,,,,,0"#,
        ]);

        let log = parse_guide_log(&path).unwrap();
        let frame = &log.segments[0].frames[0];
        assert!(frame.star_lost);
        assert_eq!(frame.raw_timestamp, "5.560");
        assert!(frame.snr.is_none());
    }

    #[test]
    fn test_event_lines_classified() {
        let (_dir, path) = write_log(&[
            "Guiding Begins at 2025-04-16 20:00:00",
            "2025-04-16 20:12:45 Guide star lost, SNR below threshold",
            "2025-04-16 20:12:50 Settling started",
            "2025-04-16 20:13:02 Settling complete",
            "2025-04-16 20:30:00 DITHER by 2.5 px",
            "2025-04-16 20:31:00 Something unusual happened",
        ]);

        let log = parse_guide_log(&path).unwrap();
        let kinds: Vec<GuideEventKind> =
            log.segments[0].events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                GuideEventKind::StarLost,
                GuideEventKind::SettleBegin,
                GuideEventKind::SettleDone,
                GuideEventKind::Dither,
                GuideEventKind::Other,
            ]
        );
        assert_eq!(log.segments[0].events[0].raw_timestamp, "2025-04-16 20:12:45");
    }

    #[test]
    fn test_restart_opens_second_segment() {
        let (_dir, path) = write_log(&[
            "Guiding Begins at 2025-04-16 20:00:00",
            r#"1,1.000,"Mount",0.1,0.1,0.1,0.1,0.1,0.1,0,E,0,N,0,0,31000,40.0,0"#,
            "Guiding Ends",
            "Guiding Begins at 2025-04-16 23:15:00",
            r#"1,2.000,"Mount",0.2,0.2,0.2,0.2,0.2,0.2,0,E,0,N,0,0,31000,40.0,0"#,
        ]);

        let log = parse_guide_log(&path).unwrap();
        assert_eq!(log.segments.len(), 2);
        assert_eq!(log.segments[1].anchor.as_deref(), Some("2025-04-16 23:15:00"));
        assert_eq!(log.segments[0].frames.len(), 1);
        assert_eq!(log.segments[1].frames.len(), 1);
    }

    #[test]
    fn test_malformed_rows_counted() {
        let (_dir, path) = write_log(&[
            "Guiding Begins at 2025-04-16 20:00:00",
            r#"1,not-a-time,"Mount",0.1,0.1,0.1,0.1"#,
            "12345 stray numeric line",
        ]);

        let log = parse_guide_log(&path).unwrap();
        assert!(log.segments[0].frames.is_empty());
        assert_eq!(log.skipped_lines, 2);
    }

    #[test]
    fn test_events_before_first_anchor_kept() {
        let (_dir, path) = write_log(&[
            "2025-04-16 19:55:00 Calibration Begins",
            "Guiding Begins at 2025-04-16 20:00:00",
        ]);

        let log = parse_guide_log(&path).unwrap();
        assert_eq!(log.segments.len(), 2);
        assert!(log.segments[0].anchor.is_none());
        assert_eq!(log.segments[0].events[0].kind, GuideEventKind::Calibration);
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = parse_guide_log(Path::new("/no/such/guide.txt")).unwrap_err();
        assert!(matches!(err, SessionError::FileRead { .. }));
    }
}
