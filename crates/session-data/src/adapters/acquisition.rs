//! Acquisition-log adapter (NINA / Autorun-style logs).
//!
//! Every record line is `<timestamp> <message>`. The adapter classifies the
//! message into an event kind and extracts a few structured payload fields
//! (autofocus position, plate-solve result); everything it does not
//! recognise is carried through as an `Other` event with the raw message.

use std::io::BufRead;
use std::path::Path;

use regex::Regex;
use session_core::error::{Result, SessionError};
use session_core::models::{AcquisitionEventKind, RawAcquisitionEvent};

use super::Parsed;

/// Parse one acquisition log into raw events.
pub fn parse_acquisition_log(path: &Path) -> Result<Parsed<RawAcquisitionEvent>> {
    let file = std::fs::File::open(path).map_err(|source| SessionError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

    let record_line =
        Regex::new(r"^(\d{4}[-/]\d{2}[-/]\d{2} \d{2}:\d{2}:\d{2})\s+(.+)$").expect("regex is valid");
    // Interleaved output-filename lines are expected and carry no timestamp.
    let filename_line = Regex::new(r"(?i)^\S+\.fit[s]?$").expect("regex is valid");
    let focus_success =
        Regex::new(r"Auto focus succeeded, the focused position is (\d+)").expect("regex is valid");
    let solve_success = Regex::new(r"Solve succeeded: RA:(\S+) DEC:(\S+)").expect("regex is valid");

    let mut out = Parsed::default();
    let reader = std::io::BufReader::new(file);

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => {
                out.skipped_lines += 1;
                continue;
            }
        };
        let line = line.trim();
        if line.is_empty() || filename_line.is_match(line) {
            continue;
        }

        let Some(cap) = record_line.captures(line) else {
            out.skipped_lines += 1;
            continue;
        };

        let message = cap[2].trim();
        let (kind, payload) = classify_message(message, &focus_success, &solve_success);
        out.records.push(RawAcquisitionEvent {
            raw_timestamp: cap[1].to_string(),
            kind,
            payload,
        });
    }

    Ok(out)
}

fn classify_message(
    message: &str,
    focus_success: &Regex,
    solve_success: &Regex,
) -> (AcquisitionEventKind, Vec<(String, String)>) {
    if message.contains("[AutoFocus|Begin]") {
        let details = message.split("[AutoFocus|Begin]").nth(1).unwrap_or("").trim();
        return (
            AcquisitionEventKind::AutofocusStart,
            vec![("details".to_string(), details.to_string())],
        );
    }
    if let Some(cap) = focus_success.captures(message) {
        return (
            AcquisitionEventKind::AutofocusResult,
            vec![
                ("status".to_string(), "success".to_string()),
                ("position".to_string(), cap[1].to_string()),
            ],
        );
    }
    if message.contains("Auto focus failed") {
        return (
            AcquisitionEventKind::AutofocusResult,
            vec![("status".to_string(), "failure".to_string())],
        );
    }
    if let Some(cap) = solve_success.captures(message) {
        return (
            AcquisitionEventKind::PlateSolve,
            vec![
                ("status".to_string(), "success".to_string()),
                ("ra".to_string(), cap[1].to_string()),
                ("dec".to_string(), cap[2].to_string()),
            ],
        );
    }
    if message.contains("Plate Solve") {
        return (
            AcquisitionEventKind::PlateSolve,
            vec![("status".to_string(), "started".to_string())],
        );
    }
    if message.contains("Meridian Flip") {
        let phase = if message.contains("|Begin]") {
            "begin"
        } else if message.contains("|End]") {
            "end"
        } else {
            "progress"
        };
        return (
            AcquisitionEventKind::MeridianFlip,
            vec![
                ("phase".to_string(), phase.to_string()),
                ("details".to_string(), message.to_string()),
            ],
        );
    }
    (
        AcquisitionEventKind::Other,
        vec![("message".to_string(), message.to_string())],
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
