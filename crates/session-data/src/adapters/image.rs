//! Image-header dump reader.
//!
//! Exposure metadata arrives as JSONL header dumps, one JSON object per line
//! with the exposure id, raw start-timestamp text, duration and the opaque
//! header fields carried through to the report.

use std::io::BufRead;
use std::path::Path;

use session_core::error::{Result, SessionError};
use session_core::models::RawImageHeader;
use tracing::debug;

use super::Parsed;

/// Read all raw image-header records from one `.jsonl` header dump.
///
/// Malformed lines are skipped and counted; only failure to open the file is
/// an error.
pub fn read_header_dump(path: &Path) -> Result<Parsed<RawImageHeader>> {
    let file = std::fs::File::open(path).map_err(|source| SessionError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;

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
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match serde_json::from_str::<RawImageHeader>(trimmed) {
            Ok(record) => out.records.push(record),
            Err(e) => {
                debug!("Skipping malformed header line in {}: {}", path.display(), e);
                out.skipped_lines += 1;
            }
        }
    }

    Ok(out)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
