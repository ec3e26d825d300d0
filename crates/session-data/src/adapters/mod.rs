//! Log-file adapters.
//!
//! Each adapter turns one file of its kind into raw records carrying raw
//! timestamp text; normalization to [`session_core::TimeValue`] happens in
//! the pipeline. Adapters never abort a run over a bad line: unparsable
//! lines are counted and skipped.

pub mod acquisition;
pub mod guide;
pub mod image;

use std::path::{Path, PathBuf};

use tracing::warn;

/// Records parsed from one file plus the number of lines that looked like
/// records but could not be parsed.
#[derive(Debug)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub skipped_lines: u64,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            skipped_lines: 0,
        }
    }
}

/// Find all files under `dir` whose file name starts with `prefix` and ends
/// with `extension`, sorted by path.
///
/// Several same-kind files per session are normal (guiding restarts, log
/// rollover), so this always returns the full sorted set.
pub fn find_files_with_prefix(dir: &Path, prefix: &str, extension: &str) -> Vec<PathBuf> {
    find_files(dir, |name| name.starts_with(prefix) && name.ends_with(extension))
}

/// Find all files under `dir` whose file name ends with `extension`, sorted
/// by path.
pub fn find_files_with_extension(dir: &Path, extension: &str) -> Vec<PathBuf> {
    find_files(dir, |name| name.ends_with(extension))
}

fn find_files(dir: &Path, matches: impl Fn(&str) -> bool) -> Vec<PathBuf> {
    if !dir.exists() {
        warn!("Session path does not exist: {}", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .path()
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map(&matches)
                    .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

// ── Tests ─────────────────────────────────────────────────────────────────────
