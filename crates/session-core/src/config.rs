use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::models::{ErrorUnit, SourceKind};

// ── CorrelationConfig ─────────────────────────────────────────────────────────

/// Run configuration supplied by the caller (or a JSON config file).
///
/// Every field has a working default, so `CorrelationConfig::default()` is a
/// complete configuration for the common "one rig, UTC clocks" session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationConfig {
    /// Timestamp format candidates for image-header records, tried in order.
    pub image_header_formats: Vec<String>,
    /// Timestamp format candidates for guiding-log records, tried in order.
    pub guide_log_formats: Vec<String>,
    /// Timestamp format candidates for acquisition-log records, tried in order.
    pub acquisition_log_formats: Vec<String>,
    /// IANA zone name applied to zone-less timestamps. `"auto"` resolves to
    /// the system zone. When set, this takes precedence over
    /// `utc_offset_minutes`.
    pub timezone: Option<String>,
    /// Fixed offset (minutes east of UTC) applied to zone-less timestamps
    /// when no `timezone` is configured.
    pub utc_offset_minutes: i32,
    /// A gap larger than this multiple of the typical inter-record interval
    /// marks a session boundary in a merged stream.
    pub gap_multiplier: f64,
    /// Unit pairs that may be combined into a single RMS figure, in addition
    /// to identical units.
    pub compatible_units: Vec<(ErrorUnit, ErrorUnit)>,
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            image_header_formats: vec![
                "%Y-%m-%dT%H:%M:%S%.f".to_string(),
                "%Y-%m-%dT%H:%M:%S".to_string(),
            ],
            guide_log_formats: vec![
                "%Y-%m-%d %H:%M:%S%.f".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
                "%Y/%m/%d %H:%M:%S".to_string(),
            ],
            acquisition_log_formats: vec![
                "%Y/%m/%d %H:%M:%S".to_string(),
                "%Y-%m-%d %H:%M:%S".to_string(),
            ],
            timezone: None,
            utc_offset_minutes: 0,
            gap_multiplier: 5.0,
            compatible_units: Vec::new(),
        }
    }
}

impl CorrelationConfig {
    /// The format candidate chain for a source kind.
    pub fn formats_for(&self, kind: SourceKind) -> &[String] {
        match kind {
            SourceKind::ImageHeader => &self.image_header_formats,
            SourceKind::GuideLog => &self.guide_log_formats,
            SourceKind::AcquisitionLog => &self.acquisition_log_formats,
        }
    }

    /// Whether per-axis errors in units `a` and `b` may contribute to one
    /// combined RMS. Identical units are always compatible; anything else
    /// must be declared in `compatible_units` (order-insensitive).
    pub fn units_compatible(&self, a: ErrorUnit, b: ErrorUnit) -> bool {
        a == b
            || self
                .compatible_units
                .iter()
                .any(|&(x, y)| (x == a && y == b) || (x == b && y == a))
    }

    /// Load a configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults; an unreadable file or
    /// invalid JSON is an error (a config file named explicitly should not
    /// be ignored silently).
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| SessionError::FileRead {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|e| {
            SessionError::Config(format!("invalid config file {}: {}", path.display(), e))
        })
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
