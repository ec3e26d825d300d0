use serde::{Deserialize, Serialize};

use crate::timevalue::TimeValue;

// ── SourceKind ────────────────────────────────────────────────────────────────

/// Which record stream a raw timestamp or record came from.
///
/// Each kind carries its own timestamp-format candidate chain and its own
/// parse-failure counter in the diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    ImageHeader,
    GuideLog,
    AcquisitionLog,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::ImageHeader => "image-header",
            SourceKind::GuideLog => "guide-log",
            SourceKind::AcquisitionLog => "acquisition-log",
        };
        f.write_str(name)
    }
}

// ── Units and event kinds ─────────────────────────────────────────────────────

/// Unit of the per-axis guiding errors carried by a [`GuideFrame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorUnit {
    Arcsec,
    Pixel,
}

/// Discrete events reported by the autoguiding subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuideEventKind {
    SettleBegin,
    SettleDone,
    StarLost,
    Dither,
    Calibration,
    Other,
}

impl std::fmt::Display for GuideEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            GuideEventKind::SettleBegin => "settle_begin",
            GuideEventKind::SettleDone => "settle_done",
            GuideEventKind::StarLost => "star_lost",
            GuideEventKind::Dither => "dither",
            GuideEventKind::Calibration => "calibration",
            GuideEventKind::Other => "other",
        };
        f.write_str(name)
    }
}

/// Discrete events reported by the acquisition software.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionEventKind {
    AutofocusStart,
    AutofocusResult,
    PlateSolve,
    MeridianFlip,
    Other,
}

impl std::fmt::Display for AcquisitionEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            AcquisitionEventKind::AutofocusStart => "autofocus_start",
            AcquisitionEventKind::AutofocusResult => "autofocus_result",
            AcquisitionEventKind::PlateSolve => "plate_solve",
            AcquisitionEventKind::MeridianFlip => "meridian_flip",
            AcquisitionEventKind::Other => "other",
        };
        f.write_str(name)
    }
}

// ── Raw records (adapter output, timestamps still text) ───────────────────────

/// One image exposure as read from a header dump, before normalization.
///
/// `header_fields` is an order-preserving key/value carry-through that the
/// engine never interprets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawImageHeader {
    pub id: String,
    pub raw_start_timestamp: String,
    pub duration_seconds: f64,
    #[serde(default)]
    pub header_fields: Vec<(String, String)>,
}

/// One guide correction sample before timestamp normalization.
///
/// `raw_timestamp` is either absolute text or fractional seconds since the
/// guide log's "Guiding Begins" anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGuideFrame {
    pub raw_timestamp: String,
    pub ra_error: f64,
    pub dec_error: f64,
    pub unit: ErrorUnit,
    pub star_lost: bool,
    pub snr: Option<f64>,
}

/// One discrete guide event before timestamp normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawGuideEvent {
    pub raw_timestamp: String,
    pub kind: GuideEventKind,
    pub payload: String,
}

/// One acquisition-log event before timestamp normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAcquisitionEvent {
    pub raw_timestamp: String,
    pub kind: AcquisitionEventKind,
    pub payload: Vec<(String, String)>,
}

// ── Normalized records ────────────────────────────────────────────────────────

/// An image exposure with a resolved start instant.
///
/// Defines the half-open exposure window `[start, start + duration)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageFrame {
    pub id: String,
    pub start: TimeValue,
    pub duration_seconds: f64,
    pub header_fields: Vec<(String, String)>,
}

impl ImageFrame {
    /// Exclusive end of the exposure window.
    pub fn end(&self) -> TimeValue {
        self.start.offset_by_seconds(self.duration_seconds)
    }

    /// Whether `t` falls strictly inside the half-open window.
    pub fn contains(&self, t: &TimeValue) -> bool {
        *t >= self.start && *t < self.end()
    }
}

/// One periodic guide correction sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideFrame {
    pub time: TimeValue,
    pub ra_error: f64,
    pub dec_error: f64,
    pub unit: ErrorUnit,
    pub star_lost: bool,
    pub snr: Option<f64>,
}

/// One discrete guide event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuideEvent {
    pub time: TimeValue,
    pub kind: GuideEventKind,
    pub payload: String,
}

/// One acquisition-log event with its opaque payload fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionEvent {
    pub time: TimeValue,
    pub kind: AcquisitionEventKind,
    pub payload: Vec<(String, String)>,
}

// ── Timestamped ───────────────────────────────────────────────────────────────

/// Interface for any normalized record that can be merged and windowed by
/// its instant.
pub trait Timestamped {
    fn timestamp(&self) -> TimeValue;
}

impl Timestamped for ImageFrame {
    fn timestamp(&self) -> TimeValue {
        self.start
    }
}

impl Timestamped for GuideFrame {
    fn timestamp(&self) -> TimeValue {
        self.time
    }
}

impl Timestamped for GuideEvent {
    fn timestamp(&self) -> TimeValue {
        self.time
    }
}

impl Timestamped for AcquisitionEvent {
    fn timestamp(&self) -> TimeValue {
        self.time
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timevalue::TimePrecision;
    use chrono::{TimeZone, Utc};

    fn tv(h: u32, m: u32, s: u32) -> TimeValue {
        TimeValue::new(
            Utc.with_ymd_and_hms(2025, 4, 16, h, m, s).unwrap(),
            TimePrecision::Second,
        )
    }

    fn frame(start: TimeValue, duration: f64) -> ImageFrame {
        ImageFrame {
            id: "Light_0001".to_string(),
            start,
            duration_seconds: duration,
            header_fields: vec![("OBJECT".to_string(), "M31".to_string())],
        }
    }

    #[test]
    fn test_exposure_window_end() {
        let f = frame(tv(20, 0, 0), 300.0);
        assert_eq!(f.end(), tv(20, 5, 0));
    }

    #[test]
    fn test_window_contains_interior_point() {
        let f = frame(tv(20, 0, 0), 300.0);
        assert!(f.contains(&tv(20, 2, 30)));
    }

    #[test]
    fn test_window_is_closed_at_start() {
        let f = frame(tv(20, 0, 0), 300.0);
        assert!(f.contains(&tv(20, 0, 0)));
    }

    #[test]
    fn test_window_is_open_at_end() {
        let f = frame(tv(20, 0, 0), 300.0);
        assert!(!f.contains(&tv(20, 5, 0)));
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::ImageHeader.to_string(), "image-header");
        assert_eq!(SourceKind::GuideLog.to_string(), "guide-log");
        assert_eq!(SourceKind::AcquisitionLog.to_string(), "acquisition-log");
    }

    #[test]
    fn test_raw_image_header_serde_defaults() {
        let json = r#"{"id":"Light_0001","raw_start_timestamp":"2025-04-16T20:00:00Z","duration_seconds":300.0}"#;
        let raw: RawImageHeader = serde_json::from_str(json).unwrap();
        assert!(raw.header_fields.is_empty());
        assert_eq!(raw.id, "Light_0001");
    }

    #[test]
    fn test_header_fields_preserve_order() {
        let json = r#"{
            "id": "Light_0002",
            "raw_start_timestamp": "2025-04-16T20:00:00Z",
            "duration_seconds": 120.0,
            "header_fields": [["B", "2"], ["A", "1"], ["C", "3"]]
        }"#;
        let raw: RawImageHeader = serde_json::from_str(json).unwrap();
        let keys: Vec<&str> = raw.header_fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["B", "A", "C"]);
    }
}
