use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ── TimePrecision ─────────────────────────────────────────────────────────────

/// Confidence tag describing what the raw timestamp text actually carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimePrecision {
    /// Zone-aware text with fractional seconds.
    SubSecond,
    /// Zone-aware text with whole-second resolution.
    Second,
    /// The raw text carried no zone information; a configured offset was
    /// assumed when normalizing to UTC.
    UnknownOffset,
}

// ── TimeValue ─────────────────────────────────────────────────────────────────

/// A normalized UTC instant with its source-precision tag.
///
/// Comparison and equality look at the instant only. The precision tag is
/// diagnostic: two values normalized from differently-formatted text that
/// denote the same instant are equal, and ties between equal instants are
/// broken by stream arrival order (stable sorts everywhere downstream).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TimeValue {
    instant: DateTime<Utc>,
    precision: TimePrecision,
}

impl TimeValue {
    pub fn new(instant: DateTime<Utc>, precision: TimePrecision) -> Self {
        Self { instant, precision }
    }

    pub fn instant(&self) -> DateTime<Utc> {
        self.instant
    }

    pub fn precision(&self) -> TimePrecision {
        self.precision
    }

    /// This instant shifted by a (possibly fractional, possibly negative)
    /// number of seconds. The precision tag is inherited.
    pub fn offset_by_seconds(&self, seconds: f64) -> Self {
        let whole = seconds.trunc() as i64;
        let nanos = (seconds.fract() * 1e9).round() as i64;
        Self {
            instant: self.instant + Duration::seconds(whole) + Duration::nanoseconds(nanos),
            precision: self.precision,
        }
    }

    /// Signed seconds from `earlier` to `self`.
    pub fn seconds_since(&self, earlier: &TimeValue) -> f64 {
        let delta = self.instant - earlier.instant;
        delta.num_nanoseconds().map_or_else(
            || delta.num_seconds() as f64,
            |n| n as f64 / 1e9,
        )
    }

    /// Absolute distance in seconds between two instants.
    pub fn abs_seconds_from(&self, other: &TimeValue) -> f64 {
        self.seconds_since(other).abs()
    }
}

impl PartialEq for TimeValue {
    fn eq(&self, other: &Self) -> bool {
        self.instant == other.instant
    }
}

impl Eq for TimeValue {}

impl PartialOrd for TimeValue {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimeValue {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.instant.cmp(&other.instant)
    }
}

impl std::fmt::Display for TimeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.instant.to_rfc3339())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
