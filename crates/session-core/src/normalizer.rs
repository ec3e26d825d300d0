use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::config::CorrelationConfig;
use crate::error::{Result, SessionError};
use crate::models::SourceKind;
use crate::timevalue::{TimePrecision, TimeValue};

// ── System timezone detection ─────────────────────────────────────────────────

/// Detect the IANA timezone name of the running system.
///
/// Uses the `iana-time-zone` crate directly. Falls back to `"UTC"` if
/// detection fails.
pub fn system_timezone() -> String {
    iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string())
}

// ── TimestampNormalizer ───────────────────────────────────────────────────────

/// Zone fallback applied to timestamps whose raw text carries no offset.
#[derive(Debug, Clone, Copy)]
enum FallbackZone {
    Offset(FixedOffset),
    Named(Tz),
}

/// Converts heterogeneous raw timestamp text into [`TimeValue`]s.
///
/// Zone-aware text (RFC 3339, including the `Z` suffix) is accepted for every
/// source kind. Zone-less text is tried against the per-source candidate
/// chain from the configuration, in order; the first candidate that consumes
/// the whole string wins, and the configured fallback zone is applied.
pub struct TimestampNormalizer {
    config: CorrelationConfig,
    fallback: FallbackZone,
}

impl TimestampNormalizer {
    /// Build a normalizer from the run configuration.
    ///
    /// An unrecognised `timezone` name falls back to UTC with a warning, as
    /// does an out-of-range fixed offset.
    pub fn new(config: &CorrelationConfig) -> Self {
        let fallback = match &config.timezone {
            Some(name) => {
                let resolved = if name == "auto" {
                    system_timezone()
                } else {
                    name.clone()
                };
                let tz = resolved.parse::<Tz>().unwrap_or_else(|_| {
                    warn!(
                        "TimestampNormalizer: unrecognised timezone \"{}\", falling back to UTC",
                        resolved
                    );
                    Tz::UTC
                });
                FallbackZone::Named(tz)
            }
            None => {
                let offset =
                    FixedOffset::east_opt(config.utc_offset_minutes * 60).unwrap_or_else(|| {
                        warn!(
                            "TimestampNormalizer: offset {} minutes out of range, using UTC",
                            config.utc_offset_minutes
                        );
                        FixedOffset::east_opt(0).expect("zero offset is valid")
                    });
                FallbackZone::Offset(offset)
            }
        };
        Self {
            config: config.clone(),
            fallback,
        }
    }

    /// Parse an absolute raw timestamp for the given source kind.
    pub fn parse(&self, raw: &str, kind: SourceKind) -> Result<TimeValue> {
        self.parse_with_anchor(raw, kind, None)
    }

    /// Parse a raw timestamp, additionally accepting fractional seconds
    /// relative to `anchor` (guiding logs time their correction samples from
    /// the "Guiding Begins" line).
    pub fn parse_with_anchor(
        &self,
        raw: &str,
        kind: SourceKind,
        anchor: Option<&TimeValue>,
    ) -> Result<TimeValue> {
        let text = raw.trim();
        if text.is_empty() {
            return Err(self.fail(text, kind));
        }

        // Zone-aware form first: replace a trailing 'Z' with '+00:00' and try
        // RFC 3339.
        let normalised = if let Some(stripped) = text.strip_suffix('Z') {
            format!("{}+00:00", stripped)
        } else {
            text.to_string()
        };
        if let Ok(dt) = DateTime::parse_from_rfc3339(&normalised) {
            let precision = if has_fraction(text) {
                TimePrecision::SubSecond
            } else {
                TimePrecision::Second
            };
            return Ok(TimeValue::new(dt.with_timezone(&Utc), precision));
        }

        // Zone-less candidates for this source kind, in declared order.
        // `parse_from_str` rejects residual unparsed characters.
        for fmt in self.config.formats_for(kind) {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                if let Some(instant) = self.resolve_naive(&naive) {
                    return Ok(TimeValue::new(instant, TimePrecision::UnknownOffset));
                }
            }
        }

        // Fractional seconds since the stream anchor.
        if let Some(anchor) = anchor {
            if let Ok(seconds) = text.parse::<f64>() {
                if seconds.is_finite() {
                    let value = anchor.offset_by_seconds(seconds);
                    let precision = match anchor.precision() {
                        TimePrecision::UnknownOffset => TimePrecision::UnknownOffset,
                        TimePrecision::SubSecond => TimePrecision::SubSecond,
                        TimePrecision::Second => {
                            if has_fraction(text) {
                                TimePrecision::SubSecond
                            } else {
                                TimePrecision::Second
                            }
                        }
                    };
                    return Ok(TimeValue::new(value.instant(), precision));
                }
            }
        }

        Err(self.fail(text, kind))
    }

    /// Interpret a zone-less local datetime in the configured fallback zone.
    fn resolve_naive(&self, naive: &NaiveDateTime) -> Option<DateTime<Utc>> {
        match self.fallback {
            FallbackZone::Offset(offset) => offset
                .from_local_datetime(naive)
                .single()
                .map(|dt| dt.with_timezone(&Utc)),
            FallbackZone::Named(tz) => match tz.from_local_datetime(naive) {
                chrono::LocalResult::Single(dt) => Some(dt.with_timezone(&Utc)),
                // DST fold: take the earlier of the two readings.
                chrono::LocalResult::Ambiguous(early, _) => Some(early.with_timezone(&Utc)),
                chrono::LocalResult::None => None,
            },
        }
    }

    fn fail(&self, text: &str, kind: SourceKind) -> SessionError {
        warn!(
            "TimestampNormalizer: could not parse {} timestamp \"{}\"",
            kind, text
        );
        SessionError::TimestampParse {
            text: text.to_string(),
            source_kind: kind,
        }
    }
}

/// Whether the raw text carries a decimal fraction of a second.
fn has_fraction(text: &str) -> bool {
    text.contains('.')
}

// ── Tests ─────────────────────────────────────────────────────────────────────
