use serde::{Deserialize, Serialize};

use crate::config::CorrelationConfig;
use crate::models::{ErrorUnit, GuideFrame};
use crate::timevalue::TimeValue;

// ── Stat records ──────────────────────────────────────────────────────────────

/// Guiding-quality summary for one exposure window.
///
/// RMS figures are `None` when no usable guide frame fell inside the window,
/// which is distinct from a (perfect) zero-valued RMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerExposureStats {
    pub exposure_id: String,
    /// Number of guide frames contributing to the RMS figures.
    pub sample_count: usize,
    /// Frames flagged star-lost; excluded from every RMS denominator.
    pub star_loss_count: usize,
    pub rms_ra: Option<f64>,
    pub rms_dec: Option<f64>,
    /// `sqrt(mean(ra^2) + mean(dec^2))`, absent when units were mixed or no
    /// frames were usable.
    pub rms_combined: Option<f64>,
    /// Set when frames inside the window carried incompatible units, which
    /// suppresses the combined figure.
    pub unit_mismatch: bool,
    pub first_frame: Option<TimeValue>,
    pub last_frame: Option<TimeValue>,
}

/// Whole-session guiding summary over the complete merged guide stream,
/// independent of exposure boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStats {
    pub sample_count: usize,
    pub star_loss_count: usize,
    pub rms_ra: Option<f64>,
    pub rms_dec: Option<f64>,
    pub rms_combined: Option<f64>,
    pub unit_mismatch: bool,
}

// ── GuideStatsCalculator ──────────────────────────────────────────────────────

/// Folds guide frames into RMS summaries under the configured unit rules.
pub struct GuideStatsCalculator {
    config: CorrelationConfig,
}

impl GuideStatsCalculator {
    pub fn new(config: &CorrelationConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Summary for the frames associated with one exposure window.
    pub fn exposure_stats(&self, exposure_id: &str, frames: &[GuideFrame]) -> PerExposureStats {
        let core = self.fold(frames);
        PerExposureStats {
            exposure_id: exposure_id.to_string(),
            sample_count: core.sample_count,
            star_loss_count: core.star_loss_count,
            rms_ra: core.rms_ra,
            rms_dec: core.rms_dec,
            rms_combined: core.rms_combined,
            unit_mismatch: core.unit_mismatch,
            first_frame: frames.iter().map(|f| f.time).min(),
            last_frame: frames.iter().map(|f| f.time).max(),
        }
    }

    /// Summary over an entire guide stream.
    pub fn session_stats(&self, frames: &[GuideFrame]) -> SessionStats {
        let core = self.fold(frames);
        SessionStats {
            sample_count: core.sample_count,
            star_loss_count: core.star_loss_count,
            rms_ra: core.rms_ra,
            rms_dec: core.rms_dec,
            rms_combined: core.rms_combined,
            unit_mismatch: core.unit_mismatch,
        }
    }

    fn fold(&self, frames: &[GuideFrame]) -> FoldedStats {
        let usable: Vec<&GuideFrame> = frames.iter().filter(|f| !f.star_lost).collect();
        let star_loss_count = frames.len() - usable.len();

        if usable.is_empty() {
            return FoldedStats {
                sample_count: 0,
                star_loss_count,
                rms_ra: None,
                rms_dec: None,
                rms_combined: None,
                unit_mismatch: false,
            };
        }

        let n = usable.len() as f64;
        let mean_ra_sq: f64 = usable.iter().map(|f| f.ra_error * f.ra_error).sum::<f64>() / n;
        let mean_dec_sq: f64 = usable.iter().map(|f| f.dec_error * f.dec_error).sum::<f64>() / n;

        let unit_mismatch = self.has_unit_mismatch(&usable);
        let rms_combined = if unit_mismatch {
            None
        } else {
            Some((mean_ra_sq + mean_dec_sq).sqrt())
        };

        FoldedStats {
            sample_count: usable.len(),
            star_loss_count,
            rms_ra: Some(mean_ra_sq.sqrt()),
            rms_dec: Some(mean_dec_sq.sqrt()),
            rms_combined,
            unit_mismatch,
        }
    }

    /// True when any two contributing frames carry units the configuration
    /// does not allow combining.
    fn has_unit_mismatch(&self, usable: &[&GuideFrame]) -> bool {
        let mut units: Vec<ErrorUnit> = Vec::new();
        for frame in usable {
            if !units.contains(&frame.unit) {
                units.push(frame.unit);
            }
        }
        for (i, &a) in units.iter().enumerate() {
            for &b in &units[i + 1..] {
                if !self.config.units_compatible(a, b) {
                    return true;
                }
            }
        }
        false
    }
}

struct FoldedStats {
    sample_count: usize,
    star_loss_count: usize,
    rms_ra: Option<f64>,
    rms_dec: Option<f64>,
    rms_combined: Option<f64>,
    unit_mismatch: bool,
}

// ── Tests ─────────────────────────────────────────────────────────────────────
