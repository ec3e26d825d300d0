//! Report emission: the unified per-exposure CSV and the console summary.

use std::path::Path;

use session_data::pipeline::SessionReport;

/// Column order of the unified CSV, one row per exposure in timeline order.
const COLUMNS: &[&str] = &[
    "exposure",
    "start_utc",
    "end_utc",
    "duration_s",
    "guide_samples",
    "star_lost",
    "rms_ra",
    "rms_dec",
    "rms_total",
    "first_guide_utc",
    "last_guide_utc",
    "unit_mismatch",
];

/// Write the unified per-exposure CSV.
///
/// Statistics that are "no data" become empty cells, keeping them distinct
/// from a genuine 0.0.
pub fn write_csv(report: &SessionReport, path: &Path) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(COLUMNS)?;

    for (exposure, stats) in report
        .timeline
        .exposures()
        .iter()
        .zip(report.per_exposure.iter())
    {
        writer.write_record([
            exposure.id().to_string(),
            exposure.start().to_string(),
            exposure.end().to_string(),
            format!("{:.1}", exposure.frame.duration_seconds),
            stats.sample_count.to_string(),
            stats.star_loss_count.to_string(),
            fmt_stat(stats.rms_ra),
            fmt_stat(stats.rms_dec),
            fmt_stat(stats.rms_combined),
            stats
                .first_frame
                .map(|t| t.to_string())
                .unwrap_or_default(),
            stats.last_frame.map(|t| t.to_string()).unwrap_or_default(),
            stats.unit_mismatch.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}

/// Print the end-of-run summary to stdout.
pub fn print_summary(report: &SessionReport) {
    println!("Exposures: {}", report.timeline.len());
    println!(
        "Guide frames: {} usable, {} star-lost, {} orphaned",
        report.session_stats.sample_count,
        report.session_stats.star_loss_count,
        report.diagnostics.orphan_guide_frames
    );
    match report.session_stats.rms_combined {
        Some(rms) => println!("Session RMS (combined): {:.3}", rms),
        None => println!("Session RMS (combined): no data"),
    }

    if !report.event_summary.guide_events.is_empty() {
        let counts: Vec<String> = report
            .event_summary
            .guide_events
            .iter()
            .map(|(kind, n)| format!("{} x{}", kind, n))
            .collect();
        println!("Guide events: {}", counts.join(", "));
    }
    if !report.event_summary.acquisition_events.is_empty() {
        let counts: Vec<String> = report
            .event_summary
            .acquisition_events
            .iter()
            .map(|(kind, n)| format!("{} x{}", kind, n))
            .collect();
        println!("Acquisition events: {}", counts.join(", "));
    }

    if !report.guide_boundaries.is_empty() {
        println!(
            "Guiding interruptions: {} (largest gap {:.0}s)",
            report.guide_boundaries.len(),
            report
                .guide_boundaries
                .iter()
                .map(|b| b.gap_seconds)
                .fold(0.0, f64::max)
        );
    }

    let diag = &report.diagnostics;
    if diag.total_skipped() > 0 || diag.dropped_duplicates > 0 || diag.overlap_resolutions > 0 {
        println!(
            "Data quality: {} records skipped, {} duplicates dropped, {} near-duplicates kept, {} window overlaps resolved",
            diag.total_skipped(),
            diag.dropped_duplicates,
            diag.near_duplicate_warnings,
            diag.overlap_resolutions
        );
    }
}

fn fmt_stat(value: Option<f64>) -> String {
    value.map(|v| format!("{:.3}", v)).unwrap_or_default()
}

// ── Tests ─────────────────────────────────────────────────────────────────────
