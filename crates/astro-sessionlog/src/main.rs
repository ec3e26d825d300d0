mod bootstrap;
mod report;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use session_core::config::CorrelationConfig;
use session_data::pipeline;

/// Correlate a night's image, guiding and acquisition logs into one
/// per-exposure quality report.
#[derive(Parser, Debug)]
#[command(
    name = "astro-sessionlog",
    about = "Session timeline and guiding-quality report for astrophotography logs",
    version
)]
struct Settings {
    /// Directory containing the session's header dumps and log files
    session_dir: PathBuf,

    /// JSON configuration file (timestamp formats, zone fallback, gap threshold)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output CSV path (defaults to session_report.csv inside the session directory)
    #[arg(long)]
    output: Option<PathBuf>,

    /// IANA timezone applied to zone-less log timestamps ("auto" = system timezone)
    #[arg(long)]
    timezone: Option<String>,

    /// Fixed offset in minutes applied to zone-less timestamps when no timezone is set
    #[arg(long)]
    utc_offset_minutes: Option<i32>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR"])]
    log_level: String,
}

fn main() -> Result<()> {
    let settings = Settings::parse();
    bootstrap::setup_logging(&settings.log_level)?;

    tracing::info!("astro-sessionlog v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config = match &settings.config {
        Some(path) => CorrelationConfig::load_from(path)?,
        None => CorrelationConfig::default(),
    };
    if let Some(tz) = &settings.timezone {
        config.timezone = Some(tz.clone());
    }
    if let Some(offset) = settings.utc_offset_minutes {
        config.utc_offset_minutes = offset;
    }

    let session_report = pipeline::correlate_session(&settings.session_dir, &config)?;

    let out_path = settings
        .output
        .unwrap_or_else(|| settings.session_dir.join("session_report.csv"));
    report::write_csv(&session_report, &out_path)?;
    report::print_summary(&session_report);

    tracing::info!("Report written to {}", out_path.display());
    Ok(())
}
