use std::path::PathBuf;
use thiserror::Error;

use crate::models::SourceKind;

/// All errors produced by the session correlation engine.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A timestamp string did not match any candidate format for its source.
    #[error("Unparsable {source_kind} timestamp: \"{text}\"")]
    TimestampParse {
        text: String,
        source_kind: SourceKind,
    },

    /// A record is missing a required field or a field is out of domain.
    #[error("Malformed record: {0}")]
    RecordShape(String),

    /// A log file could not be opened or read from disk.
    #[error("Failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The session directory does not exist.
    #[error("Session directory not found: {0}")]
    SessionDirNotFound(PathBuf),

    /// No image-exposure records survived parsing, so no exposure windows
    /// exist to correlate against.
    #[error("No usable image frames in session input")]
    NoImageFrames,

    /// No files of a required kind were found under the session directory.
    #[error("No {kind} files found in {path}")]
    NoLogFiles { kind: SourceKind, path: PathBuf },

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pass-through for any raw I/O error that does not carry a path.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Catch-all for errors from third-party crates via `anyhow`.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Convenience alias used throughout the session crates.
pub type Result<T> = std::result::Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_timestamp_parse() {
        let err = SessionError::TimestampParse {
            text: "not-a-timestamp".to_string(),
            source_kind: SourceKind::GuideLog,
        };
        let msg = err.to_string();
        assert!(msg.contains("guide-log"));
        assert!(msg.contains("not-a-timestamp"));
    }

    #[test]
    fn test_error_display_record_shape() {
        let err = SessionError::RecordShape("exposure duration must be positive".to_string());
        assert_eq!(
            err.to_string(),
            "Malformed record: exposure duration must be positive"
        );
    }

    #[test]
    fn test_error_display_file_read() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
        let err = SessionError::FileRead {
            path: PathBuf::from("/session/PHD2_GuideLog.txt"),
            source: io_err,
        };
        let msg = err.to_string();
        assert!(msg.contains("Failed to read file"));
        assert!(msg.contains("PHD2_GuideLog.txt"));
        assert!(msg.contains("no such file"));
    }

    #[test]
    fn test_error_display_session_dir_not_found() {
        let err = SessionError::SessionDirNotFound(PathBuf::from("/missing/session"));
        assert_eq!(err.to_string(), "Session directory not found: /missing/session");
    }

    #[test]
    fn test_error_display_no_image_frames() {
        let err = SessionError::NoImageFrames;
        assert_eq!(err.to_string(), "No usable image frames in session input");
    }

    #[test]
    fn test_error_display_no_log_files() {
        let err = SessionError::NoLogFiles {
            kind: SourceKind::ImageHeader,
            path: PathBuf::from("/session"),
        };
        assert_eq!(err.to_string(), "No image-header files found in /session");
    }

    #[test]
    fn test_error_display_config() {
        let err = SessionError::Config("unknown timezone \"Mars/Olympus\"".to_string());
        assert!(err.to_string().starts_with("Configuration error:"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: SessionError = io_err.into();
        assert!(err.to_string().contains("denied"));
    }
}
