//! Error types for the csvql pipeline.
//!
//! - [`PipelineError`] - Failures of the acquire → decode → normalize chain
//! - [`ConfigError`] - Invalid deployment configuration
//! - [`ServerError`] - Server bootstrap failures
//!
//! Every pipeline failure aborts the whole operation. The message of a
//! [`PipelineError`] is passed through to API clients as-is.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Pipeline Errors
// =============================================================================

/// Errors raised while serving `read` or `uploadCSV`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured dataset file does not exist.
    #[error("CSV file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The remote dataset could not be fetched.
    #[error("Remote fetch failed: {0}")]
    Network(String),

    /// The request does not carry what the operation needs.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// The operation argument has the wrong shape.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The content is not structurally valid CSV.
    #[error("Malformed CSV at line {line}: {message}")]
    MalformedCsv { line: u64, message: String },

    /// Any other read failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Stable machine-readable code used in API error envelopes.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::NotFound(_) => "NOT_FOUND",
            PipelineError::Network(_) => "NETWORK_ERROR",
            PipelineError::BadRequest(_) => "BAD_REQUEST",
            PipelineError::InvalidArgument(_) => "INVALID_ARGUMENT",
            PipelineError::MalformedCsv { .. } => "MALFORMED_CSV",
            PipelineError::Io(_) => "IO_ERROR",
        }
    }

    /// Shorthand for a [`PipelineError::MalformedCsv`].
    pub fn malformed(line: u64, message: impl Into<String>) -> Self {
        PipelineError::MalformedCsv {
            line,
            message: message.into(),
        }
    }
}

impl From<csv::Error> for PipelineError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.into_kind() {
            csv::ErrorKind::Io(e) => PipelineError::Io(e),
            csv::ErrorKind::Utf8 { err, .. } => {
                PipelineError::malformed(line, format!("invalid UTF-8 in field {}", err.field()))
            }
            other => PipelineError::malformed(line, format!("{:?}", other)),
        }
    }
}

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors while building the deployment configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unknown upload mode name.
    #[error("Unknown upload mode '{0}' (expected 'inline' or 'multipart')")]
    UnknownUploadMode(String),

    /// Port is not a valid u16.
    #[error("Invalid port '{0}'")]
    InvalidPort(String),

    /// Remote URL is not http(s).
    #[error("Invalid remote URL '{0}': must start with http:// or https://")]
    InvalidRemoteUrl(String),
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Binding or serving failed.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Result type for configuration.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(PipelineError::NotFound("x.csv".into()).code(), "NOT_FOUND");
        assert_eq!(PipelineError::Network("down".into()).code(), "NETWORK_ERROR");
        assert_eq!(PipelineError::malformed(3, "bad quote").code(), "MALFORMED_CSV");
        assert_eq!(
            PipelineError::InvalidArgument("nope".into()).code(),
            "INVALID_ARGUMENT"
        );
    }

    #[test]
    fn test_malformed_message_format() {
        let msg = PipelineError::malformed(5, "unterminated quoted field").to_string();
        assert!(msg.contains("line 5"));
        assert!(msg.contains("unterminated"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: PipelineError = io.into();
        assert_eq!(err.code(), "IO_ERROR");
        assert!(err.to_string().contains("denied"));
    }

    #[test]
    fn test_server_error_from_config() {
        let err: ServerError = ConfigError::InvalidPort("abc".into()).into();
        assert!(err.to_string().contains("abc"));
    }
}
