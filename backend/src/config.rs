//! Deployment configuration.
//!
//! Built once at startup (environment, then CLI overrides) and shared
//! read-only with every request through an `Arc`.

use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::acquire::Source;
use crate::error::{ConfigError, ConfigResult};

/// Dataset path used when `CSVQL_CSV_PATH` is not set.
pub const DEFAULT_CSV_PATH: &str = "csvtest.csv";

/// Port used when `CSVQL_PORT` is not set.
pub const DEFAULT_PORT: u16 = 8080;

/// Multipart part carrying the uploaded CSV.
pub const UPLOAD_PART_NAME: &str = "file";

/// Accepted names of the `uploadCSV` argument.
pub const UPLOAD_ARGUMENT_NAMES: [&str; 2] = ["fileContent", "file"];

/// How `uploadCSV` receives its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// CSV text passed as a string argument.
    #[default]
    Inline,
    /// CSV file sent as a `multipart/form-data` part.
    Multipart,
}

impl FromStr for UploadMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" | "string" => Ok(UploadMode::Inline),
            "multipart" | "file" => Ok(UploadMode::Multipart),
            other => Err(ConfigError::UnknownUploadMode(other.to_string())),
        }
    }
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadMode::Inline => write!(f, "inline"),
            UploadMode::Multipart => write!(f, "multipart"),
        }
    }
}

/// Immutable service configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Where `read` acquires the dataset from.
    pub read_source: Source,
    /// Argument shape expected by `uploadCSV`.
    pub upload_mode: UploadMode,
    /// HTTP port.
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read_source: Source::LocalFile(PathBuf::from(DEFAULT_CSV_PATH)),
            upload_mode: UploadMode::Inline,
            port: DEFAULT_PORT,
        }
    }
}

impl Config {
    /// Build from `CSVQL_*` environment variables (loading `.env` if present).
    pub fn from_env() -> ConfigResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(path) = lookup("CSVQL_CSV_PATH").filter(|p| !p.is_empty()) {
            config.read_source = Source::LocalFile(PathBuf::from(path));
        }
        if let Some(url) = lookup("CSVQL_REMOTE_URL").filter(|u| !u.is_empty()) {
            config = config.with_remote_url(url)?;
        }
        if let Some(mode) = lookup("CSVQL_UPLOAD_MODE") {
            config.upload_mode = mode.parse()?;
        }
        if let Some(port) = lookup("CSVQL_PORT") {
            config.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidPort(port.clone()))?;
        }

        Ok(config)
    }

    /// Read the dataset from a local file.
    pub fn with_csv_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.read_source = Source::LocalFile(path.into());
        self
    }

    /// Read the dataset from a remote URL.
    pub fn with_remote_url(mut self, url: impl Into<String>) -> ConfigResult<Self> {
        let url = url.into();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidRemoteUrl(url));
        }
        self.read_source = Source::RemoteUrl(url);
        Ok(self)
    }

    pub fn with_upload_mode(mut self, mode: UploadMode) -> Self {
        self.upload_mode = mode;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }
}
