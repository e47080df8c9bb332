//! Content acquisition.
//!
//! Obtains raw CSV bytes from one of three places:
//!
//! ```text
//! ┌──────────────┐
//! │  LocalFile   │──┐
//! ├──────────────┤  │     ┌────────────┐
//! │  RemoteUrl   │──┼────▶│ RawContent │────▶ decode
//! ├──────────────┤  │     └────────────┘
//! │ UploadedPart │──┘
//! └──────────────┘
//! ```
//!
//! Nothing is cached: every call goes back to the source.

pub mod upload;

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::api::logs::{log_info_indent, log_success_indent};
use crate::error::{PipelineError, PipelineResult};

pub use upload::acquire_upload;

/// Where a [`RawContent`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
    LocalFile,
    RemoteUrl,
    UploadedPart,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provenance::LocalFile => write!(f, "local file"),
            Provenance::RemoteUrl => write!(f, "remote URL"),
            Provenance::UploadedPart => write!(f, "uploaded part"),
        }
    }
}

/// Raw dataset bytes tagged with their provenance.
///
/// Consumed by value by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawContent {
    pub bytes: Vec<u8>,
    pub provenance: Provenance,
}

impl RawContent {
    pub fn new(bytes: Vec<u8>, provenance: Provenance) -> Self {
        Self { bytes, provenance }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Configured source for the `read` operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    LocalFile(PathBuf),
    RemoteUrl(String),
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::LocalFile(path) => write!(f, "file {}", path.display()),
            Source::RemoteUrl(url) => write!(f, "url {}", url),
        }
    }
}

/// Fetches dataset bytes from a configured [`Source`].
#[derive(Debug, Clone, Default)]
pub struct Acquirer {
    client: reqwest::Client,
}

impl Acquirer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an existing HTTP client for remote sources.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    pub async fn acquire(&self, source: &Source) -> PipelineResult<RawContent> {
        log_info_indent(format!("Acquiring dataset from {}", source), 1);
        let raw = match source {
            Source::LocalFile(path) => acquire_local(path).await?,
            Source::RemoteUrl(url) => acquire_remote(&self.client, url).await?,
        };
        log_success_indent(format!("Read {} bytes ({})", raw.len(), raw.provenance), 1);
        Ok(raw)
    }
}

/// Read a whole file into memory.
pub async fn acquire_local(path: &Path) -> PipelineResult<RawContent> {
    let bytes = tokio::fs::read(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => PipelineError::NotFound(path.to_path_buf()),
        _ => PipelineError::Io(e),
    })?;
    Ok(RawContent::new(bytes, Provenance::LocalFile))
}

/// Single GET against `url`, body read in full. No retry.
pub async fn acquire_remote(client: &reqwest::Client, url: &str) -> PipelineResult<RawContent> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PipelineError::Network(e.to_string()))?;

    let response = response
        .error_for_status()
        .map_err(|e| PipelineError::Network(e.to_string()))?;

    let body = response
        .bytes()
        .await
        .map_err(|e| PipelineError::Io(std::io::Error::new(ErrorKind::Other, e)))?;

    Ok(RawContent::new(body.to_vec(), Provenance::RemoteUrl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn spawn_csv_server() -> SocketAddr {
        let app = Router::new()
            .route("/data.csv", get(|| async { "name,age\nJohn,30\n" }))
            .route(
                "/missing.csv",
                get(|| async { (StatusCode::NOT_FOUND, "gone") }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn test_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "a,b\n1,2\n").unwrap();

        let raw = acquire_local(&path).await.unwrap();
        assert_eq!(raw.bytes, b"a,b\n1,2\n");
        assert_eq!(raw.provenance, Provenance::LocalFile);
    }

    #[tokio::test]
    async fn test_local_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = acquire_local(&dir.path().join("nope.csv")).await.unwrap_err();
        assert!(matches!(err, PipelineError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_local_path_is_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = acquire_local(dir.path()).await.unwrap_err();
        assert!(matches!(err, PipelineError::Io(_)));
    }

    #[tokio::test]
    async fn test_remote_fetch() {
        let addr = spawn_csv_server().await;
        let acquirer = Acquirer::new();
        let source = Source::RemoteUrl(format!("http://{}/data.csv", addr));

        let raw = acquirer.acquire(&source).await.unwrap();
        assert_eq!(raw.bytes, b"name,age\nJohn,30\n");
        assert_eq!(raw.provenance, Provenance::RemoteUrl);
    }

    #[tokio::test]
    async fn test_remote_error_status() {
        let addr = spawn_csv_server().await;
        let client = reqwest::Client::new();
        let err = acquire_remote(&client, &format!("http://{}/missing.csv", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Network(_)));
    }

    #[tokio::test]
    async fn test_remote_unreachable() {
        // Bind then drop to get a port nobody listens on.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = reqwest::Client::new();
        let err = acquire_remote(&client, &format!("http://{}/data.csv", addr))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Network(_)));
    }
}
