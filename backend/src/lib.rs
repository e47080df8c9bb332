//! # csvql - a CSV dataset behind a read/upload operation API
//!
//! One dataset, two operations. `read` returns the current CSV file,
//! `uploadCSV` returns submitted CSV content, both flattened to the same
//! text form.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │  Acquirer   │────▶│   Decoder   │────▶│ Normalizer  │────▶│  "a$b\nc$d" │
//! │ file/url/up │     │  (csv crate)│     │  ($ and \n) │     │             │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use csvql::{Config, Dispatcher};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::default().with_csv_path("csvtest.csv");
//!     let dispatcher = Dispatcher::new(Arc::new(config));
//!     println!("{}", dispatcher.read().await.unwrap());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Error taxonomy
//! - [`config`] - Deployment configuration
//! - [`acquire`] - Local file, remote URL and multipart acquisition
//! - [`encoding`] - Byte to text decoding
//! - [`decode`] - CSV decoding
//! - [`normalize`] - Canonical text rendering
//! - [`dispatch`] - `read` / `uploadCSV`
//! - [`api`] - HTTP API server

// Core modules
pub mod error;
pub mod config;

// Pipeline
pub mod acquire;
pub mod encoding;
pub mod decode;
pub mod normalize;

// Operations
pub mod dispatch;

// HTTP API
pub mod api;

// =============================================================================
// Re-exports - Errors and configuration
// =============================================================================

pub use error::{ConfigError, PipelineError, PipelineResult, ServerError};
pub use config::{Config, UploadMode};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use acquire::{acquire_local, acquire_remote, acquire_upload, Acquirer, Provenance, RawContent, Source};
pub use decode::{decode, decode_bytes, decode_str, Row, Table};
pub use normalize::{normalize, EMPTY_FIELD_PLACEHOLDER, FIELD_DELIMITER, ROW_DELIMITER};

// =============================================================================
// Re-exports - Operations
// =============================================================================

pub use dispatch::{Argument, Dispatcher, Operation, OperationRequest};

// Server
pub mod server {
    pub use crate::api::server::{router, start_server};
}
