//! Operation dispatch.
//!
//! Binds the two public operations to the acquire → decode → normalize
//! pipeline:
//!
//! | Operation   | Input                          | Pipeline                      |
//! |-------------|--------------------------------|-------------------------------|
//! | `read`      | none                           | acquire → decode → normalize  |
//! | `uploadCSV` | inline string or uploaded file | decode → normalize            |
//!
//! `uploadCSV` does not write anything back: the dataset served by `read`
//! is unchanged after an upload.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde_json::Value;

use crate::acquire::{Acquirer, Provenance, RawContent};
use crate::api::logs::{log_error, log_info, log_info_indent, log_success};
use crate::config::{Config, UploadMode};
use crate::decode::{decode, decode_str, Table};
use crate::encoding::decode_text;
use crate::error::{PipelineError, PipelineResult};
use crate::normalize::normalize;

/// The two operations exposed to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read,
    UploadCsv,
}

impl Operation {
    /// Name of the field in the query document.
    pub fn field_name(&self) -> &'static str {
        match self {
            Operation::Read => "read",
            Operation::UploadCsv => "uploadCSV",
        }
    }
}

impl FromStr for Operation {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "read" => Ok(Operation::Read),
            "uploadCSV" => Ok(Operation::UploadCsv),
            other => Err(PipelineError::BadRequest(format!(
                "Unknown operation '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

/// Argument passed to an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Argument {
    None,
    /// CSV text
    Inline(String),
    /// Uploaded file content
    File(RawContent),
    /// Anything else, kept only to name it in the error
    Unsupported(&'static str),
}

impl Argument {
    /// Classify a JSON argument value.
    pub fn from_json(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Argument::None,
            Some(Value::String(s)) => Argument::Inline(s.clone()),
            Some(Value::Bool(_)) => Argument::Unsupported("boolean"),
            Some(Value::Number(_)) => Argument::Unsupported("number"),
            Some(Value::Array(_)) => Argument::Unsupported("list"),
            Some(Value::Object(_)) => Argument::Unsupported("object"),
        }
    }

    /// Wrap file bytes in the shape `mode` expects.
    ///
    /// Inline mode decodes the bytes to text the same way file content is
    /// decoded, so non-UTF-8 files work in both modes.
    pub fn from_file_bytes(bytes: Vec<u8>, mode: UploadMode) -> Self {
        match mode {
            UploadMode::Inline => Argument::Inline(decode_text(&bytes).0.into_owned()),
            UploadMode::Multipart => {
                Argument::File(RawContent::new(bytes, Provenance::UploadedPart))
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Argument::None => "nothing",
            Argument::Inline(_) => "string",
            Argument::File(_) => "file",
            Argument::Unsupported(kind) => *kind,
        }
    }
}

/// A single operation invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationRequest {
    pub operation: Operation,
    pub argument: Argument,
}

impl OperationRequest {
    pub fn read() -> Self {
        Self {
            operation: Operation::Read,
            argument: Argument::None,
        }
    }

    pub fn upload(argument: Argument) -> Self {
        Self {
            operation: Operation::UploadCsv,
            argument,
        }
    }
}

/// Runs operations against the configured deployment.
///
/// Holds no per-request state; share it behind an `Arc`.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    config: Arc<Config>,
    acquirer: Acquirer,
}

impl Dispatcher {
    pub fn new(config: Arc<Config>) -> Self {
        Self {
            config,
            acquirer: Acquirer::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn dispatch(&self, request: OperationRequest) -> PipelineResult<String> {
        let operation = request.operation;
        log_info(format!("▶ {}", operation));

        let result = match (operation, request.argument) {
            (Operation::Read, Argument::None) => self.read().await,
            (Operation::Read, other) => Err(PipelineError::InvalidArgument(format!(
                "read takes no arguments, got {}",
                other.kind()
            ))),
            (Operation::UploadCsv, argument) => self.upload_csv(argument),
        };

        match &result {
            Ok(text) => log_success(format!("{} returned {} chars", operation, text.len())),
            Err(e) => log_error(format!("{} failed: {}", operation, e)),
        }
        result
    }

    /// Acquire the configured dataset and return it normalized.
    pub async fn read(&self) -> PipelineResult<String> {
        let raw = self.acquirer.acquire(&self.config.read_source).await?;
        let table = decode(raw)?;
        Ok(render(&table))
    }

    /// Normalize submitted CSV content.
    ///
    /// The argument shape is checked against the upload mode before any
    /// decoding happens.
    pub fn upload_csv(&self, argument: Argument) -> PipelineResult<String> {
        let table = match (self.config.upload_mode, argument) {
            (UploadMode::Inline, Argument::Inline(content)) => decode_str(&content)?,
            (UploadMode::Multipart, Argument::File(raw)) => decode(raw)?,
            (UploadMode::Inline, other) => {
                return Err(PipelineError::InvalidArgument(format!(
                    "file content must be a string, got {}",
                    other.kind()
                )));
            }
            (UploadMode::Multipart, other) => {
                return Err(PipelineError::InvalidArgument(format!(
                    "file must be a multipart upload, got {}",
                    other.kind()
                )));
            }
        };
        Ok(render(&table))
    }
}

fn render(table: &Table) -> String {
    log_info_indent(
        format!("Decoded {} rows (widest: {} fields)", table.len(), table.max_width()),
        1,
    );
    normalize(table)
}
