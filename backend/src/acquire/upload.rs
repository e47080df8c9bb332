//! Multipart upload acquisition.
//!
//! The named part is spooled to an anonymous temp file, then read back.
//! The temp file is removed when the handle drops, whatever the outcome.

use std::io::SeekFrom;

use axum::extract::Multipart;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use super::{Provenance, RawContent};
use crate::api::logs::log_info_indent;
use crate::error::{PipelineError, PipelineResult};

/// Extract and buffer the part called `part_name`.
///
/// Fails with [`PipelineError::BadRequest`] if the body is not valid
/// multipart or the part is absent. Other parts are skipped.
pub async fn acquire_upload(
    multipart: &mut Multipart,
    part_name: &str,
) -> PipelineResult<RawContent> {
    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|e| PipelineError::BadRequest(format!("Multipart error: {}", e)))?
    {
        if field.name() != Some(part_name) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("unknown").to_string();
        let mut spool = tokio::fs::File::from_std(tempfile::tempfile()?);

        let mut size = 0usize;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|e| PipelineError::BadRequest(format!("Read error: {}", e)))?
        {
            size += chunk.len();
            spool.write_all(&chunk).await?;
        }
        spool.flush().await?;
        spool.seek(SeekFrom::Start(0)).await?;

        let mut bytes = Vec::with_capacity(size);
        spool.read_to_end(&mut bytes).await?;

        log_info_indent(format!("Received upload '{}' ({} bytes)", file_name, size), 1);
        return Ok(RawContent::new(bytes, Provenance::UploadedPart));
    }

    Err(PipelineError::BadRequest(format!(
        "No '{}' part in multipart body",
        part_name
    )))
}
