// source/download.rs
//
// Streams a selected candidate straight to disk.

use std::path::Path;

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;

use super::StreamCandidate;
use crate::error::PipelineError;
use crate::perf_debug;
use crate::pipeline::{PipelineStage, TempArtifact};

const PROGRESS_STEP_BYTES: u64 = 8 * 1024 * 1024;

/// Download `candidate` into `destination`, returning the byte count.
///
/// The partially written file is removed on every failure path, including
/// cancellation, so a file at `destination` always means a complete transfer.
pub async fn download_to_file(
    client: &Client,
    candidate: &StreamCandidate,
    destination: &Path,
    cancel: &CancellationToken,
) -> Result<u64, PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::cancelled(PipelineStage::Fetching));
    }

    let mut request = client.get(&candidate.location);
    for (name, value) in &candidate.headers {
        request = request.header(name.as_str(), value.as_str());
    }

    let response = tokio::select! {
        response = request.send() => response
            .map_err(|e| PipelineError::fetch("failed to start download", e))?,
        _ = cancel.cancelled() => {
            return Err(PipelineError::cancelled(PipelineStage::Fetching));
        }
    };

    let response = response
        .error_for_status()
        .map_err(|e| PipelineError::fetch("download rejected by server", e))?;

    let total_size = response.content_length().unwrap_or(0);
    log::info!(
        "Downloading stream {} to {} ({:.1} MB expected)",
        candidate.id,
        destination.display(),
        total_size as f64 / (1024.0 * 1024.0)
    );

    // Guard declared before the file handle so the handle is closed first.
    let partial = TempArtifact::new(destination);
    let mut file = tokio::fs::File::create(destination)
        .await
        .map_err(|e| PipelineError::fetch("failed to create output file", e))?;

    let mut stream = response.bytes_stream();
    let mut downloaded = 0u64;
    let mut next_report = PROGRESS_STEP_BYTES;

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::warn!("Download of {} cancelled after {} bytes", candidate.id, downloaded);
                return Err(PipelineError::cancelled(PipelineStage::Fetching));
            }
            next = stream.next() => next,
        };

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| PipelineError::fetch("failed to read chunk", e))?;

        file.write_all(&chunk)
            .await
            .map_err(|e| PipelineError::fetch("failed to write chunk to file", e))?;
        downloaded += chunk.len() as u64;

        if downloaded >= next_report {
            perf_debug!(
                "Download progress: {:.1} MB / {:.1} MB",
                downloaded as f64 / (1024.0 * 1024.0),
                total_size as f64 / (1024.0 * 1024.0)
            );
            next_report += PROGRESS_STEP_BYTES;
        }
    }

    file.flush()
        .await
        .map_err(|e| PipelineError::fetch("failed to flush file", e))?;
    drop(file);
    partial.keep();

    log::info!("Download completed: {} bytes", downloaded);
    Ok(downloaded)
}
