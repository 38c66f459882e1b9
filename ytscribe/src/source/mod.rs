// source/mod.rs
//
// Stream resolution and retrieval: turn a video URL into a local media file.

pub mod download;
pub mod ytdlp;

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::PipelineError;

pub use download::download_to_file;
pub use ytdlp::YtDlpSource;

/// One retrievable audio-bearing representation of a video.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub id: String,
    /// Bits per second.
    pub bitrate: u64,
    pub codec: String,
    /// Direct download location.
    pub location: String,
    pub extension: Option<String>,
    /// Extra request headers the host expects on the download.
    pub headers: BTreeMap<String, String>,
}

#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Every stream of `url` that carries an audio track, in the order the
    /// host lists them.
    async fn candidates(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamCandidate>, PipelineError>;

    /// Stream `candidate` into `destination`. On any error or cancellation no
    /// file is left at `destination`. Returns the number of bytes written.
    async fn fetch(
        &self,
        candidate: &StreamCandidate,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError>;
}

/// Highest bitrate wins; on a tie the earliest candidate is kept.
pub fn select_best_candidate(candidates: &[StreamCandidate]) -> Option<&StreamCandidate> {
    let mut best: Option<&StreamCandidate> = None;
    for candidate in candidates {
        if best.map_or(true, |b| candidate.bitrate > b.bitrate) {
            best = Some(candidate);
        }
    }
    best
}

/// Enumerate the candidates of `url` and pick the one to download.
pub async fn resolve_stream(
    source: &dyn MediaSource,
    url: &str,
    cancel: &CancellationToken,
) -> Result<StreamCandidate, PipelineError> {
    let candidates = source.candidates(url, cancel).await?;
    log::info!("Found {} audio-bearing streams for {}", candidates.len(), url);

    let best = select_best_candidate(&candidates).ok_or_else(|| PipelineError::SourceUnavailable {
        url: url.to_string(),
    })?;

    log::info!(
        "Selected stream {} ({} kbit/s, codec {})",
        best.id,
        best.bitrate / 1000,
        best.codec
    );
    Ok(best.clone())
}

#[cfg(test)]
pub(crate) fn candidate(id: &str, bitrate: u64) -> StreamCandidate {
    StreamCandidate {
        id: id.to_string(),
        bitrate,
        codec: "opus".to_string(),
        location: format!("https://media.example/{id}"),
        extension: Some("webm".to_string()),
        headers: BTreeMap::new(),
    }
}
