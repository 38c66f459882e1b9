// error.rs
//
// Failure taxonomy for a pipeline run. Every stage reports exactly one of
// these kinds and the orchestrator passes it through unchanged.

use std::path::PathBuf;

use crate::audio::wav::WavError;
use crate::pipeline::PipelineStage;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a [`PipelineError`], stable for callers that only
/// need to branch on what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SourceUnavailable,
    FetchFailed,
    TranscodeFailed,
    InvalidFormat,
    ModelNotFound,
    InferenceFailed,
    Cancelled,
    WorkingDirectory,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("no audio-bearing stream found for {url}")]
    SourceUnavailable { url: String },

    #[error("failed to fetch media: {context}")]
    FetchFailed {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("ffmpeg failed ({status})\nOutput: {output}")]
    TranscodeFailed { status: String, output: String },

    #[error("invalid WAV container: {0}")]
    InvalidFormat(#[from] WavError),

    #[error("whisper model file not found: {}", path.display())]
    ModelNotFound { path: PathBuf },

    #[error("inference failed: {context}")]
    InferenceFailed {
        context: String,
        #[source]
        source: BoxError,
    },

    #[error("operation cancelled while {stage}")]
    Cancelled { stage: PipelineStage },

    #[error("failed to create output directory {}", path.display())]
    WorkingDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl PipelineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            Self::FetchFailed { .. } => ErrorKind::FetchFailed,
            Self::TranscodeFailed { .. } => ErrorKind::TranscodeFailed,
            Self::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Self::ModelNotFound { .. } => ErrorKind::ModelNotFound,
            Self::InferenceFailed { .. } => ErrorKind::InferenceFailed,
            Self::Cancelled { .. } => ErrorKind::Cancelled,
            Self::WorkingDirectory { .. } => ErrorKind::WorkingDirectory,
        }
    }

    pub fn fetch(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::FetchFailed {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn inference(context: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::InferenceFailed {
            context: context.into(),
            source: source.into(),
        }
    }

    pub fn cancelled(stage: PipelineStage) -> Self {
        Self::Cancelled { stage }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}
