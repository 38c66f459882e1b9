// transcription/provider.rs
//
// Engine-facing seam for speech recognition. The pipeline only ever talks to
// these traits, so whisper can be swapped for an in-process fake in tests.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// One unit of recognized text, in playback order.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub text: String,
    pub start: Duration,
    pub end: Duration,
}

/// Granular error types for engine operations
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to load model {}: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("language '{0}' is not supported by this engine")]
    UnsupportedLanguage(String),

    #[error("failed to process audio: {0}")]
    Process(String),

    #[error("failed to read segment {index}: {message}")]
    Segment { index: usize, message: String },

    #[error("inference aborted")]
    Aborted,
}

/// Lazily produced segments. `None` marks the end; an `Err` item means the
/// drain should be abandoned.
pub type Segments<'a> = Box<dyn Iterator<Item = Result<Segment, EngineError>> + 'a>;

/// A speech-recognition backend (whisper.cpp in production).
pub trait SpeechEngine: Send + Sync {
    /// Load the model file and derive a fresh working context from it.
    fn load(&self, model_path: &Path) -> Result<Box<dyn SpeechContext>, EngineError>;

    /// Get the engine name (for logging/debugging)
    fn engine_name(&self) -> &'static str;
}

/// A loaded model ready to run inference.
pub trait SpeechContext {
    fn set_language(&mut self, language: &str) -> Result<(), EngineError>;

    /// Run inference over the whole buffer in one call and expose the result
    /// as a segment sequence borrowed from this context.
    ///
    /// Implementations poll `cancel` while they work and give up with
    /// [`EngineError::Aborted`] once it fires.
    fn process(
        &mut self,
        samples: &[f32],
        cancel: &CancellationToken,
    ) -> Result<Segments<'_>, EngineError>;
}
