// pipeline/service.rs
//
// URL or local file in, transcript out. Drives the stages in order, owns every
// file a run creates and removes them on the way out.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::audio::{load_wav_file, FfmpegTranscoder, Transcoder, WavError};
use crate::config::TranscribeConfig;
use crate::error::PipelineError;
use crate::pipeline::{PipelineStage, RunTracker, TempArtifact};
use crate::source::{resolve_stream, MediaSource, YtDlpSource};
use crate::transcription::{transcribe_samples, SpeechEngine};
use crate::whisper_engine::WhisperEngine;

const DEFAULT_MEDIA_EXTENSION: &str = "mp4";

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    pub text: String,
    /// Wall-clock time of the whole run.
    pub duration: Duration,
    /// The language hint handed to the engine. Empty means auto-detect.
    pub language: String,
}

pub struct TranscriptionService {
    config: TranscribeConfig,
    source: Arc<dyn MediaSource>,
    transcoder: Arc<dyn Transcoder>,
    engine: Arc<dyn SpeechEngine>,
}

impl TranscriptionService {
    /// Service backed by yt-dlp, ffmpeg and whisper.cpp.
    pub fn new(config: TranscribeConfig) -> Self {
        let source = Arc::new(YtDlpSource::from_config(&config));
        let transcoder = Arc::new(FfmpegTranscoder::from_config(&config));
        let engine = Arc::new(WhisperEngine::new());
        Self::with_components(config, source, transcoder, engine)
    }

    pub fn with_components(
        config: TranscribeConfig,
        source: Arc<dyn MediaSource>,
        transcoder: Arc<dyn Transcoder>,
        engine: Arc<dyn SpeechEngine>,
    ) -> Self {
        Self {
            config,
            source,
            transcoder,
            engine,
        }
    }

    /// Run the whole pipeline for `url`.
    ///
    /// Safe to call concurrently on one service: every run works on its own
    /// uniquely named files. Whatever the outcome, the intermediate WAV file is
    /// gone when this returns, and so is the downloaded media unless
    /// `cleanup_files` is off.
    pub async fn transcribe_url(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, PipelineError> {
        let started = Instant::now();
        let mut tracker = RunTracker::new(generate_run_id("video"));
        log::info!("[{}] Transcribing {}", tracker.run_id(), url);

        let outcome = self.run_url(url, cancel, &mut tracker).await;
        self.finish(outcome, tracker, started)
    }

    /// Transcode and transcribe a media file already on disk. The input is
    /// never modified or removed; the intermediate WAV always is.
    pub async fn transcribe_file(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<TranscriptionResult, PipelineError> {
        let started = Instant::now();
        let mut tracker = RunTracker::starting_at(generate_run_id("file"), PipelineStage::Fetching);
        log::info!("[{}] Transcribing {}", tracker.run_id(), input.display());

        let outcome = self.run_file(input, cancel, &mut tracker).await;
        self.finish(outcome, tracker, started)
    }

    fn finish(
        &self,
        outcome: Result<String, PipelineError>,
        mut tracker: RunTracker,
        started: Instant,
    ) -> Result<TranscriptionResult, PipelineError> {
        match outcome {
            Ok(text) => {
                tracker.advance();
                let result = TranscriptionResult {
                    text,
                    duration: started.elapsed(),
                    language: self.config.language_hint().unwrap_or_default().to_string(),
                };
                log::info!(
                    "[{}] Completed in {:.1}s ({} characters)",
                    tracker.run_id(),
                    result.duration.as_secs_f64(),
                    result.text.len()
                );
                Ok(result)
            }
            Err(e) => {
                tracker.fail(&e);
                Err(e)
            }
        }
    }

    async fn run_url(
        &self,
        url: &str,
        cancel: &CancellationToken,
        tracker: &mut RunTracker,
    ) -> Result<String, PipelineError> {
        // Nothing touches the disk once cancelled.
        ensure_active(cancel, tracker.advance())?;
        let output_dir = self.prepare_output_dir().await?;

        let candidate = resolve_stream(self.source.as_ref(), url, cancel).await?;

        ensure_active(cancel, tracker.advance())?;
        let extension = media_extension(candidate.extension.as_deref());
        let media = TempArtifact::with_cleanup(
            output_dir.join(format!("{}.{}", tracker.run_id(), extension)),
            self.config.cleanup_files,
        );
        let bytes = self.source.fetch(&candidate, media.path(), cancel).await?;
        log::info!(
            "[{}] Downloaded {} bytes to {}",
            tracker.run_id(),
            bytes,
            media.path().display()
        );

        let text = self
            .transcribe_media(media.path(), output_dir, cancel, tracker)
            .await?;

        if !self.config.cleanup_files {
            log::info!("Keeping downloaded media at {}", media.path().display());
        }
        Ok(text)
    }

    async fn run_file(
        &self,
        input: &Path,
        cancel: &CancellationToken,
        tracker: &mut RunTracker,
    ) -> Result<String, PipelineError> {
        ensure_active(cancel, PipelineStage::Transcoding)?;
        tokio::fs::metadata(input)
            .await
            .map_err(|source| WavError::Io {
                path: input.to_path_buf(),
                source,
            })?;
        let output_dir = self.prepare_output_dir().await?;

        self.transcribe_media(input, output_dir, cancel, tracker)
            .await
    }

    async fn prepare_output_dir(&self) -> Result<&Path, PipelineError> {
        let output_dir = self.config.output_dir.as_path();
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|e| PipelineError::WorkingDirectory {
                path: output_dir.to_path_buf(),
                source: e,
            })?;
        Ok(output_dir)
    }

    /// Transcoding, decoding and inference over a media file on disk.
    async fn transcribe_media(
        &self,
        media: &Path,
        output_dir: &Path,
        cancel: &CancellationToken,
        tracker: &mut RunTracker,
    ) -> Result<String, PipelineError> {
        ensure_active(cancel, tracker.advance())?;
        let wav = TempArtifact::new(output_dir.join(format!("{}.wav", tracker.run_id())));
        self.transcoder.transcode(media, wav.path(), cancel).await?;

        ensure_active(cancel, tracker.advance())?;
        let samples = load_wav_file(wav.path()).await?;

        tracker.advance();
        transcribe_samples(
            self.engine.clone(),
            &self.config.model_path,
            self.config.language_hint(),
            samples,
            cancel,
        )
        .await
    }
}

fn ensure_active(cancel: &CancellationToken, stage: PipelineStage) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        return Err(PipelineError::cancelled(stage));
    }
    Ok(())
}

/// `<prefix>_<unix seconds>_<random>`: readable like the timestamped names
/// users know, unique across concurrent runs in one directory.
fn generate_run_id(prefix: &str) -> String {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, chrono::Utc::now().timestamp(), &nonce[..8])
}

/// Hosts report container extensions; anything that is not a plain token is
/// replaced so it cannot escape the output directory.
fn media_extension(reported: Option<&str>) -> &str {
    match reported {
        Some(ext) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => ext,
        _ => DEFAULT_MEDIA_EXTENSION,
    }
}
