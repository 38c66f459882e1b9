// audio/transcode.rs
//
// Converts arbitrary downloaded media into the canonical 16kHz mono s16le WAV
// the decoder accepts, by running ffmpeg as a scoped child process.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::config::TranscribeConfig;
use crate::error::PipelineError;
use crate::pipeline::PipelineStage;
use crate::utils::locate_tool;

#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write the canonical container for `input` to `output`, replacing any
    /// existing file.
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError>;
}

/// ffmpeg arguments forcing 16-bit little-endian PCM, 16kHz, one channel.
pub fn canonical_args(input: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-i".into(), input.as_os_str().to_owned()];
    args.extend(
        ["-acodec", "pcm_s16le", "-ar", "16000", "-ac", "1", "-y"]
            .iter()
            .map(OsString::from),
    );
    args.push(output.as_os_str().to_owned());
    args
}

pub struct FfmpegTranscoder {
    program: PathBuf,
    leading_args: Vec<OsString>,
}

impl FfmpegTranscoder {
    pub fn new(ffmpeg_path: PathBuf) -> Self {
        Self {
            program: ffmpeg_path,
            leading_args: Vec::new(),
        }
    }

    /// Use the configured ffmpeg, falling back to whatever `ffmpeg` the OS
    /// resolves at spawn time.
    pub fn from_config(config: &TranscribeConfig) -> Self {
        let path = locate_tool("ffmpeg", config.ffmpeg_path.as_deref())
            .unwrap_or_else(|| PathBuf::from("ffmpeg"));
        Self::new(path)
    }

    #[cfg(all(test, unix))]
    fn shell(script: &str) -> Self {
        Self {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".into(), script.into(), "ffmpeg".into()],
        }
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), PipelineError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(canonical_args(input, output))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        // Hide console window on Windows
        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        log::debug!("FFmpeg command: {:?}", command);

        let child = command.spawn().map_err(|e| PipelineError::TranscodeFailed {
            status: "not started".to_string(),
            output: format!("failed to launch {}: {}", self.program.display(), e),
        })?;

        // Dropping the wait future on cancellation drops the child, which
        // kills it (kill_on_drop).
        let result = tokio::select! {
            result = child.wait_with_output() => result,
            _ = cancel.cancelled() => {
                log::warn!("Transcoding of {} cancelled, killing ffmpeg", input.display());
                return Err(PipelineError::cancelled(PipelineStage::Transcoding));
            }
        };

        let output_capture = result.map_err(|e| PipelineError::TranscodeFailed {
            status: "unknown".to_string(),
            output: format!("failed to wait for ffmpeg: {}", e),
        })?;

        let mut combined = String::from_utf8_lossy(&output_capture.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output_capture.stderr));

        if !output_capture.status.success() {
            log::error!("FFmpeg process failed with status: {}", output_capture.status);
            return Err(PipelineError::TranscodeFailed {
                status: output_capture.status.to_string(),
                output: combined,
            });
        }

        log::info!("Transcoded {} -> {}", input.display(), output.display());
        Ok(())
    }
}
