// config.rs
//
// Per-run configuration. Built once by the caller and handed to the
// orchestrator by value; no stage mutates it.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL_PATH: &str = "models/ggml-base.bin";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Working directory for downloaded media and intermediate WAV files.
    pub output_dir: PathBuf,
    /// Path to the whisper GGML model file.
    pub model_path: PathBuf,
    /// Language hint passed to whisper; empty means auto-detect.
    pub language: String,
    /// Delete the downloaded media file once the run is over.
    pub cleanup_files: bool,
    pub ffmpeg_path: Option<PathBuf>,
    pub ytdlp_path: Option<PathBuf>,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            output_dir: std::env::temp_dir().join("ytaudio"),
            model_path: PathBuf::from(DEFAULT_MODEL_PATH),
            language: String::new(),
            cleanup_files: true,
            ffmpeg_path: None,
            ytdlp_path: None,
        }
    }
}

impl TranscribeConfig {
    /// Defaults overlaid with any `YTSCRIBE_*` environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(dir) = env_value("YTSCRIBE_OUTPUT_DIR") {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(model) = env_value("YTSCRIBE_MODEL") {
            config.model_path = PathBuf::from(model);
        }
        if let Some(language) = env_value("YTSCRIBE_LANGUAGE") {
            config.language = language;
        }
        if let Some(keep) = env_value("YTSCRIBE_KEEP_FILES").and_then(|v| parse_flag(&v)) {
            config.cleanup_files = !keep;
        }
        config.ffmpeg_path = env_value("YTSCRIBE_FFMPEG").map(PathBuf::from);
        config.ytdlp_path = env_value("YTSCRIBE_YTDLP").map(PathBuf::from);

        config
    }

    /// The hint to hand to the engine, if any. "auto" counts as no hint.
    pub fn language_hint(&self) -> Option<&str> {
        match self.language.trim() {
            "" | "auto" => None,
            lang => Some(lang),
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
