// source/ytdlp.rs
//
// Enumerates the formats of a video through `yt-dlp --dump-single-json` and
// downloads the chosen one over plain HTTP with reqwest.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use super::{download_to_file, MediaSource, StreamCandidate};
use crate::config::TranscribeConfig;
use crate::error::PipelineError;
use crate::pipeline::PipelineStage;
use crate::utils::locate_tool;

#[derive(Debug, Deserialize)]
struct VideoInfo {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    #[serde(default)]
    format_id: String,
    url: Option<String>,
    acodec: Option<String>,
    /// kbit/s
    abr: Option<f64>,
    /// kbit/s
    tbr: Option<f64>,
    ext: Option<String>,
    protocol: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

impl FormatInfo {
    fn has_audio(&self) -> bool {
        matches!(self.acodec.as_deref(), Some(codec) if codec != "none")
    }

    /// Manifest-based formats (HLS, DASH) cannot be fetched with one GET.
    fn is_direct(&self) -> bool {
        matches!(self.protocol.as_deref(), None | Some("http") | Some("https"))
    }

    fn into_candidate(self) -> Option<StreamCandidate> {
        let kbps = self.abr.or(self.tbr).unwrap_or(0.0).max(0.0);
        Some(StreamCandidate {
            id: self.format_id,
            bitrate: (kbps * 1000.0).round() as u64,
            codec: self.acodec?,
            location: self.url?,
            extension: self.ext,
            headers: self.http_headers,
        })
    }
}

/// Parse a yt-dlp JSON dump into audio-bearing candidates, keeping yt-dlp's
/// format order.
pub fn parse_candidates(json: &[u8]) -> Result<Vec<StreamCandidate>, serde_json::Error> {
    let info: VideoInfo = serde_json::from_slice(json)?;
    if let Some(title) = &info.title {
        log::info!("Resolved video: {}", title);
    }

    Ok(info
        .formats
        .into_iter()
        .filter(|f| f.has_audio() && f.is_direct())
        .filter_map(FormatInfo::into_candidate)
        .collect())
}

pub struct YtDlpSource {
    program: PathBuf,
    leading_args: Vec<OsString>,
    client: Client,
}

impl YtDlpSource {
    pub fn new(ytdlp_path: PathBuf, client: Client) -> Self {
        Self {
            program: ytdlp_path,
            leading_args: Vec::new(),
            client,
        }
    }

    pub fn from_config(config: &TranscribeConfig) -> Self {
        let path = locate_tool("yt-dlp", config.ytdlp_path.as_deref())
            .unwrap_or_else(|| PathBuf::from("yt-dlp"));
        Self::new(path, Client::new())
    }

    #[cfg(all(test, unix))]
    fn shell(script: &str) -> Self {
        Self {
            program: PathBuf::from("/bin/sh"),
            leading_args: vec!["-c".into(), script.into(), "yt-dlp".into()],
            client: Client::new(),
        }
    }
}

#[async_trait]
impl MediaSource for YtDlpSource {
    async fn candidates(
        &self,
        url: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<StreamCandidate>, PipelineError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.leading_args)
            .args(["--dump-single-json", "--no-playlist", "--no-warnings", url])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(target_os = "windows")]
        {
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let child = command.spawn().map_err(|e| {
            PipelineError::fetch(
                format!("failed to launch {}", self.program.display()),
                e,
            )
        })?;

        let output = tokio::select! {
            output = child.wait_with_output() => output
                .map_err(|e| PipelineError::fetch("failed to get video info", e))?,
            _ = cancel.cancelled() => {
                log::warn!("Stream resolution for {} cancelled", url);
                return Err(PipelineError::cancelled(PipelineStage::Resolving));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PipelineError::fetch(
                format!("failed to get video info ({})", output.status),
                stderr,
            ));
        }

        parse_candidates(&output.stdout)
            .map_err(|e| PipelineError::fetch("unreadable video info", e))
    }

    async fn fetch(
        &self,
        candidate: &StreamCandidate,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<u64, PipelineError> {
        download_to_file(&self.client, candidate, destination, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const DUMP: &str = r#"{
        "title": "Lecture 1",
        "formats": [
            {"format_id": "sb0", "url": "https://i.example/sb", "acodec": "none", "vcodec": "none", "protocol": "mhtml"},
            {"format_id": "139", "url": "https://r.example/139", "acodec": "mp4a.40.5", "abr": 48.8, "ext": "m4a", "protocol": "https"},
            {"format_id": "251", "url": "https://r.example/251", "acodec": "opus", "abr": 129.5, "ext": "webm", "protocol": "https",
             "http_headers": {"User-Agent": "Mozilla/5.0"}},
            {"format_id": "137", "url": "https://r.example/137", "acodec": "none", "vcodec": "avc1", "tbr": 4000.0, "protocol": "https"},
            {"format_id": "18", "url": "https://r.example/18", "acodec": "mp4a.40.2", "tbr": 500.0, "ext": "mp4", "protocol": "https"},
            {"format_id": "hls-1", "url": "https://m.example/1.m3u8", "acodec": "mp4a.40.2", "tbr": 900.0, "protocol": "m3u8_native"}
        ]
    }"#;

    #[test]
    fn test_parse_keeps_direct_audio_formats_in_order() {
        let candidates = parse_candidates(DUMP.as_bytes()).unwrap();
        let ids: Vec<&str> = candidates.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["139", "251", "18"]);

        assert_eq!(candidates[0].bitrate, 48_800);
        assert_eq!(candidates[1].bitrate, 129_500);
        assert_eq!(candidates[2].bitrate, 500_000);
        assert_eq!(candidates[1].codec, "opus");
        assert_eq!(candidates[1].extension.as_deref(), Some("webm"));
        assert_eq!(
            candidates[1].headers.get("User-Agent").map(String::as_str),
            Some("Mozilla/5.0")
        );
    }

    #[test]
    fn test_parse_without_formats() {
        assert!(parse_candidates(br#"{"title": "Live"}"#).unwrap().is_empty());
        assert!(parse_candidates(b"not json").is_err());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_candidates_from_process_output() {
        let script = format!("cat <<'EOF'\n{DUMP}\nEOF");
        let source = YtDlpSource::shell(&script);

        let candidates = source
            .candidates("https://youtu.be/abc", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(candidates.len(), 3);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failing_process_is_fetch_failure() {
        let source = YtDlpSource::shell("echo 'ERROR: Video unavailable' >&2; exit 1");

        let err = source
            .candidates("https://youtu.be/abc", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::FetchFailed);

        use std::error::Error as _;
        assert!(err.source().unwrap().to_string().contains("Video unavailable"));
    }
}
