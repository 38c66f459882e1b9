// cli/transcript.rs
//
// YouTube URL handling, transcript naming and the markdown document written
// for --project runs.

use std::path::Path;

use chrono::{DateTime, Local};
use url::Url;

use crate::pipeline::TranscriptionResult;
use crate::utils::format_timestamp;

const YOUTUBE_HOSTS: &[&str] = &[
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];
const SHORT_HOST: &str = "youtu.be";

/// Accepts `http(s)` URLs, tolerating a missing scheme.
fn parse_loose(input: &str) -> Option<Url> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    let url = Url::parse(input)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{}", input)).ok())?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Watch, embed, legacy `/v/`, shorts and youtu.be links.
pub fn is_valid_youtube_url(input: &str) -> bool {
    let Some(url) = parse_loose(input) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };
    let path = url.path();

    if host == SHORT_HOST {
        return path.len() > 1;
    }
    YOUTUBE_HOSTS.contains(&host)
        && (path == "/watch"
            || path.starts_with("/embed/")
            || path.starts_with("/v/")
            || path.starts_with("/shorts/"))
}

/// The video id of a YouTube link, if it has one made of id characters only.
pub fn extract_video_id(input: &str) -> Option<String> {
    let url = parse_loose(input)?;
    let host = url.host_str()?;

    let id = if host == SHORT_HOST {
        url.path_segments()?.next().map(str::to_owned)
    } else if YOUTUBE_HOSTS.contains(&host) {
        match url.query_pairs().find(|(k, _)| k == "v") {
            Some((_, v)) => Some(v.into_owned()),
            None => {
                let mut segments = url.path_segments()?;
                match segments.next() {
                    Some("embed" | "v" | "shorts") => segments.next().map(str::to_owned),
                    _ => None,
                }
            }
        }
    } else {
        None
    }?;

    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    valid.then_some(id)
}

/// `<label>_<YYYY-MM-DD_HH-MM-SS>.md`
pub fn transcript_filename(label: &str, now: DateTime<Local>) -> String {
    format!("{}_{}.md", label, now.format("%Y-%m-%d_%H-%M-%S"))
}

/// Filename for a video transcript, with `transcript` standing in for an
/// unknown id.
pub fn generate_transcript_filename(video_url: &str, now: DateTime<Local>) -> String {
    let video_id = extract_video_id(video_url).unwrap_or_else(|| "transcript".to_string());
    transcript_filename(&video_id, now)
}

/// The file stem of a local input, reduced to filename-safe characters.
pub fn file_label(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let label: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if label.is_empty() {
        "transcript".to_string()
    } else {
        label
    }
}

pub fn youtube_title(video_url: &str) -> String {
    match extract_video_id(video_url) {
        Some(id) => format!("YouTube Video Transcript ({})", id),
        None => "YouTube Video Transcript".to_string(),
    }
}

pub fn format_transcript_markdown(
    title: &str,
    source: &str,
    result: &TranscriptionResult,
    now: DateTime<Local>,
) -> String {
    let mut doc = format!("# {}\n\n", title);
    doc.push_str(&format!("**Source:** {}  \n", source));
    doc.push_str(&format!(
        "**Transcribed:** {}  \n",
        now.format("%Y-%m-%d %H:%M:%S")
    ));
    doc.push_str(&format!(
        "**Processing time:** {}  \n",
        format_timestamp(result.duration.as_secs_f64())
    ));
    if !result.language.is_empty() {
        doc.push_str(&format!("**Language:** {}  \n", result.language));
    }
    doc.push_str("\n---\n\n## Transcript\n\n");
    doc.push_str(&result.text);
    doc.push('\n');
    doc
}
