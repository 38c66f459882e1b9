use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};

pub fn format_timestamp(seconds: f64) -> String {
    let total_seconds = seconds as u64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let secs = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}

/// Resolve an external tool: an explicit override wins, otherwise search PATH.
pub fn locate_tool(name: &str, explicit: Option<&Path>) -> Option<PathBuf> {
    match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => which::which(name).ok(),
    }
}

/// Verify that the external tools the pipeline shells out to are available.
pub fn check_dependencies() -> Result<()> {
    which::which("ffmpeg").map_err(|e| {
        anyhow!(
            "ffmpeg not found in PATH: {}\nPlease install FFmpeg (https://ffmpeg.org/download.html)",
            e
        )
    })?;

    which::which("yt-dlp").map_err(|e| {
        anyhow!(
            "yt-dlp not found in PATH: {}\nPlease install yt-dlp (https://github.com/yt-dlp/yt-dlp#installation)",
            e
        )
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0.0), "00:00:00");
        assert_eq!(format_timestamp(61.9), "00:01:01");
        assert_eq!(format_timestamp(3725.0), "01:02:05");
    }

    #[test]
    fn test_explicit_tool_path_wins() {
        let explicit = Path::new("/opt/custom/ffmpeg");
        assert_eq!(
            locate_tool("ffmpeg", Some(explicit)),
            Some(PathBuf::from("/opt/custom/ffmpeg"))
        );
        assert_eq!(locate_tool("definitely-not-a-real-tool-4711", None), None);
    }
}
