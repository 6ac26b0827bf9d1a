//! Shared yt-dlp invocation for the platforms it covers.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use super::{SourceError, SourceKind};

const YT_DLP: &str = "yt-dlp";

/// Check if yt-dlp is available on PATH
pub async fn is_available() -> bool {
    Command::new(YT_DLP)
        .arg("--version")
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map(|o| o.status.success())
        .unwrap_or(false)
}

/// Download the audio track of `url` as MP3 to `output_path`
pub async fn download_audio(
    kind: SourceKind,
    url: &str,
    output_path: &Path,
) -> Result<PathBuf, SourceError> {
    tracing::debug!("Downloading audio for: {}", url);

    let output = Command::new(YT_DLP)
        .args([
            "--output",
            &output_path.to_string_lossy(),
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "5",
            "--format",
            "bestaudio/best",
            "--no-playlist",
            "--newline",
            url,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| SourceError::DownloadFailed {
            kind,
            detail: format!("failed to run yt-dlp: {}", e),
        })?;

    if !output.status.success() {
        return Err(classify_failure(
            kind,
            url,
            &String::from_utf8_lossy(&output.stderr),
        ));
    }

    // yt-dlp may add the extension itself when the template lacks one
    if output_path.exists() {
        return Ok(output_path.to_path_buf());
    }
    let with_ext = output_path.with_extension("mp3");
    if with_ext.exists() {
        return Ok(with_ext);
    }

    Err(SourceError::DownloadFailed {
        kind,
        detail: format!("yt-dlp produced no file at {}", output_path.display()),
    })
}

/// Map yt-dlp stderr to the closest source error kind
fn classify_failure(kind: SourceKind, reference: &str, stderr: &str) -> SourceError {
    let lower = stderr.to_lowercase();

    if lower.contains("sign in") || lower.contains("login required") || lower.contains("private") {
        SourceError::AuthRequired {
            kind,
            detail: first_error_line(stderr),
        }
    } else if lower.contains("not found")
        || lower.contains("does not exist")
        || lower.contains("unavailable")
        || lower.contains("404")
    {
        SourceError::NotFound {
            kind,
            reference: reference.to_string(),
        }
    } else {
        SourceError::DownloadFailed {
            kind,
            detail: first_error_line(stderr),
        }
    }
}

fn first_error_line(stderr: &str) -> String {
    stderr
        .lines()
        .find(|l| l.starts_with("ERROR"))
        .unwrap_or_else(|| stderr.lines().next().unwrap_or("unknown error"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_private_video_as_auth() {
        let err = classify_failure(
            SourceKind::Youtube,
            "https://youtu.be/x",
            "ERROR: Private video. Sign in if you've been granted access",
        );
        assert!(matches!(err, SourceError::AuthRequired { .. }));
    }

    #[test]
    fn classifies_missing_video_as_not_found() {
        let err = classify_failure(
            SourceKind::Youtube,
            "https://youtu.be/x",
            "ERROR: Video unavailable",
        );
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[test]
    fn other_failures_are_download_failed() {
        let err = classify_failure(
            SourceKind::Vk,
            "https://vk.com/video1_2",
            "ERROR: Unable to download webpage: timed out",
        );
        assert!(matches!(err, SourceError::DownloadFailed { .. }));
    }
}
