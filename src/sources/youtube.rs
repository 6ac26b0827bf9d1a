use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ytdlp, MediaSource, SourceError, SourceKind};

/// YouTube audio source backed by yt-dlp
pub struct YoutubeSource;

impl YoutubeSource {
    pub fn new() -> Self {
        Self
    }

    /// Extract the 11-character video id from a YouTube URL
    pub fn video_id(url: &str) -> Option<String> {
        let url = url.strip_prefix("http://").unwrap_or(url);
        let url = url.strip_prefix("https://").unwrap_or(url);
        let url = url.strip_prefix("www.").unwrap_or(url);
        let url = url.strip_prefix("m.").unwrap_or(url);

        let id = if let Some(rest) = url.strip_prefix("youtube.com/watch?") {
            rest.split('&')
                .find_map(|pair| pair.strip_prefix("v="))
                .map(str::to_string)
        } else if let Some(rest) = url.strip_prefix("youtu.be/") {
            rest.split(['?', '&', '/']).next().map(str::to_string)
        } else if let Some(rest) = url.strip_prefix("youtube.com/embed/") {
            rest.split(['?', '&', '/']).next().map(str::to_string)
        } else {
            None
        };

        id.filter(|id| !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'))
    }
}

#[async_trait]
impl MediaSource for YoutubeSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Youtube
    }

    fn matches(&self, reference: &str) -> bool {
        let lower = reference.to_lowercase();
        lower.contains("youtube.com/watch")
            || lower.contains("youtu.be/")
            || lower.contains("youtube.com/embed/")
            || lower.contains("m.youtube.com/")
    }

    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, SourceError> {
        if !self.matches(reference) {
            return Err(SourceError::InvalidReference {
                kind: self.kind(),
                reference: reference.to_string(),
            });
        }

        if !ytdlp::is_available().await {
            return Err(SourceError::DownloadFailed {
                kind: self.kind(),
                detail: "yt-dlp is not installed; see https://github.com/yt-dlp/yt-dlp".to_string(),
            });
        }

        let video_id = Self::video_id(reference).unwrap_or_else(|| "video".to_string());
        let output_path = dest_dir.join(format!("youtube_{}.mp3", video_id));

        tracing::info!("Downloading YouTube audio: {}", reference);
        ytdlp::download_audio(self.kind(), reference, &output_path).await
    }
}

impl Default for YoutubeSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_youtube_urls() {
        let source = YoutubeSource::new();
        assert!(source.matches("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(source.matches("https://youtu.be/dQw4w9WgXcQ"));
        assert!(source.matches("https://m.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(!source.matches("https://vimeo.com/12345"));
        assert!(!source.matches("https://vk.com/video-1_2"));
    }

    #[test]
    fn extracts_video_id() {
        assert_eq!(
            YoutubeSource::video_id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            YoutubeSource::video_id("https://youtu.be/dQw4w9WgXcQ?t=42"),
            Some("dQw4w9WgXcQ".to_string())
        );
        assert_eq!(
            YoutubeSource::video_id("https://www.youtube.com/watch?list=PL1&v=abc123_-X"),
            Some("abc123_-X".to_string())
        );
        assert_eq!(YoutubeSource::video_id("https://example.com/watch?v=x"), None);
    }

    #[tokio::test]
    async fn rejects_foreign_reference() {
        let source = YoutubeSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .fetch("https://vk.com/video-1_2", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidReference { .. }));
    }
}
