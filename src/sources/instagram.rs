use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ytdlp, MediaSource, SourceError, SourceKind};

/// Instagram post/reel audio source backed by yt-dlp
pub struct InstagramSource;

impl InstagramSource {
    pub fn new() -> Self {
        Self
    }

    /// Extract the shortcode from a post or reel URL
    pub fn shortcode(url: &str) -> Option<String> {
        let marker = ["/p/", "/reel/", "/reels/", "/tv/"]
            .iter()
            .find_map(|m| url.find(m).map(|i| i + m.len()))?;

        let code: String = url[marker..]
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();

        if code.is_empty() {
            None
        } else {
            Some(code)
        }
    }
}

#[async_trait]
impl MediaSource for InstagramSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Instagram
    }

    fn matches(&self, reference: &str) -> bool {
        let lower = reference.to_lowercase();
        lower.contains("instagram.com/") && Self::shortcode(reference).is_some()
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

        let shortcode = Self::shortcode(reference).unwrap_or_else(|| "post".to_string());
        let output_path = dest_dir.join(format!("instagram_{}.mp3", shortcode));

        tracing::info!("Downloading Instagram audio: {}", reference);
        ytdlp::download_audio(self.kind(), reference, &output_path).await
    }
}

impl Default for InstagramSource {
    fn default() -> Self {
        Self::new()
    }
}
