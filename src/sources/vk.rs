use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{ytdlp, MediaSource, SourceError, SourceKind};

/// VK video audio source backed by yt-dlp.
///
/// Accepts both direct video links (`vk.com/video-123_456`) and browser links
/// where the video id hides in a `z=` query parameter.
pub struct VkSource;

impl VkSource {
    pub fn new() -> Self {
        Self
    }

    /// Extract the `-123_456` style video id from any supported VK URL shape.
    ///
    /// The `video` marker also occurs inside `vkvideo`, so every occurrence
    /// is tried and the first one followed by a well-formed id wins.
    pub fn video_id(url: &str) -> Option<String> {
        let decoded = urlencoding::decode(url).map(|s| s.into_owned()).unwrap_or_else(|_| url.to_string());

        decoded
            .match_indices("video")
            .find_map(|(pos, marker)| Self::parse_id(&decoded[pos + marker.len()..]))
    }

    /// Parse a leading `-?\d+_\d+` id, rejecting anything malformed
    fn parse_id(rest: &str) -> Option<String> {
        let mut chars = rest.chars().peekable();
        let mut id = String::new();

        if chars.peek() == Some(&'-') {
            id.push('-');
            chars.next();
        }
        let mut seen_digits = false;
        let mut seen_underscore = false;
        for c in chars {
            match c {
                '0'..='9' => {
                    id.push(c);
                    seen_digits = true;
                }
                '_' if seen_digits && !seen_underscore => {
                    id.push(c);
                    seen_underscore = true;
                    seen_digits = false;
                }
                _ => break,
            }
        }

        if seen_underscore && seen_digits {
            Some(id)
        } else {
            None
        }
    }

    /// Turn browser-style links into the direct `vk.com/video<ID>` form
    pub fn normalize_url(url: &str) -> String {
        match Self::video_id(url) {
            Some(id) => format!("https://vk.com/video{}", id),
            None => url.to_string(),
        }
    }
}

#[async_trait]
impl MediaSource for VkSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Vk
    }

    fn matches(&self, reference: &str) -> bool {
        let lower = reference.to_lowercase();
        (lower.contains("vk.com/") || lower.contains("vkvideo.ru/")) && Self::video_id(reference).is_some()
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

        let url = Self::normalize_url(reference);
        let video_id = Self::video_id(&url).unwrap_or_else(|| "video".to_string());
        let output_path = dest_dir.join(format!("vk_video_{}.mp3", video_id));

        tracing::info!("Downloading VK audio: {}", url);
        ytdlp::download_audio(self.kind(), &url, &output_path).await
    }
}

impl Default for VkSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_id_from_direct_link() {
        assert_eq!(
            VkSource::video_id("https://vk.com/video-220754053_456243260"),
            Some("-220754053_456243260".to_string())
        );
        assert_eq!(
            VkSource::video_id("https://vk.com/video123_456"),
            Some("123_456".to_string())
        );
    }

    #[test]
    fn extracts_id_from_browser_link() {
        let url = "https://vk.com/vkvideo?z=video-220754053_456243260%2Fvideos-220754053%2Fpl_-220754053_-2";
        assert_eq!(
            VkSource::video_id(url),
            Some("-220754053_456243260".to_string())
        );
        assert_eq!(
            VkSource::normalize_url(url),
            "https://vk.com/video-220754053_456243260"
        );
    }

    #[test]
    fn extracts_id_despite_vkvideo_in_the_host() {
        // the host name itself contains the "video" marker
        assert_eq!(
            VkSource::video_id("https://vkvideo.ru/video-111222333_444555666"),
            Some("-111222333_444555666".to_string())
        );
        let source = VkSource::new();
        assert!(source.matches("https://vkvideo.ru/video-111222333_444555666"));
    }

    #[test]
    fn direct_link_passes_through_normalization() {
        assert_eq!(
            VkSource::normalize_url("https://vk.com/video-1_2"),
            "https://vk.com/video-1_2"
        );
    }

    #[test]
    fn rejects_non_video_vk_urls() {
        let source = VkSource::new();
        assert!(!source.matches("https://vk.com/somepage"));
        assert!(!source.matches("https://youtube.com/watch?v=abc"));
        assert!(source.matches("https://vk.com/video-220754053_456243260"));
    }
}
