use async_trait::async_trait;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub mod gdrive;
pub mod instagram;
pub mod local;
pub mod vk;
pub mod yandex;
pub mod youtube;
pub(crate) mod ytdlp;

/// The platforms media can be fetched from
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Youtube,
    Vk,
    Instagram,
    YandexDisk,
    GoogleDrive,
    Local,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SourceKind::Youtube => "YouTube",
            SourceKind::Vk => "VK",
            SourceKind::Instagram => "Instagram",
            SourceKind::YandexDisk => "Yandex Disk",
            SourceKind::GoogleDrive => "Google Drive",
            SourceKind::Local => "Local file",
        };
        write!(f, "{}", name)
    }
}

/// Errors a source adapter can fail with
#[derive(thiserror::Error, Debug)]
pub enum SourceError {
    #[error("invalid reference for {kind}: {reference}")]
    InvalidReference { kind: SourceKind, reference: String },

    #[error("{kind} requires authentication: {detail}")]
    AuthRequired { kind: SourceKind, detail: String },

    #[error("{kind} media not found: {reference}")]
    NotFound { kind: SourceKind, reference: String },

    #[error("{kind} download failed: {detail}")]
    DownloadFailed { kind: SourceKind, detail: String },
}

/// Trait implemented by every source adapter.
///
/// Given a reference, an adapter produces exactly one local media file under
/// `dest_dir` or fails. The caller owns the file and is responsible for
/// deleting it after use.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// The one source type this adapter is responsible for
    fn kind(&self) -> SourceKind;

    /// Whether this adapter recognizes the reference as its own
    fn matches(&self, reference: &str) -> bool;

    /// Download media for the reference into `dest_dir`
    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, SourceError>;
}

/// Registry mapping source kinds to their adapters.
///
/// An adapter is only ever invoked for its declared kind; there is no
/// cross-source fallback when one fails.
pub struct SourceRegistry {
    adapters: Vec<Box<dyn MediaSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self {
            adapters: vec![
                Box::new(youtube::YoutubeSource::new()),
                Box::new(vk::VkSource::new()),
                Box::new(instagram::InstagramSource::new()),
                Box::new(yandex::YandexDiskSource::new()),
                Box::new(gdrive::GoogleDriveSource::new()),
                Box::new(local::LocalFileSource::new()),
            ],
        }
    }

    /// Look up the adapter for a declared source kind
    pub fn adapter(&self, kind: SourceKind) -> &dyn MediaSource {
        self.adapters
            .iter()
            .find(|a| a.kind() == kind)
            .map(|a| a.as_ref())
            .unwrap_or_else(|| unreachable!("every SourceKind has a registered adapter"))
    }

    /// Detect the source kind from a raw reference.
    ///
    /// URL-shaped references go to the first platform that recognizes them;
    /// everything else is treated as a local path.
    pub fn detect(&self, reference: &str) -> Option<SourceKind> {
        if reference.starts_with("http://") || reference.starts_with("https://") {
            return self
                .adapters
                .iter()
                .filter(|a| a.kind() != SourceKind::Local)
                .find(|a| a.matches(reference))
                .map(|a| a.kind());
        }

        Some(SourceKind::Local)
    }

    /// List all supported platforms
    pub fn list_platforms(&self) -> Vec<SourceKind> {
        self.adapters.iter().map(|a| a.kind()).collect()
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_platform_from_url() {
        let registry = SourceRegistry::new();
        assert_eq!(
            registry.detect("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some(SourceKind::Youtube)
        );
        assert_eq!(
            registry.detect("https://vk.com/video-220754053_456243260"),
            Some(SourceKind::Vk)
        );
        assert_eq!(
            registry.detect("https://www.instagram.com/reel/Cxyz123/"),
            Some(SourceKind::Instagram)
        );
        assert_eq!(
            registry.detect("https://disk.yandex.ru/d/AbCdEf123"),
            Some(SourceKind::YandexDisk)
        );
        assert_eq!(
            registry.detect("https://drive.google.com/file/d/1AbCdEfGh/view"),
            Some(SourceKind::GoogleDrive)
        );
    }

    #[test]
    fn non_url_is_local() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.detect("./lecture.mp4"), Some(SourceKind::Local));
        assert_eq!(registry.detect("/tmp/audio.mp3"), Some(SourceKind::Local));
    }

    #[test]
    fn unknown_url_detects_nothing() {
        let registry = SourceRegistry::new();
        assert_eq!(registry.detect("https://example.com/page"), None);
    }

    #[test]
    fn adapter_lookup_matches_kind() {
        let registry = SourceRegistry::new();
        for kind in registry.list_platforms() {
            assert_eq!(registry.adapter(kind).kind(), kind);
        }
    }
}
