use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{MediaSource, SourceError, SourceKind};
use crate::utils;

const PUBLIC_API: &str = "https://cloud-api.yandex.net/v1/disk/public/resources";

/// Yandex Disk public-link source.
///
/// Resolves a public share link through the cloud API to a direct download
/// `href`, then streams the file. Only single-file links are accepted; a
/// folder link fails the job.
pub struct YandexDiskSource {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct ResourceMeta {
    name: String,
    #[serde(rename = "type")]
    resource_type: String,
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    href: String,
}

impl YandexDiskSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    fn http_error(&self, status: StatusCode, reference: &str) -> SourceError {
        match status {
            StatusCode::NOT_FOUND => SourceError::NotFound {
                kind: SourceKind::YandexDisk,
                reference: reference.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::AuthRequired {
                kind: SourceKind::YandexDisk,
                detail: format!("HTTP {}", status),
            },
            _ => SourceError::DownloadFailed {
                kind: SourceKind::YandexDisk,
                detail: format!("HTTP {}", status),
            },
        }
    }

    async fn resource_meta(&self, public_url: &str) -> Result<ResourceMeta, SourceError> {
        let response = self
            .client
            .get(PUBLIC_API)
            .query(&[("public_key", public_url)])
            .send()
            .await
            .map_err(|e| SourceError::DownloadFailed {
                kind: SourceKind::YandexDisk,
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(self.http_error(response.status(), public_url));
        }

        response
            .json::<ResourceMeta>()
            .await
            .map_err(|e| SourceError::DownloadFailed {
                kind: SourceKind::YandexDisk,
                detail: format!("unparseable resource metadata: {}", e),
            })
    }

    async fn download_href(&self, public_url: &str) -> Result<String, SourceError> {
        let response = self
            .client
            .get(format!("{}/download", PUBLIC_API))
            .query(&[("public_key", public_url)])
            .send()
            .await
            .map_err(|e| SourceError::DownloadFailed {
                kind: SourceKind::YandexDisk,
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(self.http_error(response.status(), public_url));
        }

        let link: DownloadLink =
            response
                .json()
                .await
                .map_err(|e| SourceError::DownloadFailed {
                    kind: SourceKind::YandexDisk,
                    detail: format!("unparseable download link: {}", e),
                })?;

        Ok(link.href)
    }

    async fn stream_to_file(&self, href: &str, target: &Path) -> Result<(), SourceError> {
        let response = self.client.get(href).send().await.map_err(|e| {
            SourceError::DownloadFailed {
                kind: SourceKind::YandexDisk,
                detail: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            return Err(self.http_error(response.status(), href));
        }

        let mut file = fs_err::File::create(target).map_err(|e| SourceError::DownloadFailed {
            kind: SourceKind::YandexDisk,
            detail: e.to_string(),
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SourceError::DownloadFailed {
                kind: SourceKind::YandexDisk,
                detail: e.to_string(),
            })?;
            file.write_all(&chunk)
                .map_err(|e| SourceError::DownloadFailed {
                    kind: SourceKind::YandexDisk,
                    detail: e.to_string(),
                })?;
        }

        Ok(())
    }
}

#[async_trait]
impl MediaSource for YandexDiskSource {
    fn kind(&self) -> SourceKind {
        SourceKind::YandexDisk
    }

    fn matches(&self, reference: &str) -> bool {
        reference.contains("disk.yandex")
    }

    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, SourceError> {
        if !self.matches(reference) {
            return Err(SourceError::InvalidReference {
                kind: self.kind(),
                reference: reference.to_string(),
            });
        }

        let meta = self.resource_meta(reference).await?;
        if meta.resource_type != "file" {
            return Err(SourceError::DownloadFailed {
                kind: self.kind(),
                detail: "public link points to a folder; pass a link to a single file".to_string(),
            });
        }

        if !utils::is_media_filename(&meta.name) {
            return Err(SourceError::DownloadFailed {
                kind: self.kind(),
                detail: format!("'{}' is not a supported audio/video file", meta.name),
            });
        }

        let target = dest_dir.join(utils::sanitize_filename(&meta.name));

        tracing::info!("Downloading from Yandex Disk: {}", meta.name);
        let href = self.download_href(reference).await?;
        self.stream_to_file(&href, &target).await?;

        Ok(target)
    }
}

impl Default for YandexDiskSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_public_links() {
        let source = YandexDiskSource::new();
        assert!(source.matches("https://disk.yandex.ru/d/AbCdEf123"));
        assert!(source.matches("https://disk.yandex.com/i/XyZ987"));
        assert!(!source.matches("https://drive.google.com/file/d/1a/view"));
    }

    #[tokio::test]
    async fn rejects_foreign_reference() {
        let source = YandexDiskSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .fetch("https://example.com/file.mp3", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidReference { .. }));
    }
}
