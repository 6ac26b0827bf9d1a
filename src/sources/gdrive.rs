use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{MediaSource, SourceError, SourceKind};
use crate::utils;

/// Google Drive public-file source.
///
/// Downloads shared files through the `uc?export=download` endpoint. Large
/// files answer with an HTML virus-scan interstitial; in that case the request
/// is retried with the confirm token the page carries.
pub struct GoogleDriveSource {
    client: Client,
}

impl GoogleDriveSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Extract the file id from the supported Drive URL shapes
    pub fn file_id(url: &str) -> Option<String> {
        let candidates = ["/file/d/", "open?id=", "uc?id=", "uc?export=download&id="];
        for marker in candidates {
            if let Some(pos) = url.find(marker) {
                let rest = &url[pos + marker.len()..];
                let id: String = rest
                    .chars()
                    .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                    .collect();
                if !id.is_empty() {
                    return Some(id);
                }
            }
        }
        None
    }

    fn http_error(&self, status: StatusCode, reference: &str) -> SourceError {
        match status {
            StatusCode::NOT_FOUND => SourceError::NotFound {
                kind: SourceKind::GoogleDrive,
                reference: reference.to_string(),
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SourceError::AuthRequired {
                kind: SourceKind::GoogleDrive,
                detail: format!("HTTP {} (is the file shared by link?)", status),
            },
            _ => SourceError::DownloadFailed {
                kind: SourceKind::GoogleDrive,
                detail: format!("HTTP {}", status),
            },
        }
    }

    /// Pull the confirm token out of the virus-scan interstitial page
    fn confirm_token(html: &str) -> Option<String> {
        let pos = html.find("confirm=")?;
        let rest = &html[pos + "confirm=".len()..];
        let token: String = rest
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
            .collect();
        if token.is_empty() {
            None
        } else {
            Some(token)
        }
    }

    /// Derive a local filename from the Content-Disposition header, if present
    fn filename_from_headers(response: &reqwest::Response) -> Option<String> {
        let value = response
            .headers()
            .get("content-disposition")?
            .to_str()
            .ok()?;
        let pos = value.find("filename=\"")?;
        let rest = &value[pos + "filename=\"".len()..];
        let name = rest.split('"').next()?;
        if name.is_empty() {
            None
        } else {
            Some(name.to_string())
        }
    }

    async fn download(
        &self,
        file_id: &str,
        dest_dir: &Path,
        reference: &str,
    ) -> Result<PathBuf, SourceError> {
        let url = format!("https://drive.google.com/uc?export=download&id={}", file_id);

        let mut response = self.client.get(&url).send().await.map_err(|e| {
            SourceError::DownloadFailed {
                kind: SourceKind::GoogleDrive,
                detail: e.to_string(),
            }
        })?;

        if !response.status().is_success() {
            return Err(self.http_error(response.status(), reference));
        }

        // An HTML answer means the interstitial page, not the file
        let is_html = response
            .headers()
            .get("content-type")
            .and_then(|ct| ct.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if is_html {
            let page = response.text().await.map_err(|e| SourceError::DownloadFailed {
                kind: SourceKind::GoogleDrive,
                detail: e.to_string(),
            })?;

            let token = Self::confirm_token(&page).ok_or_else(|| SourceError::AuthRequired {
                kind: SourceKind::GoogleDrive,
                detail: "file is not shared for anonymous download".to_string(),
            })?;

            let confirm_url = format!("{}&confirm={}", url, token);
            response = self.client.get(&confirm_url).send().await.map_err(|e| {
                SourceError::DownloadFailed {
                    kind: SourceKind::GoogleDrive,
                    detail: e.to_string(),
                }
            })?;

            if !response.status().is_success() {
                return Err(self.http_error(response.status(), reference));
            }
        }

        let filename = Self::filename_from_headers(&response)
            .map(|n| utils::sanitize_filename(&n))
            .unwrap_or_else(|| format!("gdrive_{}.bin", file_id));
        let target = dest_dir.join(filename);

        let mut file = fs_err::File::create(&target).map_err(|e| SourceError::DownloadFailed {
            kind: SourceKind::GoogleDrive,
            detail: e.to_string(),
        })?;

        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| SourceError::DownloadFailed {
                kind: SourceKind::GoogleDrive,
                detail: e.to_string(),
            })?;
            file.write_all(&chunk)
                .map_err(|e| SourceError::DownloadFailed {
                    kind: SourceKind::GoogleDrive,
                    detail: e.to_string(),
                })?;
        }

        Ok(target)
    }
}

#[async_trait]
impl MediaSource for GoogleDriveSource {
    fn kind(&self) -> SourceKind {
        SourceKind::GoogleDrive
    }

    fn matches(&self, reference: &str) -> bool {
        reference.contains("drive.google.com") && Self::file_id(reference).is_some()
    }

    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, SourceError> {
        if !self.matches(reference) {
            return Err(SourceError::InvalidReference {
                kind: self.kind(),
                reference: reference.to_string(),
            });
        }

        let file_id = Self::file_id(reference).ok_or_else(|| SourceError::InvalidReference {
            kind: self.kind(),
            reference: reference.to_string(),
        })?;

        tracing::info!("Downloading from Google Drive: {}", file_id);
        self.download(&file_id, dest_dir, reference).await
    }
}

impl Default for GoogleDriveSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_file_id() {
        assert_eq!(
            GoogleDriveSource::file_id("https://drive.google.com/file/d/1AbCdEfGh/view?usp=sharing"),
            Some("1AbCdEfGh".to_string())
        );
        assert_eq!(
            GoogleDriveSource::file_id("https://drive.google.com/open?id=XyZ_987"),
            Some("XyZ_987".to_string())
        );
        assert_eq!(GoogleDriveSource::file_id("https://drive.google.com/drive/my-drive"), None);
    }

    #[test]
    fn parses_confirm_token() {
        let html = r#"<a href="/uc?export=download&amp;confirm=AbC123&amp;id=X">Download anyway</a>"#;
        assert_eq!(
            GoogleDriveSource::confirm_token(html),
            Some("AbC123".to_string())
        );
        assert_eq!(GoogleDriveSource::confirm_token("<html></html>"), None);
    }

    #[test]
    fn matches_drive_file_urls() {
        let source = GoogleDriveSource::new();
        assert!(source.matches("https://drive.google.com/file/d/1AbCdEfGh/view"));
        assert!(source.matches("https://drive.google.com/open?id=1AbCdEfGh"));
        assert!(!source.matches("https://docs.example.com/file/d/1AbCdEfGh"));
    }

    #[tokio::test]
    async fn rejects_foreign_reference() {
        let source = GoogleDriveSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .fetch("https://disk.yandex.ru/d/xyz", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidReference { .. }));
    }
}
