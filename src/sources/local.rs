use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::{MediaSource, SourceError, SourceKind};
use crate::utils;

/// Local filesystem source.
///
/// Copies the file into the job's scratch directory so downstream steps can
/// treat every source uniformly and delete the working copy without touching
/// the user's original.
pub struct LocalFileSource;

impl LocalFileSource {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MediaSource for LocalFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Local
    }

    fn matches(&self, reference: &str) -> bool {
        !reference.starts_with("http://") && !reference.starts_with("https://")
    }

    async fn fetch(&self, reference: &str, dest_dir: &Path) -> Result<PathBuf, SourceError> {
        if !self.matches(reference) {
            return Err(SourceError::InvalidReference {
                kind: self.kind(),
                reference: reference.to_string(),
            });
        }

        let path = Path::new(reference);

        if !path.exists() {
            return Err(SourceError::NotFound {
                kind: self.kind(),
                reference: reference.to_string(),
            });
        }

        if !path.is_file() {
            return Err(SourceError::InvalidReference {
                kind: self.kind(),
                reference: reference.to_string(),
            });
        }

        let metadata = fs_err::metadata(path).map_err(|e| SourceError::DownloadFailed {
            kind: self.kind(),
            detail: e.to_string(),
        })?;
        if metadata.len() == 0 {
            return Err(SourceError::DownloadFailed {
                kind: self.kind(),
                detail: format!("file is empty: {}", path.display()),
            });
        }

        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(utils::sanitize_filename)
            .unwrap_or_else(|| "local_media".to_string());
        let target = dest_dir.join(filename);

        fs_err::copy(path, &target).map_err(|e| SourceError::DownloadFailed {
            kind: self.kind(),
            detail: e.to_string(),
        })?;

        Ok(target)
    }
}

impl Default for LocalFileSource {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let source = LocalFileSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .fetch("/definitely/not/here.mp3", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::NotFound { .. }));
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let source = LocalFileSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let input = tmp.path().join("empty.mp3");
        fs_err::File::create(&input).unwrap();

        let err = source
            .fetch(input.to_str().unwrap(), tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::DownloadFailed { .. }));
    }

    #[tokio::test]
    async fn copies_into_destination() {
        let source = LocalFileSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let dest = tempfile::tempdir().unwrap();

        let input = tmp.path().join("talk.mp3");
        let mut f = fs_err::File::create(&input).unwrap();
        f.write_all(b"not really audio").unwrap();

        let fetched = source
            .fetch(input.to_str().unwrap(), dest.path())
            .await
            .unwrap();
        assert!(fetched.starts_with(dest.path()));
        assert_eq!(fs_err::read(&fetched).unwrap(), b"not really audio");
        // the original stays in place
        assert!(input.exists());
    }

    #[tokio::test]
    async fn url_is_rejected() {
        let source = LocalFileSource::new();
        let tmp = tempfile::tempdir().unwrap();
        let err = source
            .fetch("https://example.com/a.mp3", tmp.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::InvalidReference { .. }));
    }
}
