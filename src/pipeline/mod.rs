//! Job orchestration: download, normalize, chunk, transcribe, translate,
//! summarize, export — strictly in sequence, one job per invocation.
//!
//! Final artifacts are only written after every preceding step has succeeded,
//! so a failed job leaves nothing behind in the output directory.

use anyhow::Context;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::cli::{ExportFormat, TargetLanguage};
use crate::config::Config;
use crate::media::{self, MediaFile};
use crate::postprocess::ChatClient;
use crate::sources::{SourceKind, SourceRegistry};
use crate::transcribe::{self, Transcript, WhisperClient};
use crate::{export, utils, Result, ScribeError};

/// One user-initiated transcription request, from submission to export
#[derive(Debug, Clone)]
pub struct Job {
    /// Declared source platform; auto-detected from the reference when None
    pub source: Option<SourceKind>,
    pub reference: String,
    pub target_language: TargetLanguage,
    pub format: ExportFormat,
    pub summarize: bool,
    pub keep_audio: bool,
    pub output_dir: PathBuf,
}

/// What a finished job produced
#[derive(Debug)]
pub struct JobOutcome {
    pub transcript: Transcript,
    pub translated: Option<String>,
    pub summary: Option<String>,
    pub exported: Vec<PathBuf>,
    pub kept_audio: Option<PathBuf>,
}

pub struct Pipeline {
    config: Config,
    registry: SourceRegistry,
    scratch: TempDir,
    quiet: bool,
}

impl Pipeline {
    pub fn new(config: Config, quiet: bool) -> Result<Self> {
        let scratch = match &config.app.temp_dir {
            Some(dir) => {
                fs_err::create_dir_all(dir)?;
                TempDir::new_in(dir)
            }
            None => TempDir::new(),
        }
        .context("failed to create scratch directory")?;

        Ok(Self {
            config,
            registry: SourceRegistry::new(),
            scratch,
            quiet,
        })
    }

    /// Run one job end to end
    pub async fn run(&self, job: &Job) -> Result<JobOutcome> {
        let kind = self.resolve_source(job)?;
        tracing::info!("Source: {} ({})", kind, job.reference);

        // 1. Acquire media
        let adapter = self.registry.adapter(kind);
        let media_path = adapter
            .fetch(&job.reference, self.scratch.path())
            .await
            .map_err(ScribeError::SourceUnavailable)?;

        // 2. Probe and normalize
        let media = self.prepare_audio(&media_path).await?;
        self.report_media(&media);

        // 3. Transcribe chunk by chunk
        let whisper = WhisperClient::new(&self.config)?;
        let transcript = transcribe::transcribe_file(
            &whisper,
            &media,
            &self.config,
            self.scratch.path(),
            self.quiet,
        )
        .await?;
        tracing::info!("Detected source language: {}", transcript.language);

        // The media file is owned by this job and not needed past this point
        let kept_audio_source = if job.keep_audio {
            Some(media.path.clone())
        } else {
            fs_err::remove_file(&media.path).ok();
            if media.path != media_path {
                fs_err::remove_file(&media_path).ok();
            }
            None
        };

        // 4. Translate when the detected language differs from the target
        let translated = if transcript.language != job.target_language.code() {
            let chat = ChatClient::new(&self.config)?;
            Some(chat.translate(&transcript.text, job.target_language).await?)
        } else {
            tracing::info!(
                "Source language matches target ({}); skipping translation",
                job.target_language.name()
            );
            None
        };

        // 5. Summarize the delivered text
        let summary = if job.summarize {
            let chat = ChatClient::new(&self.config)?;
            let basis = translated.as_deref().unwrap_or(&transcript.text);
            Some(chat.summarize(basis, job.target_language).await?)
        } else {
            None
        };

        // 6. Export — the only step that touches the output directory
        let job_name = media_stem(&media_path);
        let job_dir = job.output_dir.join(&job_name);
        fs_err::create_dir_all(&job_dir)
            .map_err(|e| ScribeError::Export(format!("{}: {}", job_dir.display(), e)))?;

        let mut exported = Vec::new();
        self.export_text(
            &transcript.text,
            &job_dir,
            &format!("Original_{}", job_name),
            job.format,
            false,
            &mut exported,
        )?;

        if let Some(text) = &translated {
            self.export_text(
                text,
                &job_dir,
                &format!("{}_{}", job.target_language.name(), job_name),
                job.format,
                false,
                &mut exported,
            )?;
        }

        // the summary is markdown and gets rendered formatting in DOCX
        if let Some(text) = &summary {
            self.export_text(
                text,
                &job_dir,
                &format!("Summary_{}", job_name),
                job.format,
                true,
                &mut exported,
            )?;
        }

        let kept_audio = match kept_audio_source {
            Some(source) => {
                let target = job_dir.join(
                    source
                        .file_name()
                        .and_then(|n| n.to_str())
                        .unwrap_or("audio.mp3"),
                );
                fs_err::copy(&source, &target)
                    .map_err(|e| ScribeError::Export(format!("{}: {}", target.display(), e)))?;
                Some(target)
            }
            None => None,
        };

        Ok(JobOutcome {
            transcript,
            translated,
            summary,
            exported,
            kept_audio,
        })
    }

    fn resolve_source(&self, job: &Job) -> Result<SourceKind> {
        match job.source {
            Some(kind) => Ok(kind),
            None => self.registry.detect(&job.reference).ok_or_else(|| {
                anyhow::anyhow!(
                    "Could not detect the source platform for '{}'; pass --source explicitly",
                    job.reference
                )
            }),
        }
    }

    /// Probe the downloaded file, converting to MP3 first when needed
    async fn prepare_audio(&self, media_path: &Path) -> Result<MediaFile> {
        if media::is_api_ready(media_path) {
            return media::probe(media_path).await;
        }

        let normalized = self.scratch.path().join(format!(
            "normalized_{}.mp3",
            &uuid::Uuid::new_v4().to_string()[..8]
        ));
        media::normalize_to_mp3(media_path, &normalized).await?;
        media::probe(&normalized).await
    }

    fn report_media(&self, media: &MediaFile) {
        tracing::info!(
            "Media: {:.2} min, {}",
            media.duration_secs / 60.0,
            utils::format_file_size(media.size_bytes)
        );
        if let (Some(rate), Some(channels)) = (media.sample_rate, media.channels) {
            tracing::info!("Audio: {} Hz, {} channel(s)", rate, channels);
        }
    }

    fn export_text(
        &self,
        text: &str,
        dir: &Path,
        stem: &str,
        format: ExportFormat,
        markdown: bool,
        exported: &mut Vec<PathBuf>,
    ) -> Result<()> {
        if format.wants_txt() {
            let path = dir.join(format!("{}.txt", stem));
            export::write_txt(text, &path)?;
            exported.push(path);
        }
        if format.wants_docx() {
            let path = dir.join(format!("{}.docx", stem));
            if markdown {
                export::write_docx_markdown(text, &path)?;
            } else {
                export::write_docx(text, &path)?;
            }
            exported.push(path);
        }
        Ok(())
    }
}

/// Sanitized file stem of the downloaded media, used to name the job's output
fn media_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(utils::sanitize_filename)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "transcript".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_stem_sanitizes() {
        assert_eq!(media_stem(Path::new("/tmp/youtube_abc123.mp3")), "youtube_abc123");
        assert_eq!(media_stem(Path::new("/tmp/my talk?.mp3")), "my talk_");
    }
}
