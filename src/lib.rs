//! Omniscribe - transcribe audio and video from many sources into text documents
//!
//! This library downloads media from YouTube, VK, Instagram, Yandex Disk,
//! Google Drive or the local filesystem, extracts audio, transcribes it with
//! the OpenAI Whisper API and optionally translates or summarizes the result
//! before exporting it as TXT and/or DOCX.

pub mod cli;
pub mod config;
pub mod export;
pub mod media;
pub mod pipeline;
pub mod postprocess;
pub mod sources;
pub mod transcribe;
pub mod utils;

pub use cli::{Cli, Commands, ExportFormat};
pub use config::Config;
pub use pipeline::{Job, JobOutcome, Pipeline};
pub use sources::{SourceError, SourceKind};
pub use transcribe::{Transcript, TranscriptChunk};

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error kinds a job can fail with, each naming the step that caused it
#[derive(thiserror::Error, Debug)]
pub enum ScribeError {
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[from] sources::SourceError),

    #[error("unsupported media format: {0}")]
    UnsupportedFormat(String),

    #[error("transcription API error: {0}")]
    TranscriptionApi(String),

    #[error("export failed: {0}")]
    Export(String),
}
