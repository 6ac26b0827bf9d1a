use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::sources::SourceKind;

#[derive(Parser)]
#[command(
    name = "omniscribe",
    about = "Transcribe audio/video from YouTube, VK, Instagram, Yandex Disk, Google Drive or local files",
    version,
    long_about = "A CLI tool that downloads media from multiple platforms, transcribes the audio with the OpenAI Whisper API and optionally translates or summarizes the transcript before exporting it as TXT or DOCX."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable progress indicators
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe media from a URL or local file
    Transcribe {
        /// URL or file path to transcribe
        #[arg(value_name = "URL_OR_FILE")]
        reference: String,

        /// Source platform (auto-detected from the reference if not given)
        #[arg(short, long, value_enum)]
        source: Option<SourceKind>,

        /// Target language for the final transcript
        #[arg(short, long, value_enum, default_value = "russian")]
        language: TargetLanguage,

        /// Directory for exported files (default: ./transcriptions)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Export format
        #[arg(short, long, value_enum, default_value = "both")]
        format: ExportFormat,

        /// Also produce a condensed summary of the transcript
        #[arg(long)]
        summarize: bool,

        /// Keep the downloaded audio file instead of deleting it
        #[arg(long)]
        keep_audio: bool,
    },

    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },

    /// List supported source platforms
    Platforms,
}

/// Export formats for the final transcript
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// Plain UTF-8 text
    Txt,
    /// Word document with one paragraph per transcript paragraph
    Docx,
    /// Both TXT and DOCX
    Both,
}

impl ExportFormat {
    pub fn wants_txt(&self) -> bool {
        matches!(self, ExportFormat::Txt | ExportFormat::Both)
    }

    pub fn wants_docx(&self) -> bool {
        matches!(self, ExportFormat::Docx | ExportFormat::Both)
    }
}

/// Languages the final transcript can be delivered in
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TargetLanguage {
    Russian,
    Kazakh,
    English,
}

impl TargetLanguage {
    /// ISO 639-1 code, used to compare against the detected source language
    pub fn code(&self) -> &'static str {
        match self {
            TargetLanguage::Russian => "ru",
            TargetLanguage::Kazakh => "kk",
            TargetLanguage::English => "en",
        }
    }

    /// English name for prompts and file name prefixes
    pub fn name(&self) -> &'static str {
        match self {
            TargetLanguage::Russian => "Russian",
            TargetLanguage::Kazakh => "Kazakh",
            TargetLanguage::English => "English",
        }
    }
}

impl std::fmt::Display for TargetLanguage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExportFormat::Txt => write!(f, "txt"),
            ExportFormat::Docx => write!(f, "docx"),
            ExportFormat::Both => write!(f, "both"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_format_selection() {
        assert!(ExportFormat::Txt.wants_txt());
        assert!(!ExportFormat::Txt.wants_docx());
        assert!(ExportFormat::Docx.wants_docx());
        assert!(!ExportFormat::Docx.wants_txt());
        assert!(ExportFormat::Both.wants_txt());
        assert!(ExportFormat::Both.wants_docx());
    }

    #[test]
    fn target_language_codes() {
        assert_eq!(TargetLanguage::Russian.code(), "ru");
        assert_eq!(TargetLanguage::Kazakh.code(), "kk");
        assert_eq!(TargetLanguage::English.code(), "en");
    }
}
