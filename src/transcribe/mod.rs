//! Speech-to-text over the OpenAI Whisper API.
//!
//! Long recordings are transcribed chunk by chunk; chunk transcripts carry an
//! order index and the final text is assembled by ascending index. Any chunk
//! failure fails the whole job.

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::multipart;
use serde::Deserialize;
use std::path::Path;

use crate::config::Config;
use crate::media::{self, ChunkPlan, MediaFile};
use crate::{Result, ScribeError};

/// Chunks shorter than this are never shrunk further; at that point an
/// oversized file is a hard error rather than a retry candidate.
const MIN_CHUNK_SECS: f64 = 30.0;

/// One transcribed slice of the audio
#[derive(Debug, Clone)]
pub struct TranscriptChunk {
    pub index: usize,
    pub start_secs: f64,
    pub text: String,
}

/// The assembled transcript and its detected source language (ISO 639-1)
#[derive(Debug, Clone)]
pub struct Transcript {
    pub text: String,
    pub language: String,
}

#[derive(Debug, Deserialize)]
struct WhisperResponse {
    text: String,
    language: Option<String>,
}

/// Thin client for the `/audio/transcriptions` endpoint
pub struct WhisperClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl WhisperClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(600))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.openai.base_url.clone(),
            api_key,
            model: config.openai.whisper_model.clone(),
        })
    }

    /// Transcribe one audio file (a single chunk)
    async fn transcribe_chunk(&self, path: &Path) -> Result<WhisperResponse> {
        let bytes = fs_err::read(path)?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.mp3")
            .to_string();

        let part = multipart::Part::bytes(bytes)
            .file_name(filename)
            .mime_str("audio/mpeg")
            .context("invalid mime type")?;

        let form = multipart::Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        let response = self
            .client
            .post(format!("{}/audio/transcriptions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await
            .map_err(|e| ScribeError::TranscriptionApi(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(
                ScribeError::TranscriptionApi(format!("HTTP {}: {}", status, body)).into(),
            );
        }

        let parsed: WhisperResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::TranscriptionApi(format!("unparseable response: {}", e)))?;

        Ok(parsed)
    }
}

/// Transcribe a whole media file chunk by chunk.
///
/// Chunks are cut on the fly: when a cut file exceeds the configured byte
/// ceiling, the remaining chunk duration shrinks by 20% and the same offset is
/// retried, so every upload stays under the API bound without losing audio.
pub async fn transcribe_file(
    client: &WhisperClient,
    media: &MediaFile,
    config: &Config,
    scratch_dir: &Path,
    quiet: bool,
) -> Result<Transcript> {
    let mut max_chunk_secs = config.chunking.max_chunk_secs;
    let expected = projected_total(0, media.duration_secs, max_chunk_secs);

    let progress = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(expected)
    };
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut chunks: Vec<TranscriptChunk> = Vec::new();
    let mut detected_language: Option<String> = None;
    let mut start_secs = 0.0_f64;
    let mut index = 0usize;

    while start_secs < media.duration_secs {
        let plan = ChunkPlan {
            index,
            start_secs,
            length_secs: (media.duration_secs - start_secs).min(max_chunk_secs),
        };

        let chunk_path = media::cut_chunk(&media.path, &plan, scratch_dir).await?;
        let chunk_size = fs_err::metadata(&chunk_path)?.len();

        if chunk_size > config.chunking.max_chunk_bytes {
            fs_err::remove_file(&chunk_path)?;
            if plan.length_secs <= MIN_CHUNK_SECS {
                return Err(ScribeError::TranscriptionApi(format!(
                    "chunk {} exceeds the upload limit even at {}s",
                    plan.index, plan.length_secs
                ))
                .into());
            }
            max_chunk_secs *= 0.8;
            tracing::warn!(
                "Chunk {} over the upload limit; shrinking chunk duration to {:.0}s",
                plan.index,
                max_chunk_secs
            );
            // shrinking raises the chunk count, so the bar length moves too
            progress.set_length(projected_total(
                index,
                media.duration_secs - start_secs,
                max_chunk_secs,
            ));
            continue;
        }

        tracing::info!(
            "Transcribing chunk {} ({:.0}s..{:.0}s)",
            plan.index,
            plan.start_secs,
            plan.start_secs + plan.length_secs
        );
        progress.set_message(format!("chunk {}", plan.index));

        let response = client.transcribe_chunk(&chunk_path).await?;
        fs_err::remove_file(&chunk_path)?;

        if detected_language.is_none() {
            detected_language = response
                .language
                .as_deref()
                .filter(|l| !l.is_empty() && *l != "unknown")
                .map(normalize_language);
        }

        chunks.push(TranscriptChunk {
            index: plan.index,
            start_secs: plan.start_secs,
            text: response.text,
        });

        start_secs += plan.length_secs;
        index += 1;
        progress.inc(1);
    }

    progress.finish_with_message("transcription complete");

    let text = assemble(&mut chunks);
    let language = detected_language.unwrap_or_else(|| detect_language(&text));

    Ok(Transcript { text, language })
}

/// How many chunks the whole job needs: those already done plus a plan for
/// what is left at the current chunk duration
fn projected_total(done: usize, remaining_secs: f64, max_chunk_secs: f64) -> u64 {
    (done + media::plan_chunks(remaining_secs, max_chunk_secs).len()) as u64
}

/// Concatenate chunk texts in ascending index order
pub fn assemble(chunks: &mut [TranscriptChunk]) -> String {
    chunks.sort_by_key(|c| c.index);
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Detect the ISO 639-1 language code of a text, "unknown" when undecidable.
///
/// Used as the fallback when the API response carries no language field.
pub fn detect_language(text: &str) -> String {
    let sample: String = text.chars().take(1000).collect();
    if sample.trim().is_empty() {
        return "unknown".to_string();
    }

    // whatlang has no Kazakh model; the Kazakh-specific Cyrillic letters
    // are decisive on their own
    if sample.chars().any(|c| "әғқңөұүһӘҒҚҢӨҰҮҺ".contains(c)) {
        return "kk".to_string();
    }

    match whatlang::detect_lang(&sample) {
        Some(lang) => iso639_1(lang).to_string(),
        None => "unknown".to_string(),
    }
}

/// Whisper reports full language names ("russian"); fold them to 639-1 codes
fn normalize_language(lang: &str) -> String {
    match lang.to_lowercase().as_str() {
        "russian" => "ru",
        "english" => "en",
        "kazakh" => "kk",
        "korean" => "ko",
        "japanese" => "ja",
        "chinese" => "zh",
        "spanish" => "es",
        "french" => "fr",
        "german" => "de",
        "italian" => "it",
        "portuguese" => "pt",
        "ukrainian" => "uk",
        other => return other.to_string(),
    }
    .to_string()
}

fn iso639_1(lang: whatlang::Lang) -> &'static str {
    use whatlang::Lang;
    match lang {
        Lang::Rus => "ru",
        Lang::Eng => "en",
        Lang::Kor => "ko",
        Lang::Jpn => "ja",
        Lang::Cmn => "zh",
        Lang::Spa => "es",
        Lang::Fra => "fr",
        Lang::Deu => "de",
        Lang::Ita => "it",
        Lang::Por => "pt",
        Lang::Ukr => "uk",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(index: usize, text: &str) -> TranscriptChunk {
        TranscriptChunk {
            index,
            start_secs: index as f64 * 60.0,
            text: text.to_string(),
        }
    }

    #[test]
    fn assembles_by_index_regardless_of_completion_order() {
        let mut chunks = vec![chunk(2, "third"), chunk(0, "first"), chunk(1, "second")];
        assert_eq!(assemble(&mut chunks), "first\nsecond\nthird");
    }

    #[test]
    fn detects_common_languages() {
        assert_eq!(
            detect_language("Привет, это тестовая запись лекции по истории."),
            "ru"
        );
        assert_eq!(
            detect_language("Hello, this is a test recording of a history lecture."),
            "en"
        );
        assert_eq!(detect_language("   "), "unknown");
    }

    #[test]
    fn detects_kazakh_by_its_letters() {
        assert_eq!(
            detect_language("Сәлеметсіз бе, бұл қазақ тіліндегі дәріс жазбасы."),
            "kk"
        );
        // plain Russian Cyrillic must not trip the Kazakh letter check
        assert_eq!(detect_language("Это обычный русский текст без казахских букв."), "ru");
    }

    #[test]
    fn unmapped_languages_fall_back_to_unknown() {
        assert_eq!(detect_language("مرحبا، هذا تسجيل صوتي لمحاضرة في التاريخ."), "unknown");
    }

    #[test]
    fn shrinking_raises_the_projected_chunk_total() {
        // 150s at 60s gives 3 chunks up front
        assert_eq!(projected_total(0, 150.0, 60.0), 3);
        // one chunk done, then a shrink to 48s re-plans the remaining 90s
        assert_eq!(projected_total(1, 90.0, 48.0), 3);
        // a second shrink grows the total again instead of overrunning it
        assert_eq!(projected_total(1, 90.0, 38.4), 4);
    }

    #[test]
    fn normalizes_whisper_language_names() {
        assert_eq!(normalize_language("russian"), "ru");
        assert_eq!(normalize_language("English"), "en");
        assert_eq!(normalize_language("kk"), "kk");
    }
}
