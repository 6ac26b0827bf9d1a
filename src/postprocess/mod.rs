//! Optional transcript post-processing: translation and summarization.
//!
//! Both run against the chat completions endpoint. Summarization is a
//! two-stage flow: the transcript is first sectioned into `## `-headed
//! markdown, then each section is condensed separately.

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::cli::TargetLanguage;
use crate::config::Config;
use crate::{Result, ScribeError};

/// Inputs above this size are sectioned in pieces instead of one call
const SECTIONING_THRESHOLD_CHARS: usize = 48_000;
const SPLIT_CHUNK_CHARS: usize = 30_000;
const SPLIT_OVERLAP_CHARS: usize = 1_000;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// Thin client for the `/chat/completions` endpoint
pub struct ChatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.openai.base_url.clone(),
            api_key,
            model: config.openai.chat_model.clone(),
        })
    }

    async fn complete(&self, system: &str, user: &str, temperature: f32) -> Result<String> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user.to_string(),
                },
            ],
            temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
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

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ScribeError::TranscriptionApi(format!("unparseable response: {}", e)))?;

        let content = parsed
            .choices
            .first()
            .map(|c| c.message.content.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or_else(|| ScribeError::TranscriptionApi("empty chat completion".to_string()))?;

        Ok(content)
    }

    /// Translate a transcript into the target language
    pub async fn translate(&self, text: &str, target: TargetLanguage) -> Result<String> {
        tracing::info!("Translating transcript to {}", target.name());

        let system = format!(
            "You are a professional translator. Translate the text into {}. \
             Preserve structure and meaning. Do not add anything of your own.",
            target.name()
        );
        let user = format!("Translate into {}:\n{}", target.name(), text);

        self.complete(&system, &user, 0.1).await
    }

    /// Produce a condensed summary of the transcript in the target language
    pub async fn summarize(&self, text: &str, target: TargetLanguage) -> Result<String> {
        tracing::info!("Summarizing transcript in {}", target.name());

        let pin = language_pin(target);

        // Stage one: section the raw transcript into markdown
        let section_system = format!(
            "You are an expert editor. Recognize the thematic sections in the \
             given text and split it into those sections, keeping all of the \
             text. {}",
            pin
        );
        let section_user = format!(
            "Think about which sections you can recognize and what title fits \
             each one, then rewrite the whole text as sections in the form:\n\
             ## Section title\nfollowed by all text belonging to that section. \
             {} Text:",
            pin
        );

        let sectioned = if text.chars().count() < SECTIONING_THRESHOLD_CHARS {
            self.complete(&section_system, &format!("{}\n{}", section_user, text), 0.3)
                .await?
        } else {
            let mut parts = Vec::new();
            for piece in split_text(text, SPLIT_CHUNK_CHARS, SPLIT_OVERLAP_CHARS) {
                let answer = self
                    .complete(&section_system, &format!("{}\n{}", section_user, piece), 0.3)
                    .await?;
                parts.push(answer);
            }
            parts.join("\n\n")
        };

        // Stage two: condense each section separately
        let condense_system = format!(
            "You are an expert copywriter. You receive one section of raw text \
             on a specific topic. Extract only the essential information, \
             keeping necessary details but removing filler. VERY IMPORTANT: {} \
             Write ALL text only in {}.",
            pin,
            target.name()
        );
        let condense_user = format!(
            "From this text, extract only the key information for the section's \
             topic. Do not invent anything. Answer in the form:\n## Section \
             title\nfollowed by the distilled content, using markdown for \
             emphasis (**bold** for key facts, *italics* for definitions, \
             lists for enumerations). {} Text:",
            pin
        );

        let mut summary = String::new();
        for section in split_markdown_sections(&sectioned) {
            let answer = self
                .complete(&condense_system, &format!("{}\n{}", condense_user, section), 0.3)
                .await?;
            summary.push_str(&answer);
            summary.push_str("\n\n");
        }

        Ok(summary.trim_end().to_string())
    }
}

/// Strict per-language instruction keeping the model from drifting languages
fn language_pin(target: TargetLanguage) -> &'static str {
    match target {
        TargetLanguage::Russian => {
            "ВЕСЬ ТЕКСТ ДОЛЖЕН БЫТЬ НАПИСАН ТОЛЬКО НА РУССКОМ ЯЗЫКЕ. \
             Заголовки, содержание, разделы - всё только на русском языке."
        }
        TargetLanguage::Kazakh => {
            "БАРЛЫҚ МӘТІНДІ ТЕК ҚАЗАҚ ТІЛІНДЕ ЖАЗУ КЕРЕК. \
             Тақырыптар, мәтін мазмұны, бөлімдер - бәрі қазақ тілінде болуы керек."
        }
        TargetLanguage::English => {
            "ALL TEXT MUST BE WRITTEN ONLY IN ENGLISH. \
             Headings, content, sections - everything must be in English."
        }
    }
}

/// Split text into word-aligned pieces of at most `chunk_chars` characters,
/// carrying roughly `overlap_chars` of trailing context into the next piece.
pub fn split_text(text: &str, chunk_chars: usize, overlap_chars: usize) -> Vec<String> {
    assert!(chunk_chars > overlap_chars, "overlap must be smaller than chunk");

    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }

    let mut pieces = Vec::new();
    let mut current = String::new();

    for word in &words {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > chunk_chars {
            let overlap = tail_chars(&current, overlap_chars);
            pieces.push(std::mem::take(&mut current));
            current = overlap;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Word-aligned tail of roughly `chars` characters
fn tail_chars(text: &str, chars: usize) -> String {
    if chars == 0 {
        return String::new();
    }
    let mut tail: Vec<&str> = Vec::new();
    let mut total = 0;
    for word in text.split_whitespace().rev() {
        total += word.chars().count() + 1;
        if total > chars {
            break;
        }
        tail.push(word);
    }
    tail.reverse();
    tail.join(" ")
}

/// Split sectioned markdown into its `## `-headed sections.
///
/// Text before the first heading becomes its own piece so nothing is lost.
pub fn split_markdown_sections(markdown: &str) -> Vec<String> {
    let mut sections: Vec<String> = Vec::new();
    let mut current = String::new();

    for line in markdown.lines() {
        if line.starts_with("## ") && !current.trim().is_empty() {
            sections.push(current.trim().to_string());
            current = String::new();
        }
        current.push_str(line);
        current.push('\n');
    }

    if !current.trim().is_empty() {
        sections.push(current.trim().to_string());
    }

    if sections.is_empty() && !markdown.trim().is_empty() {
        sections.push(markdown.trim().to_string());
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_chunk_size() {
        let text = "word ".repeat(1000);
        let pieces = split_text(&text, 500, 50);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(piece.chars().count() <= 500);
        }
    }

    #[test]
    fn split_carries_overlap() {
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let pieces = split_text(text, 25, 10);
        assert!(pieces.len() > 1);
        // the start of each subsequent piece repeats the tail of the previous
        for window in pieces.windows(2) {
            let first_word = window[1].split_whitespace().next().unwrap();
            assert!(window[0].contains(first_word));
        }
    }

    #[test]
    fn split_preserves_all_words() {
        let text = "one two three four five six seven eight nine ten";
        let pieces = split_text(text, 20, 5);
        let joined = pieces.join(" ");
        for word in text.split_whitespace() {
            assert!(joined.contains(word));
        }
    }

    #[test]
    fn empty_text_has_no_pieces() {
        assert!(split_text("", 100, 10).is_empty());
        assert!(split_text("   ", 100, 10).is_empty());
    }

    #[test]
    fn markdown_splits_on_second_level_headings() {
        let md = "## Intro\nhello\n\n## Body\nworld\n\n## End\nbye";
        let sections = split_markdown_sections(md);
        assert_eq!(sections.len(), 3);
        assert!(sections[0].starts_with("## Intro"));
        assert!(sections[2].contains("bye"));
    }

    #[test]
    fn preamble_before_first_heading_is_kept() {
        let md = "preamble text\n## One\nbody";
        let sections = split_markdown_sections(md);
        assert_eq!(sections.len(), 2);
        assert_eq!(sections[0], "preamble text");
    }

    #[test]
    fn headingless_text_is_one_section() {
        let sections = split_markdown_sections("just a plain paragraph");
        assert_eq!(sections.len(), 1);
    }
}
