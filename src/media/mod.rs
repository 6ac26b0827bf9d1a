//! Media probing, audio normalization and the chunking policy.
//!
//! All heavy lifting is delegated to ffprobe/ffmpeg; this module owns the
//! chunk plan that lets long recordings pass the transcription API's size
//! bound and be reassembled in order.

use anyhow::Context;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::{Result, ScribeError};

/// A downloaded media file and what ffprobe knows about it
#[derive(Debug, Clone)]
pub struct MediaFile {
    pub path: PathBuf,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub sample_rate: Option<u32>,
    pub channels: Option<u32>,
}

/// One planned slice of the audio, identified by its order index
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPlan {
    /// Zero-based position; transcripts are reassembled by ascending index
    pub index: usize,
    pub start_secs: f64,
    pub length_secs: f64,
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

/// Probe a media file with ffprobe, requiring at least one audio stream
pub async fn probe(path: &Path) -> Result<MediaFile> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
            &path.to_string_lossy(),
        ])
        .output()
        .await
        .context("failed to run ffprobe")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScribeError::UnsupportedFormat(format!(
            "ffprobe could not analyze {}: {}",
            path.display(),
            stderr.trim()
        ))
        .into());
    }

    let parsed: FfprobeOutput =
        serde_json::from_slice(&output.stdout).context("unparseable ffprobe output")?;

    let audio = parsed
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("audio"))
        .ok_or_else(|| {
            ScribeError::UnsupportedFormat(format!("no audio stream in {}", path.display()))
        })?;

    let duration_secs = parsed
        .format
        .and_then(|f| f.duration)
        .and_then(|d| d.parse::<f64>().ok())
        .ok_or_else(|| {
            ScribeError::UnsupportedFormat(format!("unknown duration for {}", path.display()))
        })?;

    if duration_secs <= 0.0 {
        return Err(ScribeError::UnsupportedFormat(format!(
            "zero-length media: {}",
            path.display()
        ))
        .into());
    }

    let size_bytes = fs_err::metadata(path)?.len();

    Ok(MediaFile {
        path: path.to_path_buf(),
        duration_secs,
        size_bytes,
        sample_rate: audio.sample_rate.as_ref().and_then(|s| s.parse().ok()),
        channels: audio.channels,
    })
}

/// Convert/extract audio to MP3 suitable for the transcription API
pub async fn normalize_to_mp3(source: &Path, target: &Path) -> Result<()> {
    tracing::debug!("Converting {} to MP3", source.display());

    let output = Command::new("ffmpeg")
        .args([
            "-i",
            &source.to_string_lossy(),
            "-vn",
            "-acodec",
            "mp3",
            "-ab",
            "128k",
            "-ar",
            "44100",
            "-y",
            &target.to_string_lossy(),
        ])
        .output()
        .await
        .context("failed to run ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScribeError::UnsupportedFormat(format!(
            "ffmpeg could not convert {}: {}",
            source.display(),
            last_lines(&stderr, 3)
        ))
        .into());
    }

    Ok(())
}

/// Whether the file can be uploaded as-is without re-encoding
pub fn is_api_ready(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()).as_deref(),
        Some("mp3") | Some("m4a") | Some("wav") | Some("flac") | Some("ogg") | Some("webm")
    )
}

/// Plan sequential, contiguous, non-overlapping chunks of at most
/// `max_chunk_secs` each.
///
/// Produces exactly ceil(duration / max) chunks; the last one carries the
/// remainder. Indexes are assigned in time order so the transcript can be
/// reassembled by ascending index whatever order the chunks complete in.
pub fn plan_chunks(duration_secs: f64, max_chunk_secs: f64) -> Vec<ChunkPlan> {
    assert!(max_chunk_secs > 0.0, "chunk duration must be positive");

    let mut plans = Vec::new();
    let mut start = 0.0_f64;
    let mut index = 0;

    while start < duration_secs {
        let length = (duration_secs - start).min(max_chunk_secs);
        plans.push(ChunkPlan {
            index,
            start_secs: start,
            length_secs: length,
        });
        start += length;
        index += 1;
    }

    plans
}

/// Cut one planned chunk out of `source` into its own MP3 file
pub async fn cut_chunk(source: &Path, plan: &ChunkPlan, dest_dir: &Path) -> Result<PathBuf> {
    let target = dest_dir.join(format!("chunk_{:04}.mp3", plan.index));

    let output = Command::new("ffmpeg")
        .args([
            "-ss",
            &format!("{:.3}", plan.start_secs),
            "-t",
            &format!("{:.3}", plan.length_secs),
            "-i",
            &source.to_string_lossy(),
            "-acodec",
            "mp3",
            "-ab",
            "128k",
            "-y",
            &target.to_string_lossy(),
        ])
        .output()
        .await
        .context("failed to run ffmpeg")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScribeError::UnsupportedFormat(format!(
            "ffmpeg could not cut chunk {}: {}",
            plan.index,
            last_lines(&stderr, 3)
        ))
        .into());
    }

    Ok(target)
}

fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_count_is_ceiling() {
        // 150s at 60s max -> [60, 60, 30]
        let plans = plan_chunks(150.0, 60.0);
        assert_eq!(plans.len(), 3);
        assert_eq!(plans[0].length_secs, 60.0);
        assert_eq!(plans[1].length_secs, 60.0);
        assert_eq!(plans[2].length_secs, 30.0);
    }

    #[test]
    fn exact_multiple_has_no_empty_tail() {
        let plans = plan_chunks(120.0, 60.0);
        assert_eq!(plans.len(), 2);
        assert_eq!(plans[1].length_secs, 60.0);
    }

    #[test]
    fn short_input_is_one_chunk() {
        let plans = plan_chunks(42.0, 600.0);
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].start_secs, 0.0);
        assert_eq!(plans[0].length_secs, 42.0);
    }

    #[test]
    fn chunks_are_contiguous_ordered_and_non_overlapping() {
        let plans = plan_chunks(1234.5, 600.0);
        for (i, plan) in plans.iter().enumerate() {
            assert_eq!(plan.index, i);
        }
        for window in plans.windows(2) {
            let end = window[0].start_secs + window[0].length_secs;
            assert!((end - window[1].start_secs).abs() < 1e-9);
        }
        let total: f64 = plans.iter().map(|p| p.length_secs).sum();
        assert!((total - 1234.5).abs() < 1e-9);
    }

    #[test]
    fn api_ready_extensions() {
        assert!(is_api_ready(Path::new("a.mp3")));
        assert!(is_api_ready(Path::new("a.WAV")));
        assert!(!is_api_ready(Path::new("a.mkv")));
        assert!(!is_api_ready(Path::new("noext")));
    }
}
