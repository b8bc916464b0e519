use crate::srt::{self, SubtitleEntry};
use crate::{logi, logok};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedWord {
    pub case: String,
    pub start: f64,
    pub end: f64,
    pub word: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alignment {
    pub words: Vec<AlignedWord>,
    pub audio_duration: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlignMethod {
    Simple,
    Transcribed,
}

impl AlignMethod {
    fn file_stem_suffix(self) -> &'static str {
        match self {
            AlignMethod::Simple => "",
            AlignMethod::Transcribed => "_whisper",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AlignmentFiles {
    pub srt_path: PathBuf,
    pub json_path: PathBuf,
    pub method: AlignMethod,
}

pub async fn read_lyrics(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .await
        .with_context(|| format!("read lyrics: {}", path.display()))?;
    let lines: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if lines.is_empty() {
        anyhow::bail!("no lyrics found in {}", path.display());
    }
    logi(format!("Lyric lines: {}", lines.len()));
    Ok(lines)
}

pub fn simple_align(lines: &[String], audio_duration: f64) -> (Vec<SubtitleEntry>, Alignment) {
    let per_line = if lines.is_empty() {
        0.0
    } else {
        audio_duration / lines.len() as f64
    };

    let mut entries = Vec::with_capacity(lines.len());
    let mut words = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        let start = i as f64 * per_line;
        let end = (i + 1) as f64 * per_line;
        entries.push(SubtitleEntry {
            index: i as u32 + 1,
            start,
            end,
            text: line.clone(),
        });
        words.push(AlignedWord {
            case: "success".to_string(),
            start,
            end,
            word: line.clone(),
            confidence: None,
        });
    }

    (
        entries,
        Alignment {
            words,
            audio_duration,
        },
    )
}

pub fn align_to_segments(
    lines: &[String],
    segments: &[TranscriptSegment],
) -> (Vec<SubtitleEntry>, Alignment) {
    let mut entries = Vec::with_capacity(segments.len());
    let mut words = Vec::with_capacity(segments.len());

    for (i, seg) in segments.iter().enumerate() {
        let text = lines
            .get(i)
            .cloned()
            .unwrap_or_else(|| seg.text.trim().to_string());
        entries.push(SubtitleEntry {
            index: i as u32 + 1,
            start: seg.start,
            end: seg.end,
            text: text.clone(),
        });
        words.push(AlignedWord {
            case: "success".to_string(),
            start: seg.start,
            end: seg.end,
            word: text,
            confidence: Some(seg.confidence.unwrap_or(0.0)),
        });
    }

    let audio_duration = segments.last().map(|s| s.end).unwrap_or(0.0);
    (
        entries,
        Alignment {
            words,
            audio_duration,
        },
    )
}

pub async fn write_alignment(
    output_dir: &Path,
    audio_path: &Path,
    method: AlignMethod,
    entries: &[SubtitleEntry],
    alignment: &Alignment,
) -> Result<AlignmentFiles> {
    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create dir {}", output_dir.display()))?;

    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio".to_string());
    let suffix = method.file_stem_suffix();
    let srt_path = output_dir.join(format!("{stem}{suffix}_subtitles.srt"));
    let json_path = output_dir.join(format!("{stem}{suffix}_alignment.json"));

    srt::write_srt(&srt_path, entries).await?;
    let json = serde_json::to_string_pretty(alignment)?;
    fs::write(&json_path, json)
        .await
        .with_context(|| format!("write alignment: {}", json_path.display()))?;

    logok(format!("SRT: {}", srt_path.display()));
    logok(format!("JSON: {}", json_path.display()));
    Ok(AlignmentFiles {
        srt_path,
        json_path,
        method,
    })
}

pub async fn preview_subtitles(srt_path: &Path, count: usize) -> Result<()> {
    let entries = srt::read_srt(srt_path).await?;
    logi(format!("Subtitle preview (first {}):", count.min(entries.len())));
    for entry in entries.iter().take(count) {
        logi(format!(
            "{} | {} --> {} | {}",
            entry.index,
            srt::seconds_to_timestamp(entry.start),
            srt::seconds_to_timestamp(entry.end),
            entry.text
        ));
    }
    if entries.len() > count {
        logi(format!("... {} more entries", entries.len() - count));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn equal_division_covers_the_audio() {
        let lyrics = lines(&["a", "b", "c", "d", "e", "f"]);
        let (entries, alignment) = simple_align(&lyrics, 6.0);
        assert_eq!(entries.len(), 6);
        assert_eq!(entries[0].start, 0.0);
        assert_eq!(entries[0].end, 1.0);
        assert_eq!(entries[5].start, 5.0);
        assert_eq!(entries[5].end, 6.0);
        assert_eq!(entries[2].index, 3);
        assert_eq!(alignment.audio_duration, 6.0);
        assert!(alignment.words.iter().all(|w| w.case == "success"));
    }

    #[test]
    fn segments_take_lyric_text_when_available() {
        let lyrics = lines(&["Neon rivers in the night"]);
        let segments = vec![
            TranscriptSegment {
                start: 0.4,
                end: 2.1,
                text: " neon rivers ".to_string(),
                confidence: Some(0.9),
            },
            TranscriptSegment {
                start: 2.1,
                end: 4.8,
                text: " chasing stars ".to_string(),
                confidence: None,
            },
        ];
        let (entries, alignment) = align_to_segments(&lyrics, &segments);
        assert_eq!(entries[0].text, "Neon rivers in the night");
        assert_eq!(entries[1].text, "chasing stars");
        assert_eq!(entries[1].start, 2.1);
        assert_eq!(alignment.audio_duration, 4.8);
        assert_eq!(alignment.words[0].confidence, Some(0.9));
        assert_eq!(alignment.words[1].confidence, Some(0.0));
    }

    #[test]
    fn no_segments_means_zero_duration() {
        let (entries, alignment) = align_to_segments(&lines(&["x"]), &[]);
        assert!(entries.is_empty());
        assert_eq!(alignment.audio_duration, 0.0);
    }

    #[test]
    fn alignment_json_shape() {
        let (_, alignment) = simple_align(&lines(&["Hello"]), 2.0);
        let value = serde_json::to_value(&alignment).unwrap();
        assert_eq!(value["audio_duration"], 2.0);
        assert_eq!(value["words"][0]["case"], "success");
        assert_eq!(value["words"][0]["word"], "Hello");
        assert_eq!(value["words"][0]["end"], 2.0);
        assert!(value["words"][0].get("confidence").is_none());
    }

    #[tokio::test]
    async fn files_are_named_after_the_audio() {
        let dir = tempfile::TempDir::new().unwrap();
        let (entries, alignment) = simple_align(&lines(&["a", "b"]), 4.0);
        let files = write_alignment(
            dir.path(),
            Path::new("/music/song.wav"),
            AlignMethod::Simple,
            &entries,
            &alignment,
        )
        .await
        .unwrap();
        assert_eq!(files.srt_path, dir.path().join("song_subtitles.srt"));
        assert_eq!(files.json_path, dir.path().join("song_alignment.json"));

        let text = fs::read_to_string(&files.json_path).await.unwrap();
        let back: Alignment = serde_json::from_str(&text).unwrap();
        assert_eq!(back.words.len(), 2);
    }

    #[tokio::test]
    async fn transcribed_files_carry_suffix() {
        let dir = tempfile::TempDir::new().unwrap();
        let (entries, alignment) = align_to_segments(&[], &[]);
        let files = write_alignment(
            dir.path(),
            Path::new("song.wav"),
            AlignMethod::Transcribed,
            &entries,
            &alignment,
        )
        .await
        .unwrap();
        assert!(files.srt_path.ends_with("song_whisper_subtitles.srt"));
    }

    #[tokio::test]
    async fn blank_lyrics_file_is_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lyrics.txt");
        fs::write(&path, "  \n\n").await.unwrap();
        assert!(read_lyrics(&path).await.is_err());
    }
}
