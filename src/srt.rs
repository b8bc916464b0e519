use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleEntry {
    pub index: u32,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl fmt::Display for SubtitleEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\n{} --> {}\n{}\n",
            self.index,
            seconds_to_timestamp(self.start),
            seconds_to_timestamp(self.end),
            self.text
        )
    }
}

pub fn seconds_to_timestamp(seconds: f64) -> String {
    let total_ms = (seconds.max(0.0) * 1000.0).round() as u64;
    let ms = total_ms % 1000;
    let s = (total_ms / 1000) % 60;
    let m = (total_ms / 60_000) % 60;
    let h = total_ms / 3_600_000;
    format!("{:02}:{:02}:{:02},{:03}", h, m, s, ms)
}

pub fn timestamp_to_seconds(ts: &str) -> Option<f64> {
    let mut parts = ts.trim().split([':', ',', '.']);
    let hh: u64 = parts.next()?.parse().ok()?;
    let mm: u64 = parts.next()?.parse().ok()?;
    let ss: u64 = parts.next()?.parse().ok()?;
    let frac = parts.next()?;
    if frac.is_empty() || frac.len() > 3 || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    // ",5" is half a second, not five milliseconds.
    let ms: u64 = format!("{frac:0<3}").parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((hh * 3600 + mm * 60 + ss) as f64 + ms as f64 / 1000.0)
}

fn timing_regex() -> Result<&'static Regex> {
    static TIMING_RE: OnceCell<Regex> = OnceCell::new();
    TIMING_RE.get_or_try_init(|| {
        Regex::new(r"^\s*(\d+:\d{2}:\d{2}[,.]\d{1,3})\s*-->\s*(\d+:\d{2}:\d{2}[,.]\d{1,3})")
            .context("failed to compile srt timing regex")
    })
}

pub fn render(entries: &[SubtitleEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&entry.to_string());
        out.push('\n');
    }
    out
}

/// Parses SRT text. Blocks without a valid timing line are skipped; `<i>` tags dropped.
pub fn parse(input: &str) -> Result<Vec<SubtitleEntry>> {
    let re = timing_regex()?;
    let input = input.replace("\r\n", "\n").replace("<i>", "").replace("</i>", "");
    let mut entries = Vec::new();

    for block in input.split("\n\n") {
        let mut lines = block.lines().filter(|l| !l.trim().is_empty());
        let Some(first) = lines.next() else {
            continue;
        };
        let timing_line = if re.is_match(first) {
            first
        } else {
            match lines.next() {
                Some(l) => l,
                None => continue,
            }
        };
        let Some(cap) = re.captures(timing_line) else {
            continue;
        };
        let (Some(start), Some(end)) = (timestamp_to_seconds(&cap[1]), timestamp_to_seconds(&cap[2]))
        else {
            continue;
        };
        let text = lines.map(str::trim).collect::<Vec<_>>().join("\n");
        entries.push(SubtitleEntry {
            index: entries.len() as u32 + 1,
            start,
            end,
            text,
        });
    }

    Ok(entries)
}

pub async fn write_srt(path: &Path, entries: &[SubtitleEntry]) -> Result<()> {
    let mut out = fs::File::create(path)
        .await
        .with_context(|| format!("create srt output: {}", path.display()))?;
    out.write_all(render(entries).as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

pub async fn read_srt(path: &Path) -> Result<Vec<SubtitleEntry>> {
    let input = fs::read_to_string(path)
        .await
        .with_context(|| format!("read srt: {}", path.display()))?;
    parse(&input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_format_with_millis() {
        assert_eq!(seconds_to_timestamp(0.0), "00:00:00,000");
        assert_eq!(seconds_to_timestamp(1.5), "00:00:01,500");
        assert_eq!(seconds_to_timestamp(3723.25), "01:02:03,250");
    }

    #[test]
    fn timestamps_parse_back() {
        assert_eq!(timestamp_to_seconds("01:02:03,250"), Some(3723.25));
        assert_eq!(timestamp_to_seconds("00:00:04.000"), Some(4.0));
        assert_eq!(timestamp_to_seconds("garbage"), None);
        assert_eq!(timestamp_to_seconds("00:00:01,2345"), None);
    }

    #[test]
    fn short_fractions_are_tenths_and_hundredths() {
        assert_eq!(timestamp_to_seconds("00:00:01,5"), Some(1.5));
        assert_eq!(timestamp_to_seconds("00:00:02.25"), Some(2.25));
        let entries = parse("1\n00:00:01,5 --> 00:00:02.25\nHello\n").unwrap();
        assert_eq!(entries[0].start, 1.5);
        assert_eq!(entries[0].end, 2.25);
    }

    #[test]
    fn render_numbers_entries() {
        let entries = vec![
            SubtitleEntry {
                index: 1,
                start: 0.0,
                end: 2.0,
                text: "Hello beautiful world".to_string(),
            },
            SubtitleEntry {
                index: 2,
                start: 2.0,
                end: 4.0,
                text: "Music flows through my soul".to_string(),
            },
        ];
        let text = render(&entries);
        assert_eq!(
            text,
            "1\n00:00:00,000 --> 00:00:02,000\nHello beautiful world\n\n\
             2\n00:00:02,000 --> 00:00:04,000\nMusic flows through my soul\n\n"
        );
    }

    #[test]
    fn parse_handles_crlf_italics_and_multiline() {
        let srt = "1\r\n00:00:01,000 --> 00:00:02,500\r\n<i>Neon rivers</i>\r\nin the night\r\n\r\n\
                   2\r\n00:00:02,500 --> 00:00:05,000\r\nChasing stars\r\n";
        let entries = parse(srt).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].text, "Neon rivers\nin the night");
        assert_eq!(entries[0].start, 1.0);
        assert_eq!(entries[1].end, 5.0);
        assert_eq!(entries[1].index, 2);
    }

    #[test]
    fn parse_skips_blocks_without_timing() {
        let srt = "1\nnot a timing line\ntext\n\n2\n00:00:01,000 --> 00:00:02,000\nok\n";
        let entries = parse(srt).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].text, "ok");
        assert_eq!(entries[0].index, 1);
    }

    #[tokio::test]
    async fn write_then_read_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("song_subtitles.srt");
        let entries = vec![SubtitleEntry {
            index: 1,
            start: 0.25,
            end: 1.75,
            text: "Peace and love forever".to_string(),
        }];
        write_srt(&path, &entries).await.unwrap();
        assert_eq!(read_srt(&path).await.unwrap(), entries);
    }
}
