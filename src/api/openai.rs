use crate::align::TranscriptSegment;
use crate::config::Config;
use crate::prompts::MusicPrompts;
use crate::{logi, logw};
use anyhow::{Context, Result};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const TRANSCRIPTIONS_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

fn openai_extract_output_text(resp_json: &str) -> Option<String> {
    let root: serde_json::Value = serde_json::from_str(resp_json).ok()?;

    if let Some(err) = root.get("error").filter(|e| !e.is_null()) {
        if let Some(msg) = err.get("message").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error message: {}", msg));
        }
        if let Some(code) = err.get("code").and_then(|v| v.as_str()) {
            logw(format!("OpenAI error code: {}", code));
        }
        return None;
    }

    let output = root.get("output")?.as_array()?;
    for item in output {
        let Some(content) = item.get("content").and_then(|v| v.as_array()) else {
            continue;
        };
        for entry in content {
            let typ = entry.get("type").and_then(|v| v.as_str());
            let text = entry.get("text").and_then(|v| v.as_str());
            if typ == Some("output_text") {
                if let Some(text) = text {
                    return Some(text.to_string());
                }
            }
        }
    }

    None
}

fn music_prompt_request(language: &str, description: &str, duration: u32) -> String {
    format!(
        "You are given a song brief.\nLanguage: {language}\nDescription: {description}\nLength: {duration} seconds\n\nTASK:\n- Write lyrics sized for {duration} seconds, one line per lyric line.\n- Write a style prompt suited to an AI music generator.\n- Write video scene prompts; each scene covers about {scene} seconds.\n- Write everything in {language}.\n- Return STRICT JSON with this shape ONLY:\n  {{\"title\":\"...\",\"lyrics\":\"line 1\\nline 2\",\"style_prompt\":\"...\",\"video_prompts\":[\"scene 1\",\"scene 2\",\"scene 3\"]}}\n",
        scene = (duration / 4).max(1)
    )
}

/// Asks the model for title, lyrics, style and scene prompts. Never fails: any
/// transport, HTTP or parse problem yields the built-in fallback set.
pub async fn generate_music_prompts(
    client: &Client,
    cfg: &Config,
    language: &str,
    description: &str,
    duration: u32,
) -> MusicPrompts {
    match request_music_prompts(client, cfg, language, description, duration).await {
        Ok(prompts) => {
            logi(format!(
                "OpenAI prompts received: \"{}\" ({} scenes)",
                prompts.title,
                prompts.video_prompts.len()
            ));
            prompts
        }
        Err(err) => {
            logw(format!("Prompt generation failed, using fallback prompts: {:#}", err));
            MusicPrompts::fallback()
        }
    }
}

async fn request_music_prompts(
    client: &Client,
    cfg: &Config,
    language: &str,
    description: &str,
    duration: u32,
) -> Result<MusicPrompts> {
    let body = json!({
        "model": "gpt-4o",
        "input": [
            {"role": "system", "content": "You are a professional music producer and lyricist."},
            {"role": "user", "content": music_prompt_request(language, description, duration)},
        ],
        "text": {"format": {"type": "json_object"}},
        "temperature": 0.8,
        "max_output_tokens": 1500,
    });

    let resp = client
        .post(RESPONSES_URL)
        .bearer_auth(&cfg.openai_key)
        .json(&body)
        .timeout(Duration::from_secs(120))
        .send()
        .await
        .context("OpenAI request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        let snippet = raw.chars().take(800).collect::<String>();
        anyhow::bail!("OpenAI HTTP {}: {}", status.as_u16(), snippet);
    }

    let out_text = openai_extract_output_text(&raw).context("OpenAI response parse failed")?;
    MusicPrompts::from_model_output(&out_text)
}

#[derive(Debug, Deserialize)]
struct TranscriptionBody {
    #[serde(default)]
    segments: Vec<TranscriptSegment>,
}

pub async fn transcribe_segments(
    client: &Client,
    cfg: &Config,
    audio_path: &Path,
) -> Result<Vec<TranscriptSegment>> {
    let bytes = fs::read(audio_path)
        .await
        .with_context(|| format!("read audio: {}", audio_path.display()))?;
    let file_name = audio_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "audio.wav".to_string());

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str("audio/wav")
        .context("invalid audio mime type")?;
    let form = Form::new()
        .text("model", "whisper-1")
        .text("response_format", "verbose_json")
        .part("file", part);

    let resp = client
        .post(TRANSCRIPTIONS_URL)
        .bearer_auth(&cfg.openai_key)
        .multipart(form)
        .timeout(Duration::from_secs(600))
        .send()
        .await
        .context("OpenAI transcription request failed")?;

    let status = resp.status();
    let raw = resp.text().await.unwrap_or_default();
    if !status.is_success() {
        let snippet = raw.chars().take(800).collect::<String>();
        anyhow::bail!("OpenAI transcription HTTP {}: {}", status.as_u16(), snippet);
    }

    let body: TranscriptionBody =
        serde_json::from_str(&raw).context("Failed to parse transcription JSON")?;
    logi(format!("Transcription segments: {}", body.segments.len()));
    Ok(body.segments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_text_is_found_in_message_content() {
        let raw = r#"{"output":[{"type":"reasoning"},{"type":"message","content":[{"type":"output_text","text":"{\"a\":1}"}]}]}"#;
        assert_eq!(openai_extract_output_text(raw).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn error_body_yields_nothing() {
        let raw = r#"{"error":{"message":"bad key","code":"invalid_api_key"}}"#;
        assert_eq!(openai_extract_output_text(raw), None);
    }

    #[test]
    fn null_error_is_not_an_error() {
        let raw = r#"{"error":null,"output":[{"content":[{"type":"output_text","text":"ok"}]}]}"#;
        assert_eq!(openai_extract_output_text(raw).as_deref(), Some("ok"));
    }

    #[test]
    fn prompt_mentions_scene_length() {
        let text = music_prompt_request("English", "space travel", 120);
        assert!(text.contains("about 30 seconds"));
        assert!(text.contains("\"video_prompts\""));
    }

    #[test]
    fn transcription_segments_parse() {
        let raw = r#"{"text":"hi","segments":[{"id":0,"start":0.0,"end":1.5,"text":" hi"}]}"#;
        let body: TranscriptionBody = serde_json::from_str(raw).unwrap();
        assert_eq!(body.segments.len(), 1);
        assert_eq!(body.segments[0].end, 1.5);
    }
}
