use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicPrompts {
    pub title: String,
    pub lyrics: String,
    pub style_prompt: String,
    pub video_prompts: Vec<String>,
}

impl MusicPrompts {
    pub fn from_model_output(text: &str) -> Result<Self> {
        let start = text.find('{').context("JSON not found in response")?;
        let end = text.rfind('}').context("JSON not found in response")?;
        if end < start {
            anyhow::bail!("JSON not found in response");
        }
        let prompts: MusicPrompts = serde_json::from_str(&text[start..=end])
            .with_context(|| "Failed to parse music prompt JSON")?;
        if prompts.video_prompts.iter().all(|p| p.trim().is_empty()) {
            anyhow::bail!("response contained no video prompts");
        }
        Ok(prompts)
    }

    pub fn fallback() -> Self {
        Self {
            title: "Cosmic Drift".to_string(),
            lyrics: [
                "Neon rivers in the night",
                "Chasing stars till morning light",
                "In this city, made of glass",
                "Future memories of the past",
                "",
                "We're on a cosmic drift, a silent flight",
                "Painting dreams in shades of light",
                "A fleeting moment, in the stream",
                "Living out a vibrant dream",
            ]
            .join("\n"),
            style_prompt: "Epic cinematic synthwave, futuristic, ethereal female vocals, driving beat, atmospheric pads, reminiscent of Blade Runner soundtrack".to_string(),
            video_prompts: vec![
                "Futuristic cityscape at night with neon lights".to_string(),
                "Close-up of character looking at holographic stars".to_string(),
                "Abstract geometric shapes moving to music".to_string(),
                "Serene figure on balcony overlooking city".to_string(),
            ],
        }
    }

    pub fn scene_prompts(&self) -> Vec<String> {
        self.video_prompts
            .iter()
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .collect()
    }
}
