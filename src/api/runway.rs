use crate::config::Config;
use crate::logw;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::io::Write;
use std::path::Path;
use std::time::Duration;

const SUBMIT_TIMEOUT: Duration = Duration::from_secs(30);
const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    pub duration: u32,
    pub style: String,
    pub seed: u64,
}

impl GenerationRequest {
    pub fn for_scene(prompt: &str, scene_index: usize, duration: u32, style: &str) -> Self {
        Self {
            prompt: prompt.to_string(),
            duration,
            style: style.to_string(),
            seed: scene_index as u64 * 1000,
        }
    }

    pub fn body(&self) -> Value {
        json!({
            "prompt": format!("{}, {} style, high quality, 4K", self.prompt, self.style),
            "duration": self.duration,
            "aspect_ratio": "16:9",
            "model": "gen4",
            "settings": {
                "motion_scale": 0.8,
                "quality": "high",
                "seed": self.seed,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteStatus {
    Completed { output_url: Option<String> },
    Failed { error: String },
    Running(String),
}

#[derive(Debug, Deserialize)]
struct TaskBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output_url: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl RemoteStatus {
    pub fn from_json(text: &str) -> Result<Self> {
        let body: TaskBody =
            serde_json::from_str(text).context("Failed to parse task status JSON")?;
        let status = body.status.unwrap_or_default();
        Ok(match status.as_str() {
            "completed" => RemoteStatus::Completed {
                output_url: body.output_url.filter(|u| !u.is_empty()),
            },
            "failed" => RemoteStatus::Failed {
                error: body.error.unwrap_or_else(|| "Unknown error".to_string()),
            },
            _ => RemoteStatus::Running(status),
        })
    }
}

#[async_trait]
pub trait GenerationApi: Send + Sync {
    async fn submit(&self, request: &GenerationRequest) -> Result<String>;

    /// Transport errors and non-success statuses are `Err`; the poller treats them as transient.
    async fn status(&self, task_id: &str) -> Result<RemoteStatus>;

    async fn download(&self, url: &str, dest: &Path) -> Result<()>;
}

pub struct RunwayClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RunwayClient {
    pub fn with_client(client: Client, cfg: &Config) -> Self {
        Self {
            client,
            base_url: cfg.runway_base_url.trim_end_matches('/').to_string(),
            api_key: cfg.runway_key.clone(),
        }
    }
}

fn body_snippet(raw: &str) -> String {
    raw.chars().take(300).collect()
}

#[async_trait]
impl GenerationApi for RunwayClient {
    async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        let resp = self
            .client
            .post(format!("{}/generate", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request.body())
            .timeout(SUBMIT_TIMEOUT)
            .send()
            .await
            .context("Runway request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Runway HTTP {} - {}", status.as_u16(), body_snippet(&raw));
        }

        let root: Value = serde_json::from_str(&raw).context("Runway submit response parse failed")?;
        match root.get("id").and_then(|v| v.as_str()) {
            Some(id) if !id.is_empty() => Ok(id.to_string()),
            _ => anyhow::bail!("Runway response carried no task id"),
        }
    }

    async fn status(&self, task_id: &str) -> Result<RemoteStatus> {
        let resp = self
            .client
            .get(format!("{}/tasks/{}", self.base_url, task_id))
            .bearer_auth(&self.api_key)
            .timeout(STATUS_TIMEOUT)
            .send()
            .await
            .context("Runway status request failed")?;

        let status = resp.status();
        let raw = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            anyhow::bail!("Runway status HTTP {}", status.as_u16());
        }
        RemoteStatus::from_json(&raw)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let resp = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .context("Artifact request failed")?;

        if !resp.status().is_success() {
            logw(format!("Artifact download failed HTTP {}", resp.status().as_u16()));
            anyhow::bail!("HTTP {}", resp.status().as_u16());
        }

        let bytes = resp.bytes().await.context("Artifact response read failed")?;
        let dest = dest.to_path_buf();
        tokio::task::spawn_blocking(move || write_artifact(&dest, &bytes))
            .await
            .context("Artifact write task failed")?
    }
}

// The bytes land in a temp file beside `dest` that is removed on drop, so a failed
// write or persist leaves nothing behind. Runs to completion even if the caller is cancelled.
fn write_artifact(dest: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(parent)
        .with_context(|| format!("Failed to create dir {}", parent.display()))?;

    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "artifact".to_string());
    let mut tmp = tempfile::Builder::new()
        .prefix(&format!("{name}."))
        .suffix(".part")
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temp file in {}", parent.display()))?;
    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write {}", tmp.path().display()))?;
    tmp.persist(dest)
        .map_err(|err| anyhow::anyhow!("Failed to move artifact into {}: {}", dest.display(), err.error))?;
    Ok(())
}
