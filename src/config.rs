use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "runway_api_key")]
    #[serde(default)]
    pub runway_key: String,
    #[serde(rename = "openai_api_key")]
    #[serde(default)]
    pub openai_key: String,
    #[serde(default = "default_runway_base_url")]
    pub runway_base_url: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_style")]
    pub style: String,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    #[serde(default = "default_fps")]
    pub fps: u32,
}

fn default_runway_base_url() -> String {
    "https://api.runway.com/v1".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./outputs")
}

fn default_style() -> String {
    "cinematic synthwave".to_string()
}

fn default_poll_interval_secs() -> u64 {
    10
}

fn default_poll_timeout_secs() -> u64 {
    300
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_fps() -> u32 {
    24
}

impl Default for Config {
    fn default() -> Self {
        Self {
            runway_key: String::new(),
            openai_key: String::new(),
            runway_base_url: default_runway_base_url(),
            output_dir: default_output_dir(),
            style: default_style(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_timeout_secs: default_poll_timeout_secs(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            fps: default_fps(),
        }
    }
}

impl Config {
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if fs::metadata(path).await.is_ok() {
            let content = fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            Self::from_json(&content)
                .with_context(|| format!("Failed to parse config: {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(key) = std::env::var("RUNWAY_API_KEY") {
            config.runway_key = key;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.openai_key = key;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            anyhow::bail!("config.json: poll_interval_secs must be positive");
        }
        if self.poll_timeout_secs == 0 {
            anyhow::bail!("config.json: poll_timeout_secs must be positive");
        }
        if self.max_concurrent_jobs == 0 {
            anyhow::bail!("config.json: max_concurrent_jobs must be positive");
        }
        if self.fps == 0 {
            anyhow::bail!("config.json: fps must be positive");
        }
        Ok(())
    }

    pub fn runway_enabled(&self) -> bool {
        !self.runway_key.trim().is_empty()
    }

    pub fn openai_enabled(&self) -> bool {
        !self.openai_key.trim().is_empty()
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_uses_defaults() {
        let cfg = Config::from_json("{}").unwrap();
        assert_eq!(cfg.output_dir, PathBuf::from("./outputs"));
        assert_eq!(cfg.style, "cinematic synthwave");
        assert_eq!(cfg.poll_timeout(), Duration::from_secs(300));
        assert_eq!(cfg.poll_interval(), Duration::from_secs(10));
        assert!(!cfg.runway_enabled());
    }

    #[test]
    fn keys_use_snake_case_names() {
        let cfg = Config::from_json(
            r#"{"runway_api_key":"rw-1","openai_api_key":"sk-1","output_dir":"/tmp/out"}"#,
        )
        .unwrap();
        assert!(cfg.runway_enabled());
        assert!(cfg.openai_enabled());
        assert_eq!(cfg.output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn whitespace_key_does_not_enable_generation() {
        let cfg = Config {
            runway_key: "   ".to_string(),
            ..Config::default()
        };
        assert!(!cfg.runway_enabled());
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let cfg = Config {
            max_concurrent_jobs: 0,
            ..Config::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[tokio::test]
    async fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let cfg = Config::load(dir.path().join("config.json")).await.unwrap();
        assert_eq!(cfg.fps, 24);
    }
}
