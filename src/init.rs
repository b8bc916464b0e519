use crate::logi;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;

pub async fn ensure_directories(output_dir: &Path) -> Result<()> {
    if fs::metadata(output_dir).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Ok(());
    }
    fs::create_dir_all(output_dir)
        .await
        .with_context(|| format!("Failed to create dir {}", output_dir.display()))?;
    logi(format!("Created directory: {}", output_dir.display()));
    Ok(())
}

async fn tool_available(name: &str) -> bool {
    match tokio::process::Command::new(name)
        .arg("-version")
        .output()
        .await
    {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}

pub async fn check_ffmpeg() -> bool {
    tool_available("ffmpeg").await && tool_available("ffprobe").await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_nested_output_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let out = dir.path().join("outputs").join("run");
        ensure_directories(&out).await.unwrap();
        assert!(out.is_dir());
        ensure_directories(&out).await.unwrap();
    }
}
