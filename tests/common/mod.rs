#![allow(dead_code)]

use ai_music_video::api::runway::{GenerationApi, GenerationRequest, RemoteStatus};
use ai_music_video::ffmpeg::MediaComposer;
use ai_music_video::reconcile::ReconcilePlan;
use ai_music_video::scenes::GenerationSettings;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use tokio::fs;

/// How the fake remote service treats one prompt.
#[derive(Debug, Clone)]
pub enum Behavior {
    /// Reports `processing` for `polls` status checks, then completes with a clip of `secs`.
    Complete { polls: usize, secs: f64 },
    RejectSubmit,
    FailRemote,
    NeverFinish,
    DownloadFails,
}

/// In-memory Runway stand-in keyed by prompt text.
#[derive(Default)]
pub struct FakeRunway {
    behaviors: HashMap<String, Behavior>,
    pub submits: Mutex<Vec<GenerationRequest>>,
    pub status_calls: Mutex<HashMap<String, usize>>,
    pub downloads: Mutex<Vec<String>>,
}

impl FakeRunway {
    pub fn new(behaviors: &[(&str, Behavior)]) -> Self {
        Self {
            behaviors: behaviors
                .iter()
                .map(|(p, b)| (p.to_string(), b.clone()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn submit_count(&self, prompt: &str) -> usize {
        self.submits
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.prompt == prompt)
            .count()
    }

    pub fn status_count(&self, prompt: &str) -> usize {
        *self
            .status_calls
            .lock()
            .unwrap()
            .get(&task_id(prompt))
            .unwrap_or(&0)
    }

    fn behavior_for_task(&self, task: &str) -> Behavior {
        let prompt = task.trim_start_matches("task-");
        self.behaviors
            .get(prompt)
            .cloned()
            .unwrap_or(Behavior::Complete { polls: 0, secs: 4.0 })
    }
}

fn task_id(prompt: &str) -> String {
    format!("task-{prompt}")
}

#[async_trait]
impl GenerationApi for FakeRunway {
    async fn submit(&self, request: &GenerationRequest) -> Result<String> {
        self.submits.lock().unwrap().push(request.clone());
        match self.behaviors.get(&request.prompt) {
            Some(Behavior::RejectSubmit) => anyhow::bail!("Runway HTTP 500 - overloaded"),
            _ => Ok(task_id(&request.prompt)),
        }
    }

    async fn status(&self, task: &str) -> Result<RemoteStatus> {
        let calls = {
            let mut map = self.status_calls.lock().unwrap();
            let n = map.entry(task.to_string()).or_insert(0);
            *n += 1;
            *n
        };
        Ok(match self.behavior_for_task(task) {
            Behavior::Complete { polls, .. } if calls <= polls => {
                RemoteStatus::Running("processing".to_string())
            }
            Behavior::Complete { .. } | Behavior::DownloadFails => RemoteStatus::Completed {
                output_url: Some(format!("https://cdn.test/{task}.mp4")),
            },
            Behavior::FailRemote => RemoteStatus::Failed {
                error: "content policy".to_string(),
            },
            Behavior::NeverFinish => RemoteStatus::Running("processing".to_string()),
            Behavior::RejectSubmit => unreachable!("rejected prompts are never polled"),
        })
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let task = url
            .trim_start_matches("https://cdn.test/")
            .trim_end_matches(".mp4")
            .to_string();
        let secs = match self.behavior_for_task(&task) {
            Behavior::DownloadFails => anyhow::bail!("HTTP 404"),
            Behavior::Complete { secs, .. } => secs,
            _ => 4.0,
        };
        self.downloads
            .lock()
            .unwrap()
            .push(task.trim_start_matches("task-").to_string());
        fs::write(dest, format!("{secs}")).await?;
        Ok(())
    }
}

/// Composer that treats each "video" file as a text file holding its duration.
#[derive(Default)]
pub struct FakeComposer {
    pub plans: Mutex<Vec<ReconcilePlan>>,
    pub backgrounds: Mutex<Vec<f64>>,
    pub muxes: Mutex<Vec<(PathBuf, PathBuf, PathBuf)>>,
    pub fail_render: bool,
}

#[async_trait]
impl MediaComposer for FakeComposer {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        let text = fs::read_to_string(path).await?;
        Ok(text.trim().parse::<f64>()?)
    }

    async fn render_plan(&self, plan: &ReconcilePlan, out_mp4: &Path) -> Result<()> {
        self.plans.lock().unwrap().push(plan.clone());
        if self.fail_render {
            fs::write(out_mp4, b"half written").await?;
            anyhow::bail!("encoder crashed");
        }
        fs::write(out_mp4, format!("{}", plan.total_duration())).await?;
        Ok(())
    }

    async fn render_background(&self, duration: f64, out_mp4: &Path) -> Result<()> {
        self.backgrounds.lock().unwrap().push(duration);
        fs::write(out_mp4, format!("{duration}")).await?;
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, srt: &Path, out_mp4: &Path) -> Result<()> {
        self.muxes
            .lock()
            .unwrap()
            .push((video.to_path_buf(), audio.to_path_buf(), srt.to_path_buf()));
        let secs = fs::read_to_string(video).await?;
        fs::write(out_mp4, secs).await?;
        Ok(())
    }
}

pub fn settings(output_dir: &Path) -> GenerationSettings {
    GenerationSettings {
        style: "cinematic synthwave".to_string(),
        output_dir: output_dir.to_path_buf(),
        poll_interval: Duration::from_secs(10),
        poll_timeout: Duration::from_secs(300),
        max_concurrent_jobs: 4,
        fps: 24,
    }
}

pub fn prompts(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}
