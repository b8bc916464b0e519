use crate::api::runway::{GenerationApi, GenerationRequest, RemoteStatus};
use crate::config::Config;
use crate::error::{PipelineError, SceneError};
use crate::ffmpeg::MediaComposer;
use crate::job::{CombinedAsset, GenerationJob, SceneClip};
use crate::reconcile;
use crate::{logi, logok, logw};
use anyhow::Context;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub const COMBINED_FILE_NAME: &str = "runway_combined_video.mp4";

#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub style: String,
    pub output_dir: PathBuf,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub max_concurrent_jobs: usize,
    pub fps: u32,
}

impl GenerationSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            style: cfg.style.clone(),
            output_dir: cfg.output_dir.clone(),
            poll_interval: cfg.poll_interval(),
            poll_timeout: cfg.poll_timeout(),
            max_concurrent_jobs: cfg.max_concurrent_jobs,
            fps: cfg.fps,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SceneOutcome {
    pub job: GenerationJob,
    pub result: Result<SceneClip, SceneError>,
}

pub fn scene_file_name(scene_index: usize) -> String {
    format!("runway_scene_{:02}.mp4", scene_index)
}

pub fn duration_per_scene(target_duration: f64, prompt_count: usize) -> u32 {
    if prompt_count == 0 || !target_duration.is_finite() || target_duration <= 0.0 {
        return 1;
    }
    ((target_duration / prompt_count as f64).floor() as u32).max(1)
}

pub struct SceneGenerator {
    api: Arc<dyn GenerationApi>,
    composer: Arc<dyn MediaComposer>,
    settings: GenerationSettings,
    cancel: CancellationToken,
}

impl SceneGenerator {
    pub fn new(
        api: Arc<dyn GenerationApi>,
        composer: Arc<dyn MediaComposer>,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            api,
            composer,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs every prompt to a terminal state. The returned vector is indexed by scene.
    pub async fn generate_scenes(&self, prompts: &[String], duration: u32) -> Vec<SceneOutcome> {
        logi(format!(
            "Generating {} scenes ({}s each, style: {})",
            prompts.len(),
            duration,
            self.settings.style
        ));

        let limit = Arc::new(Semaphore::new(self.settings.max_concurrent_jobs.max(1)));
        let mut tasks = JoinSet::new();

        for (scene_index, prompt) in prompts.iter().enumerate() {
            let worker = SceneWorker {
                api: Arc::clone(&self.api),
                composer: Arc::clone(&self.composer),
                settings: self.settings.clone(),
                cancel: self.cancel.clone(),
            };
            let limit = Arc::clone(&limit);
            let prompt = prompt.clone();
            tasks.spawn(async move {
                let _permit = limit.acquire_owned().await.ok();
                let outcome = worker.run(&prompt, scene_index, duration).await;
                (scene_index, outcome)
            });
        }

        let mut slots: Vec<Option<SceneOutcome>> = vec![None; prompts.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((scene_index, outcome)) => slots[scene_index] = Some(outcome),
                Err(err) => logw(format!("Scene task aborted: {}", err)),
            }
        }

        let outcomes: Vec<SceneOutcome> = slots
            .into_iter()
            .enumerate()
            .map(|(scene_index, slot)| {
                slot.unwrap_or_else(|| {
                    let reason = "scene task did not complete".to_string();
                    SceneOutcome {
                        job: GenerationJob::rejected(&prompts[scene_index], scene_index, reason.clone()),
                        result: Err(SceneError::Submission {
                            scene: scene_index,
                            reason,
                        }),
                    }
                })
            })
            .collect();

        let made = outcomes.iter().filter(|o| o.result.is_ok()).count();
        logok(format!("{}/{} scenes generated", made, prompts.len()));
        outcomes
    }

    pub async fn build_combined_asset(
        &self,
        prompts: &[String],
        target_duration: f64,
    ) -> Result<CombinedAsset, PipelineError> {
        let duration = duration_per_scene(target_duration, prompts.len());
        let outcomes = self.generate_scenes(prompts, duration).await;

        if self.cancel.is_cancelled() {
            return Err(PipelineError::Cancelled);
        }

        let clips: Vec<SceneClip> = outcomes
            .into_iter()
            .filter_map(|o| match o.result {
                Ok(clip) => Some(clip),
                Err(err) => {
                    logw(format!("Dropping scene {}: {}", err.scene() + 1, err));
                    None
                }
            })
            .collect();

        let out_path = self.settings.output_dir.join(COMBINED_FILE_NAME);
        reconcile::assemble(
            self.composer.as_ref(),
            &clips,
            target_duration,
            self.settings.fps,
            &out_path,
        )
        .await
    }
}

struct SceneWorker {
    api: Arc<dyn GenerationApi>,
    composer: Arc<dyn MediaComposer>,
    settings: GenerationSettings,
    cancel: CancellationToken,
}

impl SceneWorker {
    async fn run(&self, prompt: &str, scene_index: usize, duration: u32) -> SceneOutcome {
        let label = scene_index + 1;
        let snippet: String = prompt.chars().take(50).collect();
        logi(format!("Scene {}: {}", label, snippet));

        let mut job = match self.submit(prompt, scene_index, duration).await {
            Ok(job) => job,
            Err((job, err)) => {
                logw(format!("Scene {} submission failed: {}", label, err));
                return SceneOutcome {
                    job,
                    result: Err(err),
                };
            }
        };

        let url = match self.poll(&mut job).await {
            Ok(url) => url,
            Err(err) => {
                logw(format!("Scene {} did not complete: {}", label, err));
                return SceneOutcome {
                    job,
                    result: Err(err),
                };
            }
        };

        let result = self.retrieve(&url, scene_index).await;
        match &result {
            Ok(clip) => logok(format!(
                "Scene {} done: {} ({:.2}s)",
                label,
                clip.source_path.display(),
                clip.duration
            )),
            Err(err) => logw(format!("Scene {} dropped: {}", label, err)),
        }
        SceneOutcome { job, result }
    }

    async fn submit(
        &self,
        prompt: &str,
        scene_index: usize,
        duration: u32,
    ) -> Result<GenerationJob, (GenerationJob, SceneError)> {
        if self.cancel.is_cancelled() {
            let job = GenerationJob::rejected(prompt, scene_index, "cancelled".to_string());
            return Err((job, SceneError::Cancelled { scene: scene_index }));
        }
        let request = GenerationRequest::for_scene(prompt, scene_index, duration, &self.settings.style);
        let submitted = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                let job = GenerationJob::rejected(prompt, scene_index, "cancelled".to_string());
                return Err((job, SceneError::Cancelled { scene: scene_index }));
            }
            res = self.api.submit(&request) => res,
        };

        match submitted {
            Ok(task_id) => Ok(GenerationJob::submitted(prompt, scene_index, task_id)),
            Err(err) => {
                let reason = format!("{:#}", err);
                let job = GenerationJob::rejected(prompt, scene_index, reason.clone());
                Err((job, SceneError::Submission {
                    scene: scene_index,
                    reason,
                }))
            }
        }
    }

    async fn poll(&self, job: &mut GenerationJob) -> Result<String, SceneError> {
        let scene = job.scene_index;
        let task_id = job.remote_task_id.clone().unwrap_or_default();
        let deadline = Instant::now() + self.settings.poll_timeout;

        loop {
            let now = Instant::now();
            if now >= deadline {
                job.mark_timed_out();
                return Err(SceneError::PollTimeout {
                    scene,
                    timeout: self.settings.poll_timeout,
                });
            }

            let status = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    job.mark_failed("cancelled".to_string());
                    return Err(SceneError::Cancelled { scene });
                }
                _ = tokio::time::sleep_until(deadline) => {
                    job.mark_timed_out();
                    return Err(SceneError::PollTimeout {
                        scene,
                        timeout: self.settings.poll_timeout,
                    });
                }
                res = self.api.status(&task_id) => res,
            };

            match status {
                Ok(RemoteStatus::Completed {
                    output_url: Some(url),
                }) => {
                    job.mark_completed(url.clone());
                    return Ok(url);
                }
                Ok(RemoteStatus::Completed { output_url: None }) => {
                    let reason = "completed without an output url".to_string();
                    job.mark_failed(reason.clone());
                    return Err(SceneError::RemoteJobFailed { scene, reason });
                }
                Ok(RemoteStatus::Failed { error }) => {
                    job.mark_failed(error.clone());
                    return Err(SceneError::RemoteJobFailed {
                        scene,
                        reason: error,
                    });
                }
                Ok(RemoteStatus::Running(state)) => {
                    tracing::debug!(scene, state = %state, "generation in progress");
                }
                Err(err) => {
                    logw(format!("Scene {} status check failed: {:#}", scene + 1, err));
                }
            }

            let wake = (Instant::now() + self.settings.poll_interval).min(deadline);
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    job.mark_failed("cancelled".to_string());
                    return Err(SceneError::Cancelled { scene });
                }
                _ = tokio::time::sleep_until(wake) => {}
            }
        }
    }

    async fn retrieve(&self, url: &str, scene_index: usize) -> Result<SceneClip, SceneError> {
        let dest = self.settings.output_dir.join(scene_file_name(scene_index));
        let download_err = |reason: String| SceneError::Download {
            scene: scene_index,
            reason,
        };

        let fetched = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(SceneError::Cancelled { scene: scene_index }),
            res = self.api.download(url, &dest) => res,
        };
        fetched.map_err(|err| download_err(format!("{:#}", err)))?;

        let duration = self
            .composer
            .probe_duration(&dest)
            .await
            .map_err(|err| download_err(format!("unreadable artifact {}: {:#}", dest.display(), err)))?;

        Ok(SceneClip {
            scene_index,
            source_path: dest,
            duration,
        })
    }
}

pub async fn load_prompts(path: &Path) -> anyhow::Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read prompts: {}", path.display()))?;
    let prompts: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    if prompts.is_empty() {
        anyhow::bail!("no prompts in {}", path.display());
    }
    Ok(prompts)
}
