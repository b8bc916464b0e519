use crate::align::{self, AlignMethod, Alignment};
use crate::api::openai;
use crate::api::runway::{GenerationApi, RunwayClient};
use crate::config::Config;
use crate::error::PipelineError;
use crate::ffmpeg::{FfmpegComposer, MediaComposer};
use crate::init;
use crate::prompts::MusicPrompts;
use crate::scenes::{self, GenerationSettings, SceneGenerator};
use crate::srt::SubtitleEntry;
use crate::{logi, logok, logw};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub audio_path: PathBuf,
    pub lyrics_path: PathBuf,
    pub prompts_path: Option<PathBuf>,
    pub use_transcription: bool,
    pub language: String,
    pub description: Option<String>,
    pub preview_lines: usize,
}

impl VideoRequest {
    pub fn new(audio_path: impl Into<PathBuf>, lyrics_path: impl Into<PathBuf>) -> Self {
        Self {
            audio_path: audio_path.into(),
            lyrics_path: lyrics_path.into(),
            prompts_path: None,
            use_transcription: false,
            language: "English".to_string(),
            description: None,
            preview_lines: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Background {
    Generated { scene_order: Vec<usize> },
    Gradient,
}

#[derive(Debug, Clone)]
pub struct VideoOutputs {
    pub srt_path: PathBuf,
    pub json_path: PathBuf,
    pub align_method: AlignMethod,
    pub background: Background,
    pub video_path: PathBuf,
}

pub struct MusicVideoPipeline {
    cfg: Config,
    client: reqwest::Client,
    api: Option<Arc<dyn GenerationApi>>,
    composer: Arc<dyn MediaComposer>,
    cancel: CancellationToken,
}

impl MusicVideoPipeline {
    pub fn new(cfg: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        let api: Option<Arc<dyn GenerationApi>> = if cfg.runway_enabled() {
            Some(Arc::new(RunwayClient::with_client(client.clone(), &cfg)))
        } else {
            None
        };
        let composer: Arc<dyn MediaComposer> = Arc::new(FfmpegComposer::new(cfg.fps));
        Ok(Self::with_parts(cfg, client, api, composer))
    }

    pub fn with_parts(
        cfg: Config,
        client: reqwest::Client,
        api: Option<Arc<dyn GenerationApi>>,
        composer: Arc<dyn MediaComposer>,
    ) -> Self {
        Self {
            cfg,
            client,
            api,
            composer,
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(&self, request: &VideoRequest) -> Result<VideoOutputs> {
        let output_dir = self.cfg.output_dir.clone();
        init::ensure_directories(&output_dir).await?;

        let lyrics = align::read_lyrics(&request.lyrics_path).await?;
        let audio_duration = self
            .composer
            .probe_duration(&request.audio_path)
            .await
            .with_context(|| format!("Failed to read audio: {}", request.audio_path.display()))?;
        logi(format!("Audio length: {:.2}s", audio_duration));

        let (entries, alignment, method) = self
            .align_lyrics(&request.audio_path, &lyrics, audio_duration, request.use_transcription)
            .await;
        let files =
            align::write_alignment(&output_dir, &request.audio_path, method, &entries, &alignment)
                .await?;

        if request.preview_lines > 0 {
            if let Err(err) = align::preview_subtitles(&files.srt_path, request.preview_lines).await {
                logw(format!("Subtitle preview failed: {:#}", err));
            }
        }

        let stem = request
            .audio_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());

        let (background_path, background) =
            self.build_background(request, &stem, audio_duration).await?;

        let video_path = output_dir.join(format!("{stem}_final_video.mp4"));
        let tmp_path = output_dir.join(format!("{stem}_final_video.partial.mp4"));
        logi(format!("Adding audio and subtitles -> {}", video_path.display()));
        if let Err(err) = self
            .composer
            .mux(&background_path, &request.audio_path, &files.srt_path, &tmp_path)
            .await
        {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(err.context("Final video render failed"));
        }
        fs::rename(&tmp_path, &video_path)
            .await
            .with_context(|| format!("Failed to move final video into {}", video_path.display()))?;

        if let Ok(meta) = fs::metadata(&video_path).await {
            logok(format!(
                "Final video: {} ({:.1} MB)",
                video_path.display(),
                meta.len() as f64 / (1024.0 * 1024.0)
            ));
        }

        Ok(VideoOutputs {
            srt_path: files.srt_path,
            json_path: files.json_path,
            align_method: files.method,
            background,
            video_path,
        })
    }

    async fn align_lyrics(
        &self,
        audio_path: &Path,
        lyrics: &[String],
        audio_duration: f64,
        use_transcription: bool,
    ) -> (Vec<SubtitleEntry>, Alignment, AlignMethod) {
        if use_transcription {
            if !self.cfg.openai_enabled() {
                logw("Transcription requested without an OpenAI key; using equal-division timing.");
            } else {
                match openai::transcribe_segments(&self.client, &self.cfg, audio_path).await {
                    Ok(segments) if !segments.is_empty() => {
                        let (entries, alignment) = align::align_to_segments(lyrics, &segments);
                        return (entries, alignment, AlignMethod::Transcribed);
                    }
                    Ok(_) => logw("Transcription returned no segments; using equal-division timing."),
                    Err(err) => logw(format!(
                        "Transcription failed ({:#}); using equal-division timing.",
                        err
                    )),
                }
            }
        }

        let (entries, alignment) = align::simple_align(lyrics, audio_duration);
        (entries, alignment, AlignMethod::Simple)
    }

    async fn build_background(
        &self,
        request: &VideoRequest,
        stem: &str,
        audio_duration: f64,
    ) -> Result<(PathBuf, Background)> {
        if let Some(api) = &self.api {
            let prompts = self.resolve_prompts(request, audio_duration).await?;
            let generator = SceneGenerator::new(
                Arc::clone(api),
                Arc::clone(&self.composer),
                GenerationSettings::from_config(&self.cfg),
            )
            .with_cancellation(self.cancel.clone());

            match generator.build_combined_asset(&prompts, audio_duration).await {
                Ok(asset) => {
                    return Ok((
                        asset.path,
                        Background::Generated {
                            scene_order: asset.scene_order,
                        },
                    ));
                }
                Err(PipelineError::Cancelled) => return Err(PipelineError::Cancelled.into()),
                Err(err) => {
                    logw(format!("Scene generation failed ({}); using gradient background.", err));
                }
            }
        } else {
            logi("No Runway key configured; using gradient background.");
        }

        let path = self.cfg.output_dir.join(format!("{stem}_background.mp4"));
        logi(format!("Rendering gradient background -> {}", path.display()));
        self.composer
            .render_background(audio_duration, &path)
            .await
            .context("Background render failed")?;
        Ok((path, Background::Gradient))
    }

    async fn resolve_prompts(&self, request: &VideoRequest, audio_duration: f64) -> Result<Vec<String>> {
        if let Some(path) = &request.prompts_path {
            let prompts = scenes::load_prompts(path).await?;
            logi(format!("Loaded {} scene prompts from {}", prompts.len(), path.display()));
            return Ok(prompts);
        }

        let generated = match (&request.description, self.cfg.openai_enabled()) {
            (Some(description), true) => {
                let prompts = openai::generate_music_prompts(
                    &self.client,
                    &self.cfg,
                    &request.language,
                    description,
                    audio_duration.round().max(1.0) as u32,
                )
                .await;
                self.save_generated_lyrics(&prompts).await;
                prompts
            }
            _ => MusicPrompts::fallback(),
        };

        let prompts = generated.scene_prompts();
        if prompts.is_empty() {
            return Ok(MusicPrompts::fallback().scene_prompts());
        }
        Ok(prompts)
    }

    async fn save_generated_lyrics(&self, prompts: &MusicPrompts) {
        let path = self.cfg.output_dir.join("generated_lyrics.txt");
        match fs::write(&path, prompts.lyrics.as_bytes()).await {
            Ok(()) => logok(format!("Generated lyrics saved: {}", path.display())),
            Err(err) => logw(format!("Could not save generated lyrics: {}", err)),
        }
    }
}
