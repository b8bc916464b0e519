use ai_music_video::config::Config;
use ai_music_video::init;
use ai_music_video::pipeline::{Background, MusicVideoPipeline, VideoRequest};
use ai_music_video::platform;
use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "ai-music-video", about = "Render a captioned music video from a WAV file and lyrics")]
struct Args {
    /// Song audio (WAV)
    #[arg(long)]
    audio: PathBuf,

    /// Lyrics text, one caption per line
    #[arg(long)]
    lyrics: PathBuf,

    /// Scene prompts, one per line (overrides generated prompts)
    #[arg(long)]
    prompts: Option<PathBuf>,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,

    /// Override the output directory from the config
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override the scene style from the config
    #[arg(long)]
    style: Option<String>,

    /// Time captions from speech recognition instead of equal division
    #[arg(long)]
    transcribe: bool,

    /// Song brief for language-model scene prompts
    #[arg(long)]
    describe: Option<String>,

    #[arg(long, default_value = "English")]
    language: String,

    /// Captions to print after alignment
    #[arg(long, default_value_t = 3)]
    preview: usize,

    /// Open the finished video when done
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let mut cfg = Config::load(&args.config).await?;
    if let Some(dir) = args.output_dir {
        cfg.output_dir = dir;
    }
    if let Some(style) = args.style {
        cfg.style = style;
    }

    init::ensure_directories(&cfg.output_dir).await?;
    if !init::check_ffmpeg().await {
        tracing::warn!("FFmpeg/ffprobe not found in PATH. Please install FFmpeg.");
    }

    let pipeline = MusicVideoPipeline::new(cfg)?;
    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; stopping scene generation...");
            cancel.cancel();
        }
    });

    let mut request = VideoRequest::new(args.audio, args.lyrics);
    request.prompts_path = args.prompts;
    request.use_transcription = args.transcribe;
    request.description = args.describe;
    request.language = args.language;
    request.preview_lines = args.preview;

    let outputs = pipeline.run(&request).await?;
    match &outputs.background {
        Background::Generated { scene_order } => tracing::info!(
            "Background: {} generated scenes (order {:?})",
            scene_order.len(),
            scene_order
        ),
        Background::Gradient => tracing::info!("Background: gradient"),
    }
    tracing::info!("Subtitles: {}", outputs.srt_path.display());
    tracing::info!("Alignment: {}", outputs.json_path.display());
    tracing::info!("Video: {}", outputs.video_path.display());

    if args.open {
        platform::open_in_viewer(&outputs.video_path);
    }
    Ok(())
}
