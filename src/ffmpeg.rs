use crate::reconcile::ReconcilePlan;
use crate::{logi, logw};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const FRAME_WIDTH: u32 = 1920;
const FRAME_HEIGHT: u32 = 1080;

#[async_trait]
pub trait MediaComposer: Send + Sync {
    async fn probe_duration(&self, path: &Path) -> Result<f64>;

    async fn render_plan(&self, plan: &ReconcilePlan, out_mp4: &Path) -> Result<()>;

    async fn render_background(&self, duration: f64, out_mp4: &Path) -> Result<()>;

    async fn mux(&self, video: &Path, audio: &Path, srt: &Path, out_mp4: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct FfmpegComposer {
    pub fps: u32,
}

impl FfmpegComposer {
    pub fn new(fps: u32) -> Self {
        Self { fps }
    }
}

#[async_trait]
impl MediaComposer for FfmpegComposer {
    async fn probe_duration(&self, path: &Path) -> Result<f64> {
        ffprobe_duration_seconds(path).await
    }

    async fn render_plan(&self, plan: &ReconcilePlan, out_mp4: &Path) -> Result<()> {
        let work = tempfile::Builder::new()
            .prefix("scene_segments")
            .tempdir()
            .context("Failed to create segment work dir")?;

        let list_txt = work.path().join("concat_list.txt");
        let mut listf = fs::File::create(&list_txt).await?;

        for (i, seg) in plan.segments.iter().enumerate() {
            let name = format!("segment_{:02}.mp4", i);
            let seg_path = work.path().join(&name);
            let ok = if seg.looped {
                logi(format!(
                    "Looping scene {} for {:.2}s -> {}",
                    seg.scene_index, seg.length, name
                ));
                ffmpeg_loop_segment(&seg.source_path, seg.length, self.fps, &seg_path).await?
            } else {
                ffmpeg_head_segment(&seg.source_path, seg.length, self.fps, &seg_path).await?
            };
            if !ok {
                anyhow::bail!("segment {} was not produced", name);
            }
            listf
                .write_all(format!("file '{}'\n", name).as_bytes())
                .await?;
        }
        listf.flush().await?;

        if !ffmpeg_concat_videos(&list_txt, plan.target_duration, self.fps, out_mp4).await? {
            anyhow::bail!("concat produced no output");
        }
        Ok(())
    }

    async fn render_background(&self, duration: f64, out_mp4: &Path) -> Result<()> {
        if !ffmpeg_gradient_background(duration, self.fps, out_mp4).await? {
            anyhow::bail!("background render produced no output");
        }
        Ok(())
    }

    async fn mux(&self, video: &Path, audio: &Path, srt: &Path, out_mp4: &Path) -> Result<()> {
        if !ffmpeg_mux_with_subtitles(video, audio, srt, self.fps, out_mp4).await? {
            anyhow::bail!("mux produced no output");
        }
        Ok(())
    }
}

async fn run_cmd(args: &[String]) -> Result<()> {
    if args.is_empty() {
        return Ok(());
    }

    let mut cmd = Command::new(&args[0]);
    if args.len() > 1 {
        cmd.args(&args[1..]);
    }

    let status = cmd.status().await.context("Command execution failed")?;
    if !status.success() {
        return Err(anyhow::anyhow!("Command failed: {:?}", args));
    }

    Ok(())
}

fn ffmpeg_prelude() -> Vec<String> {
    vec![
        "ffmpeg".to_string(),
        "-y".to_string(),
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ]
}

fn x264_args(fps: u32) -> Vec<String> {
    vec![
        "-r".to_string(),
        fps.to_string(),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-preset".to_string(),
        "veryfast".to_string(),
        "-crf".to_string(),
        "22".to_string(),
    ]
}

fn normalize_filter() -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:black,setsar=1",
        w = FRAME_WIDTH,
        h = FRAME_HEIGHT
    )
}

pub async fn ffprobe_duration_seconds(path: &Path) -> Result<f64> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .await
        .context("ffprobe duration failed")?;

    if !output.status.success() {
        return Err(anyhow::anyhow!("ffprobe failed"));
    }

    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let duration = text.parse::<f64>().unwrap_or(-1.0);
    if duration <= 0.1 {
        return Err(anyhow::anyhow!("Invalid duration"));
    }
    Ok(duration)
}

pub async fn ffmpeg_head_segment(
    input_mp4: &Path,
    length_s: f64,
    fps: u32,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-i".to_string(),
        input_mp4.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", length_s),
        "-vf".to_string(),
        normalize_filter(),
        "-an".to_string(),
    ]);
    args.extend(x264_args(fps));
    args.push(out_mp4.display().to_string());

    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_loop_segment(
    input_mp4: &Path,
    length_s: f64,
    fps: u32,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-stream_loop".to_string(),
        "-1".to_string(),
        "-i".to_string(),
        input_mp4.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", length_s),
        "-vf".to_string(),
        normalize_filter(),
        "-an".to_string(),
    ]);
    args.extend(x264_args(fps));
    args.push(out_mp4.display().to_string());

    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_concat_videos(
    list_txt: &Path,
    target_s: f64,
    fps: u32,
    out_mp4: &Path,
) -> Result<bool> {
    let mut args = ffmpeg_prelude();
    args.extend([
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        list_txt.display().to_string(),
        "-t".to_string(),
        format!("{:.3}", target_s),
        "-an".to_string(),
    ]);
    args.extend(x264_args(fps));
    args.extend([
        "-movflags".to_string(),
        "+faststart".to_string(),
        out_mp4.display().to_string(),
    ]);
    run_cmd(&args).await?;
    Ok(out_mp4.exists())
}

pub async fn ffmpeg_gradient_background(duration_s: f64, fps: u32, out_mp4: &Path) -> Result<bool> {
    let source = format!(
        "color=c=0x8064ff:s={}x{}:r={}:d={:.3}",
        FRAME_WIDTH, FRAME_HEIGHT, fps, duration_s
    );
    let mut args = ffmpeg_prelude();
    args.extend([
        "-f".to_string(),
        "lavfi".to_string(),
        "-i".to_string(),
        source,
        "-vf".to_string(),
        "hue=H=2*PI*t/4".to_string(),
    ]);
    args.extend(x264_args(fps));
    args.push(out_mp4.display().to_string());

    if let Err(err) = run_cmd(&args).await {
        logw(format!("Background render failed: {}", err));
        return Ok(false);
    }
    Ok(out_mp4.exists())
}

pub fn escape_filter_path(path: &Path) -> String {
    let raw = path.display().to_string().replace('\\', "/");
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            ':' | '\'' | ',' | '[' | ']' | ';' => {
                out.push('\\');
                out.push(ch);
            }
            _ => out.push(ch),
        }
    }
    out
}

pub async fn ffmpeg_mux_with_subtitles(
    video_in: &Path,
    audio_in: &Path,
    srt: &Path,
    fps: u32,
    video_out: &Path,
) -> Result<bool> {
    let filter = format!(
        "subtitles={}:force_style='FontName=Arial,Bold=1,FontSize=24,PrimaryColour=&H00FFFFFF,OutlineColour=&H00000000,Outline=2,Alignment=2'",
        escape_filter_path(srt)
    );

    let mut args = ffmpeg_prelude();
    args.extend([
        "-i".to_string(),
        video_in.display().to_string(),
        "-i".to_string(),
        audio_in.display().to_string(),
        "-vf".to_string(),
        filter,
        "-map".to_string(),
        "0:v".to_string(),
        "-map".to_string(),
        "1:a".to_string(),
    ]);
    args.extend(x264_args(fps));
    args.extend([
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        "192k".to_string(),
        "-shortest".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        video_out.display().to_string(),
    ]);

    run_cmd(&args).await?;
    Ok(video_out.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn filter_path_escaping() {
        let p = PathBuf::from("C:\\songs\\it's,here.srt");
        assert_eq!(escape_filter_path(&p), "C\\:/songs/it\\'s\\,here.srt");
    }

    #[test]
    fn plain_path_is_unchanged() {
        let p = PathBuf::from("./outputs/song_subtitles.srt");
        assert_eq!(escape_filter_path(&p), "./outputs/song_subtitles.srt");
    }

    #[test]
    fn normalize_filter_targets_full_hd() {
        let f = normalize_filter();
        assert!(f.starts_with("scale=1920:1080"));
        assert!(f.contains("pad=1920:1080"));
    }
}
