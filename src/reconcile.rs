use crate::error::PipelineError;
use crate::ffmpeg::MediaComposer;
use crate::job::{CombinedAsset, SceneClip};
use crate::{logi, logok};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone, PartialEq)]
pub struct PlanSegment {
    pub scene_index: usize,
    pub source_path: PathBuf,
    pub length: f64,
    pub looped: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    pub segments: Vec<PlanSegment>,
    pub target_duration: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Adjustment {
    None,
    Truncated { excess: f64 },
    Extended { shortfall: f64 },
}

impl ReconcilePlan {
    pub fn total_duration(&self) -> f64 {
        self.segments.iter().map(|s| s.length).sum()
    }

    pub fn scene_order(&self) -> Vec<usize> {
        let mut order: Vec<usize> = Vec::new();
        for seg in self.segments.iter().filter(|s| !s.looped) {
            if order.last() != Some(&seg.scene_index) {
                order.push(seg.scene_index);
            }
        }
        order
    }

    pub fn adjustment(&self, raw_duration: f64) -> Adjustment {
        let diff = raw_duration - self.target_duration;
        if self.segments.iter().any(|s| s.looped) {
            Adjustment::Extended { shortfall: -diff }
        } else if diff > 0.0 && self.total_duration() < raw_duration {
            Adjustment::Truncated { excess: diff }
        } else {
            Adjustment::None
        }
    }
}

pub fn plan(
    clips: &[SceneClip],
    target_duration: f64,
    tolerance: f64,
) -> Result<ReconcilePlan, PipelineError> {
    let mut ordered: Vec<&SceneClip> = clips.iter().filter(|c| c.duration > 0.0).collect();
    if ordered.is_empty() {
        return Err(PipelineError::Reconciliation(
            "all scenes failed, timed out, or were empty".to_string(),
        ));
    }
    if !target_duration.is_finite() || target_duration <= 0.0 {
        return Err(PipelineError::Reconciliation(format!(
            "invalid target duration {target_duration}"
        )));
    }
    ordered.sort_by_key(|c| c.scene_index);

    let raw: f64 = ordered.iter().map(|c| c.duration).sum();
    let mut segments = Vec::with_capacity(ordered.len() + 1);

    if (raw - target_duration).abs() < tolerance {
        for clip in &ordered {
            segments.push(whole(clip));
        }
    } else if raw > target_duration {
        let mut remaining = target_duration;
        for clip in &ordered {
            if remaining < tolerance {
                break;
            }
            let take = clip.duration.min(remaining);
            segments.push(PlanSegment {
                length: take,
                ..whole(clip)
            });
            remaining -= take;
        }
    } else {
        for clip in &ordered {
            segments.push(whole(clip));
        }
        let last = ordered[ordered.len() - 1];
        segments.push(PlanSegment {
            length: target_duration - raw,
            looped: true,
            ..whole(last)
        });
    }

    Ok(ReconcilePlan {
        segments,
        target_duration,
    })
}

fn whole(clip: &SceneClip) -> PlanSegment {
    PlanSegment {
        scene_index: clip.scene_index,
        source_path: clip.source_path.clone(),
        length: clip.duration,
        looped: false,
    }
}

/// Plans and renders the combined asset at `out_path`. Rendering goes to a temporary
/// sibling first; on any failure nothing is left at `out_path`.
pub async fn assemble(
    composer: &dyn MediaComposer,
    clips: &[SceneClip],
    target_duration: f64,
    fps: u32,
    out_path: &Path,
) -> Result<CombinedAsset, PipelineError> {
    let tolerance = 1.0 / fps.max(1) as f64;
    let plan = plan(clips, target_duration, tolerance)?;
    let raw: f64 = clips.iter().map(|c| c.duration.max(0.0)).sum();

    match plan.adjustment(raw) {
        Adjustment::None => logi(format!(
            "Concatenated {:.2}s matches target {:.2}s",
            raw, target_duration
        )),
        Adjustment::Truncated { excess } => logi(format!(
            "Concatenated {:.2}s exceeds target {:.2}s; dropping {:.2}s from the tail",
            raw, target_duration, excess
        )),
        Adjustment::Extended { shortfall } => logi(format!(
            "Concatenated {:.2}s is short of {:.2}s; looping last scene for {:.2}s",
            raw, target_duration, shortfall
        )),
    }

    let tmp_path = out_path.with_extension("partial.mp4");
    let _ = fs::remove_file(&tmp_path).await;

    if let Err(err) = composer.render_plan(&plan, &tmp_path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(PipelineError::Compose(format!("{err:#}")));
    }
    if let Err(err) = fs::rename(&tmp_path, out_path).await {
        let _ = fs::remove_file(&tmp_path).await;
        return Err(PipelineError::Compose(format!(
            "move into {}: {}",
            out_path.display(),
            err
        )));
    }

    logok(format!(
        "Combined asset: {} ({:.2}s, scenes {:?})",
        out_path.display(),
        plan.target_duration,
        plan.scene_order()
    ));

    Ok(CombinedAsset {
        path: out_path.to_path_buf(),
        duration: plan.total_duration(),
        scene_order: plan.scene_order(),
    })
}
