use std::time::Duration;

/// Failure of a single scene. These never abort the pipeline on their own; the scene is
/// dropped and assembly continues with the rest.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("submission rejected for scene {scene}: {reason}")]
    Submission { scene: usize, reason: String },

    #[error("scene {scene} did not finish within {}s", .timeout.as_secs())]
    PollTimeout { scene: usize, timeout: Duration },

    #[error("remote job for scene {scene} failed: {reason}")]
    RemoteJobFailed { scene: usize, reason: String },

    #[error("download failed for scene {scene}: {reason}")]
    Download { scene: usize, reason: String },

    #[error("scene {scene} cancelled")]
    Cancelled { scene: usize },
}

impl SceneError {
    pub fn scene(&self) -> usize {
        match self {
            SceneError::Submission { scene, .. }
            | SceneError::PollTimeout { scene, .. }
            | SceneError::RemoteJobFailed { scene, .. }
            | SceneError::Download { scene, .. }
            | SceneError::Cancelled { scene } => *scene,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("reconciliation failed: {0}")]
    Reconciliation(String),

    #[error("composition failed: {0}")]
    Compose(String),

    #[error("scene generation cancelled")]
    Cancelled,
}
