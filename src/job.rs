use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Completed,
    Failed,
    TimedOut,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub prompt: String,
    pub scene_index: usize,
    pub remote_task_id: Option<String>,
    pub status: JobStatus,
    pub result_location: Option<String>,
    pub error: Option<String>,
}

impl GenerationJob {
    pub fn submitted(prompt: &str, scene_index: usize, task_id: String) -> Self {
        Self {
            prompt: prompt.to_string(),
            scene_index,
            remote_task_id: Some(task_id),
            status: JobStatus::Pending,
            result_location: None,
            error: None,
        }
    }

    pub fn rejected(prompt: &str, scene_index: usize, reason: String) -> Self {
        Self {
            prompt: prompt.to_string(),
            scene_index,
            remote_task_id: None,
            status: JobStatus::Failed,
            result_location: None,
            error: Some(reason),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status != JobStatus::Pending
    }

    // Transitions out of Pending happen once; later calls are no-ops.

    pub fn mark_completed(&mut self, url: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed;
        self.result_location = Some(url);
        true
    }

    pub fn mark_failed(&mut self, reason: String) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed;
        self.error = Some(reason);
        true
    }

    pub fn mark_timed_out(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::TimedOut;
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneClip {
    pub scene_index: usize,
    pub source_path: PathBuf,
    pub duration: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedAsset {
    pub path: PathBuf,
    pub duration: f64,
    pub scene_order: Vec<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completed_job_is_terminal() {
        let mut job = GenerationJob::submitted("A", 0, "task-1".to_string());
        assert!(!job.is_terminal());
        assert!(job.mark_completed("https://cdn/a.mp4".to_string()));
        assert!(job.is_terminal());
        assert!(!job.mark_failed("late".to_string()));
        assert!(!job.mark_timed_out());
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.error, None);
    }

    #[test]
    fn rejected_job_has_no_task_id() {
        let job = GenerationJob::rejected("B", 1, "HTTP 500".to_string());
        assert_eq!(job.status, JobStatus::Failed);
        assert!(job.remote_task_id.is_none());
        assert_eq!(job.error.as_deref(), Some("HTTP 500"));
    }

    #[test]
    fn status_serializes_snake_case() {
        let text = serde_json::to_string(&JobStatus::TimedOut).unwrap();
        assert_eq!(text, "\"timed_out\"");
    }
}
