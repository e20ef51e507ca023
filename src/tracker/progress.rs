use super::metrics::PollMetrics;
use super::stage::{compute_stage_index, render_pipeline, step_states, Stage, StepState};
use crate::api::{Podcast, PodcastStatus, TaskType};
use serde::Serialize;

/// What the progress display renders for one podcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub podcast_id: i64,
    pub status: Option<PodcastStatus>,
    pub stage: Stage,
    pub stage_index: usize,
    pub steps: [StepState; 5],
    pub has_error: bool,
    pub task_id: Option<String>,
    pub task_type: Option<TaskType>,
    pub progress: u8,
    pub estimated_time_remaining: Option<u64>,
    /// Transient fetch failure from the latest poll, cleared on the next success.
    pub fetch_error: Option<String>,
    /// Set when the backend rejected our credentials; polling has stopped.
    pub auth_required: bool,
    pub polling: bool,
    #[serde(skip)]
    pub podcast: Option<Podcast>,
    #[serde(skip)]
    pub metrics: PollMetrics,
}

impl TrackerSnapshot {
    pub fn initial(podcast_id: i64) -> Self {
        Self {
            podcast_id,
            status: None,
            stage: Stage::Upload,
            stage_index: compute_stage_index(Stage::Upload),
            steps: step_states(Stage::Upload, false),
            has_error: false,
            task_id: None,
            task_type: None,
            progress: 0,
            estimated_time_remaining: None,
            fetch_error: None,
            auth_required: false,
            polling: true,
            podcast: None,
            metrics: PollMetrics::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_some_and(PodcastStatus::is_terminal)
    }

    pub fn is_completed(&self) -> bool {
        self.status == Some(PodcastStatus::Completed)
    }

    pub fn pipeline(&self) -> String {
        render_pipeline(self.stage, self.has_error)
    }
}
