use crate::api::{ApiError, GenerationTask, Podcast};

pub mod metrics;
pub mod poller;
pub mod progress;
pub mod stage;

pub use metrics::{PollMetrics, PODCAST_ENDPOINT, TASK_ENDPOINT};
pub use poller::{poll_once, PollHandle, StatusPoller, DEFAULT_POLL_INTERVAL};
pub use progress::TrackerSnapshot;
pub use stage::{compute_stage_index, map_stage, render_pipeline, step_states, Stage, StepState, STAGES};

/// Generation progress for a single podcast.
///
/// Pure state: the poller feeds it fetch results, it decides the stage and
/// whether another poll is warranted. The stage never moves backwards for the
/// same task; a new task id resets that floor.
pub struct GenerationStatusTracker {
    snapshot: TrackerSnapshot,
    fresh_task: bool,
}

impl GenerationStatusTracker {
    pub fn new(podcast_id: i64) -> Self {
        Self {
            snapshot: TrackerSnapshot::initial(podcast_id),
            fresh_task: true,
        }
    }

    pub fn podcast_id(&self) -> i64 {
        self.snapshot.podcast_id
    }

    pub fn snapshot(&self) -> &TrackerSnapshot {
        &self.snapshot
    }

    pub fn current_task_id(&self) -> Option<&str> {
        self.snapshot.task_id.as_deref()
    }

    /// Task to poll before the podcast payload names one, e.g. the id returned
    /// by the create call. Podcast payloads without `tasks` rely on this.
    pub fn seed_task(&mut self, task_id: impl Into<String>) {
        if self.snapshot.task_id.is_none() {
            self.snapshot.task_id = Some(task_id.into());
        }
    }

    pub fn apply_podcast(&mut self, podcast: Podcast) {
        self.snapshot.metrics.record_success(PODCAST_ENDPOINT);
        self.snapshot.fetch_error = None;
        self.snapshot.status = Some(podcast.status);
        if let Some(task) = podcast.latest_task() {
            self.observe_task(task);
        }
        self.snapshot.podcast = Some(podcast);
        self.recompute();
    }

    pub fn apply_task(&mut self, task: GenerationTask) {
        self.snapshot.metrics.record_success(TASK_ENDPOINT);
        self.snapshot.fetch_error = None;
        self.observe_task(&task);
        self.recompute();
    }

    /// A failed fetch never changes the podcast status; it is displayed until
    /// the next successful poll. Credential failures stop polling.
    pub fn record_fetch_error(&mut self, endpoint: &str, error: &ApiError) {
        self.snapshot.metrics.record_failure(endpoint);
        self.snapshot.fetch_error = Some(error.to_string());
        if error.is_auth() {
            self.snapshot.auth_required = true;
            self.snapshot.polling = false;
        }
    }

    pub fn should_poll(&self) -> bool {
        self.snapshot.polling && !self.snapshot.auth_required && !self.snapshot.is_terminal()
    }

    pub fn finish(&mut self) {
        self.snapshot.polling = false;
    }

    fn observe_task(&mut self, task: &GenerationTask) {
        if self.snapshot.task_id.as_deref() != Some(task.task_id.as_str()) {
            tracing::debug!(
                "Tracker: podcast {} now on task {} ({:?})",
                self.snapshot.podcast_id,
                task.task_id,
                task.task_type
            );
            self.snapshot.task_id = Some(task.task_id.clone());
            self.fresh_task = true;
        }
        self.snapshot.task_type = Some(task.task_type);
        self.snapshot.progress = task.progress_percent();
        self.snapshot.estimated_time_remaining = task.estimated_time_remaining;
    }

    fn recompute(&mut self) {
        let Some(status) = self.snapshot.status else {
            return;
        };

        match map_stage(status, self.snapshot.task_type, self.snapshot.progress) {
            Some(stage) => {
                let next = if !self.fresh_task && stage < self.snapshot.stage {
                    self.snapshot.stage
                } else {
                    stage
                };
                self.fresh_task = false;
                self.snapshot.has_error = false;
                self.set_stage(next);
            }
            None => {
                self.snapshot.has_error = true;
                self.set_stage(self.snapshot.stage);
            }
        }

        if status.is_terminal() {
            self.snapshot.polling = false;
        }
    }

    fn set_stage(&mut self, stage: Stage) {
        if stage != self.snapshot.stage {
            tracing::info!(
                "Tracker: podcast {} stage {:?} -> {:?}",
                self.snapshot.podcast_id,
                self.snapshot.stage,
                stage
            );
        }
        self.snapshot.stage = stage;
        self.snapshot.stage_index = compute_stage_index(stage);
        self.snapshot.steps = step_states(stage, self.snapshot.has_error);
    }
}
