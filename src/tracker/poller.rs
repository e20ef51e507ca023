use super::metrics::{PODCAST_ENDPOINT, TASK_ENDPOINT};
use super::progress::TrackerSnapshot;
use super::GenerationStatusTracker;
use crate::api::{PodcastApi, RequestContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Cadence existing backends expect for `GET /tasks/{id}`.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(5000);

/// One poll tick: podcast first, then its latest task while still running.
///
/// Returns whether another tick should be scheduled. Never issues a task
/// request once a terminal podcast status has been observed.
pub async fn poll_once(
    api: &dyn PodcastApi,
    ctx: &RequestContext,
    tracker: &mut GenerationStatusTracker,
) -> bool {
    let podcast_id = tracker.podcast_id();

    match api.get_podcast(ctx, podcast_id).await {
        Ok(podcast) => match podcast.check_invariants() {
            Ok(()) => tracker.apply_podcast(podcast),
            Err(e) => {
                tracing::warn!("Poller: podcast {} inconsistent: {}", podcast_id, e);
                tracker.record_fetch_error(PODCAST_ENDPOINT, &e);
                return tracker.should_poll();
            }
        },
        Err(e) => {
            tracing::warn!("Poller: podcast {} fetch failed: {}", podcast_id, e);
            tracker.record_fetch_error(PODCAST_ENDPOINT, &e);
            return tracker.should_poll();
        }
    }

    if !tracker.should_poll() {
        return false;
    }

    if let Some(task_id) = tracker.current_task_id().map(str::to_string) {
        match api.get_task(ctx, &task_id).await {
            Ok(task) => tracker.apply_task(task),
            Err(e) => {
                tracing::warn!("Poller: task {} fetch failed: {}", task_id, e);
                tracker.record_fetch_error(TASK_ENDPOINT, &e);
            }
        }
    }

    tracker.should_poll()
}

/// A running poll loop bound to one podcast. Dropping the handle aborts the loop.
pub struct PollHandle {
    podcast_id: i64,
    task: JoinHandle<()>,
    updates: watch::Receiver<TrackerSnapshot>,
}

impl PollHandle {
    pub fn spawn(
        api: Arc<dyn PodcastApi>,
        ctx: RequestContext,
        podcast_id: i64,
        initial_task: Option<String>,
        interval: Duration,
    ) -> Self {
        let (tx, updates) = watch::channel(TrackerSnapshot::initial(podcast_id));

        let task = tokio::spawn(async move {
            tracing::info!(
                "Poller: tracking podcast {} every {}ms",
                podcast_id,
                interval.as_millis()
            );

            let mut tracker = GenerationStatusTracker::new(podcast_id);
            if let Some(task_id) = initial_task {
                tracker.seed_task(task_id);
            }
            let mut ticker = tokio::time::interval(interval);
            // The fetch is awaited inline, so a slow request delays the next
            // tick instead of overlapping with it.
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let keep_polling = poll_once(api.as_ref(), &ctx, &mut tracker).await;
                if !keep_polling {
                    tracker.finish();
                }
                tx.send_replace(tracker.snapshot().clone());
                if !keep_polling {
                    break;
                }
            }

            tracing::info!(
                "Poller: stopped for podcast {} (status {:?})",
                podcast_id,
                tracker.snapshot().status
            );
        });

        Self {
            podcast_id,
            task,
            updates,
        }
    }

    pub fn podcast_id(&self) -> i64 {
        self.podcast_id
    }

    pub fn latest(&self) -> TrackerSnapshot {
        self.updates.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<TrackerSnapshot> {
        self.updates.clone()
    }

    /// Next snapshot; `None` once the loop has finished and everything was seen.
    pub async fn changed(&mut self) -> Option<TrackerSnapshot> {
        self.updates.changed().await.ok()?;
        Some(self.updates.borrow_and_update().clone())
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            tracing::debug!("Poller: cancelling podcast {}", self.podcast_id);
        }
        self.task.abort();
    }
}

/// Owns at most one poll loop and rebinds it when the tracked podcast changes.
pub struct StatusPoller {
    api: Arc<dyn PodcastApi>,
    ctx: RequestContext,
    interval: Duration,
    current: Option<PollHandle>,
}

impl StatusPoller {
    pub fn new(api: Arc<dyn PodcastApi>, ctx: RequestContext, interval: Duration) -> Self {
        Self {
            api,
            ctx,
            interval,
            current: None,
        }
    }

    /// Starts tracking `podcast_id`, cancelling any loop bound to another podcast.
    pub fn track(&mut self, podcast_id: i64) -> &mut PollHandle {
        self.track_with_task(podcast_id, None)
    }

    /// Like [`track`](Self::track), seeding the task to poll when the loop starts.
    pub fn track_with_task(
        &mut self,
        podcast_id: i64,
        task_id: Option<String>,
    ) -> &mut PollHandle {
        let same = self
            .current
            .as_ref()
            .is_some_and(|handle| handle.podcast_id() == podcast_id);

        if !same {
            // Abort the previous loop before the replacement starts.
            self.current = None;
        }

        let (api, ctx, interval) = (&self.api, &self.ctx, self.interval);
        self.current.get_or_insert_with(|| {
            PollHandle::spawn(api.clone(), ctx.clone(), podcast_id, task_id, interval)
        })
    }

    pub fn current(&self) -> Option<&PollHandle> {
        self.current.as_ref()
    }

    pub fn current_mut(&mut self) -> Option<&mut PollHandle> {
        self.current.as_mut()
    }

    pub fn stop(&mut self) {
        self.current = None;
    }
}
