#![allow(dead_code)]

use async_trait::async_trait;
use fionntan_lib::api::{
    ApiError, AudioAsset, CancelTaskResponse, CreatePodcastRequest, CreatePodcastResponse,
    GenerationTask, ListQuery, Podcast, PodcastApi, PodcastPage, PodcastScript, PodcastStatus,
    RequestContext, ScriptContent, ScriptSection, ScriptSegment, TaskAccepted, TaskStatus,
    TaskType, TechnicalLevel,
};
use fionntan_lib::player::{
    AudioBackend, AudioEngine, EngineEvent, EventSender, PlayerError,
};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;

pub fn task(id: &str, task_type: TaskType, progress: u8) -> GenerationTask {
    GenerationTask {
        task_id: id.to_string(),
        task_type,
        status: TaskStatus::Processing,
        progress,
        estimated_time_remaining: None,
        error_message: None,
    }
}

pub fn podcast(id: i64, status: PodcastStatus, tasks: Vec<GenerationTask>) -> Podcast {
    Podcast {
        id,
        title: format!("Podcast {}", id),
        status,
        created_at: None,
        completed_at: None,
        technical_level: TechnicalLevel::Intermediate,
        target_length_minutes: 15,
        error_message: None,
        tasks,
        script: None,
        audio: None,
    }
}

pub fn completed(id: i64, duration: f64) -> Podcast {
    let mut podcast = podcast(
        id,
        PodcastStatus::Completed,
        vec![task("audio-1", TaskType::AudioGeneration, 100)],
    );
    podcast.audio = Some(AudioAsset {
        url: format!("/api/v1/podcasts/{}/audio", id),
        duration_seconds: Some(duration),
        file_size_bytes: Some(1_024_000),
        audio_format: Some("mp3".to_string()),
    });
    podcast
}

pub fn script(sections: &[(&str, usize)]) -> PodcastScript {
    PodcastScript {
        paper_ids: vec!["2301.00001".to_string()],
        script_content: Some(ScriptContent {
            title: Some("Episode".to_string()),
            sections: sections
                .iter()
                .map(|(title, words)| ScriptSection {
                    title: title.to_string(),
                    segments: vec![ScriptSegment {
                        speaker: "host".to_string(),
                        text: vec!["word"; *words].join(" "),
                    }],
                })
                .collect(),
        }),
    }
}

#[derive(Default)]
struct FakeState {
    podcasts: HashMap<i64, VecDeque<Result<Podcast, ApiError>>>,
    tasks: HashMap<String, GenerationTask>,
    calls: Vec<String>,
    podcast_fetch_times: Vec<Instant>,
    created: Vec<CreatePodcastRequest>,
    next_podcast_id: i64,
}

/// Scripted backend. Each podcast id answers from its queue in order and keeps
/// repeating the last answer.
#[derive(Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

impl FakeApi {
    pub fn new() -> Self {
        let api = Self::default();
        api.state.lock().unwrap().next_podcast_id = 42;
        api
    }

    pub fn script_podcast(&self, id: i64, responses: Vec<Result<Podcast, ApiError>>) {
        let mut state = self.state.lock().unwrap();
        for podcast in responses.iter().flatten() {
            for task in &podcast.tasks {
                state
                    .tasks
                    .entry(task.task_id.clone())
                    .or_insert_with(|| task.clone());
            }
        }
        state.podcasts.insert(id, responses.into());
    }

    pub fn set_task(&self, task: GenerationTask) {
        self.state
            .lock()
            .unwrap()
            .tasks
            .insert(task.task_id.clone(), task);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    pub fn podcast_fetch_times(&self) -> Vec<Instant> {
        self.state.lock().unwrap().podcast_fetch_times.clone()
    }

    pub fn created(&self) -> Vec<CreatePodcastRequest> {
        self.state.lock().unwrap().created.clone()
    }
}

#[async_trait]
impl PodcastApi for FakeApi {
    async fn get_podcast(
        &self,
        _ctx: &RequestContext,
        podcast_id: i64,
    ) -> Result<Podcast, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("GET /podcasts/{}", podcast_id));
        state.podcast_fetch_times.push(Instant::now());

        let queue = state
            .podcasts
            .get_mut(&podcast_id)
            .ok_or_else(|| ApiError::NotFound(format!("podcast {}", podcast_id)))?;
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(Err(ApiError::Timeout))
        } else {
            queue.front().cloned().unwrap_or(Err(ApiError::Timeout))
        }
    }

    async fn get_task(
        &self,
        _ctx: &RequestContext,
        task_id: &str,
    ) -> Result<GenerationTask, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("GET /tasks/{}", task_id));
        state
            .tasks
            .get(task_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("task {}", task_id)))
    }

    async fn list_podcasts(
        &self,
        _ctx: &RequestContext,
        query: &ListQuery,
    ) -> Result<PodcastPage, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push("GET /podcasts".to_string());
        let podcasts: Vec<Podcast> = state
            .podcasts
            .values()
            .filter_map(|queue| queue.front().and_then(|r| r.clone().ok()))
            .filter(|p| query.status.map_or(true, |s| p.status == s))
            .collect();
        Ok(PodcastPage {
            total: podcasts.len() as u64,
            podcasts,
            page: query.page.unwrap_or(1),
            pages: 1,
        })
    }

    async fn create_podcast(
        &self,
        _ctx: &RequestContext,
        request: &CreatePodcastRequest,
    ) -> Result<CreatePodcastResponse, ApiError> {
        request.validate()?;
        let mut state = self.state.lock().unwrap();
        state.calls.push("POST /podcasts".to_string());
        state.created.push(request.clone());
        let podcast_id = state.next_podcast_id;
        state.next_podcast_id += 1;
        Ok(CreatePodcastResponse {
            podcast_id,
            task_id: format!("script-{}", podcast_id),
            status: TaskStatus::Queued,
            created_at: None,
        })
    }

    async fn cancel_task(
        &self,
        _ctx: &RequestContext,
        task_id: &str,
    ) -> Result<CancelTaskResponse, ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(format!("POST /tasks/{}/cancel", task_id));
        Ok(CancelTaskResponse {
            message: "Task cancelled successfully".to_string(),
            task_id: task_id.to_string(),
        })
    }

    async fn regenerate_audio(
        &self,
        _ctx: &RequestContext,
        podcast_id: i64,
    ) -> Result<TaskAccepted, ApiError> {
        let mut state = self.state.lock().unwrap();
        state
            .calls
            .push(format!("POST /podcasts/{}/regenerate-audio", podcast_id));
        Ok(TaskAccepted {
            task_id: format!("audio-{}", podcast_id),
            status: TaskStatus::Queued,
            created_at: None,
        })
    }

    async fn download_audio(
        &self,
        _ctx: &RequestContext,
        podcast_id: i64,
        dest: &Path,
    ) -> Result<u64, ApiError> {
        self.state
            .lock()
            .unwrap()
            .calls
            .push(format!("GET /podcasts/{}/audio", podcast_id));
        let bytes = b"ID3fake-audio";
        std::fs::write(dest, bytes).map_err(|e| ApiError::Io(e.to_string()))?;
        Ok(bytes.len() as u64)
    }

    fn audio_stream_url(&self, podcast_id: i64) -> String {
        format!("memory://podcasts/{}/audio", podcast_id)
    }
}

#[derive(Default)]
pub struct BackendLog {
    pub events: Vec<String>,
    pub senders: Vec<EventSender>,
}

/// Records engine acquire/release and keeps every instance's sender so tests
/// can emit events, including from released instances.
#[derive(Clone, Default)]
pub struct FakeBackend {
    log: Arc<Mutex<BackendLog>>,
}

impl FakeBackend {
    pub fn events(&self) -> Vec<String> {
        self.log.lock().unwrap().events.clone()
    }

    pub fn opened(&self) -> usize {
        self.log.lock().unwrap().senders.len()
    }

    /// Emits `event` as engine number `instance` (1-based, in open order).
    pub fn emit(&self, instance: usize, event: EngineEvent) -> bool {
        let log = self.log.lock().unwrap();
        log.senders[instance - 1].emit(event)
    }
}

impl AudioBackend for FakeBackend {
    fn open(
        &mut self,
        url: &str,
        events: EventSender,
    ) -> Result<Box<dyn AudioEngine>, PlayerError> {
        let mut log = self.log.lock().unwrap();
        log.senders.push(events);
        let instance = log.senders.len();
        log.events.push(format!("open {} {}", instance, url));
        Ok(Box::new(FakeEngine {
            instance,
            log: self.log.clone(),
        }))
    }
}

struct FakeEngine {
    instance: usize,
    log: Arc<Mutex<BackendLog>>,
}

impl FakeEngine {
    fn record(&self, what: &str) {
        self.log
            .lock()
            .unwrap()
            .events
            .push(format!("{} {}", what, self.instance));
    }
}

impl AudioEngine for FakeEngine {
    fn play(&mut self) -> Result<(), PlayerError> {
        self.record("play");
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.record("pause");
        Ok(())
    }

    fn seek(&mut self, _seconds: f64) -> Result<(), PlayerError> {
        self.record("seek");
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn set_playback_rate(&mut self, _rate: f32) {}

    fn destroy(&mut self) {
        self.record("destroy");
    }
}
