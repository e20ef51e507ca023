// src/api/mod.rs
// REST contract consumer for the Fionntán backend

mod context;
mod http;
mod types;

pub use context::RequestContext;
pub use http::HttpPodcastApi;
pub use types::{
    is_arxiv_id, ApiError, AudioAsset, CancelTaskResponse, CreatePodcastRequest,
    CreatePodcastResponse, GenerationTask, ListQuery, Podcast, PodcastPage, PodcastScript,
    PodcastStatus, ScriptContent, ScriptSection, ScriptSegment, TaskAccepted, TaskStatus,
    TaskType, TechnicalLevel, DEFAULT_TARGET_LENGTH, MAX_TARGET_LENGTH, MIN_TARGET_LENGTH,
};

use async_trait::async_trait;
use std::path::Path;

pub const API_PREFIX: &str = "/api/v1";

/// Backend operations consumed by the tracker, the player and the CLI.
///
/// Every call takes the request context explicitly.
#[async_trait]
pub trait PodcastApi: Send + Sync {
    async fn get_podcast(&self, ctx: &RequestContext, podcast_id: i64)
        -> Result<Podcast, ApiError>;

    async fn get_task(&self, ctx: &RequestContext, task_id: &str)
        -> Result<GenerationTask, ApiError>;

    async fn list_podcasts(
        &self,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> Result<PodcastPage, ApiError>;

    async fn create_podcast(
        &self,
        ctx: &RequestContext,
        request: &CreatePodcastRequest,
    ) -> Result<CreatePodcastResponse, ApiError>;

    async fn cancel_task(&self, ctx: &RequestContext, task_id: &str)
        -> Result<CancelTaskResponse, ApiError>;

    async fn regenerate_audio(&self, ctx: &RequestContext, podcast_id: i64)
        -> Result<TaskAccepted, ApiError>;

    /// Writes the downloadable audio file to `dest`, returning the byte count.
    async fn download_audio(
        &self,
        ctx: &RequestContext,
        podcast_id: i64,
        dest: &Path,
    ) -> Result<u64, ApiError>;

    /// URL handed to the audio engine for streaming playback.
    fn audio_stream_url(&self, podcast_id: i64) -> String;
}

/// `{base}/api/v1/podcasts/{id}/audio?stream=true`
pub fn audio_stream_url(base_url: &str, podcast_id: i64) -> String {
    format!(
        "{}{}/podcasts/{}/audio?stream=true",
        base_url.trim_end_matches('/'),
        API_PREFIX,
        podcast_id
    )
}
