// src/api/http.rs
// reqwest-backed implementation of the podcast REST contract

use super::types::{
    ApiError, CancelTaskResponse, CreatePodcastRequest, CreatePodcastResponse, ErrorBody,
    GenerationTask, ListQuery, Podcast, PodcastPage, TaskAccepted,
};
use super::{PodcastApi, RequestContext, API_PREFIX};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const TIMEOUT_SECS: u64 = 30;
const USER_AGENT: &str = concat!("fionntan/", env!("CARGO_PKG_VERSION"));

pub struct HttpPodcastApi {
    base_url: String,
    client: Client,
}

impl HttpPodcastApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();

        let base_url = base_url.into().trim_end_matches('/').to_string();
        tracing::info!("HTTP podcast API initialized: {}", base_url);

        Self { base_url, client }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn authorize(&self, ctx: &RequestContext) -> Result<(), ApiError> {
        if ctx.is_expired(Utc::now()) {
            return Err(ApiError::TokenExpired);
        }
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        path: &str,
    ) -> Result<T, ApiError> {
        self.authorize(ctx)?;
        let url = self.endpoint(path);
        tracing::debug!("GET {}", url);

        let response = ctx
            .apply(self.client.get(&url))
            .send()
            .await
            .map_err(map_transport_error)?;
        decode(response, path).await
    }

    async fn post_json<T: DeserializeOwned, B: serde::Serialize + ?Sized>(
        &self,
        ctx: &RequestContext,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        self.authorize(ctx)?;
        let url = self.endpoint(path);
        tracing::debug!("POST {}", url);

        let mut request = ctx.apply(self.client.post(&url));
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(map_transport_error)?;
        decode(response, path).await
    }
}

fn map_transport_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(err.to_string())
    }
}

async fn error_from_response(response: Response, path: &str) -> ApiError {
    let status = response.status();
    let raw = response.text().await.unwrap_or_default();
    classify_error(status, &raw, path)
}

/// Maps an error response to [`ApiError`]. The backend repeats the status in
/// its JSON body; that code wins when a proxy rewrote the HTTP status.
fn classify_error(status: StatusCode, raw: &str, path: &str) -> ApiError {
    let (status, message) = match serde_json::from_str::<ErrorBody>(raw) {
        Ok(body) => {
            let status = body
                .status_code
                .and_then(|code| StatusCode::from_u16(code).ok())
                .filter(|code| code.is_client_error() || code.is_server_error())
                .unwrap_or(status);
            (status, body.message_text())
        }
        Err(_) => (status, raw.to_string()),
    };

    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
        StatusCode::NOT_FOUND => ApiError::NotFound(if message.is_empty() {
            path.to_string()
        } else {
            message
        }),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

async fn decode<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ApiError> {
    if !response.status().is_success() {
        let err = error_from_response(response, path).await;
        tracing::warn!("Request {} failed: {}", path, err);
        return Err(err);
    }

    response
        .json::<T>()
        .await
        .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", path, e)))
}

#[async_trait]
impl PodcastApi for HttpPodcastApi {
    async fn get_podcast(
        &self,
        ctx: &RequestContext,
        podcast_id: i64,
    ) -> Result<Podcast, ApiError> {
        self.get_json(ctx, &format!("/podcasts/{}", podcast_id)).await
    }

    async fn get_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
    ) -> Result<GenerationTask, ApiError> {
        self.get_json(ctx, &format!("/tasks/{}", task_id)).await
    }

    async fn list_podcasts(
        &self,
        ctx: &RequestContext,
        query: &ListQuery,
    ) -> Result<PodcastPage, ApiError> {
        self.authorize(ctx)?;
        let url = self.endpoint("/podcasts");
        tracing::debug!("GET {} {:?}", url, query);

        let response = ctx
            .apply(self.client.get(&url).query(query))
            .send()
            .await
            .map_err(map_transport_error)?;
        decode(response, "/podcasts").await
    }

    async fn create_podcast(
        &self,
        ctx: &RequestContext,
        request: &CreatePodcastRequest,
    ) -> Result<CreatePodcastResponse, ApiError> {
        request.validate()?;
        let created: CreatePodcastResponse =
            self.post_json(ctx, "/podcasts", Some(request)).await?;
        tracing::info!(
            "Podcast {} created, task {} ({:?})",
            created.podcast_id,
            created.task_id,
            created.status
        );
        Ok(created)
    }

    async fn cancel_task(
        &self,
        ctx: &RequestContext,
        task_id: &str,
    ) -> Result<CancelTaskResponse, ApiError> {
        self.post_json::<_, ()>(ctx, &format!("/tasks/{}/cancel", task_id), None)
            .await
    }

    async fn regenerate_audio(
        &self,
        ctx: &RequestContext,
        podcast_id: i64,
    ) -> Result<TaskAccepted, ApiError> {
        self.post_json::<_, ()>(
            ctx,
            &format!("/podcasts/{}/regenerate-audio", podcast_id),
            None,
        )
        .await
    }

    async fn download_audio(
        &self,
        ctx: &RequestContext,
        podcast_id: i64,
        dest: &Path,
    ) -> Result<u64, ApiError> {
        self.authorize(ctx)?;
        let path = format!("/podcasts/{}/audio", podcast_id);
        let url = self.endpoint(&path);
        tracing::info!("Downloading {} to {}", url, dest.display());

        let mut response = ctx
            .apply(self.client.get(&url))
            .send()
            .await
            .map_err(map_transport_error)?;

        if !response.status().is_success() {
            return Err(error_from_response(response, &path).await);
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .map_err(|e| ApiError::Io(e.to_string()))?;
        let mut written = 0u64;

        while let Some(chunk) = response.chunk().await.map_err(map_transport_error)? {
            file.write_all(&chunk)
                .await
                .map_err(|e| ApiError::Io(e.to_string()))?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(|e| ApiError::Io(e.to_string()))?;

        tracing::info!("Downloaded {} bytes", written);
        Ok(written)
    }

    fn audio_stream_url(&self, podcast_id: i64) -> String {
        super::audio_stream_url(&self.base_url, podcast_id)
    }
}
