// src/api/types.rs
// Wire types for the Fionntán REST contract and the client error taxonomy

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use thiserror::Error;

pub const MIN_TARGET_LENGTH: u32 = 5;
pub const MAX_TARGET_LENGTH: u32 = 60;
pub const DEFAULT_TARGET_LENGTH: u32 = 15;

/// Overall podcast status as reported by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodcastStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PodcastStatus {
    /// Terminal statuses never change again and stop polling.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PodcastStatus::Completed | PodcastStatus::Failed | PodcastStatus::Cancelled
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PodcastStatus::Pending => "pending",
            PodcastStatus::Processing => "processing",
            PodcastStatus::Completed => "completed",
            PodcastStatus::Failed => "failed",
            PodcastStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    ScriptGeneration,
    AudioGeneration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Queued,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalLevel {
    Beginner,
    #[default]
    Intermediate,
    Advanced,
}

impl TechnicalLevel {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "beginner" => Some(TechnicalLevel::Beginner),
            "intermediate" => Some(TechnicalLevel::Intermediate),
            "advanced" => Some(TechnicalLevel::Advanced),
            _ => None,
        }
    }
}

/// One backend unit of generation work
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationTask {
    pub task_id: String,
    pub task_type: TaskType,
    #[serde(default = "default_task_status")]
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: u8,
    #[serde(default, alias = "estimated_time")]
    pub estimated_time_remaining: Option<u64>,
    #[serde(default)]
    pub error_message: Option<String>,
}

fn default_task_status() -> TaskStatus {
    TaskStatus::Queued
}

impl GenerationTask {
    /// Progress clamped to 0-100 regardless of what the backend sent.
    pub fn progress_percent(&self) -> u8 {
        self.progress.min(100)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioAsset {
    #[serde(rename = "file_url", alias = "url")]
    pub url: String,
    #[serde(rename = "duration", alias = "duration_seconds", default)]
    pub duration_seconds: Option<f64>,
    #[serde(rename = "file_size", alias = "file_size_bytes", default)]
    pub file_size_bytes: Option<u64>,
    #[serde(default)]
    pub audio_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSegment {
    #[serde(default)]
    pub speaker: String,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptSection {
    pub title: String,
    #[serde(default)]
    pub segments: Vec<ScriptSegment>,
}

impl ScriptSection {
    pub fn word_count(&self) -> usize {
        self.segments
            .iter()
            .map(|segment| segment.text.split_whitespace().count())
            .sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptContent {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sections: Vec<ScriptSection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodcastScript {
    #[serde(default)]
    pub script_content: Option<ScriptContent>,
    #[serde(default)]
    pub paper_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Podcast {
    pub id: i64,
    pub title: String,
    pub status: PodcastStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub technical_level: TechnicalLevel,
    #[serde(rename = "target_length", default = "default_target_length")]
    pub target_length_minutes: u32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub tasks: Vec<GenerationTask>,
    #[serde(default)]
    pub script: Option<PodcastScript>,
    #[serde(default)]
    pub audio: Option<AudioAsset>,
}

fn default_target_length() -> u32 {
    DEFAULT_TARGET_LENGTH
}

impl Podcast {
    /// Most recent generation task, if any.
    pub fn latest_task(&self) -> Option<&GenerationTask> {
        self.tasks.last()
    }

    pub fn script_content(&self) -> Option<&ScriptContent> {
        self.script.as_ref().and_then(|s| s.script_content.as_ref())
    }

    /// Audio is present if and only if the podcast is completed.
    pub fn check_invariants(&self) -> Result<(), ApiError> {
        match (self.status, self.audio.is_some()) {
            (PodcastStatus::Completed, false) => Err(ApiError::InvalidResponse(format!(
                "podcast {} is completed but has no audio",
                self.id
            ))),
            (status, true) if status != PodcastStatus::Completed => {
                Err(ApiError::InvalidResponse(format!(
                    "podcast {} has audio while {}",
                    self.id,
                    status.as_str()
                )))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastPage {
    pub podcasts: Vec<Podcast>,
    pub total: u64,
    pub page: u32,
    pub pages: u32,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PodcastStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreatePodcastRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub technical_level: TechnicalLevel,
    pub target_length: u32,
    pub use_preferences: bool,
    pub paper_ids: Vec<String>,
}

impl Default for CreatePodcastRequest {
    fn default() -> Self {
        Self {
            title: None,
            technical_level: TechnicalLevel::Intermediate,
            target_length: DEFAULT_TARGET_LENGTH,
            use_preferences: true,
            paper_ids: Vec::new(),
        }
    }
}

impl CreatePodcastRequest {
    /// Mirrors the backend schema so obviously bad requests never leave the client.
    pub fn validate(&self) -> Result<(), ApiError> {
        if !(MIN_TARGET_LENGTH..=MAX_TARGET_LENGTH).contains(&self.target_length) {
            return Err(ApiError::InvalidRequest(format!(
                "target_length must be between {} and {} minutes",
                MIN_TARGET_LENGTH, MAX_TARGET_LENGTH
            )));
        }

        if !self.use_preferences && self.paper_ids.is_empty() {
            return Err(ApiError::InvalidRequest(
                "If not using preferences, paper_ids must be provided.".to_string(),
            ));
        }

        if let Some(bad) = self.paper_ids.iter().find(|id| !is_arxiv_id(id)) {
            return Err(ApiError::InvalidRequest(format!(
                "'{}' is not an arXiv identifier",
                bad
            )));
        }

        Ok(())
    }
}

/// Accepts `2301.00001`, `2301.00001v2` and old-style `hep-th/9901001`.
pub fn is_arxiv_id(input: &str) -> bool {
    static ARXIV_RE: OnceLock<Regex> = OnceLock::new();
    let re = ARXIV_RE.get_or_init(|| {
        Regex::new(r"^(\d{4}\.\d{4,5}|[a-z][a-z\-]*(\.[A-Z]{2})?/\d{7})(v\d+)?$")
            .expect("valid arXiv id regex")
    });
    re.is_match(input.trim())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePodcastResponse {
    pub podcast_id: i64,
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskAccepted {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelTaskResponse {
    pub message: String,
    pub task_id: String,
}

/// Error body produced by the backend's `error_response`
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: serde_json::Value,
    #[serde(default)]
    pub status_code: Option<u16>,
}

impl ErrorBody {
    pub fn message_text(&self) -> String {
        match &self.message {
            serde_json::Value::String(text) => text.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// REST client errors with retry classification
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Access token expired")]
    TokenExpired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl ApiError {
    /// Returns true if a later identical request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout | ApiError::RateLimited => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Errors that require the user to sign in again.
    pub fn is_auth(&self) -> bool {
        matches!(self, ApiError::Unauthorized | ApiError::TokenExpired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn podcast_decodes_backend_payload() {
        let raw = r#"{
            "id": 7,
            "title": "Attention Is All You Need",
            "status": "completed",
            "technical_level": "advanced",
            "target_length": 20,
            "created_at": "2024-03-01T10:00:00.123456",
            "completed_at": null,
            "error_message": null,
            "script": {
                "id": 3,
                "paper_ids": ["1706.03762"],
                "script_content": {
                    "title": "Transformers",
                    "sections": [
                        {"title": "Intro", "segments": [{"speaker": "host", "text": "hello there"}]}
                    ]
                },
                "generated_at": "2024-03-01T10:05:00"
            },
            "audio": {
                "id": 1,
                "file_url": "gs://bucket/7.mp3",
                "file_size": 1048576,
                "duration": 1200,
                "audio_format": "mp3",
                "created_at": "2024-03-01T10:10:00"
            },
            "extra_data": null
        }"#;

        let podcast: Podcast = serde_json::from_str(raw).unwrap();
        assert_eq!(podcast.status, PodcastStatus::Completed);
        assert_eq!(podcast.technical_level, TechnicalLevel::Advanced);
        assert_eq!(podcast.target_length_minutes, 20);
        assert!(podcast.tasks.is_empty());

        let audio = podcast.audio.as_ref().unwrap();
        assert_eq!(audio.url, "gs://bucket/7.mp3");
        assert_eq!(audio.duration_seconds, Some(1200.0));
        assert_eq!(audio.file_size_bytes, Some(1_048_576));

        let script = podcast.script_content().unwrap();
        assert_eq!(script.sections[0].word_count(), 2);
        assert!(podcast.check_invariants().is_ok());
    }

    #[test]
    fn task_accepts_estimated_time_alias() {
        let raw = r#"{"task_id": "abc", "task_type": "audio_generation",
                      "status": "processing", "progress": 60, "estimated_time": 45}"#;
        let task: GenerationTask = serde_json::from_str(raw).unwrap();
        assert_eq!(task.task_type, TaskType::AudioGeneration);
        assert_eq!(task.estimated_time_remaining, Some(45));
        assert_eq!(task.progress_percent(), 60);
    }

    #[test]
    fn invariant_rejects_completed_without_audio() {
        let podcast = Podcast {
            id: 1,
            title: "t".to_string(),
            status: PodcastStatus::Completed,
            created_at: None,
            completed_at: None,
            technical_level: TechnicalLevel::Intermediate,
            target_length_minutes: 15,
            error_message: None,
            tasks: Vec::new(),
            script: None,
            audio: None,
        };
        assert!(matches!(
            podcast.check_invariants(),
            Err(ApiError::InvalidResponse(_))
        ));
    }

    #[test]
    fn create_request_requires_papers_without_preferences() {
        let request = CreatePodcastRequest {
            use_preferences: false,
            ..CreatePodcastRequest::default()
        };
        assert!(request.validate().is_err());

        let request = CreatePodcastRequest {
            use_preferences: false,
            paper_ids: vec!["2301.00001".to_string()],
            ..CreatePodcastRequest::default()
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn create_request_rejects_out_of_range_length() {
        let request = CreatePodcastRequest {
            target_length: 61,
            ..CreatePodcastRequest::default()
        };
        assert!(request.validate().is_err());
    }

    #[test]
    fn arxiv_ids() {
        assert!(is_arxiv_id("2301.00001"));
        assert!(is_arxiv_id("2301.0001v3"));
        assert!(is_arxiv_id("hep-th/9901001"));
        assert!(is_arxiv_id("math.AG/0601001"));
        assert!(!is_arxiv_id("not-a-paper"));
        assert!(!is_arxiv_id("2301.1"));
    }

    #[test]
    fn error_body_message_can_be_an_object() {
        let body: ErrorBody = serde_json::from_str(
            r#"{"error": true, "message": {"target_length": ["bad"]}, "status_code": 400}"#,
        )
        .unwrap();
        assert!(body.message_text().contains("target_length"));
        assert_eq!(body.status_code, Some(400));
    }

    #[test]
    fn retry_classification() {
        assert!(ApiError::Timeout.is_retryable());
        assert!(ApiError::Status { status: 503, message: String::new() }.is_retryable());
        assert!(!ApiError::Status { status: 400, message: String::new() }.is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
        assert!(ApiError::TokenExpired.is_auth());
    }
}
