use serde::Serialize;
use std::collections::HashMap;

pub const PODCAST_ENDPOINT: &str = "podcast";
pub const TASK_ENDPOINT: &str = "task";

/// Per-endpoint poll counters
#[derive(Debug, Clone, Default, Serialize)]
pub struct PollMetrics {
    success_counts: HashMap<String, u64>,
    failure_counts: HashMap<String, u64>,
}

impl PollMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self, endpoint: &str) {
        *self
            .success_counts
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn record_failure(&mut self, endpoint: &str) {
        *self
            .failure_counts
            .entry(endpoint.to_string())
            .or_insert(0) += 1;
    }

    pub fn success_count(&self, endpoint: &str) -> u64 {
        *self.success_counts.get(endpoint).unwrap_or(&0)
    }

    pub fn failure_count(&self, endpoint: &str) -> u64 {
        *self.failure_counts.get(endpoint).unwrap_or(&0)
    }

    /// Total requests issued to `endpoint`.
    pub fn request_count(&self, endpoint: &str) -> u64 {
        self.success_count(endpoint) + self.failure_count(endpoint)
    }

    pub fn success_rate(&self, endpoint: &str) -> f32 {
        let success = self.success_count(endpoint) as f32;
        let total = self.request_count(endpoint) as f32;

        if total == 0.0 {
            0.0
        } else {
            success / total
        }
    }
}
