// src/lib.rs
pub mod api;
pub mod cli;
pub mod config;
pub mod detail;
pub mod player;
pub mod tracker;

pub use api::{HttpPodcastApi, PodcastApi, RequestContext};
pub use detail::PodcastDetail;
pub use player::AudioPlaybackController;
pub use tracker::GenerationStatusTracker;
