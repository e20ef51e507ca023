// src/player/mod.rs
pub mod chapters;
pub mod controller;
pub mod engine;
pub mod format;
pub mod headless;
pub mod state;

pub use chapters::{Chapter, ChapterSource, ChapterTimetable};
pub use controller::{AudioPlaybackController, PlayerNotification};
pub use engine::{AudioBackend, AudioEngine, EngineToken, EventSender, TaggedEvent};
pub use format::format_time;
pub use headless::HeadlessBackend;
pub use state::{EngineEvent, PlaybackRate, PlaybackState, PlayerStatus};

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Engine error: {0}")]
    Engine(String),

    #[error("Unsupported playback rate: {0}")]
    InvalidRate(f32),

    #[error("No audio loaded")]
    NotReady,
}
