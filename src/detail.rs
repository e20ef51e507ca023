// src/detail.rs
// Podcast detail view: status polling until completion, then playback.

use crate::api::{Podcast, PodcastApi, RequestContext};
use crate::player::{AudioBackend, AudioPlaybackController, ChapterSource, PlayerNotification};
use crate::tracker::{StatusPoller, TrackerSnapshot};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum DetailUpdate {
    Progress(TrackerSnapshot),
    PollingStopped,
    Player(Vec<PlayerNotification>),
    /// Polling has stopped and no engine is loaded; nothing further will arrive.
    Idle,
}

/// Chapters from the podcast script when it has sections, the fixed
/// fallback otherwise.
pub fn chapter_source(podcast: &Podcast) -> ChapterSource {
    match podcast.script_content() {
        Some(script) if !script.sections.is_empty() => ChapterSource::Script(script.clone()),
        _ => ChapterSource::Fallback,
    }
}

pub struct PodcastDetail<B: AudioBackend> {
    api: Arc<dyn PodcastApi>,
    poller: StatusPoller,
    player: AudioPlaybackController<B>,
    podcast_id: Option<i64>,
    polling_open: bool,
    loaded_url: Option<String>,
}

impl<B: AudioBackend> PodcastDetail<B> {
    pub fn new(
        api: Arc<dyn PodcastApi>,
        ctx: RequestContext,
        interval: Duration,
        player: AudioPlaybackController<B>,
    ) -> Self {
        Self {
            poller: StatusPoller::new(api.clone(), ctx, interval),
            api,
            player,
            podcast_id: None,
            polling_open: false,
            loaded_url: None,
        }
    }

    pub fn player(&self) -> &AudioPlaybackController<B> {
        &self.player
    }

    pub fn player_mut(&mut self) -> &mut AudioPlaybackController<B> {
        &mut self.player
    }

    pub fn podcast_id(&self) -> Option<i64> {
        self.podcast_id
    }

    pub fn latest(&self) -> Option<TrackerSnapshot> {
        self.poller.current().map(|handle| handle.latest())
    }

    /// Shows `podcast_id`. Switching podcasts cancels the old poll loop and
    /// releases the old audio engine before anything new starts.
    pub fn open(&mut self, podcast_id: i64) {
        if self.podcast_id == Some(podcast_id) {
            return;
        }
        tracing::info!("Detail: opening podcast {}", podcast_id);

        self.player.unload();
        self.loaded_url = None;
        self.poller.stop();

        self.podcast_id = Some(podcast_id);
        self.poller.track(podcast_id);
        self.polling_open = true;
    }

    pub fn close(&mut self) {
        self.poller.stop();
        self.player.unload();
        self.podcast_id = None;
        self.polling_open = false;
        self.loaded_url = None;
    }

    /// Binds the player once the snapshot shows a completed podcast with audio.
    /// Returns true when a new URL was loaded.
    pub fn apply_snapshot(&mut self, snapshot: &TrackerSnapshot) -> bool {
        if Some(snapshot.podcast_id) != self.podcast_id || !snapshot.is_completed() {
            return false;
        }
        let Some(podcast) = snapshot.podcast.as_ref() else {
            return false;
        };
        if podcast.audio.is_none() {
            return false;
        }

        let url = self.api.audio_stream_url(podcast.id);
        if self.loaded_url.as_deref() == Some(url.as_str()) {
            return false;
        }

        self.player.load(&url, chapter_source(podcast));
        self.loaded_url = Some(url);
        true
    }

    /// Waits for the next poll snapshot or player event, whichever comes first.
    ///
    /// Returns [`DetailUpdate::Idle`] without waiting once neither source can
    /// produce anything, e.g. after a failed podcast or [`close`](Self::close).
    pub async fn next_update(&mut self) -> DetailUpdate {
        if !self.polling_open && !self.player.has_engine() {
            let pending = self.player.drain_notifications();
            if !pending.is_empty() {
                return DetailUpdate::Player(pending);
            }
            return DetailUpdate::Idle;
        }

        enum Woke {
            Snapshot(Option<TrackerSnapshot>),
            Player,
        }

        let woke = match self.poller.current_mut() {
            Some(handle) if self.polling_open => {
                let player = &mut self.player;
                tokio::select! {
                    snapshot = handle.changed() => Woke::Snapshot(snapshot),
                    _ = player.process_next_event() => Woke::Player,
                }
            }
            _ => {
                self.player.process_next_event().await;
                Woke::Player
            }
        };

        match woke {
            Woke::Snapshot(Some(snapshot)) => {
                self.apply_snapshot(&snapshot);
                DetailUpdate::Progress(snapshot)
            }
            Woke::Snapshot(None) => {
                self.polling_open = false;
                DetailUpdate::PollingStopped
            }
            Woke::Player => DetailUpdate::Player(self.player.drain_notifications()),
        }
    }
}
