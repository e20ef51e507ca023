use super::chapters::{Chapter, ChapterSource, ChapterTimetable};
use super::engine::{AudioBackend, EngineSlot, EngineToken, EventSender, TaggedEvent};
use super::state::{
    clamp_position, clamp_volume, reduce, PlaybackRate, PlaybackState, PlayerStatus, Reduced,
};
use super::PlayerError;
use serde::Serialize;
use tokio::sync::mpsc;

/// Observable changes raised by the controller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PlayerNotification {
    StatusChanged { status: PlayerStatus },
    ChapterChanged { index: usize, title: String },
}

/// Owns exactly one audio engine bound to one URL and keeps
/// [`PlaybackState`] consistent with the engine's events.
///
/// Every failure ends up in `state().error`; nothing here returns an error
/// to the caller of a transport operation.
pub struct AudioPlaybackController<B: AudioBackend> {
    backend: B,
    slot: Option<EngineSlot>,
    current_token: Option<EngineToken>,
    next_token: u64,
    events_tx: mpsc::UnboundedSender<TaggedEvent>,
    events_rx: mpsc::UnboundedReceiver<TaggedEvent>,
    state: PlaybackState,
    timetable: ChapterTimetable,
    notifications: Vec<PlayerNotification>,
}

impl<B: AudioBackend> AudioPlaybackController<B> {
    pub fn new(backend: B) -> Self {
        Self::with_preferences(backend, 1.0, PlaybackRate::Normal)
    }

    pub fn with_preferences(backend: B, volume: f32, playback_rate: PlaybackRate) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            slot: None,
            current_token: None,
            next_token: 0,
            events_tx,
            events_rx,
            state: PlaybackState::loading("", volume, playback_rate),
            timetable: ChapterTimetable::new(ChapterSource::Fallback),
            notifications: Vec::new(),
        }
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn status(&self) -> PlayerStatus {
        self.state.status
    }

    pub fn chapters(&self) -> &[Chapter] {
        self.timetable.chapters()
    }

    pub fn current_chapter(&self) -> Option<&Chapter> {
        self.timetable
            .chapters()
            .get(self.state.current_chapter_index)
    }

    pub fn current_token(&self) -> Option<EngineToken> {
        self.current_token
    }

    pub fn has_engine(&self) -> bool {
        self.slot.is_some()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn drain_notifications(&mut self) -> Vec<PlayerNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Binds the controller to `url`, releasing the previous engine first.
    pub fn load(&mut self, url: &str, chapters: ChapterSource) {
        self.release();

        self.next_token += 1;
        let token = EngineToken(self.next_token);
        self.current_token = Some(token);

        let volume = self.state.volume;
        let rate = self.state.playback_rate;
        let previous = self.state.status;
        self.state = PlaybackState::loading(url, volume, rate);
        self.timetable = ChapterTimetable::new(chapters);
        if previous != PlayerStatus::Loading {
            self.notify_status();
        }

        tracing::info!("Player: loading {} as engine {:?}", url, token);

        match self
            .backend
            .open(url, EventSender::new(token, self.events_tx.clone()))
        {
            Ok(mut engine) => {
                engine.set_volume(volume);
                engine.set_playback_rate(rate.as_f32());
                self.slot = Some(EngineSlot::new(token, engine));
            }
            Err(e) => {
                tracing::warn!("Player: failed to open {}: {}", url, e);
                self.fail(e);
            }
        }
    }

    /// Retries the current URL with the current chapter source.
    pub fn reload(&mut self) {
        if self.state.url.is_empty() {
            return;
        }
        let url = self.state.url.clone();
        let source = self.timetable.source().clone();
        self.load(&url, source);
    }

    /// Destroys the engine and forgets its token; later events from it are stale.
    /// The playback state goes with it, only volume and rate are kept.
    pub fn unload(&mut self) {
        self.release();
        self.current_token = None;

        let previous = self.state.status;
        self.state = PlaybackState::loading("", self.state.volume, self.state.playback_rate);
        self.timetable = ChapterTimetable::new(ChapterSource::Fallback);
        if previous != PlayerStatus::Loading {
            self.notify_status();
        }
    }

    /// Applies one engine event. Returns false for events from released instances.
    pub fn handle_event(&mut self, tagged: TaggedEvent) -> bool {
        if Some(tagged.token) != self.current_token {
            tracing::trace!(
                "Player: dropping stale {:?} from engine {:?}",
                tagged.event,
                tagged.token
            );
            return false;
        }

        let reduced = reduce(&self.state, &mut self.timetable, &tagged.event);
        self.commit(reduced);

        if self.state.status == PlayerStatus::Error {
            tracing::warn!(
                "Player: engine {:?} failed: {}",
                tagged.token,
                self.state.error.as_deref().unwrap_or("unknown error")
            );
            self.release();
        }
        true
    }

    /// Applies every event already queued, in emission order.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(tagged) = self.events_rx.try_recv() {
            if self.handle_event(tagged) {
                applied += 1;
            }
        }
        applied
    }

    /// Waits for the next event and applies it.
    pub async fn process_next_event(&mut self) -> bool {
        match self.events_rx.recv().await {
            Some(tagged) => self.handle_event(tagged),
            None => false,
        }
    }

    pub fn play_pause(&mut self) {
        match self.state.status {
            PlayerStatus::Loading | PlayerStatus::Error => {}
            PlayerStatus::Playing => self.pause(),
            PlayerStatus::Ready | PlayerStatus::Paused | PlayerStatus::Ended => self.play(),
        }
    }

    pub fn play(&mut self) {
        if !self.state.status.accepts_transport() || self.state.status == PlayerStatus::Playing {
            return;
        }

        if self.state.status == PlayerStatus::Ended {
            if let Err(e) = self.with_engine(|engine| engine.seek(0.0)) {
                self.fail(e);
                return;
            }
            self.state.current_time_seconds = 0.0;
            self.update_current_chapter(0.0);
        }

        match self.with_engine(|engine| engine.play()) {
            Ok(()) => {
                self.state.is_playing = true;
                self.set_status(PlayerStatus::Playing);
            }
            Err(e) => self.fail(e),
        }
    }

    pub fn pause(&mut self) {
        if self.state.status != PlayerStatus::Playing {
            return;
        }

        match self.with_engine(|engine| engine.pause()) {
            Ok(()) => {
                self.state.is_playing = false;
                self.set_status(PlayerStatus::Paused);
            }
            Err(e) => self.fail(e),
        }
    }

    /// Seeks within `[0, duration]`. An ended track becomes paused.
    pub fn seek(&mut self, time_seconds: f64) {
        if !self.state.status.accepts_transport() {
            return;
        }

        let target = clamp_position(time_seconds, self.state.duration_seconds);
        if let Err(e) = self.with_engine(|engine| engine.seek(target)) {
            self.fail(e);
            return;
        }

        self.state.current_time_seconds = target;
        if self.state.status == PlayerStatus::Ended {
            self.set_status(PlayerStatus::Paused);
        }
        self.update_current_chapter(target);
    }

    pub fn skip(&mut self, delta_seconds: f64) {
        self.seek(self.state.current_time_seconds + delta_seconds);
    }

    pub fn set_volume(&mut self, volume: f32) {
        let volume = clamp_volume(volume);
        self.state.volume = volume;
        if let Some(slot) = self.slot.as_mut() {
            slot.engine().set_volume(volume);
        }
    }

    pub fn set_playback_rate(&mut self, rate: PlaybackRate) {
        self.state.playback_rate = rate;
        if let Some(slot) = self.slot.as_mut() {
            slot.engine().set_playback_rate(rate.as_f32());
        }
    }

    pub fn next_chapter(&mut self) {
        let next = self.state.current_chapter_index + 1;
        if let Some(start) = self.timetable.chapters().get(next).map(|c| c.start_seconds) {
            self.seek(start);
        }
    }

    pub fn previous_chapter(&mut self) {
        let Some(previous) = self.state.current_chapter_index.checked_sub(1) else {
            return;
        };
        if let Some(start) = self
            .timetable
            .chapters()
            .get(previous)
            .map(|c| c.start_seconds)
        {
            self.seek(start);
        }
    }

    /// Recomputes the current chapter for `time_seconds`, notifying only on change.
    pub fn update_current_chapter(&mut self, time_seconds: f64) -> Option<usize> {
        let index = self.timetable.index_at(time_seconds)?;
        if index != self.state.current_chapter_index {
            self.state.current_chapter_index = index;
            self.notify_chapter(index);
        }
        Some(index)
    }

    fn with_engine<T>(
        &mut self,
        op: impl FnOnce(&mut dyn super::engine::AudioEngine) -> Result<T, PlayerError>,
    ) -> Result<T, PlayerError> {
        match self.slot.as_mut() {
            Some(slot) => op(slot.engine()),
            None => Err(PlayerError::NotReady),
        }
    }

    fn commit(&mut self, reduced: Reduced) {
        self.state = reduced.state;
        if reduced.status_changed {
            self.notify_status();
        }
        if let Some(index) = reduced.chapter_changed {
            self.notify_chapter(index);
        }
    }

    fn fail(&mut self, error: PlayerError) {
        self.state.fail(error.to_string());
        self.notify_status();
        self.release();
    }

    fn release(&mut self) {
        // EngineSlot::drop destroys the instance.
        self.slot = None;
    }

    fn set_status(&mut self, status: PlayerStatus) {
        if self.state.status != status {
            self.state.status = status;
            self.notify_status();
        }
    }

    fn notify_status(&mut self) {
        self.notifications.push(PlayerNotification::StatusChanged {
            status: self.state.status,
        });
    }

    fn notify_chapter(&mut self, index: usize) {
        let title = self
            .timetable
            .chapters()
            .get(index)
            .map(|c| c.title.clone())
            .unwrap_or_default();
        tracing::debug!("Player: chapter {} '{}'", index, title);
        self.notifications
            .push(PlayerNotification::ChapterChanged { index, title });
    }
}
