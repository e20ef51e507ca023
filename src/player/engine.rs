use super::state::EngineEvent;
use super::PlayerError;
use tokio::sync::mpsc;

/// Distinguishes successive engine instances owned by one controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineToken(pub u64);

/// An engine event stamped with the instance that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub token: EngineToken,
    pub event: EngineEvent,
}

/// Handed to each engine instance so its callbacks reach the controller.
#[derive(Debug, Clone)]
pub struct EventSender {
    token: EngineToken,
    tx: mpsc::UnboundedSender<TaggedEvent>,
}

impl EventSender {
    pub(crate) fn new(token: EngineToken, tx: mpsc::UnboundedSender<TaggedEvent>) -> Self {
        Self { token, tx }
    }

    pub fn token(&self) -> EngineToken {
        self.token
    }

    /// Returns false once the controller is gone.
    pub fn emit(&self, event: EngineEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                token: self.token,
                event,
            })
            .is_ok()
    }
}

/// One live decoding/playback instance bound to a single URL.
pub trait AudioEngine: Send {
    fn play(&mut self) -> Result<(), PlayerError>;

    fn pause(&mut self) -> Result<(), PlayerError>;

    fn seek(&mut self, seconds: f64) -> Result<(), PlayerError>;

    fn set_volume(&mut self, volume: f32);

    fn set_playback_rate(&mut self, rate: f32);

    /// Releases the instance; no events may be emitted afterwards.
    fn destroy(&mut self);
}

/// Creates engine instances. `open` starts loading `url` and reports the
/// outcome through `events` (`Ready` or `Failed`).
pub trait AudioBackend: Send {
    fn open(
        &mut self,
        url: &str,
        events: EventSender,
    ) -> Result<Box<dyn AudioEngine>, PlayerError>;
}

/// Owns the live engine and destroys it when dropped, whichever path drops it.
pub(crate) struct EngineSlot {
    token: EngineToken,
    engine: Box<dyn AudioEngine>,
}

impl EngineSlot {
    pub(crate) fn new(token: EngineToken, engine: Box<dyn AudioEngine>) -> Self {
        Self { token, engine }
    }

    pub(crate) fn engine(&mut self) -> &mut dyn AudioEngine {
        self.engine.as_mut()
    }
}

impl Drop for EngineSlot {
    fn drop(&mut self) {
        tracing::debug!("Player: releasing engine {:?}", self.token);
        self.engine.destroy();
    }
}
