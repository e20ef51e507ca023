use super::engine::{AudioBackend, AudioEngine, EventSender};
use super::state::EngineEvent;
use super::PlayerError;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const DEFAULT_TICK: Duration = Duration::from_millis(250);

/// Engine backend that decodes nothing and advances a virtual clock.
///
/// The CLI uses it to walk through an episode without an audio device; the
/// duration comes from the podcast's audio metadata. Must be used inside a
/// tokio runtime.
#[derive(Debug, Clone)]
pub struct HeadlessBackend {
    duration: Option<f64>,
    tick: Duration,
}

impl HeadlessBackend {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration,
            tick: DEFAULT_TICK,
        }
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }
}

impl AudioBackend for HeadlessBackend {
    fn open(
        &mut self,
        url: &str,
        events: EventSender,
    ) -> Result<Box<dyn AudioEngine>, PlayerError> {
        let transport = Arc::new(Mutex::new(Transport::default()));
        let task = tokio::spawn(run_clock(
            self.duration,
            self.tick,
            transport.clone(),
            events,
        ));

        tracing::debug!("Headless: opened {}", url);
        Ok(Box::new(HeadlessEngine { transport, task }))
    }
}

#[derive(Debug)]
struct Transport {
    playing: bool,
    position: f64,
    rate: f32,
}

impl Default for Transport {
    fn default() -> Self {
        Self {
            playing: false,
            position: 0.0,
            rate: 1.0,
        }
    }
}

fn lock(transport: &Mutex<Transport>) -> MutexGuard<'_, Transport> {
    transport.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn run_clock(
    duration: Option<f64>,
    tick: Duration,
    transport: Arc<Mutex<Transport>>,
    events: EventSender,
) {
    let duration = match duration {
        Some(d) if d.is_finite() && d > 0.0 => d,
        _ => {
            events.emit(EngineEvent::Failed(PlayerError::Decode(
                "audio duration is unknown".into(),
            )
            .to_string()));
            return;
        }
    };

    if !events.emit(EngineEvent::Ready(duration)) {
        return;
    }

    let mut interval = tokio::time::interval(tick);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await;

    loop {
        interval.tick().await;

        let event = {
            let mut state = lock(&transport);
            if !state.playing {
                continue;
            }
            state.position += tick.as_secs_f64() * f64::from(state.rate);
            if state.position >= duration {
                state.position = duration;
                state.playing = false;
                EngineEvent::Finished
            } else {
                EngineEvent::Progress(state.position)
            }
        };

        if !events.emit(event) {
            break;
        }
    }
}

struct HeadlessEngine {
    transport: Arc<Mutex<Transport>>,
    task: JoinHandle<()>,
}

impl AudioEngine for HeadlessEngine {
    fn play(&mut self) -> Result<(), PlayerError> {
        if self.task.is_finished() {
            return Err(PlayerError::Engine("clock stopped".into()));
        }
        lock(&self.transport).playing = true;
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        lock(&self.transport).playing = false;
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<(), PlayerError> {
        lock(&self.transport).position = seconds;
        Ok(())
    }

    fn set_volume(&mut self, _volume: f32) {}

    fn set_playback_rate(&mut self, rate: f32) {
        lock(&self.transport).rate = rate;
    }

    fn destroy(&mut self) {
        self.task.abort();
    }
}
