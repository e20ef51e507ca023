use super::chapters::ChapterTimetable;
use super::PlayerError;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlayerStatus {
    Loading,
    Ready,
    Playing,
    Paused,
    Ended,
    Error,
}

impl PlayerStatus {
    /// States in which transport operations are honored.
    pub fn accepts_transport(self) -> bool {
        !matches!(self, PlayerStatus::Loading | PlayerStatus::Error)
    }
}

/// The enumerated playback speeds offered by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(into = "f32")]
pub enum PlaybackRate {
    Half,
    ThreeQuarters,
    #[default]
    Normal,
    OneAndQuarter,
    OneAndHalf,
    OneAndThreeQuarters,
    Double,
}

impl PlaybackRate {
    pub const ALL: [PlaybackRate; 7] = [
        PlaybackRate::Half,
        PlaybackRate::ThreeQuarters,
        PlaybackRate::Normal,
        PlaybackRate::OneAndQuarter,
        PlaybackRate::OneAndHalf,
        PlaybackRate::OneAndThreeQuarters,
        PlaybackRate::Double,
    ];

    pub fn as_f32(self) -> f32 {
        match self {
            PlaybackRate::Half => 0.5,
            PlaybackRate::ThreeQuarters => 0.75,
            PlaybackRate::Normal => 1.0,
            PlaybackRate::OneAndQuarter => 1.25,
            PlaybackRate::OneAndHalf => 1.5,
            PlaybackRate::OneAndThreeQuarters => 1.75,
            PlaybackRate::Double => 2.0,
        }
    }

    /// Closest allowed rate, used when loading persisted settings.
    pub fn nearest(value: f32) -> Self {
        if !value.is_finite() {
            return PlaybackRate::Normal;
        }
        Self::ALL
            .into_iter()
            .min_by(|a, b| {
                (a.as_f32() - value)
                    .abs()
                    .total_cmp(&(b.as_f32() - value).abs())
            })
            .unwrap_or_default()
    }
}

impl From<PlaybackRate> for f32 {
    fn from(rate: PlaybackRate) -> Self {
        rate.as_f32()
    }
}

impl TryFrom<f32> for PlaybackRate {
    type Error = PlayerError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|rate| rate.as_f32() == value)
            .ok_or(PlayerError::InvalidRate(value))
    }
}

/// Tagged engine callbacks, consumed by [`reduce`].
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Metadata decoded; duration in seconds.
    Ready(f64),
    /// Periodic playback position in seconds.
    Progress(f64),
    Finished,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub url: String,
    pub status: PlayerStatus,
    pub is_playing: bool,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub volume: f32,
    pub playback_rate: PlaybackRate,
    pub current_chapter_index: usize,
    pub error: Option<String>,
}

impl PlaybackState {
    /// Fresh state for a newly bound asset; only user preferences carry over.
    pub fn loading(url: impl Into<String>, volume: f32, playback_rate: PlaybackRate) -> Self {
        Self {
            url: url.into(),
            status: PlayerStatus::Loading,
            is_playing: false,
            current_time_seconds: 0.0,
            duration_seconds: 0.0,
            volume: clamp_volume(volume),
            playback_rate,
            current_chapter_index: 0,
            error: None,
        }
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        self.status = PlayerStatus::Error;
        self.is_playing = false;
        self.error = Some(reason.into());
    }
}

pub fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

/// Clamps a position into `[0, duration]`.
pub fn clamp_position(time: f64, duration: f64) -> f64 {
    if !time.is_finite() {
        return 0.0;
    }
    time.max(0.0).min(duration.max(0.0))
}

/// Outcome of one reducer step.
#[derive(Debug, Clone, PartialEq)]
pub struct Reduced {
    pub state: PlaybackState,
    /// New chapter index when it differs from the previous state's.
    pub chapter_changed: Option<usize>,
    pub status_changed: bool,
}

/// Next playback state after one engine event.
///
/// `timetable` is updated in place when the event reveals a new duration.
pub fn reduce(
    state: &PlaybackState,
    timetable: &mut ChapterTimetable,
    event: &EngineEvent,
) -> Reduced {
    let mut next = state.clone();

    match event {
        EngineEvent::Ready(duration) => {
            if state.status == PlayerStatus::Error {
                return unchanged(next);
            }
            next.duration_seconds = if duration.is_finite() {
                duration.max(0.0)
            } else {
                0.0
            };
            timetable.set_duration(next.duration_seconds);
            next.current_time_seconds =
                clamp_position(next.current_time_seconds, next.duration_seconds);
            if state.status == PlayerStatus::Loading {
                next.status = PlayerStatus::Ready;
            }
        }
        EngineEvent::Progress(time) => {
            if !matches!(
                state.status,
                PlayerStatus::Ready | PlayerStatus::Playing | PlayerStatus::Paused
            ) {
                return unchanged(next);
            }
            next.current_time_seconds = clamp_position(*time, next.duration_seconds);
        }
        EngineEvent::Finished => {
            // Only a playing track can run off its end.
            if state.status != PlayerStatus::Playing {
                return unchanged(next);
            }
            next.status = PlayerStatus::Ended;
            next.is_playing = false;
            next.current_time_seconds = next.duration_seconds;
        }
        EngineEvent::Failed(reason) => {
            next.fail(reason.clone());
        }
    }

    let chapter_changed = match timetable.index_at(next.current_time_seconds) {
        Some(index) if index != state.current_chapter_index => {
            next.current_chapter_index = index;
            Some(index)
        }
        _ => None,
    };

    Reduced {
        status_changed: next.status != state.status,
        state: next,
        chapter_changed,
    }
}

fn unchanged(state: PlaybackState) -> Reduced {
    Reduced {
        state,
        chapter_changed: None,
        status_changed: false,
    }
}

#[cfg(test)]
mod tests {
    use super::super::chapters::{Chapter, ChapterSource};
    use super::*;

    fn timetable() -> ChapterTimetable {
        ChapterTimetable::new(ChapterSource::Explicit(vec![
            Chapter::new("A", 0.0),
            Chapter::new("B", 100.0),
            Chapter::new("C", 250.0),
        ]))
    }

    fn ready(duration: f64) -> (PlaybackState, ChapterTimetable) {
        let mut chapters = timetable();
        let state = PlaybackState::loading("a.mp3", 1.0, PlaybackRate::Normal);
        let reduced = reduce(&state, &mut chapters, &EngineEvent::Ready(duration));
        (reduced.state, chapters)
    }

    #[test]
    fn ready_moves_loading_to_ready() {
        let (state, _) = ready(300.0);
        assert_eq!(state.status, PlayerStatus::Ready);
        assert_eq!(state.duration_seconds, 300.0);
    }

    #[test]
    fn progress_updates_chapter_once() {
        let (mut state, mut chapters) = ready(300.0);
        state.status = PlayerStatus::Playing;

        let step = reduce(&state, &mut chapters, &EngineEvent::Progress(150.0));
        assert_eq!(step.chapter_changed, Some(1));
        assert_eq!(step.state.current_chapter_index, 1);

        let again = reduce(&step.state, &mut chapters, &EngineEvent::Progress(160.0));
        assert_eq!(again.chapter_changed, None);
        assert_eq!(again.state.current_time_seconds, 160.0);
    }

    #[test]
    fn finished_ends_playback() {
        let (mut state, mut chapters) = ready(300.0);
        state.status = PlayerStatus::Playing;
        state.is_playing = true;

        let step = reduce(&state, &mut chapters, &EngineEvent::Finished);
        assert_eq!(step.state.status, PlayerStatus::Ended);
        assert!(!step.state.is_playing);
        assert_eq!(step.state.current_time_seconds, 300.0);
        assert_eq!(step.chapter_changed, Some(2));
    }

    #[test]
    fn failure_from_any_state() {
        let (state, mut chapters) = ready(300.0);
        let step = reduce(&state, &mut chapters, &EngineEvent::Failed("decode".into()));
        assert_eq!(step.state.status, PlayerStatus::Error);
        assert_eq!(step.state.error.as_deref(), Some("decode"));
        assert!(step.status_changed);

        let ignored = reduce(&step.state, &mut chapters, &EngineEvent::Progress(10.0));
        assert_eq!(ignored.state.current_time_seconds, 0.0);
    }

    #[test]
    fn ended_track_ignores_late_clock_events() {
        let (mut state, mut chapters) = ready(300.0);
        state.status = PlayerStatus::Playing;
        state.is_playing = true;
        let ended = reduce(&state, &mut chapters, &EngineEvent::Finished).state;

        let late = reduce(&ended, &mut chapters, &EngineEvent::Progress(120.0));
        assert_eq!(late.state, ended);
        assert_eq!(late.chapter_changed, None);
    }

    #[test]
    fn finished_only_ends_a_playing_track() {
        let (ready_state, mut chapters) = ready(300.0);
        let mut paused = ready_state.clone();
        paused.status = PlayerStatus::Paused;
        paused.current_time_seconds = 50.0;

        for state in [ready_state, paused] {
            let step = reduce(&state, &mut chapters, &EngineEvent::Finished);
            assert_eq!(step.state, state);
            assert!(!step.status_changed);
        }
    }

    #[test]
    fn progress_ignored_while_loading() {
        let mut chapters = timetable();
        let state = PlaybackState::loading("a.mp3", 1.0, PlaybackRate::Normal);
        let step = reduce(&state, &mut chapters, &EngineEvent::Progress(50.0));
        assert_eq!(step.state, state);
    }

    #[test]
    fn rates_are_restricted() {
        assert_eq!(PlaybackRate::try_from(1.25).unwrap(), PlaybackRate::OneAndQuarter);
        assert!(matches!(
            PlaybackRate::try_from(1.1),
            Err(PlayerError::InvalidRate(_))
        ));
        assert_eq!(PlaybackRate::nearest(1.1), PlaybackRate::Normal);
        assert_eq!(PlaybackRate::nearest(9.0), PlaybackRate::Double);
    }

    #[test]
    fn clamps() {
        assert_eq!(clamp_position(-5.0, 120.0), 0.0);
        assert_eq!(clamp_position(500.0, 120.0), 120.0);
        assert_eq!(clamp_volume(1.7), 1.0);
        assert_eq!(clamp_volume(f32::NAN), 0.0);
    }
}
