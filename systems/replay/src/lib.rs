#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Recording, playback and persistence of battle replays.
//!
//! [`ReplayManager`] captures a running battle by subscribing to its event
//! bus and later replays the captured stream against a virtual clock.
//! [`ReplayStore`] keeps replays on disk, each next to a small sidecar that
//! lets a directory be listed without decoding any payload.

mod codec;
mod store;

use std::{cell::RefCell, rc::Rc, time::Duration};

use crystal_defence_core::{
    duration_to_millis, BattleResult, Command, EventKind, GameEvent, InitParams, PlaybackState,
    RecordedEvent, ReplayData, LOGIC_FRAME_INTERVAL,
};
use crystal_defence_events::{EventHandler, EventManager};
use thiserror::Error;

pub use codec::{decode, encode};
pub use store::{is_valid_replay_id, ReplayStore, ReplaySummary};

/// Slowest accepted playback speed.
pub const MIN_PLAYBACK_SPEED: f64 = 0.1;
/// Fastest accepted playback speed.
pub const MAX_PLAYBACK_SPEED: f64 = 10.0;

/// Event kinds captured while recording.
pub const RECORDED_KINDS: [EventKind; 17] = [
    EventKind::EntityCreated,
    EventKind::EntityDeath,
    EventKind::EntityRemoved,
    EventKind::DamageDealt,
    EventKind::HealingApplied,
    EventKind::SkillCast,
    EventKind::SkillEffectApplied,
    EventKind::SkillEffectRemoved,
    EventKind::HeroLevelUp,
    EventKind::HeroPositionChanged,
    EventKind::WaveStart,
    EventKind::WaveCompleted,
    EventKind::AllWavesCompleted,
    EventKind::BattleStart,
    EventKind::BattleEnd,
    EventKind::GameOver,
    EventKind::CommandProcessed,
];

/// Failures while persisting or loading replays.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// Filesystem access failed.
    #[error("replay i/o failed: {0}")]
    Io(#[from] std::io::Error),
    /// The payload is not a valid replay.
    #[error("malformed replay: {0}")]
    Json(#[from] serde_json::Error),
    /// No replay with that id exists.
    #[error("replay `{0}` not found")]
    NotFound(String),
    /// The id is not a plain file stem (`[A-Za-z0-9_-]+`).
    #[error("replay id `{0}` is not a valid file name")]
    InvalidId(String),
    /// The payload does not match the checksum in its sidecar.
    #[error("replay `{replay_id}` failed its checksum")]
    ChecksumMismatch {
        /// Corrupted replay.
        replay_id: String,
    },
}

#[derive(Debug, Default)]
struct Capture {
    events: Vec<RecordedEvent>,
    commands: Vec<Command>,
}

struct Recording {
    replay_id: String,
    init_params: InitParams,
    capture: Rc<RefCell<Capture>>,
    handlers: Vec<(EventKind, EventHandler)>,
}

impl std::fmt::Debug for Recording {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Recording")
            .field("replay_id", &self.replay_id)
            .field("capture", &self.capture)
            .field("subscriptions", &self.handlers.len())
            .finish()
    }
}

/// Records battles and plays them back.
#[derive(Debug)]
pub struct ReplayManager {
    state: PlaybackState,
    recording: Option<Recording>,
    replay: Option<ReplayData>,
    cursor: usize,
    current: Duration,
    total: Duration,
    current_frame: u64,
    speed: f64,
}

impl Default for ReplayManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayManager {
    /// Creates an idle manager.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: PlaybackState::Idle,
            recording: None,
            replay: None,
            cursor: 0,
            current: Duration::ZERO,
            total: Duration::ZERO,
            current_frame: 0,
            speed: 1.0,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Replay loaded for playback.
    #[must_use]
    pub fn replay(&self) -> Option<&ReplayData> {
        self.replay.as_ref()
    }

    /// Starts capturing `events` for a battle initialised with `init_params`.
    pub fn start_recording(
        &mut self,
        events: &mut EventManager,
        replay_id: impl Into<String>,
        init_params: InitParams,
    ) -> bool {
        if self.state != PlaybackState::Idle {
            tracing::warn!(state = ?self.state, "recording requires an idle replay manager");
            return false;
        }

        let capture = Rc::new(RefCell::new(Capture::default()));
        let mut handlers = Vec::with_capacity(RECORDED_KINDS.len());
        for kind in RECORDED_KINDS {
            let sink = Rc::clone(&capture);
            let handler: EventHandler = Rc::new(move |event, stamp| {
                let mut capture = sink.borrow_mut();
                if let GameEvent::CommandProcessed { command } = event {
                    capture.commands.push(command.clone());
                }
                capture.events.push(RecordedEvent {
                    kind: event.kind(),
                    frame: stamp.frame,
                    time_ms: duration_to_millis(stamp.time),
                    event: event.clone(),
                });
            });
            let _ = events.on(kind, Rc::clone(&handler));
            handlers.push((kind, handler));
        }

        let replay_id = replay_id.into();
        tracing::info!(replay = %replay_id, "recording started");
        self.recording = Some(Recording {
            replay_id,
            init_params,
            capture,
            handlers,
        });
        self.set_state(events, PlaybackState::Recording);
        true
    }

    /// Stops capturing and returns the recorded replay.
    pub fn stop_recording(&mut self, events: &mut EventManager) -> Option<ReplayData> {
        let Some(recording) = self.recording.take() else {
            tracing::warn!(state = ?self.state, "no recording in progress");
            return None;
        };
        for (kind, handler) in &recording.handlers {
            let _ = events.off(*kind, handler);
        }

        let capture = recording.capture.take();
        let mut replay = ReplayData::new(recording.replay_id, recording.init_params);
        replay.metadata.duration_ms = capture.events.last().map_or(0, |event| event.time_ms);
        replay.metadata.total_frames = capture.events.last().map_or(0, |event| event.frame);
        replay.metadata.result = capture.events.iter().rev().find_map(|event| match event.event {
            GameEvent::BattleEnd { result } => Some(result),
            _ => None,
        });
        replay.commands = capture.commands;
        replay.events = capture.events;

        tracing::info!(
            replay = %replay.replay_id,
            events = replay.events.len(),
            commands = replay.commands.len(),
            "recording stopped"
        );
        self.set_state(events, PlaybackState::Idle);
        Some(replay)
    }

    /// Loads `replay` for playback, replacing any previous one.
    pub fn load(&mut self, mut replay: ReplayData) -> bool {
        if self.state == PlaybackState::Recording {
            tracing::warn!("cannot load a replay while recording");
            return false;
        }
        replay.events.sort_by_key(|event| (event.time_ms, event.frame));
        let last = replay.events.last().map_or(0, |event| event.time_ms);
        self.total = Duration::from_millis(replay.metadata.duration_ms.max(last));
        self.replay = Some(replay);
        self.cursor = 0;
        self.current = Duration::ZERO;
        self.current_frame = 0;
        self.state = PlaybackState::Idle;
        true
    }

    /// Starts or resumes playback.
    pub fn play(&mut self, events: &mut EventManager) -> bool {
        let ready = match self.state {
            PlaybackState::Idle | PlaybackState::Paused => self.replay.is_some(),
            PlaybackState::Completed => {
                self.rewind();
                true
            }
            PlaybackState::Recording | PlaybackState::Playing => false,
        };
        if !ready {
            tracing::warn!(state = ?self.state, "play ignored");
            return false;
        }
        self.set_state(events, PlaybackState::Playing);
        true
    }

    /// Suspends playback. Paused time never advances the virtual clock.
    pub fn pause(&mut self, events: &mut EventManager) -> bool {
        if self.state != PlaybackState::Playing {
            return false;
        }
        self.set_state(events, PlaybackState::Paused);
        true
    }

    /// Stops playback and rewinds to the start.
    pub fn stop(&mut self, events: &mut EventManager) -> bool {
        if !matches!(
            self.state,
            PlaybackState::Playing | PlaybackState::Paused | PlaybackState::Completed
        ) {
            return false;
        }
        self.rewind();
        self.set_state(events, PlaybackState::Idle);
        true
    }

    /// Sets the playback speed, clamped to the accepted range.
    pub fn set_speed(&mut self, speed: f64) {
        self.speed = if speed.is_finite() {
            speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
        } else {
            1.0
        };
    }

    /// Playback speed.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed
    }

    /// Virtual time in milliseconds.
    #[must_use]
    pub fn current_time_ms(&self) -> u64 {
        duration_to_millis(self.current)
    }

    /// Replay length in milliseconds.
    #[must_use]
    pub fn total_time_ms(&self) -> u64 {
        duration_to_millis(self.total)
    }

    /// Frame of the most recent event at or before the virtual time.
    #[must_use]
    pub fn current_frame(&self) -> u64 {
        self.current_frame
    }

    /// Fraction of the replay played, between 0 and 1.
    #[must_use]
    pub fn progress(&self) -> f64 {
        if self.total.is_zero() {
            return 0.0;
        }
        (self.current.as_secs_f64() / self.total.as_secs_f64()).clamp(0.0, 1.0)
    }

    /// Advances the virtual clock by `elapsed` scaled by the speed and
    /// re-emits every recorded event it passes. Returns the events fired.
    pub fn update(&mut self, elapsed: Duration, events: &mut EventManager) -> usize {
        if self.state != PlaybackState::Playing {
            return 0;
        }
        let Some(replay) = self.replay.as_ref() else {
            return 0;
        };

        self.current = self.current.saturating_add(elapsed.mul_f64(self.speed)).min(self.total);
        let now = duration_to_millis(self.current);
        let mut fired = 0;
        while let Some(recorded) = replay.events.get(self.cursor) {
            if recorded.time_ms > now {
                break;
            }
            events.set_clock(recorded.frame, Duration::from_millis(recorded.time_ms));
            events.emit(recorded.event.clone());
            self.current_frame = recorded.frame;
            self.cursor += 1;
            fired += 1;
        }

        events.emit(GameEvent::ReplayTimeUpdate {
            time_ms: now,
            total_ms: self.total_time_ms(),
        });
        if self.cursor >= replay.events.len() && self.current >= self.total {
            tracing::info!(replay = %replay.replay_id, "playback completed");
            self.set_state(events, PlaybackState::Completed);
        }
        fired
    }

    /// Jumps to `time_ms`, clamped to the replay, without firing the events
    /// skipped over.
    pub fn seek_to_time(&mut self, time_ms: u64, events: &mut EventManager) -> bool {
        let Some(replay) = self.replay.as_ref() else {
            return false;
        };
        if self.state == PlaybackState::Recording {
            return false;
        }

        let time_ms = time_ms.min(self.total_time_ms());
        self.current = Duration::from_millis(time_ms);
        self.cursor = replay.events.partition_point(|event| event.time_ms <= time_ms);
        self.current_frame = nearest_frame(&replay.events, time_ms);

        events.emit(GameEvent::ReplaySeek {
            time_ms,
            frame: self.current_frame,
        });
        events.emit(GameEvent::ReplayTimeUpdate {
            time_ms,
            total_ms: self.total_time_ms(),
        });
        if self.state == PlaybackState::Completed && self.current < self.total {
            self.set_state(events, PlaybackState::Paused);
        }
        true
    }

    /// Jumps to the start of logic frame `frame`.
    pub fn seek_to_frame(&mut self, frame: u64, events: &mut EventManager) -> bool {
        let time_ms = duration_to_millis(LOGIC_FRAME_INTERVAL).saturating_mul(frame);
        self.seek_to_time(time_ms, events)
    }

    /// Outcome recorded in the loaded replay.
    #[must_use]
    pub fn result(&self) -> Option<BattleResult> {
        self.replay.as_ref().and_then(|replay| replay.metadata.result)
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.current = Duration::ZERO;
        self.current_frame = 0;
    }

    fn set_state(&mut self, events: &mut EventManager, state: PlaybackState) {
        if self.state == state {
            return;
        }
        self.state = state;
        events.emit(GameEvent::ReplayStateChanged { state });
    }
}

fn nearest_frame(events: &[RecordedEvent], time_ms: u64) -> u64 {
    events
        .iter()
        .min_by_key(|event| (event.time_ms.abs_diff(time_ms), event.time_ms))
        .map_or(0, |event| event.frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{BattleResult, EntityId};

    fn recorded(time_ms: u64, frame: u64, event: GameEvent) -> RecordedEvent {
        RecordedEvent {
            kind: event.kind(),
            frame,
            time_ms,
            event,
        }
    }

    fn sample() -> ReplayData {
        let mut replay = ReplayData::new("sample", InitParams::new(1));
        replay.events = vec![
            recorded(500, 5, GameEvent::EntityRemoved { entity: EntityId::new(2) }),
            recorded(0, 0, GameEvent::BattleStart),
            recorded(1_000, 10, GameEvent::BattleEnd {
                result: BattleResult::Victory,
            }),
        ];
        replay.metadata.duration_ms = 1_000;
        replay.metadata.result = Some(BattleResult::Victory);
        replay
    }

    fn count(events: &mut EventManager, kind: EventKind) -> Rc<RefCell<u32>> {
        let total = Rc::new(RefCell::new(0));
        let sink = Rc::clone(&total);
        let handler: EventHandler = Rc::new(move |_, _| *sink.borrow_mut() += 1);
        assert!(events.on(kind, handler));
        total
    }

    #[test]
    fn a_single_large_step_fires_every_passed_event() {
        let mut events = EventManager::default();
        let removed = count(&mut events, EventKind::EntityRemoved);
        let mut manager = ReplayManager::new();
        assert!(manager.load(sample()));
        assert!(manager.play(&mut events));

        assert_eq!(manager.update(Duration::from_millis(700), &mut events), 2);
        assert_eq!(*removed.borrow(), 1);
        assert_eq!(manager.current_frame(), 5);

        assert_eq!(manager.update(Duration::from_secs(60), &mut events), 1);
        assert_eq!(manager.state(), PlaybackState::Completed);
        assert_eq!(manager.current_time_ms(), 1_000);
        assert_eq!(manager.result(), Some(BattleResult::Victory));
    }

    #[test]
    fn paused_playback_holds_its_clock() {
        let mut events = EventManager::default();
        let mut manager = ReplayManager::new();
        assert!(manager.load(sample()));
        assert!(!manager.pause(&mut events));
        assert!(manager.play(&mut events));
        let _ = manager.update(Duration::from_millis(200), &mut events);
        assert!(manager.pause(&mut events));
        assert_eq!(manager.update(Duration::from_secs(5), &mut events), 0);
        assert_eq!(manager.current_time_ms(), 200);
        assert!(manager.play(&mut events));

        manager.set_speed(2.0);
        let _ = manager.update(Duration::from_millis(200), &mut events);
        assert_eq!(manager.current_time_ms(), 600);
    }

    #[test]
    fn seeking_repositions_without_firing() {
        let mut events = EventManager::default();
        let removed = count(&mut events, EventKind::EntityRemoved);
        let seeks = count(&mut events, EventKind::ReplaySeek);
        let mut manager = ReplayManager::new();
        assert!(manager.load(sample()));

        assert!(manager.seek_to_time(5_000, &mut events));
        assert_eq!(manager.current_time_ms(), 1_000);
        assert_eq!(manager.current_frame(), 10);

        assert!(manager.seek_to_frame(6, &mut events));
        assert_eq!(manager.current_time_ms(), 600);
        assert_eq!(manager.current_frame(), 5);
        assert_eq!(*removed.borrow(), 0);
        assert_eq!(*seeks.borrow(), 2);

        assert!(manager.seek_to_time(400, &mut events));
        assert!(manager.play(&mut events));
        assert_eq!(manager.update(Duration::from_millis(100), &mut events), 1);
        assert_eq!(*removed.borrow(), 1);
    }

    #[test]
    fn speed_is_clamped() {
        let mut manager = ReplayManager::new();
        manager.set_speed(100.0);
        assert_eq!(manager.speed(), MAX_PLAYBACK_SPEED);
        manager.set_speed(0.0);
        assert_eq!(manager.speed(), MIN_PLAYBACK_SPEED);
        manager.set_speed(f64::NAN);
        assert_eq!(manager.speed(), 1.0);
    }
}
