#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Fixed-rate clock driving the battle.
//!
//! Wall-clock time is accumulated and sliced into 20 ms inner frames. Every
//! fifth inner frame is also a logic frame, and commands scheduled for that
//! logic frame are handed to the handler before its update runs.

use std::collections::BTreeMap;
use std::time::Duration;

use crystal_defence_core::{Command, INNER_FRAMES_PER_LOGIC_FRAME, INNER_FRAME_INTERVAL};

/// Slowest accepted simulation speed.
pub const MIN_SPEED: f64 = 0.1;
/// Fastest accepted simulation speed.
pub const MAX_SPEED: f64 = 10.0;

/// Whether an inner frame also closes a logic frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Plain inner frame.
    Inner,
    /// Inner frame that also advanced the logic counter.
    Logic,
}

/// Clock position handed to the handler.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameTick {
    /// Frame category.
    pub kind: FrameKind,
    /// Inner frame counter, starting at 1.
    pub inner_frame: u64,
    /// Logic frame counter.
    pub logic_frame: u64,
    /// Fixed step length.
    pub dt: Duration,
    /// Simulated time at the end of this frame.
    pub now: Duration,
}

/// Receives the clock's frames.
pub trait FrameHandler {
    /// Executes commands scheduled for the logic frame in `tick`.
    fn process_commands(&mut self, tick: FrameTick, commands: &[Command]);

    /// Advances the simulation by one inner frame.
    fn update(&mut self, tick: FrameTick);

    /// Whether the simulation has ended; the clock stops once it has.
    fn is_finished(&self) -> bool {
        false
    }
}

/// Run state of the clock.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClockState {
    /// Not advancing; counters kept.
    Stopped,
    /// Advancing on every tick.
    Running,
    /// Suspended; ticks are ignored.
    Paused,
}

/// Fixed-step clock with a per-frame command buffer.
#[derive(Debug)]
pub struct FrameManager {
    state: ClockState,
    inner_frame: u64,
    logic_frame: u64,
    accumulator: Duration,
    simulation_mode: bool,
    speed: f64,
    pending: BTreeMap<u64, Vec<Command>>,
    processed: Vec<Command>,
}

impl Default for FrameManager {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameManager {
    /// Creates a stopped clock at frame zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: ClockState::Stopped,
            inner_frame: 0,
            logic_frame: 0,
            accumulator: Duration::ZERO,
            simulation_mode: false,
            speed: 1.0,
            pending: BTreeMap::new(),
            processed: Vec::new(),
        }
    }

    /// Current run state.
    #[must_use]
    pub fn state(&self) -> ClockState {
        self.state
    }

    /// Inner frames run so far.
    #[must_use]
    pub fn inner_frame(&self) -> u64 {
        self.inner_frame
    }

    /// Logic frames run so far.
    #[must_use]
    pub fn logic_frame(&self) -> u64 {
        self.logic_frame
    }

    /// Simulated time covered by the frames run so far.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        frame_time(self.inner_frame)
    }

    /// Effective speed multiplier applied to ticks.
    #[must_use]
    pub fn speed(&self) -> f64 {
        if self.simulation_mode {
            self.speed
        } else {
            1.0
        }
    }

    /// Commands already handed to the handler, in execution order.
    #[must_use]
    pub fn processed_commands(&self) -> &[Command] {
        &self.processed
    }

    /// Commands waiting for their logic frame.
    #[must_use]
    pub fn pending_commands(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Starts a stopped clock from frame zero. Returns `false` if it was not
    /// stopped.
    ///
    /// Buffered commands survive a restart; [`FrameManager::reset`] drops them.
    pub fn start(&mut self) -> bool {
        if self.state != ClockState::Stopped {
            tracing::warn!(state = ?self.state, "clock already started");
            return false;
        }
        self.state = ClockState::Running;
        self.inner_frame = 0;
        self.logic_frame = 0;
        self.accumulator = Duration::ZERO;
        true
    }

    /// Suspends a running clock.
    pub fn pause(&mut self) -> bool {
        if self.state != ClockState::Running {
            tracing::warn!(state = ?self.state, "pause ignored");
            return false;
        }
        self.state = ClockState::Paused;
        true
    }

    /// Resumes a paused clock. Time spent paused is never simulated.
    pub fn resume(&mut self) -> bool {
        if self.state != ClockState::Paused {
            tracing::warn!(state = ?self.state, "resume ignored");
            return false;
        }
        self.state = ClockState::Running;
        self.accumulator = Duration::ZERO;
        true
    }

    /// Stops the clock, keeping its counters.
    pub fn stop(&mut self) {
        self.state = ClockState::Stopped;
        self.accumulator = Duration::ZERO;
    }

    /// Stops the clock and forgets every frame and command.
    pub fn reset(&mut self) {
        *self = Self {
            simulation_mode: self.simulation_mode,
            speed: self.speed,
            ..Self::new()
        };
    }

    /// Enables fast-forward with `speed`, clamped to the accepted range.
    pub fn set_simulation_mode(&mut self, enabled: bool, speed: f64) {
        self.simulation_mode = enabled;
        self.speed = if speed.is_finite() {
            speed.clamp(MIN_SPEED, MAX_SPEED)
        } else {
            1.0
        };
    }

    /// Queues `command` for its logic frame.
    ///
    /// Commands for the current or an earlier logic frame are rejected.
    pub fn add_command(&mut self, command: Command) -> bool {
        if command.frame <= self.logic_frame {
            tracing::warn!(
                frame = command.frame,
                logic_frame = self.logic_frame,
                "command scheduled for a past frame rejected"
            );
            return false;
        }
        self.pending.entry(command.frame).or_default().push(command);
        true
    }

    /// Accumulates `elapsed` wall-clock time and runs every whole inner frame
    /// it covers. Returns the number of frames run.
    pub fn tick<H: FrameHandler>(&mut self, elapsed: Duration, handler: &mut H) -> u64 {
        if self.state != ClockState::Running {
            return 0;
        }
        let scaled = if self.simulation_mode {
            elapsed.mul_f64(self.speed)
        } else {
            elapsed
        };
        self.accumulator = self.accumulator.saturating_add(scaled);

        let mut frames = 0;
        while self.state == ClockState::Running && self.accumulator >= INNER_FRAME_INTERVAL {
            self.accumulator -= INNER_FRAME_INTERVAL;
            self.advance(handler);
            frames += 1;
        }
        frames
    }

    /// Runs exactly one inner frame on a started clock.
    pub fn step<H: FrameHandler>(&mut self, handler: &mut H) -> bool {
        if self.state == ClockState::Stopped {
            tracing::warn!("step ignored on a stopped clock");
            return false;
        }
        self.advance(handler);
        true
    }

    fn advance<H: FrameHandler>(&mut self, handler: &mut H) {
        self.inner_frame += 1;
        let mut tick = FrameTick {
            kind: FrameKind::Inner,
            inner_frame: self.inner_frame,
            logic_frame: self.logic_frame,
            dt: INNER_FRAME_INTERVAL,
            now: frame_time(self.inner_frame),
        };

        if self.inner_frame % INNER_FRAMES_PER_LOGIC_FRAME == 0 {
            self.logic_frame += 1;
            tick.kind = FrameKind::Logic;
            tick.logic_frame = self.logic_frame;
            let commands = self.pending.remove(&self.logic_frame).unwrap_or_default();
            handler.process_commands(tick, &commands);
            self.processed.extend(commands);
        }

        handler.update(tick);
        if handler.is_finished() {
            tracing::debug!(inner_frame = self.inner_frame, "handler finished; clock stopped");
            self.stop();
        }
    }
}

fn frame_time(inner_frame: u64) -> Duration {
    INNER_FRAME_INTERVAL.saturating_mul(u32::try_from(inner_frame).unwrap_or(u32::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{CommandAction, PlayerId};

    #[derive(Default)]
    struct Recorder {
        updates: Vec<FrameTick>,
        commands: Vec<(u64, usize)>,
        finish_after: Option<u64>,
    }

    impl FrameHandler for Recorder {
        fn process_commands(&mut self, tick: FrameTick, commands: &[Command]) {
            self.commands.push((tick.logic_frame, commands.len()));
        }

        fn update(&mut self, tick: FrameTick) {
            self.updates.push(tick);
        }

        fn is_finished(&self) -> bool {
            self.finish_after
                .is_some_and(|frames| self.updates.len() as u64 >= frames)
        }
    }

    fn learn(frame: u64) -> Command {
        Command::new(
            frame,
            PlayerId::new(1),
            CommandAction::LearnSkill {
                skill_id: "bolt".to_owned(),
            },
        )
    }

    #[test]
    fn every_fifth_inner_frame_is_a_logic_frame() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder::default();
        assert!(clock.start());

        assert_eq!(clock.tick(Duration::from_millis(210), &mut recorder), 10);
        let kinds: Vec<FrameKind> = recorder.updates.iter().map(|tick| tick.kind).collect();
        assert_eq!(kinds[4], FrameKind::Logic);
        assert_eq!(kinds[9], FrameKind::Logic);
        assert_eq!(kinds.iter().filter(|kind| **kind == FrameKind::Logic).count(), 2);
        assert_eq!(clock.logic_frame(), 2);
        assert_eq!(clock.elapsed(), Duration::from_millis(200));

        assert_eq!(clock.tick(Duration::from_millis(10), &mut recorder), 1);
    }

    #[test]
    fn commands_run_before_the_logic_update() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder::default();
        assert!(clock.add_command(learn(1)));
        assert!(clock.add_command(learn(1)));
        assert!(clock.start());

        let _ = clock.tick(Duration::from_millis(100), &mut recorder);
        assert_eq!(recorder.commands, vec![(1, 2)]);
        assert_eq!(clock.processed_commands().len(), 2);
        assert_eq!(clock.pending_commands(), 0);
    }

    #[test]
    fn current_frame_commands_are_rejected() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder::default();
        assert!(clock.start());
        let _ = clock.tick(Duration::from_millis(100), &mut recorder);

        assert!(!clock.add_command(learn(clock.logic_frame())));
        let _ = clock.tick(Duration::from_millis(500), &mut recorder);
        assert!(clock.processed_commands().is_empty());
    }

    #[test]
    fn restarting_counts_from_frame_zero() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder::default();
        assert!(clock.start());
        let _ = clock.tick(Duration::from_millis(300), &mut recorder);
        assert_eq!(clock.logic_frame(), 3);
        clock.stop();

        assert!(clock.add_command(learn(4)));
        assert!(clock.start());
        assert_eq!(clock.inner_frame(), 0);
        assert_eq!(clock.logic_frame(), 0);
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(clock.pending_commands(), 1);
    }

    #[test]
    fn pause_freezes_time() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder::default();
        assert!(clock.start());
        assert!(clock.pause());
        assert_eq!(clock.tick(Duration::from_secs(5), &mut recorder), 0);
        assert!(clock.resume());
        assert_eq!(clock.tick(Duration::from_millis(40), &mut recorder), 2);
        assert!(!clock.resume());
    }

    #[test]
    fn simulation_speed_is_clamped() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder::default();
        clock.set_simulation_mode(true, 50.0);
        assert_eq!(clock.speed(), MAX_SPEED);
        assert!(clock.start());
        assert_eq!(clock.tick(Duration::from_millis(100), &mut recorder), 50);
    }

    #[test]
    fn finished_handler_stops_the_clock() {
        let mut clock = FrameManager::new();
        let mut recorder = Recorder {
            finish_after: Some(3),
            ..Recorder::default()
        };
        assert!(clock.start());
        assert_eq!(clock.tick(Duration::from_secs(1), &mut recorder), 3);
        assert_eq!(clock.state(), ClockState::Stopped);
        assert!(!clock.step(&mut recorder));
    }
}
