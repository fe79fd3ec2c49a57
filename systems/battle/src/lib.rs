#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Battle orchestration.
//!
//! [`BattleManager`] owns one battle from initialisation to its outcome. It
//! wires the entity registry, damage, skills, waves and the frame clock
//! together, executes player commands on their scheduled logic frame, and
//! keeps the seed and command stream needed to reproduce the run.

mod ai;
mod commands;
mod factory;
mod simulation;

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use crystal_defence_core::{
    BattleResult, BattleStatistics, BeanKind, Command, EntityKind, GameEvent, InitParams,
    PlayerId, ReplayData, WaveConfigError,
};
use crystal_defence_events::{EventConfig, EventManager};
use crystal_defence_frame::FrameManager;
use crystal_defence_random::RandomState;
use crystal_defence_waves::{synthesize_waves, WaveManager, WaveSettings};
use crystal_defence_world::{BeanProfile, EntityManager};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use ai::HeroAi;

use simulation::BattleSimulation;

/// Experience and gold granted for killing a bean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeanReward {
    /// Experience points.
    pub exp: u32,
    /// Gold.
    pub gold: u32,
}

/// Tunables for a battle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BattleSettings {
    /// Side length of a spatial grid cell.
    pub grid_cell_size: f64,
    /// Capacity of the event history.
    pub max_history_size: usize,
    /// Whether emitted events are kept in the history.
    pub record_history: bool,
    /// Spawn ring and wave pacing.
    pub waves: WaveSettings,
    /// Distance between the crystal and the hero slots.
    pub hero_slot_radius: f64,
    /// Per-kind overrides of the kill rewards.
    pub rewards: BTreeMap<BeanKind, BeanReward>,
}

impl Default for BattleSettings {
    fn default() -> Self {
        Self {
            grid_cell_size: crystal_defence_world::DEFAULT_CELL_SIZE,
            max_history_size: 1_000,
            record_history: false,
            waves: WaveSettings::default(),
            hero_slot_radius: 150.0,
            rewards: BTreeMap::new(),
        }
    }
}

impl BattleSettings {
    /// Reward for killing a bean of `kind`, falling back to its profile.
    #[must_use]
    pub fn reward(&self, kind: BeanKind) -> BeanReward {
        self.rewards.get(&kind).copied().unwrap_or_else(|| {
            let profile = BeanProfile::of(kind);
            BeanReward {
                exp: profile.exp,
                gold: profile.gold,
            }
        })
    }
}

/// Lifecycle of a [`BattleManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BattleState {
    /// Initialised or never started.
    Idle,
    /// Building the battle.
    Initializing,
    /// Clock running.
    Running,
    /// Clock suspended.
    Paused,
    /// An outcome was reached.
    Completed,
    /// Reserved for unrecoverable faults.
    Failed,
}

/// Reasons a battle cannot be initialised.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum BattleError {
    /// The wave table or spawn ring is malformed.
    #[error("invalid waves: {0}")]
    Waves(#[from] WaveConfigError),
    /// Two heroes belong to one player.
    #[error("player {player} appears more than once")]
    DuplicatePlayer {
        /// Repeated player.
        player: PlayerId,
    },
}

/// Bit-exact projection of one entity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntitySnapshot {
    /// Entity id.
    pub id: u32,
    /// Entity kind.
    pub kind: EntityKind,
    /// Health, as raw bits.
    pub hp_bits: u64,
    /// Horizontal position, as raw bits.
    pub x_bits: u64,
    /// Vertical position, as raw bits.
    pub y_bits: u64,
}

/// Bit-exact projection of a battle, suitable for hashing.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct BattleSnapshot {
    /// Inner frames run.
    pub inner_frame: u64,
    /// Logic frames run.
    pub logic_frame: u64,
    /// Entities in id order.
    pub entities: Vec<EntitySnapshot>,
    /// Random stream position.
    pub rng: RandomState,
    /// Current wave index.
    pub wave: Option<usize>,
    /// Outcome, once decided.
    pub result: Option<BattleResult>,
}

/// Owns and drives a single battle.
#[derive(Debug)]
pub struct BattleManager {
    state: BattleState,
    frames: FrameManager,
    sim: BattleSimulation,
}

impl Default for BattleManager {
    fn default() -> Self {
        Self::new(BattleSettings::default())
    }
}

impl BattleManager {
    /// Creates an idle manager.
    #[must_use]
    pub fn new(settings: BattleSettings) -> Self {
        let events = EventManager::new(EventConfig {
            record_history: settings.record_history,
            max_history_size: settings.max_history_size,
            buffer_outbox: true,
        });
        Self {
            state: BattleState::Idle,
            frames: FrameManager::new(),
            sim: BattleSimulation::idle(settings, events),
        }
    }

    /// Builds the battle described by `params`, discarding any previous one.
    ///
    /// Event subscriptions survive re-initialisation.
    pub fn init_battle(&mut self, params: InitParams) -> Result<(), BattleError> {
        let mut players = BTreeSet::new();
        if let Some(player) = params
            .players
            .iter()
            .map(|player| player.player_id)
            .find(|player| !players.insert(*player))
        {
            return Err(BattleError::DuplicatePlayer { player });
        }

        let table = params
            .waves
            .clone()
            .unwrap_or_else(|| synthesize_waves(params.level));
        let settings = self.sim.settings.clone();
        let waves = WaveManager::new(table, settings.waves.clone())?;

        self.state = BattleState::Initializing;
        self.frames.reset();
        let mut events = std::mem::take(&mut self.sim.events);
        events.reset();

        let replay_id = replay_id(&params);
        tracing::info!(
            replay = %replay_id,
            seed = params.seed,
            players = params.players.len(),
            waves = waves.wave_count(),
            "battle initialised"
        );
        self.sim = BattleSimulation::build(&params, replay_id, settings, events, waves);
        self.state = BattleState::Idle;
        Ok(())
    }

    /// Starts the clock and the first wave.
    pub fn start_battle(&mut self) -> bool {
        if self.state != BattleState::Idle || self.sim.crystal.is_none() {
            tracing::warn!(state = ?self.state, "start ignored");
            return false;
        }
        let _ = self.frames.start();
        self.state = BattleState::Running;
        tracing::info!("battle started");
        self.sim.waves.start_battle(self.sim.now, &mut self.sim.events);
        true
    }

    /// Suspends a running battle.
    pub fn pause_battle(&mut self) -> bool {
        if self.state != BattleState::Running || !self.frames.pause() {
            return false;
        }
        self.state = BattleState::Paused;
        self.sim.events.emit(GameEvent::BattlePause);
        true
    }

    /// Resumes a paused battle.
    pub fn resume_battle(&mut self) -> bool {
        if self.state != BattleState::Paused || !self.frames.resume() {
            return false;
        }
        self.state = BattleState::Running;
        self.sim.events.emit(GameEvent::BattleResume);
        true
    }

    /// Schedules a player command. Only a running battle accepts commands.
    pub fn submit_command(&mut self, command: Command) -> bool {
        if self.state != BattleState::Running {
            tracing::warn!(state = ?self.state, "command rejected outside a running battle");
            return false;
        }
        self.frames.add_command(command)
    }

    /// Feeds `elapsed` wall-clock time to the clock. Returns the inner
    /// frames run.
    pub fn tick(&mut self, elapsed: Duration) -> u64 {
        let frames = self.frames.tick(elapsed, &mut self.sim);
        self.settle();
        frames
    }

    /// Runs exactly one inner frame.
    pub fn step(&mut self) -> bool {
        if self.state != BattleState::Running {
            return false;
        }
        let stepped = self.frames.step(&mut self.sim);
        self.settle();
        stepped
    }

    /// Steps until the battle ends or `max_inner_frames` have run.
    pub fn run_to_completion(&mut self, max_inner_frames: u64) -> Option<BattleResult> {
        for _ in 0..max_inner_frames {
            if !self.step() {
                break;
            }
        }
        self.result()
    }

    /// Ends the battle with `result`.
    pub fn end_battle(&mut self, result: BattleResult) -> bool {
        if !matches!(self.state, BattleState::Running | BattleState::Paused) {
            tracing::warn!(state = ?self.state, "end ignored");
            return false;
        }
        self.frames.stop();
        self.state = BattleState::Completed;
        let result = *self.sim.result.get_or_insert(result);
        let statistics = self.sim.statistics();

        let metadata = &mut self.sim.replay.metadata;
        metadata.duration_ms = statistics.duration_ms;
        metadata.total_frames = statistics.logic_frames;
        metadata.result = Some(result);
        let players = metadata.player_ids.clone();

        tracing::info!(
            ?result,
            frames = statistics.logic_frames,
            defeated = statistics.total_enemies_defeated,
            "battle ended"
        );
        self.sim.events.emit(GameEvent::BattleEnd { result });
        self.sim.events.emit(GameEvent::GameOver {
            result,
            statistics,
            players,
        });
        true
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> BattleState {
        self.state
    }

    /// Outcome, once decided.
    #[must_use]
    pub fn result(&self) -> Option<BattleResult> {
        self.sim.result
    }

    /// Aggregate counters so far.
    #[must_use]
    pub fn statistics(&self) -> BattleStatistics {
        self.sim.statistics()
    }

    /// Inner frames run so far.
    #[must_use]
    pub fn inner_frame(&self) -> u64 {
        self.frames.inner_frame()
    }

    /// Logic frames run so far.
    #[must_use]
    pub fn logic_frame(&self) -> u64 {
        self.frames.logic_frame()
    }

    /// Event bus, for inspecting history.
    #[must_use]
    pub fn events(&self) -> &EventManager {
        &self.sim.events
    }

    /// Event bus, for subscribing.
    pub fn events_mut(&mut self) -> &mut EventManager {
        &mut self.sim.events
    }

    /// Entity registry.
    #[must_use]
    pub fn entities(&self) -> &EntityManager {
        &self.sim.entities
    }

    /// Wave scheduler.
    #[must_use]
    pub fn waves(&self) -> &WaveManager {
        &self.sim.waves
    }

    /// Seed, parameters and command stream of the current battle.
    #[must_use]
    pub fn replay(&self) -> &ReplayData {
        &self.sim.replay
    }

    /// Bit-exact projection of the current state.
    #[must_use]
    pub fn snapshot(&self) -> BattleSnapshot {
        let entities = self
            .sim
            .entities
            .iter()
            .map(|entity| EntitySnapshot {
                id: entity.id().get(),
                kind: entity.kind(),
                hp_bits: entity.hp().to_bits(),
                x_bits: entity.position().x.to_bits(),
                y_bits: entity.position().y.to_bits(),
            })
            .collect();
        BattleSnapshot {
            inner_frame: self.frames.inner_frame(),
            logic_frame: self.frames.logic_frame(),
            entities,
            rng: self.sim.rng.state(),
            wave: self.sim.waves.current_wave(),
            result: self.sim.result,
        }
    }

    /// Re-runs `replay` from its seed and command stream.
    pub fn resimulate(
        replay: &ReplayData,
        settings: BattleSettings,
        max_inner_frames: u64,
    ) -> Result<Self, BattleError> {
        let mut params = replay.init_params.clone();
        params.seed = replay.random_seed;

        let mut battle = Self::new(settings);
        battle.init_battle(params)?;
        let _ = battle.start_battle();
        for command in &replay.commands {
            let _ = battle.submit_command(command.clone());
        }
        let _ = battle.run_to_completion(max_inner_frames);
        Ok(battle)
    }

    fn settle(&mut self) {
        if let Some(result) = self.sim.result {
            if self.state == BattleState::Running {
                let _ = self.end_battle(result);
            }
        }
    }
}

fn replay_id(params: &InitParams) -> String {
    let payload = serde_json::to_vec(params).unwrap_or_default();
    format!("replay-{:x}", Sha256::digest(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{PlayerParams, StatKey, Stats};

    fn params(seed: u32) -> InitParams {
        let mut params = InitParams::new(seed);
        params.players.push(PlayerParams::new(
            PlayerId::new(1),
            "warrior",
            1,
            Stats::new().with(StatKey::Hp, 800.0).with(StatKey::Attack, 50.0),
        ));
        params
    }

    #[test]
    fn reward_table_overrides_profiles() {
        let mut settings = BattleSettings::default();
        let _ = settings
            .rewards
            .insert(BeanKind::Normal, BeanReward { exp: 1, gold: 2 });
        assert_eq!(settings.reward(BeanKind::Normal), BeanReward { exp: 1, gold: 2 });
        assert_eq!(settings.reward(BeanKind::Boss).exp, BeanProfile::of(BeanKind::Boss).exp);
    }

    #[test]
    fn duplicate_players_are_rejected() {
        let mut params = params(7);
        params.players.push(params.players[0].clone());
        let mut battle = BattleManager::default();
        assert_eq!(
            battle.init_battle(params),
            Err(BattleError::DuplicatePlayer {
                player: PlayerId::new(1)
            })
        );
        assert_eq!(battle.state(), BattleState::Idle);
        assert!(!battle.start_battle());
    }

    #[test]
    fn lifecycle_follows_start_pause_resume() {
        let mut battle = BattleManager::default();
        battle.init_battle(params(7)).expect("init");
        assert_eq!(battle.entities().len(), 2);
        assert!(!battle.pause_battle());
        assert!(battle.start_battle());
        assert!(!battle.start_battle());
        assert!(battle.pause_battle());
        assert!(!battle.step());
        assert!(battle.resume_battle());
        assert!(battle.step());
        assert_eq!(battle.inner_frame(), 1);
    }

    #[test]
    fn replay_ids_depend_on_parameters() {
        assert_eq!(replay_id(&params(1)), replay_id(&params(1)));
        assert_ne!(replay_id(&params(1)), replay_id(&params(2)));
        assert!(replay_id(&params(1)).starts_with("replay-"));
    }
}
