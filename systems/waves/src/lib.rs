#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Wave scheduling for the battle.
//!
//! The manager never builds entities itself. Each update pushes
//! [`SpawnRequest`] values which the battle turns into beans, and the battle
//! reports deaths back through [`WaveManager::on_enemy_defeated`].

mod synth;

use std::time::Duration;

use crystal_defence_core::{
    AttributeMultipliers, BeanKind, GameEvent, Position, SpecialSpawn, WaveConfig,
    WaveConfigError,
};
use crystal_defence_events::EventManager;
use crystal_defence_random::RandomManager;
use serde::{Deserialize, Serialize};

pub use synth::synthesize_waves;

const TWO_PI: f64 = std::f64::consts::TAU;

/// Lifecycle of a single wave.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum WaveStatus {
    /// Not started yet.
    Pending,
    /// Spawning or waiting for its enemies to die.
    Active,
    /// Every enemy was spawned and defeated.
    Completed,
}

/// Spawn ring and pacing shared by every wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WaveSettings {
    /// Centre of the spawn ring.
    pub spawn_center: Position,
    /// Inner radius of the spawn ring.
    pub spawn_min: f64,
    /// Outer radius of the spawn ring.
    pub spawn_max: f64,
    /// Starts the following wave after its delay once one completes.
    pub auto_next_wave: bool,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            spawn_center: Position::ZERO,
            spawn_min: 400.0,
            spawn_max: 500.0,
            auto_next_wave: true,
        }
    }
}

/// An enemy the battle should create.
#[derive(Clone, Debug, PartialEq)]
pub struct SpawnRequest {
    /// Index of the spawning wave.
    pub wave: usize,
    /// Variety to build.
    pub bean_type: BeanKind,
    /// Spawn location on the ring.
    pub position: Position,
    /// Attribute scaling on top of the base profile.
    pub multipliers: AttributeMultipliers,
    /// Whether this is a one-shot special spawn.
    pub special: bool,
}

/// Spawned, defeated and total enemy counts for a wave.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WaveProgress {
    /// Enemies spawned so far.
    pub spawned: u32,
    /// Enemies defeated so far.
    pub defeated: u32,
    /// Enemies the wave fields.
    pub total: u32,
}

#[derive(Debug)]
struct WaveRuntime {
    config: WaveConfig,
    status: WaveStatus,
    regular_spawned: u32,
    spawned: u32,
    defeated: u32,
    started_at: Duration,
    last_spawn: Option<Duration>,
    pending_specials: Vec<SpecialSpawn>,
}

impl WaveRuntime {
    fn new(config: WaveConfig) -> Self {
        Self {
            config,
            status: WaveStatus::Pending,
            regular_spawned: 0,
            spawned: 0,
            defeated: 0,
            started_at: Duration::ZERO,
            last_spawn: None,
            pending_specials: Vec::new(),
        }
    }

    fn is_finished(&self) -> bool {
        let total = self.config.total_enemies();
        self.spawned == total && self.defeated == total
    }
}

/// Drives the wave state machines of one battle.
#[derive(Debug)]
pub struct WaveManager {
    waves: Vec<WaveRuntime>,
    settings: WaveSettings,
    current: Option<usize>,
    next_wave_at: Option<Duration>,
    all_completed: bool,
}

impl Default for WaveManager {
    fn default() -> Self {
        Self {
            waves: Vec::new(),
            settings: WaveSettings::default(),
            current: None,
            next_wave_at: None,
            all_completed: false,
        }
    }
}

impl WaveManager {
    /// Validates `waves` and the spawn ring and builds a manager with every
    /// wave pending.
    pub fn new(waves: Vec<WaveConfig>, settings: WaveSettings) -> Result<Self, WaveConfigError> {
        if settings.spawn_min > settings.spawn_max {
            return Err(WaveConfigError::InvertedSpawnRing {
                min: settings.spawn_min,
                max: settings.spawn_max,
            });
        }
        for wave in &waves {
            wave.validate()?;
        }
        Ok(Self {
            waves: waves.into_iter().map(WaveRuntime::new).collect(),
            settings,
            current: None,
            next_wave_at: None,
            all_completed: false,
        })
    }

    /// Spawn ring and pacing.
    #[must_use]
    pub fn settings(&self) -> &WaveSettings {
        &self.settings
    }

    /// Number of configured waves.
    #[must_use]
    pub fn wave_count(&self) -> usize {
        self.waves.len()
    }

    /// Index of the most recently started wave.
    #[must_use]
    pub fn current_wave(&self) -> Option<usize> {
        self.current
    }

    /// Status of wave `index`.
    #[must_use]
    pub fn status(&self, index: usize) -> Option<WaveStatus> {
        self.waves.get(index).map(|wave| wave.status)
    }

    /// Counters of wave `index`.
    #[must_use]
    pub fn progress(&self, index: usize) -> Option<WaveProgress> {
        self.waves.get(index).map(|wave| WaveProgress {
            spawned: wave.spawned,
            defeated: wave.defeated,
            total: wave.config.total_enemies(),
        })
    }

    /// Whether the final wave has completed.
    #[must_use]
    pub fn is_all_completed(&self) -> bool {
        self.all_completed
    }

    /// Opens the battle and starts the first wave.
    pub fn start_battle(&mut self, now: Duration, events: &mut EventManager) {
        events.emit(GameEvent::BattleStart);
        if self.waves.is_empty() {
            self.all_completed = true;
            events.emit(GameEvent::AllWavesCompleted);
            return;
        }
        let _ = self.start_next_wave(now, events);
    }

    /// Starts the wave after the current one.
    ///
    /// Returns `false` when no wave is left.
    pub fn start_next_wave(&mut self, now: Duration, events: &mut EventManager) -> bool {
        let index = self.current.map_or(0, |current| current + 1);
        let Some(wave) = self.waves.get_mut(index) else {
            tracing::debug!(index, "no wave left to start");
            return false;
        };

        wave.status = WaveStatus::Active;
        wave.regular_spawned = 0;
        wave.spawned = 0;
        wave.defeated = 0;
        wave.started_at = now;
        wave.last_spawn = None;
        wave.pending_specials = wave.config.special_spawns.clone();
        wave.pending_specials.sort_by_key(|special| special.at_ms);
        self.current = Some(index);
        self.next_wave_at = None;

        let total = wave.config.total_enemies();
        tracing::info!(wave = index, id = %wave.config.id, total, "wave started");
        events.emit(GameEvent::WaveStart {
            wave: index,
            wave_id: wave.config.id.clone(),
            total,
        });
        true
    }

    /// Advances the active wave to `now`, pushing due spawns into `out`.
    pub fn update(
        &mut self,
        now: Duration,
        rng: &mut RandomManager,
        events: &mut EventManager,
        out: &mut Vec<SpawnRequest>,
    ) {
        if self.next_wave_at.is_some_and(|at| now >= at) {
            let _ = self.start_next_wave(now, events);
        }
        let Some(index) = self.current else {
            return;
        };
        let settings = &self.settings;
        let Some(wave) = self.waves.get_mut(index) else {
            return;
        };
        if wave.status != WaveStatus::Active {
            return;
        }

        let interval_elapsed = wave
            .last_spawn
            .map_or(true, |last| now.saturating_sub(last) >= wave.config.spawn_interval());
        if wave.regular_spawned < wave.config.total_count && interval_elapsed {
            let weights: Vec<f64> = wave.config.enemies.iter().map(|entry| entry.weight).collect();
            match rng.weighted_random(&wave.config.enemies, &weights) {
                Ok(entry) => {
                    out.push(SpawnRequest {
                        wave: index,
                        bean_type: entry.bean_type,
                        position: ring_position(settings, rng),
                        multipliers: entry.multipliers,
                        special: false,
                    });
                    wave.regular_spawned += 1;
                    wave.spawned += 1;
                    wave.last_spawn = Some(now);
                }
                Err(error) => {
                    tracing::error!(wave = index, %error, "enemy table unusable");
                }
            }
        }

        let elapsed = now.saturating_sub(wave.started_at);
        let due = wave
            .pending_specials
            .iter()
            .take_while(|special| Duration::from_millis(special.at_ms) <= elapsed)
            .count();
        for special in wave.pending_specials.drain(..due) {
            out.push(SpawnRequest {
                wave: index,
                bean_type: special.bean_type,
                position: ring_position(settings, rng),
                multipliers: AttributeMultipliers::SPECIAL,
                special: true,
            });
            wave.spawned += 1;
        }

        if wave.is_finished() {
            self.complete(index, now, events);
        }
    }

    /// Records the death of an enemy spawned by wave `index`.
    pub fn on_enemy_defeated(&mut self, index: usize, now: Duration, events: &mut EventManager) {
        let Some(wave) = self.waves.get_mut(index) else {
            tracing::warn!(wave = index, "defeat reported for unknown wave");
            return;
        };
        if wave.status != WaveStatus::Active || wave.defeated >= wave.spawned {
            tracing::warn!(wave = index, status = ?wave.status, "unexpected defeat report ignored");
            return;
        }

        wave.defeated += 1;
        events.emit(GameEvent::WaveProgress {
            wave: index,
            defeated: wave.defeated,
            total: wave.config.total_enemies(),
        });
        if wave.is_finished() {
            self.complete(index, now, events);
        }
    }

    fn complete(&mut self, index: usize, now: Duration, events: &mut EventManager) {
        let Some(wave) = self.waves.get_mut(index) else {
            return;
        };
        wave.status = WaveStatus::Completed;
        let delay = wave.config.delay();
        tracing::info!(wave = index, "wave completed");
        events.emit(GameEvent::WaveCompleted { wave: index });

        if index + 1 == self.waves.len() {
            self.all_completed = true;
            tracing::info!("all waves completed");
            events.emit(GameEvent::AllWavesCompleted);
        } else if self.settings.auto_next_wave {
            self.next_wave_at = Some(now + delay);
        }
    }
}

fn ring_position(settings: &WaveSettings, rng: &mut RandomManager) -> Position {
    let angle = rng.random_float(0.0, TWO_PI);
    let distance = rng.random_float(settings.spawn_min, settings.spawn_max);
    settings.spawn_center + Position::new(angle.cos(), angle.sin()) * distance
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::EnemyEntry;

    fn wave(id: &str, count: u32, specials: Vec<SpecialSpawn>) -> WaveConfig {
        WaveConfig {
            id: id.to_owned(),
            name: id.to_owned(),
            enemies: vec![EnemyEntry::new(BeanKind::Normal, 1.0)],
            total_count: count,
            spawn_interval_ms: 1_000,
            delay_ms: 2_000,
            special_spawns: specials,
        }
    }

    fn run(
        manager: &mut WaveManager,
        rng: &mut RandomManager,
        events: &mut EventManager,
        ms: u64,
    ) -> Vec<SpawnRequest> {
        let mut out = Vec::new();
        manager.update(Duration::from_millis(ms), rng, events, &mut out);
        out
    }

    #[test]
    fn one_regular_spawn_per_interval() {
        let mut manager = WaveManager::new(vec![wave("w1", 3, Vec::new())], WaveSettings::default())
            .expect("valid");
        let mut rng = RandomManager::new(9);
        let mut events = EventManager::default();
        manager.start_battle(Duration::ZERO, &mut events);

        assert_eq!(run(&mut manager, &mut rng, &mut events, 0).len(), 1);
        assert!(run(&mut manager, &mut rng, &mut events, 500).is_empty());
        let spawned = run(&mut manager, &mut rng, &mut events, 1_000);
        assert_eq!(spawned.len(), 1);
        let distance = spawned[0].position.length();
        assert!((400.0..=500.0).contains(&distance));
        assert_eq!(manager.progress(0).map(|p| p.spawned), Some(2));
    }

    #[test]
    fn specials_fire_once_with_the_preset() {
        let specials = vec![SpecialSpawn {
            at_ms: 1_500,
            bean_type: BeanKind::Giant,
        }];
        let mut manager = WaveManager::new(vec![wave("w1", 1, specials)], WaveSettings::default())
            .expect("valid");
        let mut rng = RandomManager::new(4);
        let mut events = EventManager::default();
        manager.start_battle(Duration::ZERO, &mut events);

        let _ = run(&mut manager, &mut rng, &mut events, 0);
        let spawned = run(&mut manager, &mut rng, &mut events, 2_000);
        assert_eq!(spawned.len(), 1);
        assert!(spawned[0].special);
        assert_eq!(spawned[0].multipliers, AttributeMultipliers::SPECIAL);
        assert!(run(&mut manager, &mut rng, &mut events, 4_000).is_empty());
        assert_eq!(manager.progress(0).map(|p| p.total), Some(2));
    }

    #[test]
    fn status_moves_forward_only_when_everything_died() {
        let waves = vec![wave("w1", 2, Vec::new()), wave("w2", 1, Vec::new())];
        let mut manager = WaveManager::new(waves, WaveSettings::default()).expect("valid");
        let mut rng = RandomManager::new(1);
        let mut events = EventManager::buffered();
        assert_eq!(manager.status(0), Some(WaveStatus::Pending));
        manager.start_battle(Duration::ZERO, &mut events);
        assert_eq!(manager.status(0), Some(WaveStatus::Active));

        let _ = run(&mut manager, &mut rng, &mut events, 0);
        manager.on_enemy_defeated(0, Duration::from_millis(10), &mut events);
        assert_eq!(manager.status(0), Some(WaveStatus::Active));
        let _ = run(&mut manager, &mut rng, &mut events, 1_000);
        manager.on_enemy_defeated(0, Duration::from_millis(1_100), &mut events);
        assert_eq!(manager.status(0), Some(WaveStatus::Completed));
        assert_eq!(manager.status(1), Some(WaveStatus::Pending));

        let _ = run(&mut manager, &mut rng, &mut events, 3_200);
        assert_eq!(manager.status(1), Some(WaveStatus::Active));
        manager.on_enemy_defeated(1, Duration::from_millis(3_250), &mut events);
        assert!(manager.is_all_completed());

        let kinds: Vec<&str> = events
            .drain_outbox()
            .iter()
            .map(|event| event.kind().as_str())
            .filter(|kind| kind.starts_with("wave") || *kind == "allWavesCompleted")
            .collect();
        assert_eq!(
            kinds,
            vec![
                "waveStart",
                "waveProgress",
                "waveProgress",
                "waveCompleted",
                "waveStart",
                "waveProgress",
                "waveCompleted",
                "allWavesCompleted",
            ]
        );
    }

    #[test]
    fn stray_defeats_are_ignored() {
        let mut manager = WaveManager::new(vec![wave("w1", 1, Vec::new())], WaveSettings::default())
            .expect("valid");
        let mut events = EventManager::default();
        manager.start_battle(Duration::ZERO, &mut events);
        manager.on_enemy_defeated(0, Duration::ZERO, &mut events);
        manager.on_enemy_defeated(7, Duration::ZERO, &mut events);
        assert_eq!(manager.progress(0).map(|p| p.defeated), Some(0));
    }

    #[test]
    fn empty_wave_list_completes_immediately() {
        let mut manager = WaveManager::new(Vec::new(), WaveSettings::default()).expect("valid");
        let mut events = EventManager::default();
        manager.start_battle(Duration::ZERO, &mut events);
        assert!(manager.is_all_completed());
    }

    #[test]
    fn inverted_ring_is_rejected() {
        let settings = WaveSettings {
            spawn_min: 600.0,
            spawn_max: 500.0,
            ..WaveSettings::default()
        };
        assert_eq!(
            WaveManager::new(Vec::new(), settings).err(),
            Some(WaveConfigError::InvertedSpawnRing {
                min: 600.0,
                max: 500.0
            })
        );
    }
}
