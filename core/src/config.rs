use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{BeanKind, PlayerId, Position, StatKey, Stats};

/// Primary behaviour of a skill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillType {
    /// Deals magical damage to every resolved target.
    Damage,
    /// Heals every resolved target.
    Heal,
    /// Applies the declared beneficial effects.
    Buff,
    /// Applies the declared detrimental effects.
    Debuff,
    /// Applies the declared crowd-control effects.
    Control,
    /// Applies the declared summon markers.
    Summon,
}

/// How a skill chooses its targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetType {
    /// The caster only.
    #[serde(rename = "self")]
    SelfOnly,
    /// One explicit, living target within range.
    Single,
    /// Every bean within the area radius of a ground position.
    Area,
    /// Every living bean, range-filtered and randomly truncated.
    Enemy,
    /// Every other living hero, range-filtered and randomly truncated.
    Ally,
    /// Several explicit targets; currently resolves a single explicit target.
    Multiple,
}

/// Category of a timed or instant effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectKind {
    /// Instant damage.
    Damage,
    /// Instant heal.
    Heal,
    /// Damage over time.
    Dot,
    /// Heal over time.
    Hot,
    /// Temporary attribute increase.
    Buff,
    /// Temporary attribute decrease.
    Debuff,
    /// Crowd control tag.
    Control,
    /// Summon marker.
    Summon,
    /// Forced movement marker.
    Movement,
    /// Scripted marker with no built-in behaviour.
    Special,
}

/// Crowd-control varieties, applied as `control_<name>` tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    /// Cannot move or attack.
    Stun,
    /// Moves at half speed.
    Slow,
    /// Cannot move or attack.
    Freeze,
    /// Cannot cast.
    Silence,
    /// Cannot move.
    Root,
}

impl ControlKind {
    /// Tag attached to an entity while the control is active.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Stun => "control_stun",
            Self::Slow => "control_slow",
            Self::Freeze => "control_freeze",
            Self::Silence => "control_silence",
            Self::Root => "control_root",
        }
    }
}

/// Declarative description of an effect a skill applies.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectSpec {
    /// Effect category.
    pub kind: EffectKind,
    /// Attribute delta, per-tick amount, or instant amount.
    pub magnitude: f64,
    /// Total lifetime in milliseconds.
    #[serde(default)]
    pub duration_ms: u64,
    /// Tick interval for DOT/HOT effects.
    #[serde(default)]
    pub interval_ms: Option<u64>,
    /// Attribute modified by buffs and debuffs.
    #[serde(default)]
    pub attribute: Option<StatKey>,
    /// Control variety for control effects.
    #[serde(default)]
    pub control: Option<ControlKind>,
}

impl EffectSpec {
    /// Creates a spec with the provided kind, magnitude and lifetime.
    #[must_use]
    pub fn new(kind: EffectKind, magnitude: f64, duration: Duration) -> Self {
        Self {
            kind,
            magnitude,
            duration_ms: crate::duration_to_millis(duration),
            interval_ms: None,
            attribute: None,
            control: None,
        }
    }

    /// Sets the tick interval.
    #[must_use]
    pub fn every(mut self, interval: Duration) -> Self {
        self.interval_ms = Some(crate::duration_to_millis(interval));
        self
    }

    /// Sets the modified attribute.
    #[must_use]
    pub fn on(mut self, attribute: StatKey) -> Self {
        self.attribute = Some(attribute);
        self
    }

    /// Sets the control variety.
    #[must_use]
    pub fn control(mut self, control: ControlKind) -> Self {
        self.control = Some(control);
        self
    }

    /// Total lifetime.
    #[must_use]
    pub fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Tick interval, if any.
    #[must_use]
    pub fn interval(&self) -> Option<Duration> {
        self.interval_ms.map(Duration::from_millis)
    }
}

fn default_crit_multiplier() -> f64 {
    1.5
}

fn default_area_radius() -> f64 {
    100.0
}

fn default_max_level() -> u32 {
    5
}

/// Static definition of a skill.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillConfig {
    /// Unique skill identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Primary behaviour.
    pub skill_type: SkillType,
    /// Target resolution strategy.
    pub target_type: TargetType,
    /// Cooldown in milliseconds.
    #[serde(default)]
    pub cooldown_ms: u64,
    /// Maximum cast distance; unlimited when absent.
    #[serde(default)]
    pub range: Option<f64>,
    /// Radius of area skills.
    #[serde(default = "default_area_radius")]
    pub area_radius: f64,
    /// Cap on resolved targets for ENEMY and ALLY skills.
    #[serde(default)]
    pub max_targets: Option<usize>,
    /// Mana cost.
    #[serde(default)]
    pub mp_cost: f64,
    /// Damage dealt per target at level 1.
    #[serde(default)]
    pub base_damage: f64,
    /// Healing per target at level 1.
    #[serde(default)]
    pub base_heal: f64,
    /// Critical strike probability.
    #[serde(default)]
    pub crit_rate: f64,
    /// Critical strike multiplier.
    #[serde(default = "default_crit_multiplier")]
    pub crit_multiplier: f64,
    /// Highest level the skill can be trained to.
    #[serde(default = "default_max_level")]
    pub max_level: u32,
    /// Timed effects applied to every resolved target.
    #[serde(default)]
    pub effects: Vec<EffectSpec>,
}

impl SkillConfig {
    /// Creates a skill definition with neutral defaults.
    #[must_use]
    pub fn new(id: impl Into<String>, skill_type: SkillType, target_type: TargetType) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            skill_type,
            target_type,
            cooldown_ms: 0,
            range: None,
            area_radius: default_area_radius(),
            max_targets: None,
            mp_cost: 0.0,
            base_damage: 0.0,
            base_heal: 0.0,
            crit_rate: 0.0,
            crit_multiplier: default_crit_multiplier(),
            max_level: default_max_level(),
            effects: Vec::new(),
        }
    }

    /// Cooldown as a duration.
    #[must_use]
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}

/// Per-type multipliers applied to a bean's base attributes.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AttributeMultipliers {
    /// Health multiplier.
    pub hp: f64,
    /// Attack multiplier.
    pub attack: f64,
    /// Defense multiplier.
    pub defense: f64,
    /// Movement and agility multiplier.
    pub speed: f64,
}

impl AttributeMultipliers {
    /// Neutral multipliers.
    pub const IDENTITY: Self = Self {
        hp: 1.0,
        attack: 1.0,
        defense: 1.0,
        speed: 1.0,
    };

    /// Fixed preset applied to one-shot special spawns.
    pub const SPECIAL: Self = Self {
        hp: 2.0,
        attack: 1.5,
        defense: 1.5,
        speed: 1.2,
    };
}

impl Default for AttributeMultipliers {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// One row of a wave's weighted enemy table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnemyEntry {
    /// Enemy variety.
    pub bean_type: BeanKind,
    /// Relative selection weight.
    pub weight: f64,
    /// Attribute multipliers applied on spawn.
    #[serde(default)]
    pub multipliers: AttributeMultipliers,
}

impl EnemyEntry {
    /// Creates an entry with neutral multipliers.
    #[must_use]
    pub fn new(bean_type: BeanKind, weight: f64) -> Self {
        Self {
            bean_type,
            weight,
            multipliers: AttributeMultipliers::IDENTITY,
        }
    }
}

/// One-shot spawn fired once a wave has been active for `at_ms`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecialSpawn {
    /// Time since wave start, in milliseconds.
    pub at_ms: u64,
    /// Enemy variety.
    pub bean_type: BeanKind,
}

fn default_wave_delay_ms() -> u64 {
    3_000
}

/// Immutable definition of a wave.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaveConfig {
    /// Wave identifier.
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Weighted enemy table.
    pub enemies: Vec<EnemyEntry>,
    /// Number of regular spawns.
    pub total_count: u32,
    /// Time between regular spawns, in milliseconds.
    pub spawn_interval_ms: u64,
    /// Delay before the following wave starts, in milliseconds.
    #[serde(default = "default_wave_delay_ms")]
    pub delay_ms: u64,
    /// One-shot special spawns keyed by elapsed wave time.
    #[serde(default)]
    pub special_spawns: Vec<SpecialSpawn>,
}

impl WaveConfig {
    /// Spawn interval as a duration.
    #[must_use]
    pub fn spawn_interval(&self) -> Duration {
        Duration::from_millis(self.spawn_interval_ms)
    }

    /// Inter-wave delay as a duration.
    #[must_use]
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Regular plus special spawns.
    #[must_use]
    pub fn total_enemies(&self) -> u32 {
        let specials = u32::try_from(self.special_spawns.len()).unwrap_or(u32::MAX);
        self.total_count.saturating_add(specials)
    }

    /// Rejects definitions that cannot produce a completable wave.
    pub fn validate(&self) -> Result<(), WaveConfigError> {
        if self.total_count > 0 && self.enemies.is_empty() {
            return Err(WaveConfigError::NoEnemyTypes {
                wave: self.id.clone(),
            });
        }
        if self
            .enemies
            .iter()
            .any(|entry| !entry.weight.is_finite() || entry.weight < 0.0)
        {
            return Err(WaveConfigError::InvalidWeight {
                wave: self.id.clone(),
            });
        }
        let total_weight: f64 = self.enemies.iter().map(|entry| entry.weight).sum();
        if self.total_count > 0 && total_weight <= 0.0 {
            return Err(WaveConfigError::InvalidWeight {
                wave: self.id.clone(),
            });
        }
        if self.total_enemies() == 0 {
            return Err(WaveConfigError::Empty {
                wave: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Malformed wave data.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum WaveConfigError {
    /// Regular spawns were requested without an enemy table.
    #[error("wave `{wave}` spawns enemies but lists no enemy types")]
    NoEnemyTypes {
        /// Offending wave.
        wave: String,
    },
    /// A weight was negative or not finite, or all weights were zero.
    #[error("wave `{wave}` has unusable enemy weights")]
    InvalidWeight {
        /// Offending wave.
        wave: String,
    },
    /// The wave would never field an enemy.
    #[error("wave `{wave}` fields no enemies")]
    Empty {
        /// Offending wave.
        wave: String,
    },
    /// The spawn ring's inner radius exceeds its outer radius.
    #[error("spawn ring is inverted: min {min} exceeds max {max}")]
    InvertedSpawnRing {
        /// Inner radius.
        min: f64,
        /// Outer radius.
        max: f64,
    },
}

/// Chapter and stage used to look up or synthesise waves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Level {
    /// Chapter number, starting at 1.
    pub chapter: u32,
    /// Stage number within the chapter, starting at 1.
    pub stage: u32,
}

impl Default for Level {
    fn default() -> Self {
        Self {
            chapter: 1,
            stage: 1,
        }
    }
}

/// Crystal construction parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CrystalParams {
    /// Starting and maximum health.
    pub hp: f64,
    /// Physical defense.
    pub defense: f64,
    /// Magical defense.
    pub magic_defense: f64,
    /// World position.
    pub position: Position,
    /// Percentage by which incoming damage is reduced.
    pub defense_bonus_pct: f64,
    /// Pure damage returned to every bean that strikes the crystal.
    pub contact_damage: f64,
    /// Immunity granted on entering the critical state, in milliseconds.
    pub invulnerability_ms: u64,
    /// Minimum time between two accepted hits, in milliseconds.
    pub damage_cooldown_ms: u64,
}

impl Default for CrystalParams {
    fn default() -> Self {
        Self {
            hp: 1_000.0,
            defense: 50.0,
            magic_defense: 50.0,
            position: Position::ZERO,
            defense_bonus_pct: 0.0,
            contact_damage: 1.0,
            invulnerability_ms: 1_000,
            damage_cooldown_ms: 0,
        }
    }
}

fn default_slot() -> u8 {
    1
}

/// Hero construction parameters for one player.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerParams {
    /// Owning player.
    pub player_id: PlayerId,
    /// Hero template key.
    pub hero_id: String,
    /// Display name; defaults to the hero id.
    #[serde(default)]
    pub name: Option<String>,
    /// Position slot around the crystal, 1 through 5.
    #[serde(default = "default_slot")]
    pub slot: u8,
    /// Base attributes. `maxHp` defaults to `hp`, `mp`/`maxMp` to 100.
    #[serde(default)]
    pub stats: Stats,
    /// Basic attack range.
    #[serde(default)]
    pub attack_range: Option<f64>,
    /// Basic attack interval, in milliseconds.
    #[serde(default)]
    pub attack_interval_ms: Option<u64>,
    /// Skills from the skill book learned at battle start.
    #[serde(default)]
    pub skills: Vec<String>,
    /// Starting inventory.
    #[serde(default)]
    pub items: Vec<String>,
}

impl PlayerParams {
    /// Creates parameters for a hero with the provided base attributes.
    #[must_use]
    pub fn new(player_id: PlayerId, hero_id: impl Into<String>, slot: u8, stats: Stats) -> Self {
        Self {
            player_id,
            hero_id: hero_id.into(),
            name: None,
            slot,
            stats,
            attack_range: None,
            attack_interval_ms: None,
            skills: Vec::new(),
            items: Vec::new(),
        }
    }
}

/// Everything required to initialise a battle deterministically.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitParams {
    /// Random seed.
    pub seed: u32,
    /// Crystal parameters.
    #[serde(default)]
    pub crystal: CrystalParams,
    /// Participating players.
    #[serde(default)]
    pub players: Vec<PlayerParams>,
    /// Level used to synthesise waves when none are supplied.
    #[serde(default)]
    pub level: Level,
    /// Explicit wave table.
    #[serde(default)]
    pub waves: Option<Vec<WaveConfig>>,
    /// Skills that may be learned during the battle.
    #[serde(default)]
    pub skill_book: Vec<SkillConfig>,
}

impl InitParams {
    /// Creates parameters with default crystal, no players and synthesised waves.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            crystal: CrystalParams::default(),
            players: Vec::new(),
            level: Level::default(),
            waves: None,
            skill_book: Vec::new(),
        }
    }
}
