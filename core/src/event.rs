use serde::{Deserialize, Serialize};

use crate::{Command, EffectId, EffectKind, EntityId, EntityKind, PlayerId, Position};

/// Damage categories, each with its own reduction rule.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DamageType {
    /// Reduced by defense; may be blocked.
    Physical,
    /// Reduced by magic defense.
    Magical,
    /// Elemental magic; reduced by magic defense.
    Fire,
    /// Bypasses every reduction.
    Pure,
    /// Periodic damage from an active effect; bypasses reduction.
    Dot,
}

/// Health-derived state of the crystal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CrystalState {
    /// Above 70 % health.
    Normal,
    /// Above 30 % health.
    Damaged,
    /// Above 0 health.
    Critical,
    /// No health left.
    Destroyed,
}

/// Behaviour state of a bean.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BeanState {
    /// No live target.
    Idle,
    /// Walking toward the target.
    Move,
    /// In range, waiting for the attack interval.
    Attack,
    /// Disabled by a stun or freeze.
    Stunned,
    /// Killed.
    Dead,
}

/// Final outcome of a battle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BattleResult {
    /// Every wave was cleared.
    Victory,
    /// The crystal was destroyed.
    Defeat,
}

/// Why an active effect ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EffectEndReason {
    /// Its duration elapsed.
    Expired,
    /// Its target died.
    TargetDied,
    /// It was force-cleared.
    Cleared,
}

/// Lifecycle of the replay manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackState {
    /// Nothing recorded or playing.
    Idle,
    /// Capturing a live battle.
    Recording,
    /// Replaying events.
    Playing,
    /// Playback suspended.
    Paused,
    /// Playback reached the end.
    Completed,
}

/// Aggregate counters reported when a battle ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BattleStatistics {
    /// Logic frames simulated.
    pub logic_frames: u64,
    /// Simulated duration in milliseconds.
    pub duration_ms: u64,
    /// Beans spawned.
    pub enemies_spawned: u32,
    /// Beans killed.
    pub total_enemies_defeated: u32,
    /// Damage applied to any entity.
    pub damage_dealt: f64,
    /// Healing applied to any entity.
    pub healing_done: f64,
    /// Critical hits landed.
    pub critical_hits: u32,
    /// Hits evaded.
    pub evasions: u32,
    /// Player commands executed.
    pub commands_processed: u32,
}

/// Notifications broadcast by the simulation.
///
/// The core never consumes a response to these; they exist for the view
/// layer, the replay recorder and the battle's own bookkeeping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum GameEvent {
    /// An entity joined the registry.
    EntityCreated {
        /// New entity.
        entity: EntityId,
        /// Its kind.
        kind: EntityKind,
        /// Its display name.
        name: String,
        /// Its spawn position.
        position: Position,
    },
    /// An entity changed position.
    EntityMoved {
        /// Moving entity.
        entity: EntityId,
        /// Previous position.
        from: Position,
        /// New position.
        to: Position,
    },
    /// An entity's health reached zero.
    EntityDeath {
        /// Dead entity.
        entity: EntityId,
        /// Its kind.
        kind: EntityKind,
        /// Entity that dealt the killing blow.
        killer: Option<EntityId>,
    },
    /// An entity was evicted from the registry.
    EntityRemoved {
        /// Evicted entity.
        entity: EntityId,
    },
    /// Damage landed on a target.
    DamageDealt {
        /// Attacker, if any.
        source: Option<EntityId>,
        /// Victim.
        target: EntityId,
        /// Damage category.
        damage_type: DamageType,
        /// Damage after crit and defense, before the target's own transform.
        amount: f64,
        /// Damage the target accepted.
        actual: f64,
        /// Whether the hit was critical.
        critical: bool,
        /// Whether the hit was blocked.
        blocked: bool,
        /// Target health after the hit.
        remaining_hp: f64,
    },
    /// A hit was evaded.
    DamageEvaded {
        /// Attacker, if any.
        source: Option<EntityId>,
        /// Evading entity.
        target: EntityId,
    },
    /// Healing landed on a target.
    HealingApplied {
        /// Healer, if any.
        source: Option<EntityId>,
        /// Healed entity.
        target: EntityId,
        /// Health restored.
        amount: f64,
        /// Whether the heal was critical.
        critical: bool,
    },
    /// The crystal crossed a health threshold.
    CrystalStateChanged {
        /// The crystal.
        crystal: EntityId,
        /// Previous state.
        from: CrystalState,
        /// New state.
        to: CrystalState,
    },
    /// A bean changed behaviour state.
    BeanStateChanged {
        /// The bean.
        bean: EntityId,
        /// Previous state.
        from: BeanState,
        /// New state.
        to: BeanState,
    },
    /// A hero adopted or dropped a target.
    HeroTargetChanged {
        /// The hero.
        hero: EntityId,
        /// New target.
        target: Option<EntityId>,
    },
    /// A hero moved to another slot.
    HeroPositionChanged {
        /// The hero.
        hero: EntityId,
        /// New slot.
        slot: u8,
        /// New position.
        position: Position,
    },
    /// A hero gained a level.
    HeroLevelUp {
        /// The hero.
        hero: EntityId,
        /// New level.
        level: u32,
    },
    /// A hero consumed an item.
    ItemUsed {
        /// The hero.
        hero: EntityId,
        /// Consumed item.
        item_id: String,
    },
    /// A skill was cast successfully.
    SkillCast {
        /// Caster.
        caster: EntityId,
        /// Skill cast.
        skill_id: String,
        /// Resolved targets.
        targets: Vec<EntityId>,
        /// Ground position, for area skills.
        position: Option<Position>,
    },
    /// A skill was learned or levelled up.
    SkillLearned {
        /// Skill owner.
        owner: EntityId,
        /// Skill learned.
        skill_id: String,
        /// Resulting level.
        level: u32,
    },
    /// A timed effect was attached.
    SkillEffectApplied {
        /// Effect identifier.
        effect: EffectId,
        /// Effect category.
        kind: EffectKind,
        /// Applying entity.
        source: EntityId,
        /// Affected entity.
        target: EntityId,
        /// Originating skill.
        skill_id: String,
        /// Effect magnitude.
        magnitude: f64,
    },
    /// A timed effect ended.
    SkillEffectRemoved {
        /// Effect identifier.
        effect: EffectId,
        /// Effect category.
        kind: EffectKind,
        /// Affected entity.
        target: EntityId,
        /// Why it ended.
        reason: EffectEndReason,
    },
    /// A skill finished cooling down.
    SkillCooldownComplete {
        /// Skill owner.
        owner: EntityId,
        /// Ready skill.
        skill_id: String,
    },
    /// A wave became active.
    WaveStart {
        /// Wave index.
        wave: usize,
        /// Wave identifier.
        wave_id: String,
        /// Enemies the wave will field.
        total: u32,
    },
    /// A wave enemy was defeated.
    WaveProgress {
        /// Wave index.
        wave: usize,
        /// Enemies defeated so far.
        defeated: u32,
        /// Enemies the wave fields.
        total: u32,
    },
    /// Every enemy of a wave was spawned and defeated.
    WaveCompleted {
        /// Wave index.
        wave: usize,
    },
    /// The final wave was completed.
    AllWavesCompleted,
    /// A player command was executed.
    CommandProcessed {
        /// The command.
        command: Command,
    },
    /// The battle started.
    BattleStart,
    /// The battle was paused.
    BattlePause,
    /// The battle resumed.
    BattleResume,
    /// The battle ended.
    BattleEnd {
        /// Outcome.
        result: BattleResult,
    },
    /// Final summary for the view layer.
    GameOver {
        /// Outcome.
        result: BattleResult,
        /// Aggregate counters.
        statistics: BattleStatistics,
        /// Players that took part.
        players: Vec<PlayerId>,
    },
    /// Replay playback changed state.
    ReplayStateChanged {
        /// New state.
        state: PlaybackState,
    },
    /// Replay playback jumped.
    ReplaySeek {
        /// New virtual time in milliseconds.
        time_ms: u64,
        /// Estimated frame at that time.
        frame: u64,
    },
    /// Replay playback clock advanced.
    ReplayTimeUpdate {
        /// Virtual time in milliseconds.
        time_ms: u64,
        /// Replay length in milliseconds.
        total_ms: u64,
    },
}

macro_rules! event_kinds {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// Field-less discriminant of [`GameEvent`], used as the subscription key.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(rename_all = "camelCase")]
        pub enum EventKind {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl EventKind {
            /// Stable camelCase event name.
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)+
                }
            }
        }

        impl GameEvent {
            /// Subscription key of the event.
            #[must_use]
            pub const fn kind(&self) -> EventKind {
                match self {
                    $(Self::$variant { .. } => EventKind::$variant,)+
                }
            }
        }
    };
}

event_kinds! {
    EntityCreated => "entityCreated",
    EntityMoved => "entityMoved",
    EntityDeath => "entityDeath",
    EntityRemoved => "entityRemoved",
    DamageDealt => "damageDealt",
    DamageEvaded => "damageEvaded",
    HealingApplied => "healingApplied",
    CrystalStateChanged => "crystalStateChanged",
    BeanStateChanged => "beanStateChanged",
    HeroTargetChanged => "heroTargetChanged",
    HeroPositionChanged => "heroPositionChanged",
    HeroLevelUp => "heroLevelUp",
    ItemUsed => "itemUsed",
    SkillCast => "skillCast",
    SkillLearned => "skillLearned",
    SkillEffectApplied => "skillEffectApplied",
    SkillEffectRemoved => "skillEffectRemoved",
    SkillCooldownComplete => "skillCooldownComplete",
    WaveStart => "waveStart",
    WaveProgress => "waveProgress",
    WaveCompleted => "waveCompleted",
    AllWavesCompleted => "allWavesCompleted",
    CommandProcessed => "commandProcessed",
    BattleStart => "battleStart",
    BattlePause => "battlePause",
    BattleResume => "battleResume",
    BattleEnd => "battleEnd",
    GameOver => "gameOver",
    ReplayStateChanged => "replayStateChanged",
    ReplaySeek => "replaySeek",
    ReplayTimeUpdate => "replayTimeUpdate",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_kind_names_match_serialized_tags() {
        let event = GameEvent::WaveProgress {
            wave: 0,
            defeated: 3,
            total: 10,
        };
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], event.kind().as_str());
        assert_eq!(json["defeated"], 3);
    }

    #[test]
    fn unit_events_carry_only_their_tag() {
        let json = serde_json::to_string(&GameEvent::AllWavesCompleted).expect("serialize");
        assert_eq!(json, r#"{"type":"allWavesCompleted"}"#);
        let kind_json = serde_json::to_string(&EventKind::AllWavesCompleted).expect("serialize");
        assert_eq!(kind_json, "\"allWavesCompleted\"");
    }
}
