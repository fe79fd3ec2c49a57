#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Damage and healing resolution.
//!
//! Every hit in a battle runs through [`DamageManager::apply_damage`]:
//! evasion, critical strike, defense reduction, rounding, the target's own
//! transform and finally the notifications. Each random roll is drawn from
//! the battle's shared generator so outcomes replay exactly.

use crystal_defence_core::{DamageType, EntityId, GameEvent, StatKey};
use crystal_defence_world::SimContext;
use serde::{Deserialize, Serialize};

/// Upper bound on evasion probability.
const MAX_EVADE_CHANCE: f64 = 0.75;
/// Upper bound on the fraction of a hit removed by defense and blocking.
const MAX_REDUCTION: f64 = 0.9;
/// Reduction added by a successful block.
const BLOCK_REDUCTION: f64 = 0.5;

/// Per-hit switches and critical parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DamageOptions {
    /// Whether the target may evade.
    pub can_evade: bool,
    /// Critical strike probability; no roll is made when zero.
    pub crit_rate: f64,
    /// Multiplier applied on a critical strike.
    pub crit_multiplier: f64,
    /// Skips defense reduction and blocking.
    pub ignore_defense: bool,
    /// Whether physical hits may be blocked.
    pub can_block: bool,
    /// Block probability; the target's `blockRate` when absent.
    pub block_rate: Option<f64>,
}

impl Default for DamageOptions {
    fn default() -> Self {
        Self {
            can_evade: true,
            crit_rate: 0.0,
            crit_multiplier: 1.5,
            ignore_defense: false,
            can_block: true,
            block_rate: None,
        }
    }
}

impl DamageOptions {
    /// Options for hits that always land and skip every roll.
    #[must_use]
    pub fn unavoidable() -> Self {
        Self {
            can_evade: false,
            can_block: false,
            ..Self::default()
        }
    }
}

/// Outcome of a single hit.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DamageResult {
    /// The hit was evaded.
    pub evaded: bool,
    /// The hit was critical.
    pub critical: bool,
    /// The hit was blocked.
    pub blocked: bool,
    /// Damage after critical, reduction and rounding. At least 1 for every
    /// hit that landed on a living target.
    pub actual_amount: f64,
    /// Health the target actually lost after its own transform.
    pub applied: f64,
    /// The hit killed the target.
    pub killed: bool,
}

/// Outcome of a single heal.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HealResult {
    /// The heal was critical.
    pub critical: bool,
    /// Health restored.
    pub amount: f64,
}

/// Running totals reported when a battle ends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageStats {
    /// Health removed from any entity.
    pub total_damage: f64,
    /// Health restored to any entity.
    pub total_healing: f64,
    /// Critical hits and heals.
    pub critical_hits: u32,
    /// Evaded hits.
    pub evasions: u32,
}

/// Resolves hits and heals, keeping running totals.
#[derive(Debug, Default)]
pub struct DamageManager {
    stats: DamageStats,
}

impl DamageManager {
    /// Creates a manager with zeroed totals.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Running totals.
    #[must_use]
    pub fn stats(&self) -> DamageStats {
        self.stats
    }

    /// Zeroes the running totals.
    pub fn reset(&mut self) {
        self.stats = DamageStats::default();
    }

    /// Resolves a hit of `amount` against `target`.
    ///
    /// Dead or unknown targets yield a zeroed result without drawing from
    /// the random stream.
    pub fn apply_damage(
        &mut self,
        ctx: &mut SimContext<'_>,
        source: Option<EntityId>,
        target: EntityId,
        amount: f64,
        damage_type: DamageType,
        options: &DamageOptions,
    ) -> DamageResult {
        let Some(victim) = ctx.entities.get(target).filter(|victim| victim.is_alive()) else {
            return DamageResult::default();
        };
        let kind = victim.kind();
        let speed = victim.stat(&StatKey::Speed);
        let defense = match damage_type {
            DamageType::Physical => victim.stat(&StatKey::Defense),
            DamageType::Magical | DamageType::Fire => victim.stat(&StatKey::MagicDefense),
            DamageType::Pure | DamageType::Dot => 0.0,
        };
        let block_stat = victim.stat(&StatKey::BlockRate);
        let accuracy = source
            .and_then(|source| ctx.entities.get(source))
            .map_or(0.0, |attacker| attacker.stat(&StatKey::Accuracy));

        if options.can_evade && ctx.rng.random_bool(evade_chance(speed, accuracy)) {
            self.stats.evasions += 1;
            tracing::trace!(entity = %target, "hit evaded");
            ctx.events.emit(GameEvent::DamageEvaded { source, target });
            return DamageResult {
                evaded: true,
                ..DamageResult::default()
            };
        }

        let mut amount = amount.max(0.0);
        let critical = options.crit_rate > 0.0 && ctx.rng.random_bool(options.crit_rate);
        if critical {
            amount *= options.crit_multiplier;
        }

        let mut blocked = false;
        if !options.ignore_defense {
            let mut reduction = defense_reduction(defense);
            if damage_type == DamageType::Physical && options.can_block {
                let rate = options.block_rate.unwrap_or(block_stat);
                if rate > 0.0 && ctx.rng.random_bool(rate) {
                    blocked = true;
                    reduction += BLOCK_REDUCTION;
                }
            }
            amount *= 1.0 - reduction.min(MAX_REDUCTION);
        }
        let actual_amount = amount.floor().max(1.0);

        let Some(victim) = ctx.entities.get_mut(target) else {
            return DamageResult::default();
        };
        let taken = victim.take_damage(actual_amount, damage_type, ctx.now);
        let remaining_hp = victim.hp();

        self.stats.total_damage += taken.applied;
        if critical {
            self.stats.critical_hits += 1;
        }
        tracing::trace!(
            entity = %target,
            amount = actual_amount,
            applied = taken.applied,
            remaining_hp,
            "damage resolved"
        );

        ctx.events.emit(GameEvent::DamageDealt {
            source,
            target,
            damage_type,
            amount: actual_amount,
            actual: taken.applied,
            critical,
            blocked,
            remaining_hp,
        });
        if let Some((from, to)) = taken.crystal_change {
            ctx.events.emit(GameEvent::CrystalStateChanged {
                crystal: target,
                from,
                to,
            });
        }
        if taken.killed {
            ctx.events.emit(GameEvent::EntityDeath {
                entity: target,
                kind,
                killer: source,
            });
        }

        DamageResult {
            evaded: false,
            critical,
            blocked,
            actual_amount,
            applied: taken.applied,
            killed: taken.killed,
        }
    }

    /// Restores up to `amount` health to `target`, clamped to its headroom.
    pub fn apply_healing(
        &mut self,
        ctx: &mut SimContext<'_>,
        source: Option<EntityId>,
        target: EntityId,
        amount: f64,
        crit_rate: f64,
        crit_multiplier: f64,
    ) -> HealResult {
        if !ctx.entities.is_alive(target) {
            return HealResult::default();
        }

        let mut amount = amount.max(0.0);
        let critical = crit_rate > 0.0 && ctx.rng.random_bool(crit_rate);
        if critical {
            amount *= crit_multiplier;
        }

        let Some(patient) = ctx.entities.get_mut(target) else {
            return HealResult::default();
        };
        let headroom = (patient.max_hp() - patient.hp()).max(0.0);
        let restored = patient.heal(amount.min(headroom));

        self.stats.total_healing += restored;
        if critical {
            self.stats.critical_hits += 1;
        }
        ctx.events.emit(GameEvent::HealingApplied {
            source,
            target,
            amount: restored,
            critical,
        });

        HealResult {
            critical,
            amount: restored,
        }
    }
}

/// Probability that a target with `speed` evades an attacker with `accuracy`.
#[must_use]
pub fn evade_chance(speed: f64, accuracy: f64) -> f64 {
    (speed * 0.002 - accuracy * 0.001).clamp(0.0, MAX_EVADE_CHANCE)
}

/// Fraction of a hit removed by `defense`.
#[must_use]
pub fn defense_reduction(defense: f64) -> f64 {
    let defense = defense.max(0.0);
    defense / (defense + 100.0)
}
