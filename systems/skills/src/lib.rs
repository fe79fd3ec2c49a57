#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Skill ownership, casting and timed effects.
//!
//! A cast is validated in a fixed order (known skill, cooldown, living
//! caster, silence, mana, targets) and only then charged. Failures are
//! values; nothing is deducted when a cast is rejected.

mod effects;
mod targeting;

use std::collections::BTreeMap;
use std::time::Duration;

use crystal_defence_core::{
    duration_to_millis, ControlKind, DamageType, EffectId, EntityId, GameEvent, Position,
    SkillConfig, SkillType, StatKey,
};
use crystal_defence_damage::{DamageManager, DamageOptions, DamageResult};
use crystal_defence_events::EventManager;
use crystal_defence_world::SimContext;
use thiserror::Error;

pub use effects::{ActiveEffect, EffectManager, DEFAULT_TICK_INTERVAL};
pub use targeting::TargetSelector;

/// Damage and healing growth per skill level above the first.
const LEVEL_SCALING: f64 = 0.1;

/// Why a cast was rejected.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum CastFailure {
    /// The caster does not own the skill.
    #[error("skill `{skill_id}` is not known to the caster")]
    UnknownSkill {
        /// Requested skill.
        skill_id: String,
    },
    /// The skill is cooling down.
    #[error("skill `{skill_id}` is on cooldown for another {remaining_ms} ms")]
    OnCooldown {
        /// Requested skill.
        skill_id: String,
        /// Time left.
        remaining_ms: u64,
    },
    /// The caster is dead or gone.
    #[error("caster is dead")]
    CasterDead,
    /// The caster carries a silence control.
    #[error("caster is silenced")]
    Silenced,
    /// Not enough mana.
    #[error("not enough mana: {required} required, {available} available")]
    InsufficientMana {
        /// Skill cost.
        required: f64,
        /// Caster's current mana.
        available: f64,
    },
    /// A targeted skill was cast without a target.
    #[error("skill requires a target")]
    MissingTarget,
    /// The target does not exist.
    #[error("target {0} does not exist")]
    TargetNotFound(EntityId),
    /// The target is dead.
    #[error("target {0} is dead")]
    TargetDead(EntityId),
    /// The target or ground position is beyond the skill's range.
    #[error("target is {distance:.1} away, beyond range {range:.1}")]
    OutOfRange {
        /// Distance from the caster.
        distance: f64,
        /// Skill range.
        range: f64,
    },
    /// An area skill was cast without a ground position.
    #[error("skill requires a position")]
    MissingPosition,
    /// Nothing matched the skill's targeting.
    #[error("no valid targets")]
    NoTargets,
}

/// A skill owned by an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Skill {
    config: SkillConfig,
    owner: EntityId,
    level: u32,
    cooldown_remaining: Duration,
    last_cast: Option<Duration>,
    available: bool,
}

impl Skill {
    fn new(owner: EntityId, config: SkillConfig, level: u32) -> Self {
        let level = level.clamp(1, config.max_level.max(1));
        Self {
            config,
            owner,
            level,
            cooldown_remaining: Duration::ZERO,
            last_cast: None,
            available: true,
        }
    }

    /// Static definition.
    #[must_use]
    pub fn config(&self) -> &SkillConfig {
        &self.config
    }

    /// Owning entity.
    #[must_use]
    pub fn owner(&self) -> EntityId {
        self.owner
    }

    /// Current level, starting at 1.
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Cooldown left before the next cast.
    #[must_use]
    pub fn cooldown_remaining(&self) -> Duration {
        self.cooldown_remaining
    }

    /// Simulation time of the last successful cast.
    #[must_use]
    pub fn last_cast(&self) -> Option<Duration> {
        self.last_cast
    }

    /// Whether the cooldown has elapsed.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.available
    }

    /// Level multiplier applied to base damage and healing.
    #[must_use]
    pub fn scaling(&self) -> f64 {
        1.0 + LEVEL_SCALING * f64::from(self.level.saturating_sub(1))
    }
}

/// What a successful cast did.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CastReport {
    /// Resolved targets.
    pub targets: Vec<EntityId>,
    /// One entry per damaged target.
    pub hits: Vec<DamageResult>,
    /// Total health restored.
    pub healed: f64,
    /// Effects left running.
    pub effects: Vec<EffectId>,
}

/// Owns every learned skill and the effects they leave behind.
#[derive(Debug, Default)]
pub struct SkillManager {
    skills: BTreeMap<EntityId, BTreeMap<String, Skill>>,
    effects: EffectManager,
}

impl SkillManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gives `owner` the skill at `level`, replacing any previous copy.
    pub fn register(&mut self, owner: EntityId, config: SkillConfig, level: u32) {
        let skills = self.skills.entry(owner).or_default();
        let _ = skills.insert(config.id.clone(), Skill::new(owner, config, level));
    }

    /// Learns `config` or raises its level by one.
    ///
    /// Returns the new level, or `None` when the skill is already at its
    /// maximum.
    pub fn learn(
        &mut self,
        events: &mut EventManager,
        owner: EntityId,
        config: &SkillConfig,
    ) -> Option<u32> {
        let skills = self.skills.entry(owner).or_default();
        let level = match skills.get_mut(&config.id) {
            Some(skill) if skill.level >= skill.config.max_level => {
                tracing::debug!(entity = %owner, skill = %config.id, "skill already at max level");
                return None;
            }
            Some(skill) => {
                skill.level += 1;
                skill.level
            }
            None => {
                let _ = skills.insert(config.id.clone(), Skill::new(owner, config.clone(), 1));
                1
            }
        };

        events.emit(GameEvent::SkillLearned {
            owner,
            skill_id: config.id.clone(),
            level,
        });
        Some(level)
    }

    /// Looks up a skill owned by `owner`.
    #[must_use]
    pub fn skill(&self, owner: EntityId, skill_id: &str) -> Option<&Skill> {
        self.skills.get(&owner)?.get(skill_id)
    }

    /// Skills owned by `owner`, ordered by id.
    pub fn skills_of(&self, owner: EntityId) -> impl Iterator<Item = &Skill> {
        self.skills.get(&owner).into_iter().flat_map(BTreeMap::values)
    }

    /// Forgets every skill owned by `owner`.
    pub fn remove_owner(&mut self, owner: EntityId) {
        let _ = self.skills.remove(&owner);
    }

    /// Active effects.
    #[must_use]
    pub fn effects(&self) -> &EffectManager {
        &self.effects
    }

    /// Active effects, mutably.
    pub fn effects_mut(&mut self) -> &mut EffectManager {
        &mut self.effects
    }

    /// Validates and performs a cast.
    pub fn cast_skill(
        &mut self,
        ctx: &mut SimContext<'_>,
        damage: &mut DamageManager,
        caster: EntityId,
        skill_id: &str,
        target: Option<EntityId>,
        position: Option<Position>,
    ) -> Result<CastReport, CastFailure> {
        let skill = self
            .skills
            .get(&caster)
            .and_then(|skills| skills.get(skill_id))
            .ok_or_else(|| CastFailure::UnknownSkill {
                skill_id: skill_id.to_owned(),
            })?;
        if !skill.available {
            return Err(CastFailure::OnCooldown {
                skill_id: skill_id.to_owned(),
                remaining_ms: duration_to_millis(skill.cooldown_remaining),
            });
        }
        let caster_entity = ctx
            .entities
            .get(caster)
            .filter(|entity| entity.is_alive())
            .ok_or(CastFailure::CasterDead)?;
        if caster_entity.has_tag(ControlKind::Silence.tag()) {
            return Err(CastFailure::Silenced);
        }
        let cost = skill.config.mp_cost;
        let mana = caster_entity.stat(&StatKey::Mp);
        if cost > 0.0 && mana < cost {
            return Err(CastFailure::InsufficientMana {
                required: cost,
                available: mana,
            });
        }
        let targets = TargetSelector::resolve(
            ctx.entities,
            ctx.rng,
            &skill.config,
            caster,
            target,
            position,
        )?;

        let config = skill.config.clone();
        let scaling = skill.scaling();
        if cost > 0.0 {
            if let Some(entity) = ctx.entities.get_mut(caster) {
                let _ = entity.add_to_stat(StatKey::Mp, -cost);
            }
        }
        if let Some(skill) = self
            .skills
            .get_mut(&caster)
            .and_then(|skills| skills.get_mut(skill_id))
        {
            skill.cooldown_remaining = config.cooldown();
            skill.available = skill.cooldown_remaining.is_zero();
            skill.last_cast = Some(ctx.now);
        }

        let mut report = CastReport {
            targets: targets.clone(),
            ..CastReport::default()
        };
        match config.skill_type {
            SkillType::Damage => {
                let options = DamageOptions {
                    crit_rate: config.crit_rate,
                    crit_multiplier: config.crit_multiplier,
                    ..DamageOptions::default()
                };
                for &target in &targets {
                    report.hits.push(damage.apply_damage(
                        ctx,
                        Some(caster),
                        target,
                        config.base_damage * scaling,
                        DamageType::Magical,
                        &options,
                    ));
                }
            }
            SkillType::Heal => {
                for &target in &targets {
                    report.healed += damage
                        .apply_healing(
                            ctx,
                            Some(caster),
                            target,
                            config.base_heal * scaling,
                            config.crit_rate,
                            config.crit_multiplier,
                        )
                        .amount;
                }
            }
            SkillType::Buff | SkillType::Debuff | SkillType::Control | SkillType::Summon => {}
        }

        for &target in &targets {
            for spec in &config.effects {
                if let Some(id) = self.effects.apply(ctx, damage, caster, target, &config.id, spec) {
                    report.effects.push(id);
                }
            }
        }

        tracing::debug!(entity = %caster, skill = %config.id, targets = targets.len(), "skill cast");
        ctx.events.emit(GameEvent::SkillCast {
            caster,
            skill_id: config.id,
            targets,
            position,
        });
        Ok(report)
    }

    /// Advances cooldowns by `dt` and drives active effects.
    pub fn update(&mut self, ctx: &mut SimContext<'_>, damage: &mut DamageManager, dt: Duration) {
        for skill in self.skills.values_mut().flat_map(BTreeMap::values_mut) {
            if skill.available {
                continue;
            }
            skill.cooldown_remaining = skill.cooldown_remaining.saturating_sub(dt);
            if skill.cooldown_remaining.is_zero() {
                skill.available = true;
                ctx.events.emit(GameEvent::SkillCooldownComplete {
                    owner: skill.owner,
                    skill_id: skill.config.id.clone(),
                });
            }
        }
        self.effects.update(ctx, damage);
    }

    /// Drops every skill and clears every effect.
    pub fn reset(&mut self, ctx: &mut SimContext<'_>) {
        self.skills.clear();
        self.effects.clear_all_effects(ctx);
    }
}
