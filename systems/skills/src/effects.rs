use std::time::Duration;

use crystal_defence_core::{
    ControlKind, DamageType, EffectEndReason, EffectId, EffectKind, EffectSpec, EntityId,
    GameEvent, StatKey,
};
use crystal_defence_damage::{DamageManager, DamageOptions};
use crystal_defence_world::SimContext;

/// Tick interval for periodic effects that do not declare one.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(1000);

/// A timed effect attached to an entity.
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveEffect {
    /// Unique identifier.
    pub id: EffectId,
    /// Effect category.
    pub kind: EffectKind,
    /// Applying entity.
    pub source: EntityId,
    /// Affected entity.
    pub target: EntityId,
    /// Originating skill.
    pub skill_id: String,
    /// Per-tick amount, stat delta or slow factor.
    pub magnitude: f64,
    /// Lifetime measured from `started`.
    pub duration: Duration,
    /// Tick interval for periodic kinds.
    pub interval: Duration,
    /// Simulation time the effect was applied.
    pub started: Duration,
    /// Simulation time of the last periodic tick.
    pub last_tick: Duration,
    /// Modified stat, for buffs and debuffs.
    pub attribute: Option<StatKey>,
    /// Control applied, for control effects.
    pub control: Option<ControlKind>,
    /// Stat delta to undo on removal.
    pub applied_delta: f64,
}

impl ActiveEffect {
    /// Time left before expiry at `now`.
    #[must_use]
    pub fn remaining(&self, now: Duration) -> Duration {
        (self.started + self.duration).saturating_sub(now)
    }

    fn expired(&self, now: Duration) -> bool {
        now.saturating_sub(self.started) >= self.duration
    }
}

/// Owns every active effect and drives their ticks.
#[derive(Debug, Default)]
pub struct EffectManager {
    effects: Vec<ActiveEffect>,
    next_id: u64,
}

impl EffectManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Active effects in application order.
    #[must_use]
    pub fn effects(&self) -> &[ActiveEffect] {
        &self.effects
    }

    /// Active effects on `target`.
    pub fn effects_on(&self, target: EntityId) -> impl Iterator<Item = &ActiveEffect> {
        self.effects
            .iter()
            .filter(move |effect| effect.target == target)
    }

    /// Applies `spec` from `source` to `target`.
    ///
    /// Instant damage and heal specs resolve immediately and leave nothing
    /// behind. Everything else becomes an [`ActiveEffect`] whose id is
    /// returned.
    pub fn apply(
        &mut self,
        ctx: &mut SimContext<'_>,
        damage: &mut DamageManager,
        source: EntityId,
        target: EntityId,
        skill_id: &str,
        spec: &EffectSpec,
    ) -> Option<EffectId> {
        if !ctx.entities.is_alive(target) {
            return None;
        }

        let mut applied_delta = 0.0;
        match spec.kind {
            EffectKind::Damage => {
                let _ = damage.apply_damage(
                    ctx,
                    Some(source),
                    target,
                    spec.magnitude,
                    DamageType::Magical,
                    &DamageOptions::default(),
                );
                return None;
            }
            EffectKind::Heal => {
                let _ = damage.apply_healing(ctx, Some(source), target, spec.magnitude, 0.0, 1.0);
                return None;
            }
            EffectKind::Buff | EffectKind::Debuff => {
                let Some(attribute) = spec.attribute.clone() else {
                    tracing::warn!(skill = skill_id, "stat effect without an attribute ignored");
                    return None;
                };
                let requested = if spec.kind == EffectKind::Buff {
                    spec.magnitude
                } else {
                    -spec.magnitude
                };
                if let Some(entity) = ctx.entities.get_mut(target) {
                    // Clamped stats only take part of the delta; remember what landed.
                    let before = entity.stat(&attribute);
                    applied_delta = entity.add_to_stat(attribute, requested) - before;
                }
            }
            EffectKind::Control => {
                let Some(control) = spec.control else {
                    tracing::warn!(skill = skill_id, "control effect without a control kind ignored");
                    return None;
                };
                let _ = ctx.entities.add_tag(target, control.tag());
            }
            EffectKind::Dot
            | EffectKind::Hot
            | EffectKind::Summon
            | EffectKind::Movement
            | EffectKind::Special => {}
        }

        self.next_id += 1;
        let id = EffectId::new(self.next_id);
        self.effects.push(ActiveEffect {
            id,
            kind: spec.kind,
            source,
            target,
            skill_id: skill_id.to_owned(),
            magnitude: spec.magnitude,
            duration: spec.duration(),
            interval: spec.interval().unwrap_or(DEFAULT_TICK_INTERVAL),
            started: ctx.now,
            last_tick: ctx.now,
            attribute: spec.attribute.clone(),
            control: spec.control,
            applied_delta,
        });
        tracing::debug!(effect = id.get(), entity = %target, kind = ?spec.kind, "effect applied");

        ctx.events.emit(GameEvent::SkillEffectApplied {
            effect: id,
            kind: spec.kind,
            source,
            target,
            skill_id: skill_id.to_owned(),
            magnitude: spec.magnitude,
        });
        Some(id)
    }

    /// Expires finished effects and ticks periodic ones.
    ///
    /// Removal is checked before ticking, so an effect never ticks on the
    /// frame it expires or after its target died.
    pub fn update(&mut self, ctx: &mut SimContext<'_>, damage: &mut DamageManager) {
        let mut index = 0;
        while index < self.effects.len() {
            let effect = &self.effects[index];
            let reason = if !ctx.entities.is_alive(effect.target) {
                Some(EffectEndReason::TargetDied)
            } else if effect.expired(ctx.now) {
                Some(EffectEndReason::Expired)
            } else {
                None
            };
            if let Some(reason) = reason {
                let effect = self.effects.remove(index);
                self.finish(ctx, effect, reason);
                continue;
            }

            let periodic = matches!(effect.kind, EffectKind::Dot | EffectKind::Hot);
            if periodic && ctx.now.saturating_sub(effect.last_tick) >= effect.interval {
                let effect = &mut self.effects[index];
                effect.last_tick = ctx.now;
                let (kind, source, target, magnitude) =
                    (effect.kind, effect.source, effect.target, effect.magnitude);
                if kind == EffectKind::Dot {
                    let _ = damage.apply_damage(
                        ctx,
                        Some(source),
                        target,
                        magnitude,
                        DamageType::Dot,
                        &DamageOptions::unavoidable(),
                    );
                } else {
                    let _ = damage.apply_healing(ctx, Some(source), target, magnitude, 0.0, 1.0);
                }
            }
            index += 1;
        }
    }

    /// Removes every effect on `entity`.
    pub fn clear_entity_effects(&mut self, ctx: &mut SimContext<'_>, entity: EntityId) {
        let (removed, kept) = std::mem::take(&mut self.effects)
            .into_iter()
            .partition(|effect| effect.target == entity);
        self.effects = kept;
        for effect in removed {
            self.finish(ctx, effect, EffectEndReason::Cleared);
        }
    }

    /// Removes every effect.
    pub fn clear_all_effects(&mut self, ctx: &mut SimContext<'_>) {
        for effect in std::mem::take(&mut self.effects) {
            self.finish(ctx, effect, EffectEndReason::Cleared);
        }
    }

    fn finish(&self, ctx: &mut SimContext<'_>, effect: ActiveEffect, reason: EffectEndReason) {
        match effect.kind {
            EffectKind::Buff | EffectKind::Debuff => {
                if let (Some(attribute), Some(entity)) =
                    (effect.attribute.clone(), ctx.entities.get_mut(effect.target))
                {
                    let _ = entity.add_to_stat(attribute, -effect.applied_delta);
                }
            }
            EffectKind::Control => {
                if let Some(control) = effect.control {
                    let still_held = self
                        .effects
                        .iter()
                        .any(|other| other.target == effect.target && other.control == Some(control));
                    if !still_held {
                        let _ = ctx.entities.remove_tag(effect.target, control.tag());
                    }
                }
            }
            _ => {}
        }
        tracing::debug!(effect = effect.id.get(), entity = %effect.target, ?reason, "effect removed");

        ctx.events.emit(GameEvent::SkillEffectRemoved {
            effect: effect.id,
            kind: effect.kind,
            target: effect.target,
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{BeanKind, Position, Stats};
    use crystal_defence_events::EventManager;
    use crystal_defence_random::RandomManager;
    use crystal_defence_world::{Bean, Entity, EntityManager, Role};

    struct Fixture {
        entities: EntityManager,
        rng: RandomManager,
        events: EventManager,
        now: Duration,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                entities: EntityManager::default(),
                rng: RandomManager::new(42),
                events: EventManager::buffered(),
                now: Duration::ZERO,
            }
        }

        fn ctx(&mut self) -> SimContext<'_> {
            SimContext {
                entities: &mut self.entities,
                rng: &mut self.rng,
                events: &mut self.events,
                now: self.now,
            }
        }

        fn bean(&mut self, hp: f64) -> EntityId {
            let id = self.entities.allocate_id();
            let stats = Stats::new()
                .with(StatKey::Hp, hp)
                .with(StatKey::Attack, 10.0);
            let role = Role::Bean(Bean::new(BeanKind::Normal, 1.0, 0, false));
            assert!(self.entities.add(Entity::new(id, "bean", Position::ZERO, stats, role)));
            id
        }

        fn removals(&mut self) -> Vec<EffectEndReason> {
            self.events
                .drain_outbox()
                .into_iter()
                .filter_map(|event| match event {
                    GameEvent::SkillEffectRemoved { reason, .. } => Some(reason),
                    _ => None,
                })
                .collect()
        }
    }

    #[test]
    fn dot_ticks_until_expiry() {
        let mut fixture = Fixture::new();
        let source = fixture.bean(100.0);
        let target = fixture.bean(100.0);
        let mut damage = DamageManager::new();
        let mut effects = EffectManager::new();
        let spec = EffectSpec::new(EffectKind::Dot, 5.0, Duration::from_millis(3000));

        let id = effects.apply(&mut fixture.ctx(), &mut damage, source, target, "burn", &spec);
        assert!(id.is_some());

        for ms in (500..=3000).step_by(500) {
            fixture.now = Duration::from_millis(ms);
            effects.update(&mut fixture.ctx(), &mut damage);
        }

        // Ticks at 1000 and 2000; removed at 3000 before a third tick.
        assert_eq!(fixture.entities.get(target).map(Entity::hp), Some(90.0));
        assert!(effects.effects().is_empty());
        assert_eq!(fixture.removals(), vec![EffectEndReason::Expired]);
    }

    #[test]
    fn buff_is_reverted_on_expiry() {
        let mut fixture = Fixture::new();
        let target = fixture.bean(100.0);
        let mut damage = DamageManager::new();
        let mut effects = EffectManager::new();
        let spec = EffectSpec::new(EffectKind::Buff, 15.0, Duration::from_millis(1000))
            .on(StatKey::Attack);

        let _ = effects.apply(&mut fixture.ctx(), &mut damage, target, target, "rally", &spec);
        assert_eq!(fixture.entities.get(target).map(|e| e.stat(&StatKey::Attack)), Some(25.0));

        fixture.now = Duration::from_millis(1000);
        effects.update(&mut fixture.ctx(), &mut damage);
        assert_eq!(fixture.entities.get(target).map(|e| e.stat(&StatKey::Attack)), Some(10.0));
    }

    #[test]
    fn clamped_debuff_restores_the_original_value() {
        let mut fixture = Fixture::new();
        let target = fixture.bean(100.0);
        if let Some(entity) = fixture.entities.get_mut(target) {
            entity.set_stat(StatKey::MaxMp, 50.0);
        }
        let mut damage = DamageManager::new();
        let mut effects = EffectManager::new();
        let spec = EffectSpec::new(EffectKind::Debuff, 80.0, Duration::from_millis(1000))
            .on(StatKey::MaxMp);

        let _ = effects.apply(&mut fixture.ctx(), &mut damage, target, target, "drain", &spec);
        assert_eq!(fixture.entities.get(target).map(|e| e.stat(&StatKey::MaxMp)), Some(0.0));

        fixture.now = Duration::from_millis(1000);
        effects.update(&mut fixture.ctx(), &mut damage);
        assert_eq!(fixture.entities.get(target).map(|e| e.stat(&StatKey::MaxMp)), Some(50.0));
    }

    #[test]
    fn overlapping_controls_keep_the_tag() {
        let mut fixture = Fixture::new();
        let target = fixture.bean(100.0);
        let mut damage = DamageManager::new();
        let mut effects = EffectManager::new();
        let short = EffectSpec::new(EffectKind::Control, 0.0, Duration::from_millis(500))
            .control(ControlKind::Stun);
        let long = EffectSpec::new(EffectKind::Control, 0.0, Duration::from_millis(2000))
            .control(ControlKind::Stun);

        let _ = effects.apply(&mut fixture.ctx(), &mut damage, target, target, "bash", &short);
        let _ = effects.apply(&mut fixture.ctx(), &mut damage, target, target, "slam", &long);

        fixture.now = Duration::from_millis(600);
        effects.update(&mut fixture.ctx(), &mut damage);
        assert!(fixture.entities.get(target).is_some_and(|e| e.has_tag("control_stun")));

        fixture.now = Duration::from_millis(2000);
        effects.update(&mut fixture.ctx(), &mut damage);
        assert!(!fixture.entities.get(target).is_some_and(|e| e.has_tag("control_stun")));
    }

    #[test]
    fn dead_targets_lose_their_effects() {
        let mut fixture = Fixture::new();
        let target = fixture.bean(3.0);
        let mut damage = DamageManager::new();
        let mut effects = EffectManager::new();
        let spec = EffectSpec::new(EffectKind::Dot, 10.0, Duration::from_millis(5000))
            .every(Duration::from_millis(200));

        let _ = effects.apply(&mut fixture.ctx(), &mut damage, target, target, "venom", &spec);
        fixture.now = Duration::from_millis(200);
        effects.update(&mut fixture.ctx(), &mut damage);
        assert!(!fixture.entities.is_alive(target));
        let _ = fixture.events.drain_outbox();

        fixture.now = Duration::from_millis(400);
        effects.update(&mut fixture.ctx(), &mut damage);
        assert_eq!(fixture.removals(), vec![EffectEndReason::TargetDied]);
    }

    #[test]
    fn clearing_reports_every_effect() {
        let mut fixture = Fixture::new();
        let first = fixture.bean(100.0);
        let second = fixture.bean(100.0);
        let mut damage = DamageManager::new();
        let mut effects = EffectManager::new();
        let spec = EffectSpec::new(EffectKind::Hot, 1.0, Duration::from_millis(5000));

        let _ = effects.apply(&mut fixture.ctx(), &mut damage, first, first, "mend", &spec);
        let _ = effects.apply(&mut fixture.ctx(), &mut damage, first, second, "mend", &spec);
        let _ = fixture.events.drain_outbox();

        effects.clear_entity_effects(&mut fixture.ctx(), first);
        assert_eq!(effects.effects_on(second).count(), 1);
        effects.clear_all_effects(&mut fixture.ctx());
        assert_eq!(
            fixture.removals(),
            vec![EffectEndReason::Cleared, EffectEndReason::Cleared]
        );
    }
}
