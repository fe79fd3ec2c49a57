use std::collections::BTreeMap;
use std::time::Duration;

use crystal_defence_core::{
    BattleResult, BattleStatistics, EntityId, EntityKind, GameEvent, InitParams, ReplayData,
    SkillConfig, StatKey, Command,
};
use crystal_defence_damage::{DamageManager, DamageOptions};
use crystal_defence_events::EventManager;
use crystal_defence_frame::{FrameHandler, FrameKind, FrameTick};
use crystal_defence_random::RandomManager;
use crystal_defence_skills::SkillManager;
use crystal_defence_waves::{SpawnRequest, WaveManager};
use crystal_defence_world::{EntityManager, Intent, SimContext};

use crate::ai::HeroAi;
use crate::factory;
use crate::BattleSettings;

/// Max health gained per hero level.
const LEVEL_UP_HP: f64 = 50.0;
/// Attack gained per hero level.
const LEVEL_UP_ATTACK: f64 = 5.0;
/// Defense gained per hero level.
const LEVEL_UP_DEFENSE: f64 = 2.0;

#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) enemies_spawned: u32,
    pub(crate) enemies_defeated: u32,
    pub(crate) commands_processed: u32,
}

/// Everything one battle simulates, driven frame by frame by the clock.
#[derive(Debug)]
pub(crate) struct BattleSimulation {
    pub(crate) entities: EntityManager,
    pub(crate) rng: RandomManager,
    pub(crate) events: EventManager,
    pub(crate) damage: DamageManager,
    pub(crate) skills: SkillManager,
    pub(crate) waves: WaveManager,
    pub(crate) settings: BattleSettings,
    pub(crate) crystal: Option<EntityId>,
    pub(crate) heroes: Vec<EntityId>,
    pub(crate) skill_book: BTreeMap<String, SkillConfig>,
    pub(crate) replay: ReplayData,
    pub(crate) counters: Counters,
    pub(crate) now: Duration,
    pub(crate) logic_frame: u64,
    pub(crate) result: Option<BattleResult>,
    intents: Vec<Intent>,
    spawns: Vec<SpawnRequest>,
}

impl BattleSimulation {
    /// A simulation with no entities, used before the first initialisation.
    pub(crate) fn idle(settings: BattleSettings, events: EventManager) -> Self {
        Self {
            entities: EntityManager::new(settings.grid_cell_size),
            rng: RandomManager::new(0),
            events,
            damage: DamageManager::new(),
            skills: SkillManager::new(),
            waves: WaveManager::default(),
            settings,
            crystal: None,
            heroes: Vec::new(),
            skill_book: BTreeMap::new(),
            replay: ReplayData::new(String::new(), InitParams::new(0)),
            counters: Counters::default(),
            now: Duration::ZERO,
            logic_frame: 0,
            result: None,
            intents: Vec::new(),
            spawns: Vec::new(),
        }
    }

    /// Builds the crystal and heroes described by `params`.
    pub(crate) fn build(
        params: &InitParams,
        replay_id: String,
        settings: BattleSettings,
        events: EventManager,
        waves: WaveManager,
    ) -> Self {
        let mut sim = Self::idle(settings, events);
        sim.rng = RandomManager::new(params.seed);
        sim.waves = waves;
        sim.replay = ReplayData::new(replay_id, params.clone());
        sim.skill_book = params
            .skill_book
            .iter()
            .map(|config| (config.id.clone(), config.clone()))
            .collect();

        let crystal_id = sim.entities.allocate_id();
        sim.insert(factory::crystal(crystal_id, &params.crystal));
        sim.crystal = Some(crystal_id);

        for player in &params.players {
            let slot = player.slot.clamp(1, factory::HERO_SLOTS);
            if slot != player.slot {
                tracing::warn!(player = player.player_id.get(), slot = player.slot, "hero slot clamped");
            }
            let position = factory::slot_position(
                params.crystal.position,
                slot,
                sim.settings.hero_slot_radius,
            );
            let id = sim.entities.allocate_id();
            sim.insert(factory::hero(id, player, position, slot));
            sim.heroes.push(id);

            for skill_id in &player.skills {
                match sim.skill_book.get(skill_id) {
                    Some(config) => sim.skills.register(id, config.clone(), 1),
                    None => tracing::warn!(skill = %skill_id, "starting skill missing from the skill book"),
                }
            }
        }
        sim
    }

    pub(crate) fn statistics(&self) -> BattleStatistics {
        let damage = self.damage.stats();
        BattleStatistics {
            logic_frames: self.logic_frame,
            duration_ms: crystal_defence_core::duration_to_millis(self.now),
            enemies_spawned: self.counters.enemies_spawned,
            total_enemies_defeated: self.counters.enemies_defeated,
            damage_dealt: damage.total_damage,
            healing_done: damage.total_healing,
            critical_hits: damage.critical_hits,
            evasions: damage.evasions,
            commands_processed: self.counters.commands_processed,
        }
    }

    pub(crate) fn parts(&mut self) -> (SimContext<'_>, &mut DamageManager, &mut SkillManager) {
        (
            SimContext {
                entities: &mut self.entities,
                rng: &mut self.rng,
                events: &mut self.events,
                now: self.now,
            },
            &mut self.damage,
            &mut self.skills,
        )
    }

    fn insert(&mut self, entity: crystal_defence_world::Entity) {
        let (id, kind, name, position) =
            (entity.id(), entity.kind(), entity.name().to_owned(), entity.position());
        if self.entities.add(entity) {
            self.events.emit(GameEvent::EntityCreated {
                entity: id,
                kind,
                name,
                position,
            });
        }
    }

    fn set_clock(&mut self, tick: FrameTick) {
        self.now = tick.now;
        self.logic_frame = tick.logic_frame;
        self.events.set_clock(tick.logic_frame, tick.now);
    }

    fn resolve_intents(&mut self) {
        let mut intents = std::mem::take(&mut self.intents);
        for intent in intents.drain(..) {
            let Intent::Attack {
                attacker,
                target,
                amount,
                damage_type,
            } = intent;
            if !self.entities.is_alive(attacker) {
                continue;
            }
            let reflected = self
                .entities
                .get(target)
                .and_then(|entity| entity.crystal())
                .map(|crystal| crystal.contact_damage())
                .filter(|_| {
                    self.entities
                        .get(attacker)
                        .is_some_and(|entity| entity.kind() == EntityKind::Bean)
                });

            let (mut ctx, damage, _) = self.parts();
            let result = damage.apply_damage(
                &mut ctx,
                Some(attacker),
                target,
                amount,
                damage_type,
                &DamageOptions::default(),
            );
            if let Some(contact) = reflected.filter(|contact| *contact > 0.0 && !result.evaded) {
                let _ = damage.apply_damage(
                    &mut ctx,
                    Some(target),
                    attacker,
                    contact,
                    crystal_defence_core::DamageType::Pure,
                    &DamageOptions::unavoidable(),
                );
            }
        }
        self.intents = intents;
    }

    /// Drains the event outbox and settles every death it reports, repeating
    /// until no new events appear.
    pub(crate) fn route_deaths(&mut self) {
        loop {
            let pending = self.events.drain_outbox();
            if pending.is_empty() {
                break;
            }
            for event in pending {
                if let GameEvent::EntityDeath {
                    entity,
                    kind: EntityKind::Bean,
                    killer,
                } = event
                {
                    self.on_bean_death(entity, killer);
                }
            }
        }
    }

    fn on_bean_death(&mut self, bean: EntityId, killer: Option<EntityId>) {
        let Some((kind, wave)) = self
            .entities
            .get(bean)
            .and_then(|entity| entity.bean())
            .map(|role| (role.kind(), role.wave()))
        else {
            return;
        };

        self.counters.enemies_defeated += 1;
        self.waves.on_enemy_defeated(wave, self.now, &mut self.events);
        if let Some(hero) = killer.filter(|id| self.heroes.contains(id)) {
            self.reward(hero, self.settings.reward(kind));
        }

        let _ = self.entities.remove(bean);
        self.events.emit(GameEvent::EntityRemoved { entity: bean });
        tracing::debug!(entity = %bean, kind = %kind, "bean removed");
    }

    fn reward(&mut self, hero: EntityId, reward: crate::BeanReward) {
        let Some(entity) = self.entities.get_mut(hero) else {
            return;
        };
        let Some(role) = entity.hero_mut() else {
            return;
        };
        role.add_gold(reward.gold);
        let gained = role.gain_exp(reward.exp);
        let level = role.level();
        for _ in 0..gained {
            let _ = entity.add_to_stat(StatKey::MaxHp, LEVEL_UP_HP);
            let _ = entity.add_to_stat(StatKey::Hp, LEVEL_UP_HP);
            let _ = entity.add_to_stat(StatKey::Attack, LEVEL_UP_ATTACK);
            let _ = entity.add_to_stat(StatKey::Defense, LEVEL_UP_DEFENSE);
        }
        for step in 0..gained {
            let level = level - gained + step + 1;
            tracing::info!(entity = %hero, level, "hero levelled up");
            self.events.emit(GameEvent::HeroLevelUp { hero, level });
        }
    }

    fn spawn_waves(&mut self) {
        let mut spawns = std::mem::take(&mut self.spawns);
        self.waves
            .update(self.now, &mut self.rng, &mut self.events, &mut spawns);
        let target = self
            .crystal
            .and_then(|id| self.entities.get(id))
            .filter(|crystal| crystal.is_alive())
            .map(|crystal| (crystal.id(), crystal.position()));
        for request in spawns.drain(..) {
            let id = self.entities.allocate_id();
            self.insert(factory::bean(id, &request, target));
            self.counters.enemies_spawned += 1;
        }
        self.spawns = spawns;
    }

    fn update_hero_ai(&mut self) {
        for index in 0..self.heroes.len() {
            let hero = self.heroes[index];
            let Some(entity) = self.entities.get(hero).filter(|entity| entity.is_alive()) else {
                continue;
            };
            let Some(role) = entity.hero() else {
                continue;
            };
            let (origin, range, current) = (entity.position(), role.attack_range(), role.target());
            if HeroAi::keeps_target(&self.entities, origin, range, current) {
                continue;
            }

            let next = HeroAi::select_target(&self.entities, origin, range);
            let changed = self
                .entities
                .get_mut(hero)
                .and_then(|entity| entity.hero_mut())
                .is_some_and(|role| role.set_target(next));
            if changed {
                self.events.emit(GameEvent::HeroTargetChanged { hero, target: next });
            }
        }
    }

    fn evaluate_outcome(&mut self) {
        if self.result.is_some() {
            return;
        }
        let crystal_alive = self.crystal.is_some_and(|id| self.entities.is_alive(id));
        if !crystal_alive {
            self.result = Some(BattleResult::Defeat);
        } else if self.waves.is_all_completed() {
            self.result = Some(BattleResult::Victory);
        }
        if let Some(result) = self.result {
            tracing::info!(?result, logic_frame = self.logic_frame, "battle decided");
        }
    }
}

impl FrameHandler for BattleSimulation {
    fn process_commands(&mut self, tick: FrameTick, commands: &[Command]) {
        self.set_clock(tick);
        for command in commands {
            self.replay.commands.push(command.clone());
            match self.execute(command) {
                Ok(()) => {
                    self.counters.commands_processed += 1;
                    self.events.emit(GameEvent::CommandProcessed {
                        command: command.clone(),
                    });
                }
                Err(error) => {
                    tracing::debug!(
                        player = command.player.get(),
                        command = command.action.kind(),
                        %error,
                        "command failed"
                    );
                }
            }
            self.route_deaths();
        }
    }

    fn update(&mut self, tick: FrameTick) {
        self.set_clock(tick);

        let mut intents = std::mem::take(&mut self.intents);
        self.entities
            .update_all(tick.dt, tick.logic_frame, tick.now, &mut self.events, &mut intents);
        self.intents = intents;
        self.resolve_intents();
        self.route_deaths();

        let (mut ctx, damage, skills) = self.parts();
        skills.update(&mut ctx, damage, tick.dt);
        self.route_deaths();

        if tick.kind == FrameKind::Logic {
            self.spawn_waves();
            self.update_hero_ai();
            self.route_deaths();
            self.evaluate_outcome();
        }
    }

    fn is_finished(&self) -> bool {
        self.result.is_some()
    }
}
