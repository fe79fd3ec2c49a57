#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative entity registry for the Crystal Defence battle engine.
//!
//! The [`EntityManager`] owns every live [`Entity`] together with three
//! derived indices (by kind, by tag and a uniform spatial grid) and advances
//! each entity's state machine once per inner frame. Entities never act on
//! each other directly: attacks leave the registry as [`Intent`] values that
//! the battle resolves through the damage pipeline.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    time::Duration,
};

use crystal_defence_core::{DamageType, EntityId, EntityKind, GameEvent, PlayerId, Position};
use crystal_defence_events::EventManager;
use crystal_defence_random::RandomManager;

mod entity;
mod grid;
mod profile;

pub use entity::{
    crystal_state_for, Bean, Crystal, DamageTaken, Entity, Hero, Role,
    DEFAULT_HERO_ATTACK_INTERVAL, DEFAULT_HERO_ATTACK_RANGE,
};
pub use profile::BeanProfile;

use entity::TargetView;
use grid::SpatialGrid;

/// Default side length of a spatial grid cell in world units.
pub const DEFAULT_CELL_SIZE: f64 = 100.0;

/// Action an entity wants performed on another entity.
#[derive(Clone, Debug, PartialEq)]
pub enum Intent {
    /// A basic attack.
    Attack {
        /// Striking entity.
        attacker: EntityId,
        /// Struck entity.
        target: EntityId,
        /// Raw damage before any reduction.
        amount: f64,
        /// Damage category.
        damage_type: DamageType,
    },
}

/// Mutable simulation services handed to systems that resolve gameplay.
#[derive(Debug)]
pub struct SimContext<'a> {
    /// Entity registry.
    pub entities: &'a mut EntityManager,
    /// Shared random stream.
    pub rng: &'a mut RandomManager,
    /// Event bus.
    pub events: &'a mut EventManager,
    /// Current simulation time.
    pub now: Duration,
}

/// Registry of live entities with kind, tag and spatial indices.
#[derive(Debug)]
pub struct EntityManager {
    entities: BTreeMap<EntityId, Entity>,
    by_kind: HashMap<EntityKind, BTreeSet<EntityId>>,
    by_tag: HashMap<String, BTreeSet<EntityId>>,
    grid: SpatialGrid,
    next_id: u32,
    frame: u64,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_SIZE)
    }
}

impl EntityManager {
    /// Creates an empty registry with the provided grid cell size.
    #[must_use]
    pub fn new(cell_size: f64) -> Self {
        Self {
            entities: BTreeMap::new(),
            by_kind: HashMap::new(),
            by_tag: HashMap::new(),
            grid: SpatialGrid::new(cell_size),
            next_id: 1,
            frame: 0,
        }
    }

    /// Side length of a grid cell.
    #[must_use]
    pub fn cell_size(&self) -> f64 {
        self.grid.cell_size()
    }

    /// Reserves the next unused entity identifier.
    pub fn allocate_id(&mut self) -> EntityId {
        let id = EntityId::new(self.next_id);
        self.next_id += 1;
        id
    }

    /// Registers an entity. Returns `false`, leaving the registry untouched,
    /// if the id is already taken.
    pub fn add(&mut self, mut entity: Entity) -> bool {
        let id = entity.id();
        if self.entities.contains_key(&id) {
            tracing::warn!(entity = %id, "rejected duplicate entity id");
            return false;
        }

        entity.mark_created(self.frame);
        self.next_id = self.next_id.max(id.get().saturating_add(1));
        let _ = self.by_kind.entry(entity.kind()).or_default().insert(id);
        for tag in entity.tags() {
            let _ = self.by_tag.entry(tag.to_owned()).or_default().insert(id);
        }
        self.grid.insert(id, entity.position());
        let _ = self.entities.insert(id, entity);
        true
    }

    /// Evicts an entity from the registry and every index.
    pub fn remove(&mut self, id: EntityId) -> Option<Entity> {
        let entity = self.entities.remove(&id)?;
        if let Some(ids) = self.by_kind.get_mut(&entity.kind()) {
            let _ = ids.remove(&id);
        }
        for tag in entity.tags() {
            if let Some(ids) = self.by_tag.get_mut(tag) {
                let _ = ids.remove(&id);
            }
        }
        self.grid.remove(id, entity.position());
        Some(entity)
    }

    /// Looks up an entity.
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(&id)
    }

    /// Looks up an entity for mutation. Positions and tags are changed
    /// through the manager so the indices stay consistent.
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(&id)
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Whether `id` is registered and alive.
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        self.get(id).is_some_and(Entity::is_alive)
    }

    /// Number of registered entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every entity in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Ids of every entity of `kind`, ascending.
    pub fn ids_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = EntityId> + '_ {
        self.by_kind
            .get(&kind)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// Living entities of `kind` in id order.
    pub fn living(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> + '_ {
        self.ids_of_kind(kind)
            .filter_map(|id| self.entities.get(&id))
            .filter(|entity| entity.is_alive())
    }

    /// Ids carrying `tag`, ascending.
    pub fn with_tag<'a>(&'a self, tag: &str) -> impl Iterator<Item = EntityId> + 'a {
        self.by_tag
            .get(tag)
            .into_iter()
            .flat_map(|ids| ids.iter().copied())
    }

    /// The hero controlled by `player`.
    #[must_use]
    pub fn hero_of(&self, player: PlayerId) -> Option<EntityId> {
        self.ids_of_kind(EntityKind::Hero).find(|id| {
            self.entities
                .get(id)
                .and_then(Entity::hero)
                .is_some_and(|hero| hero.player() == player)
        })
    }

    /// The crystal, if registered.
    #[must_use]
    pub fn crystal(&self) -> Option<&Entity> {
        self.ids_of_kind(EntityKind::Crystal)
            .next()
            .and_then(|id| self.entities.get(&id))
    }

    /// Ids within `radius` of `position`, optionally filtered by kind,
    /// ascending.
    #[must_use]
    pub fn nearby(
        &self,
        position: Position,
        radius: f64,
        kind: Option<EntityKind>,
    ) -> Vec<EntityId> {
        self.grid
            .candidates(position, radius)
            .into_iter()
            .filter(|id| {
                self.entities.get(id).is_some_and(|entity| {
                    kind.map_or(true, |kind| entity.kind() == kind)
                        && entity.position().distance(position) <= radius
                })
            })
            .collect()
    }

    /// Moves an entity and re-indexes it. Returns the previous position.
    pub fn set_position(&mut self, id: EntityId, position: Position) -> Option<Position> {
        let entity = self.entities.get_mut(&id)?;
        let previous = entity.set_position(position);
        self.grid.relocate(id, previous, position);
        Some(previous)
    }

    /// Attaches a tag. Returns `false` if it was already attached or the
    /// entity is unknown.
    pub fn add_tag(&mut self, id: EntityId, tag: &str) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.insert_tag(tag) {
            return false;
        }
        let _ = self.by_tag.entry(tag.to_owned()).or_default().insert(id);
        true
    }

    /// Detaches a tag. Returns `false` if it was not attached.
    pub fn remove_tag(&mut self, id: EntityId, tag: &str) -> bool {
        let Some(entity) = self.entities.get_mut(&id) else {
            return false;
        };
        if !entity.delete_tag(tag) {
            return false;
        }
        if let Some(ids) = self.by_tag.get_mut(tag) {
            let _ = ids.remove(&id);
        }
        true
    }

    /// Runs every entity's state machine for one inner frame in id order,
    /// re-indexing moved entities and collecting attack intents in `out`.
    pub fn update_all(
        &mut self,
        dt: Duration,
        frame: u64,
        now: Duration,
        events: &mut EventManager,
        out: &mut Vec<Intent>,
    ) {
        self.frame = frame;
        let ids: Vec<EntityId> = self.entities.keys().copied().collect();
        for id in ids {
            let view = self
                .entities
                .get(&id)
                .and_then(Entity::pursued)
                .and_then(|target| self.entities.get(&target))
                .map(|target| TargetView {
                    position: target.position(),
                    alive: target.is_alive(),
                });
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };

            let outcome = entity.update(dt, now, frame, view, out);
            if let Some((from, to)) = outcome.state_change {
                events.emit(GameEvent::BeanStateChanged { bean: id, from, to });
            }
            if let Some((from, to)) = outcome.moved {
                self.grid.relocate(id, from, to);
                events.emit(GameEvent::EntityMoved { entity: id, from, to });
            }
        }
    }

    /// Drops every entity and resets id allocation.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.by_kind.clear();
        self.by_tag.clear();
        self.grid.clear();
        self.next_id = 1;
        self.frame = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{BeanKind, CrystalParams, StatKey, Stats};

    fn add_bean(manager: &mut EntityManager, position: Position) -> EntityId {
        let id = manager.allocate_id();
        let stats = Stats::new().with(StatKey::Hp, 100.0).with(StatKey::Attack, 10.0);
        let bean = Bean::new(BeanKind::Normal, 1.0, 0, false);
        assert!(manager.add(Entity::new(id, "bean", position, stats, Role::Bean(bean))));
        id
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut manager = EntityManager::default();
        let id = add_bean(&mut manager, Position::ZERO);
        let copy = manager.get(id).cloned().expect("registered");
        assert!(!manager.add(copy));
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn nearby_matches_brute_force_scan() {
        let mut manager = EntityManager::new(37.0);
        let mut ids = Vec::new();
        for x in -6..=6 {
            for y in -6..=6 {
                let position = Position::new(f64::from(x) * 23.5, f64::from(y) * 19.25);
                ids.push(add_bean(&mut manager, position));
            }
        }

        let center = Position::new(12.0, -7.0);
        for radius in [0.0, 10.0, 45.0, 90.0, 400.0] {
            let expected: Vec<EntityId> = manager
                .iter()
                .filter(|entity| entity.position().distance(center) <= radius)
                .map(Entity::id)
                .collect();
            assert_eq!(manager.nearby(center, radius, Some(EntityKind::Bean)), expected);
        }
        assert!(manager
            .nearby(center, 400.0, Some(EntityKind::Crystal))
            .is_empty());
    }

    #[test]
    fn removal_clears_every_index() {
        let mut manager = EntityManager::default();
        let id = add_bean(&mut manager, Position::new(5.0, 5.0));
        assert!(manager.add_tag(id, "control_slow"));
        assert!(!manager.add_tag(id, "control_slow"));

        let removed = manager.remove(id).expect("registered");
        assert!(removed.has_tag("control_slow"));
        assert!(manager.with_tag("control_slow").next().is_none());
        assert!(manager.ids_of_kind(EntityKind::Bean).next().is_none());
        assert!(manager.nearby(Position::new(5.0, 5.0), 10.0, None).is_empty());
    }

    #[test]
    fn moving_entities_are_reindexed() {
        let mut manager = EntityManager::default();
        let id = add_bean(&mut manager, Position::ZERO);
        assert_eq!(manager.set_position(id, Position::new(450.0, 0.0)), Some(Position::ZERO));
        assert!(manager.nearby(Position::ZERO, 50.0, None).is_empty());
        assert_eq!(manager.nearby(Position::new(450.0, 0.0), 1.0, None), vec![id]);
    }

    #[test]
    fn beans_walk_toward_the_crystal_and_strike_it() {
        let mut manager = EntityManager::default();
        let mut events = EventManager::buffered();
        let crystal_id = manager.allocate_id();
        let params = CrystalParams::default();
        assert!(manager.add(Entity::new(
            crystal_id,
            "crystal",
            Position::ZERO,
            Stats::new().with(StatKey::Hp, params.hp),
            Role::Crystal(Crystal::new(&params)),
        )));
        let bean_id = manager.allocate_id();
        let stats = Stats::new().with(StatKey::Hp, 100.0).with(StatKey::Attack, 10.0);
        let bean = Bean::new(BeanKind::Normal, 1.0, 0, false).targeting(crystal_id, Position::ZERO);
        assert!(manager.add(Entity::new(
            bean_id,
            "bean",
            Position::new(200.0, 0.0),
            stats,
            Role::Bean(bean),
        )));

        let dt = Duration::from_millis(20);
        let mut intents = Vec::new();
        let mut now = Duration::ZERO;
        while intents.is_empty() && now < Duration::from_secs(10) {
            now += dt;
            manager.update_all(dt, 0, now, &mut events, &mut intents);
        }

        let bean = manager.get(bean_id).expect("bean");
        assert!(bean.position().x <= 50.0 + 1e-9);
        assert!(bean.position().x > 45.0);
        assert_eq!(
            intents,
            vec![Intent::Attack {
                attacker: bean_id,
                target: crystal_id,
                amount: 10.0,
                damage_type: DamageType::Physical,
            }]
        );
        assert_eq!(manager.nearby(bean.position(), 0.5, None), vec![bean_id]);
        assert!(events
            .drain_outbox()
            .iter()
            .any(|event| matches!(event, GameEvent::EntityMoved { .. })));
    }
}
