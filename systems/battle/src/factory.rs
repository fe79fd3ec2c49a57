//! Entity construction from battle parameters and spawn requests.

use std::time::Duration;

use crystal_defence_core::{CrystalParams, EntityId, PlayerParams, Position, StatKey, Stats};
use crystal_defence_waves::SpawnRequest;
use crystal_defence_world::{
    Bean, BeanProfile, Crystal, Entity, Hero, Role, DEFAULT_HERO_ATTACK_INTERVAL,
    DEFAULT_HERO_ATTACK_RANGE,
};

/// Mana granted to heroes whose parameters omit it.
const DEFAULT_HERO_MANA: f64 = 100.0;
/// Number of hero slots around the crystal.
pub(crate) const HERO_SLOTS: u8 = 5;

/// Centre of hero slot `slot` on a circle of `radius` around `center`.
///
/// Slot 1 sits straight above the crystal and the rest follow at 72° steps.
pub(crate) fn slot_position(center: Position, slot: u8, radius: f64) -> Position {
    let index = f64::from(slot.clamp(1, HERO_SLOTS) - 1);
    let angle = (-90.0 + index * 72.0_f64).to_radians();
    center + Position::new(angle.cos(), angle.sin()) * radius
}

pub(crate) fn crystal(id: EntityId, params: &CrystalParams) -> Entity {
    let stats = Stats::new()
        .with(StatKey::Hp, params.hp)
        .with(StatKey::MaxHp, params.hp)
        .with(StatKey::Defense, params.defense)
        .with(StatKey::MagicDefense, params.magic_defense);
    Entity::new(
        id,
        "crystal",
        params.position,
        stats,
        Role::Crystal(Crystal::new(params)),
    )
}

pub(crate) fn hero(id: EntityId, params: &PlayerParams, position: Position, slot: u8) -> Entity {
    let mut stats = params.stats.clone();
    if !stats.contains(&StatKey::Mp) {
        stats.set(StatKey::Mp, DEFAULT_HERO_MANA);
    }
    if !stats.contains(&StatKey::MaxMp) {
        stats.set(StatKey::MaxMp, stats.get(&StatKey::Mp).max(DEFAULT_HERO_MANA));
    }
    let interval = params
        .attack_interval_ms
        .map_or(DEFAULT_HERO_ATTACK_INTERVAL, Duration::from_millis);
    let role = Hero::new(params.player_id, params.hero_id.clone(), slot)
        .with_attack(params.attack_range.unwrap_or(DEFAULT_HERO_ATTACK_RANGE), interval)
        .with_items(params.items.clone());
    let name = params.name.clone().unwrap_or_else(|| params.hero_id.clone());
    Entity::new(id, name, position, stats, Role::Hero(role))
}

/// Builds a bean from its base profile scaled by the request's multipliers,
/// marching on `target` when one is given.
pub(crate) fn bean(
    id: EntityId,
    request: &SpawnRequest,
    target: Option<(EntityId, Position)>,
) -> Entity {
    let profile = BeanProfile::of(request.bean_type);
    let scale = request.multipliers;
    let hp = profile.hp * scale.hp;
    let stats = Stats::new()
        .with(StatKey::Hp, hp)
        .with(StatKey::MaxHp, hp)
        .with(StatKey::Attack, profile.attack * scale.attack)
        .with(StatKey::Defense, profile.defense * scale.defense)
        .with(StatKey::MagicDefense, profile.magic_defense * scale.defense)
        .with(StatKey::Speed, profile.speed * scale.speed);

    let mut role = Bean::new(request.bean_type, scale.speed, request.wave, request.special);
    if let Some((target, position)) = target {
        role = role.targeting(target, position);
    }
    let name = if request.special {
        format!("{} (special)", request.bean_type)
    } else {
        request.bean_type.to_string()
    };
    Entity::new(id, name, request.position, stats, Role::Bean(role))
}
