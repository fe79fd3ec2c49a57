use crystal_defence_core::{EntityId, EntityKind, Position, SkillConfig, TargetType};
use crystal_defence_random::RandomManager;
use crystal_defence_world::{Entity, EntityManager};

use crate::CastFailure;

/// Resolves the entities a skill affects.
#[derive(Clone, Copy, Debug, Default)]
pub struct TargetSelector;

impl TargetSelector {
    /// Resolves targets for `config` cast by `caster`.
    ///
    /// `MULTIPLE` resolves the single explicit target, like `SINGLE`.
    /// Truncation to `maxTargets` shuffles through `rng`, so the draw only
    /// happens when there are more candidates than slots.
    pub fn resolve(
        entities: &EntityManager,
        rng: &mut RandomManager,
        config: &SkillConfig,
        caster: EntityId,
        target: Option<EntityId>,
        position: Option<Position>,
    ) -> Result<Vec<EntityId>, CastFailure> {
        let origin = entities
            .get(caster)
            .map(Entity::position)
            .ok_or(CastFailure::CasterDead)?;

        match config.target_type {
            TargetType::SelfOnly => Ok(vec![caster]),
            TargetType::Single | TargetType::Multiple => {
                let target = target.ok_or(CastFailure::MissingTarget)?;
                let entity = entities
                    .get(target)
                    .ok_or(CastFailure::TargetNotFound(target))?;
                if !entity.is_alive() {
                    return Err(CastFailure::TargetDead(target));
                }
                check_range(config, origin, entity.position())?;
                Ok(vec![target])
            }
            TargetType::Area => {
                let center = position.ok_or(CastFailure::MissingPosition)?;
                check_range(config, origin, center)?;
                let found: Vec<EntityId> = entities
                    .nearby(center, config.area_radius, Some(EntityKind::Bean))
                    .into_iter()
                    .filter(|id| entities.is_alive(*id))
                    .collect();
                non_empty(found)
            }
            TargetType::Enemy => {
                let found = in_range(entities, config, origin, EntityKind::Bean, None);
                non_empty(truncate(rng, config, found))
            }
            TargetType::Ally => {
                let found = in_range(entities, config, origin, EntityKind::Hero, Some(caster));
                non_empty(truncate(rng, config, found))
            }
        }
    }
}

fn check_range(config: &SkillConfig, from: Position, to: Position) -> Result<(), CastFailure> {
    let distance = from.distance(to);
    match config.range {
        Some(range) if distance > range => Err(CastFailure::OutOfRange { distance, range }),
        _ => Ok(()),
    }
}

fn in_range(
    entities: &EntityManager,
    config: &SkillConfig,
    origin: Position,
    kind: EntityKind,
    exclude: Option<EntityId>,
) -> Vec<EntityId> {
    entities
        .living(kind)
        .filter(|entity| Some(entity.id()) != exclude)
        .filter(|entity| {
            config
                .range
                .map_or(true, |range| entity.position().distance(origin) <= range)
        })
        .map(Entity::id)
        .collect()
}

fn truncate(rng: &mut RandomManager, config: &SkillConfig, found: Vec<EntityId>) -> Vec<EntityId> {
    match config.max_targets {
        Some(limit) if found.len() > limit => {
            let mut shuffled = rng.shuffle(&found);
            shuffled.truncate(limit);
            shuffled
        }
        _ => found,
    }
}

fn non_empty(found: Vec<EntityId>) -> Result<Vec<EntityId>, CastFailure> {
    if found.is_empty() {
        Err(CastFailure::NoTargets)
    } else {
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{BeanKind, PlayerId, SkillType, StatKey, Stats};
    use crystal_defence_world::{Bean, Hero, Role};

    fn add(entities: &mut EntityManager, position: Position, role: Role) -> EntityId {
        let id = entities.allocate_id();
        let stats = Stats::new().with(StatKey::Hp, 50.0);
        assert!(entities.add(Entity::new(id, "unit", position, stats, role)));
        id
    }

    fn bean() -> Role {
        Role::Bean(Bean::new(BeanKind::Normal, 1.0, 0, false))
    }

    fn hero(player: u32) -> Role {
        Role::Hero(Hero::new(PlayerId::new(player), "hero", 1))
    }

    #[test]
    fn single_target_respects_range() {
        let mut entities = EntityManager::default();
        let mut rng = RandomManager::new(1);
        let caster = add(&mut entities, Position::ZERO, hero(1));
        let near = add(&mut entities, Position::new(80.0, 0.0), bean());
        let far = add(&mut entities, Position::new(300.0, 0.0), bean());
        let mut config = SkillConfig::new("bolt", SkillType::Damage, TargetType::Single);
        config.range = Some(100.0);

        assert_eq!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, Some(near), None),
            Ok(vec![near])
        );
        assert!(matches!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, Some(far), None),
            Err(CastFailure::OutOfRange { .. })
        ));
        assert_eq!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, None, None),
            Err(CastFailure::MissingTarget)
        );
    }

    #[test]
    fn multiple_resolves_one_explicit_target() {
        let mut entities = EntityManager::default();
        let mut rng = RandomManager::new(1);
        let caster = add(&mut entities, Position::ZERO, hero(1));
        let first = add(&mut entities, Position::new(10.0, 0.0), bean());
        let _second = add(&mut entities, Position::new(20.0, 0.0), bean());
        let config = SkillConfig::new("volley", SkillType::Damage, TargetType::Multiple);

        assert_eq!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, Some(first), None),
            Ok(vec![first])
        );
    }

    #[test]
    fn area_collects_beans_around_the_ground_position() {
        let mut entities = EntityManager::default();
        let mut rng = RandomManager::new(1);
        let caster = add(&mut entities, Position::ZERO, hero(1));
        let inside = add(&mut entities, Position::new(200.0, 40.0), bean());
        let _outside = add(&mut entities, Position::new(200.0, 200.0), bean());
        let _ally = add(&mut entities, Position::new(200.0, 0.0), hero(2));
        let mut config = SkillConfig::new("quake", SkillType::Damage, TargetType::Area);
        config.area_radius = 50.0;
        config.range = Some(250.0);

        let center = Position::new(200.0, 0.0);
        assert_eq!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, None, Some(center)),
            Ok(vec![inside])
        );
        assert!(matches!(
            TargetSelector::resolve(
                &entities,
                &mut rng,
                &config,
                caster,
                None,
                Some(Position::new(400.0, 0.0))
            ),
            Err(CastFailure::OutOfRange { .. })
        ));
    }

    #[test]
    fn enemy_targets_are_truncated_randomly() {
        let mut entities = EntityManager::default();
        let mut rng = RandomManager::new(99);
        let caster = add(&mut entities, Position::ZERO, hero(1));
        let beans: Vec<EntityId> = (0..6)
            .map(|i| add(&mut entities, Position::new(f64::from(i) * 10.0, 0.0), bean()))
            .collect();
        let mut config = SkillConfig::new("chain", SkillType::Damage, TargetType::Enemy);
        config.max_targets = Some(3);

        let picked = TargetSelector::resolve(&entities, &mut rng, &config, caster, None, None)
            .expect("targets");
        assert_eq!(picked.len(), 3);
        assert!(picked.iter().all(|id| beans.contains(id)));
    }

    #[test]
    fn ally_targets_exclude_the_caster() {
        let mut entities = EntityManager::default();
        let mut rng = RandomManager::new(5);
        let caster = add(&mut entities, Position::ZERO, hero(1));
        let config = SkillConfig::new("rally", SkillType::Buff, TargetType::Ally);
        assert_eq!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, None, None),
            Err(CastFailure::NoTargets)
        );

        let friend = add(&mut entities, Position::new(30.0, 0.0), hero(2));
        assert_eq!(
            TargetSelector::resolve(&entities, &mut rng, &config, caster, None, None),
            Ok(vec![friend])
        );
    }
}
