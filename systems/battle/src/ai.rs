use crystal_defence_core::{EntityId, EntityKind, Position};
use crystal_defence_world::EntityManager;

/// Target selection for heroes.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeroAi;

impl HeroAi {
    /// Whether `current` is still worth attacking from `origin`.
    #[must_use]
    pub fn keeps_target(
        entities: &EntityManager,
        origin: Position,
        range: f64,
        current: Option<EntityId>,
    ) -> bool {
        current
            .and_then(|id| entities.get(id))
            .is_some_and(|target| {
                target.is_alive() && target.position().distance(origin) <= range
            })
    }

    /// Picks the nearest living bean, preferring one already within `range`.
    ///
    /// Equal distances resolve to the lower id so the choice is stable.
    #[must_use]
    pub fn select_target(
        entities: &EntityManager,
        origin: Position,
        range: f64,
    ) -> Option<EntityId> {
        let nearest = |within: bool| {
            entities
                .living(EntityKind::Bean)
                .map(|bean| (bean.position().distance(origin), bean.id()))
                .filter(|(distance, _)| !within || *distance <= range)
                .min_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)))
                .map(|(_, id)| id)
        };
        nearest(true).or_else(|| nearest(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{BeanKind, StatKey, Stats};
    use crystal_defence_world::{Bean, Entity, Role};

    fn bean(entities: &mut EntityManager, x: f64, hp: f64) -> EntityId {
        let id = entities.allocate_id();
        let role = Role::Bean(Bean::new(BeanKind::Normal, 1.0, 0, false));
        let stats = Stats::new().with(StatKey::Hp, hp);
        assert!(entities.add(Entity::new(id, "bean", Position::new(x, 0.0), stats, role)));
        id
    }

    #[test]
    fn nearest_bean_wins_with_ties_to_lower_id() {
        let mut entities = EntityManager::default();
        let far = bean(&mut entities, 300.0, 10.0);
        let left = bean(&mut entities, -50.0, 10.0);
        let _right = bean(&mut entities, 50.0, 10.0);

        assert_eq!(HeroAi::select_target(&entities, Position::ZERO, 120.0), Some(left));
        assert_eq!(
            HeroAi::select_target(&entities, Position::new(250.0, 0.0), 120.0),
            Some(far)
        );
    }

    #[test]
    fn dead_beans_are_skipped_and_out_of_range_is_a_fallback() {
        let mut entities = EntityManager::default();
        let _dead = bean(&mut entities, 10.0, 0.0);
        let distant = bean(&mut entities, 500.0, 10.0);

        assert_eq!(HeroAi::select_target(&entities, Position::ZERO, 120.0), Some(distant));
        assert!(!HeroAi::keeps_target(&entities, Position::ZERO, 120.0, Some(distant)));
        assert!(HeroAi::keeps_target(&entities, Position::ZERO, 600.0, Some(distant)));
        assert!(!HeroAi::keeps_target(&entities, Position::ZERO, 600.0, None));
    }
}
