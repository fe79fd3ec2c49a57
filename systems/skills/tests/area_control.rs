use std::time::Duration;

use crystal_defence_core::{
    BeanKind, BeanState, ControlKind, EffectKind, EffectSpec, EntityId, EntityKind, GameEvent,
    PlayerId, Position, SkillConfig, SkillType, StatKey, Stats, TargetType,
};
use crystal_defence_damage::DamageManager;
use crystal_defence_events::EventManager;
use crystal_defence_random::RandomManager;
use crystal_defence_skills::{CastFailure, SkillManager};
use crystal_defence_world::{Bean, Entity, EntityManager, Hero, Role, SimContext};

fn spawn_bean(entities: &mut EntityManager, at: Position, target: EntityId) -> EntityId {
    let id = entities.allocate_id();
    let stats = Stats::new()
        .with(StatKey::Hp, 400.0)
        .with(StatKey::Attack, 10.0);
    let bean = Bean::new(BeanKind::Normal, 1.0, 0, false).targeting(target, Position::ZERO);
    assert!(entities.add(Entity::new(id, "bean", at, stats, Role::Bean(bean))));
    id
}

#[test]
fn frost_nova_stuns_every_bean_in_the_blast() {
    let mut entities = EntityManager::default();
    let mut rng = RandomManager::new(77);
    let mut events = EventManager::buffered();
    let mut damage = DamageManager::new();
    let mut skills = SkillManager::new();

    let hero = entities.allocate_id();
    let stats = Stats::new().with(StatKey::Hp, 600.0).with(StatKey::Mp, 50.0);
    let role = Role::Hero(Hero::new(PlayerId::new(1), "frost-mage", 1));
    assert!(entities.add(Entity::new(hero, "frost-mage", Position::ZERO, stats, role)));

    let near = spawn_bean(&mut entities, Position::new(300.0, 0.0), hero);
    let also_near = spawn_bean(&mut entities, Position::new(320.0, 30.0), hero);
    let far = spawn_bean(&mut entities, Position::new(-300.0, 0.0), hero);

    let nova = SkillConfig {
        range: Some(400.0),
        area_radius: 80.0,
        base_damage: 50.0,
        cooldown_ms: 5_000,
        effects: vec![
            EffectSpec::new(EffectKind::Control, 0.0, Duration::from_millis(1_000))
                .control(ControlKind::Stun),
        ],
        ..SkillConfig::new("frost_nova", SkillType::Damage, TargetType::Area)
    };
    skills.register(hero, nova, 1);

    let mut ctx = SimContext {
        entities: &mut entities,
        rng: &mut rng,
        events: &mut events,
        now: Duration::ZERO,
    };
    assert_eq!(
        skills
            .cast_skill(&mut ctx, &mut damage, hero, "frost_nova", None, None)
            .map(|report| report.targets),
        Err(CastFailure::MissingPosition)
    );
    let report = skills
        .cast_skill(
            &mut ctx,
            &mut damage,
            hero,
            "frost_nova",
            None,
            Some(Position::new(310.0, 0.0)),
        )
        .expect("nova lands");
    assert_eq!(report.targets, vec![near, also_near]);
    assert_eq!(report.effects.len(), 2);

    let stunned: Vec<EntityId> = entities
        .with_tag(ControlKind::Stun.tag())
        .collect();
    assert_eq!(stunned, vec![near, also_near]);

    let mut intents = Vec::new();
    entities.update_all(Duration::from_millis(20), 1, Duration::from_millis(20), &mut events, &mut intents);
    let states: Vec<BeanState> = entities
        .living(EntityKind::Bean)
        .filter_map(|entity| entity.bean().map(Bean::state))
        .collect();
    assert_eq!(states, vec![BeanState::Stunned, BeanState::Stunned, BeanState::Move]);
    assert!(entities.get(far).is_some_and(|entity| !entity.has_tag("control_stun")));

    let mut ctx = SimContext {
        entities: &mut entities,
        rng: &mut rng,
        events: &mut events,
        now: Duration::from_millis(1_000),
    };
    skills.update(&mut ctx, &mut damage, Duration::from_millis(1_000));
    assert!(entities.with_tag(ControlKind::Stun.tag()).next().is_none());
    assert!(events
        .drain_outbox()
        .iter()
        .any(|event| matches!(event, GameEvent::SkillCast { .. })));
}
