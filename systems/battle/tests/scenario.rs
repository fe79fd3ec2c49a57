use std::{cell::RefCell, rc::Rc, time::Duration};

use crystal_defence_battle::{BattleManager, BattleSettings, BattleState};
use crystal_defence_core::{
    BattleResult, BeanKind, Command, CommandAction, CrystalParams, EnemyEntry, EntityKind,
    EventKind, GameEvent, InitParams, PlayerId, PlayerParams, StatKey, Stats, WaveConfig,
};
use crystal_defence_events::EventHandler;

fn single_wave_params() -> InitParams {
    let mut params = InitParams::new(12_345);
    params.crystal = CrystalParams {
        hp: 1_000.0,
        defense: 50.0,
        ..CrystalParams::default()
    };
    params.players.push(PlayerParams::new(
        PlayerId::new(1),
        "warrior",
        1,
        Stats::new()
            .with(StatKey::Hp, 800.0)
            .with(StatKey::Attack, 50.0)
            .with(StatKey::Defense, 40.0),
    ));
    params.waves = Some(vec![WaveConfig {
        id: "w1".to_owned(),
        name: "Wave 1".to_owned(),
        enemies: vec![EnemyEntry::new(BeanKind::Normal, 1.0)],
        total_count: 10,
        spawn_interval_ms: 1_000,
        delay_ms: 0,
        special_spawns: Vec::new(),
    }]);
    params
}

fn counter(
    battle: &mut BattleManager,
    kind: EventKind,
    filter: fn(&GameEvent) -> bool,
) -> Rc<RefCell<u32>> {
    let count = Rc::new(RefCell::new(0));
    let sink = Rc::clone(&count);
    let handler: EventHandler = Rc::new(move |event, _| {
        if filter(event) {
            *sink.borrow_mut() += 1;
        }
    });
    assert!(battle.events_mut().on(kind, handler));
    count
}

#[test]
fn seeded_single_wave_overwhelms_the_crystal() {
    let mut battle = BattleManager::default();
    let bean_deaths = counter(&mut battle, EventKind::EntityDeath, |event| {
        matches!(
            event,
            GameEvent::EntityDeath {
                kind: EntityKind::Bean,
                ..
            }
        )
    });
    let game_overs = counter(&mut battle, EventKind::GameOver, |_| true);

    battle.init_battle(single_wave_params()).expect("init");
    assert!(battle.start_battle());
    let result = battle.run_to_completion(200_000);

    assert_eq!(result, Some(BattleResult::Defeat));
    assert_eq!(battle.state(), BattleState::Completed);
    assert_eq!(*game_overs.borrow(), 1);

    let statistics = battle.statistics();
    assert_eq!(statistics.logic_frames, 352);
    assert_eq!(statistics.enemies_spawned, 10);
    assert_eq!(statistics.total_enemies_defeated, 3);
    assert_eq!(statistics.total_enemies_defeated, *bean_deaths.borrow());
    let crystal = battle.entities().crystal().expect("crystal");
    assert_eq!(crystal.hp(), 0.0);

    let metadata = &battle.replay().metadata;
    assert_eq!(metadata.result, result);
    assert_eq!(metadata.total_frames, statistics.logic_frames);
    assert!(!battle.step());
}

#[test]
fn commands_for_the_current_frame_are_rejected() {
    let mut battle = BattleManager::default();
    battle.init_battle(single_wave_params()).expect("init");
    assert!(battle.start_battle());
    for _ in 0..5 {
        assert!(battle.step());
    }
    assert_eq!(battle.logic_frame(), 1);

    let stale = Command::new(
        1,
        PlayerId::new(1),
        CommandAction::ChangePosition { slot: 3 },
    );
    assert!(!battle.submit_command(stale));
    assert!(battle.submit_command(Command::new(
        2,
        PlayerId::new(1),
        CommandAction::ChangePosition { slot: 3 },
    )));
    for _ in 0..5 {
        assert!(battle.step());
    }

    let commands = &battle.replay().commands;
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].frame, 2);
    let hero = battle.entities().hero_of(PlayerId::new(1)).expect("hero");
    let slot = battle
        .entities()
        .get(hero)
        .and_then(|entity| entity.hero())
        .map(|role| role.slot());
    assert_eq!(slot, Some(3));
    assert_eq!(battle.statistics().commands_processed, 1);
}

#[test]
fn items_are_consumed_once() {
    let mut params = single_wave_params();
    params.players[0].items = vec!["whetstone".to_owned()];
    let mut battle = BattleManager::default();
    battle.init_battle(params).expect("init");
    assert!(battle.start_battle());

    for frame in [1, 2] {
        assert!(battle.submit_command(Command::new(
            frame,
            PlayerId::new(1),
            CommandAction::UseItem {
                item_id: "whetstone".to_owned(),
            },
        )));
    }
    let _ = battle.tick(Duration::from_millis(300));

    let hero = battle.entities().hero_of(PlayerId::new(1)).expect("hero");
    let attack = battle
        .entities()
        .get(hero)
        .map(|entity| entity.stat(&StatKey::Attack));
    assert_eq!(attack, Some(60.0));
    assert_eq!(battle.statistics().commands_processed, 1);
    assert_eq!(battle.replay().commands.len(), 2);
}

#[test]
fn paused_battles_do_not_advance() {
    let mut battle = BattleManager::new(BattleSettings::default());
    battle.init_battle(single_wave_params()).expect("init");
    assert!(battle.start_battle());
    assert_eq!(battle.tick(Duration::from_millis(100)), 5);
    assert!(battle.pause_battle());
    assert_eq!(battle.tick(Duration::from_secs(5)), 0);
    assert!(!battle.submit_command(Command::new(
        9,
        PlayerId::new(1),
        CommandAction::ChangePosition { slot: 2 },
    )));
    assert!(battle.resume_battle());
    assert_eq!(battle.tick(Duration::from_millis(40)), 2);
    assert_eq!(battle.inner_frame(), 7);
}
