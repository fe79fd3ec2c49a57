use std::time::Duration;

use crystal_defence_core::{BeanKind, EnemyEntry, Level, WaveConfig};
use crystal_defence_events::EventManager;
use crystal_defence_random::RandomManager;
use crystal_defence_waves::{synthesize_waves, SpawnRequest, WaveManager, WaveSettings, WaveStatus};

#[test]
fn settings_fill_missing_fields_with_defaults() {
    let settings: WaveSettings =
        serde_json::from_str(r#"{ "spawnMax": 650.0, "autoNextWave": false }"#).expect("parse");
    assert_eq!(settings.spawn_min, 400.0);
    assert_eq!(settings.spawn_max, 650.0);
    assert!(!settings.auto_next_wave);
}

#[test]
fn weighted_table_never_picks_zero_weight_rows() {
    let wave = WaveConfig {
        id: "only-swift".to_owned(),
        name: String::new(),
        enemies: vec![
            EnemyEntry::new(BeanKind::Swift, 1.0),
            EnemyEntry::new(BeanKind::Giant, 0.0),
        ],
        total_count: 20,
        spawn_interval_ms: 100,
        delay_ms: 0,
        special_spawns: Vec::new(),
    };
    let mut manager = WaveManager::new(vec![wave], WaveSettings::default()).expect("valid");
    let mut rng = RandomManager::new(31_337);
    let mut events = EventManager::default();
    manager.start_battle(Duration::ZERO, &mut events);

    let mut spawned = Vec::new();
    for step in 0..40u64 {
        manager.update(Duration::from_millis(step * 100), &mut rng, &mut events, &mut spawned);
    }
    assert_eq!(spawned.len(), 20);
    assert!(spawned.iter().all(|request| request.bean_type == BeanKind::Swift));
}

#[test]
fn synthesized_stage_runs_to_completion() {
    let waves = synthesize_waves(Level::default());
    let total: u32 = waves.iter().map(WaveConfig::total_enemies).sum();
    let mut manager = WaveManager::new(waves, WaveSettings::default()).expect("valid");
    let mut rng = RandomManager::new(12_345);
    let mut events = EventManager::default();
    manager.start_battle(Duration::ZERO, &mut events);

    let mut killed = 0;
    let mut now = Duration::ZERO;
    while !manager.is_all_completed() && now < Duration::from_secs(600) {
        let mut spawned: Vec<SpawnRequest> = Vec::new();
        manager.update(now, &mut rng, &mut events, &mut spawned);
        for request in spawned {
            manager.on_enemy_defeated(request.wave, now, &mut events);
            killed += 1;
        }
        now += Duration::from_millis(100);
    }

    assert!(manager.is_all_completed());
    assert_eq!(killed, total);
    assert!((0..manager.wave_count()).all(|index| manager.status(index) == Some(WaveStatus::Completed)));
}
