use crystal_defence_core::{
    AttributeMultipliers, BeanKind, EnemyEntry, Level, SpecialSpawn, WaveConfig,
};

/// Builds the default waves for `level` when a battle supplies none.
///
/// Difficulty grows with `(chapter - 1) * 10 + stage`. Later chapters unlock
/// tougher varieties, and the final wave of every stage carries a giant, or a
/// boss on every fifth stage.
#[must_use]
pub fn synthesize_waves(level: Level) -> Vec<WaveConfig> {
    let chapter = level.chapter.max(1);
    let stage = level.stage.max(1);
    let difficulty = (chapter - 1).saturating_mul(10).saturating_add(stage);
    let wave_count = 3 + (difficulty / 4).min(3);
    let growth = 1.0 + 0.05 * f64::from(difficulty - 1);
    let multipliers = AttributeMultipliers {
        hp: growth,
        attack: growth,
        defense: 1.0 + 0.02 * f64::from(difficulty - 1),
        speed: 1.0,
    };

    (0..wave_count)
        .map(|index| {
            let mut enemies = vec![EnemyEntry {
                multipliers,
                ..EnemyEntry::new(BeanKind::Normal, 10.0)
            }];
            for (kind, weight) in unlocked(chapter, difficulty, index) {
                enemies.push(EnemyEntry {
                    multipliers,
                    ..EnemyEntry::new(kind, weight)
                });
            }

            let last = index + 1 == wave_count;
            let special_spawns = if last {
                let bean_type = if stage % 5 == 0 {
                    BeanKind::Boss
                } else {
                    BeanKind::Giant
                };
                vec![SpecialSpawn {
                    at_ms: 10_000,
                    bean_type,
                }]
            } else {
                Vec::new()
            };

            let interval = 1_500u64
                .saturating_sub(50 * u64::from(difficulty))
                .saturating_sub(100 * u64::from(index))
                .max(400);

            WaveConfig {
                id: format!("c{chapter}s{stage}w{}", index + 1),
                name: format!("Wave {}", index + 1),
                enemies,
                total_count: 6 + 2 * index + difficulty,
                spawn_interval_ms: interval,
                delay_ms: 3_000,
                special_spawns,
            }
        })
        .collect()
}

fn unlocked(chapter: u32, difficulty: u32, wave: u32) -> Vec<(BeanKind, f64)> {
    let mut kinds = Vec::new();
    if difficulty >= 2 {
        kinds.push((BeanKind::Swift, 4.0));
    }
    if difficulty >= 4 || wave >= 2 {
        kinds.push((BeanKind::Armored, 3.0));
    }
    if chapter >= 2 {
        kinds.push((BeanKind::Frost, 3.0));
        kinds.push((BeanKind::Flame, 3.0));
    }
    if chapter >= 3 {
        kinds.push((BeanKind::Rage, 2.0));
        kinds.push((BeanKind::Toxic, 2.0));
    }
    if chapter >= 4 {
        kinds.push((BeanKind::Giant, 1.0));
    }
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_stage_is_gentle() {
        let waves = synthesize_waves(Level::default());
        assert_eq!(waves.len(), 3);
        assert_eq!(waves[0].total_count, 7);
        assert_eq!(waves[0].enemies.len(), 1);
        assert_eq!(waves[0].spawn_interval_ms, 1_450);
        assert!(waves[..2].iter().all(|wave| wave.special_spawns.is_empty()));
        assert_eq!(waves[2].special_spawns[0].bean_type, BeanKind::Giant);
    }

    #[test]
    fn later_chapters_unlock_more_varieties() {
        let waves = synthesize_waves(Level {
            chapter: 3,
            stage: 5,
        });
        assert_eq!(waves.len(), 6);
        let kinds: Vec<BeanKind> = waves[0].enemies.iter().map(|e| e.bean_type).collect();
        assert!(kinds.contains(&BeanKind::Toxic));
        assert!(!kinds.contains(&BeanKind::Giant));
        assert_eq!(
            waves.last().map(|wave| wave.special_spawns[0].bean_type),
            Some(BeanKind::Boss)
        );
        assert!(waves.iter().all(|wave| wave.spawn_interval_ms >= 400));
    }

    #[test]
    fn synthesized_waves_validate() {
        for chapter in 1..=5 {
            for stage in 1..=10 {
                for wave in synthesize_waves(Level { chapter, stage }) {
                    assert_eq!(wave.validate(), Ok(()));
                }
            }
        }
    }
}
