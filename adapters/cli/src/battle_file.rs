use crystal_defence_battle::BattleSettings;
use crystal_defence_core::{
    CrystalParams, InitParams, Level, PlayerId, PlayerParams, SkillConfig, StatKey, Stats,
    WaveConfig,
};
use serde::Deserialize;

/// Seed used when neither the file nor the command line provides one.
pub(crate) const DEFAULT_SEED: u32 = 12_345;

/// Battle description read from a TOML file. Every field may be omitted.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BattleFile {
    seed: Option<u32>,
    crystal: CrystalParams,
    players: Vec<PlayerParams>,
    level: Level,
    waves: Option<Vec<WaveConfig>>,
    skill_book: Vec<SkillConfig>,
    settings: BattleSettings,
}

impl BattleFile {
    /// Parses a battle file.
    pub(crate) fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Splits the file into battle parameters and settings. A lone default
    /// hero defends the crystal when the file names no players.
    pub(crate) fn into_parts(self, seed: Option<u32>) -> (InitParams, BattleSettings) {
        let mut players = self.players;
        if players.is_empty() {
            players.push(default_hero());
        }
        let params = InitParams {
            seed: seed.or(self.seed).unwrap_or(DEFAULT_SEED),
            crystal: self.crystal,
            players,
            level: self.level,
            waves: self.waves,
            skill_book: self.skill_book,
        };
        (params, self.settings)
    }
}

fn default_hero() -> PlayerParams {
    PlayerParams::new(
        PlayerId::new(1),
        "guardian",
        1,
        Stats::new()
            .with(StatKey::Hp, 800.0)
            .with(StatKey::Attack, 50.0)
            .with(StatKey::Defense, 40.0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let file = BattleFile::parse("").expect("parses");
        let (params, settings) = file.into_parts(None);
        assert_eq!(params.seed, DEFAULT_SEED);
        assert_eq!(params.players.len(), 1);
        assert_eq!(params.crystal, CrystalParams::default());
        assert_eq!(settings, BattleSettings::default());
    }

    #[test]
    fn command_line_seed_wins() {
        let file = BattleFile::parse(
            r#"
            seed = 5

            [level]
            chapter = 2
            stage = 3

            [crystal]
            hp = 2500.0

            [[players]]
            playerId = 7
            heroId = "ranger"
            slot = 4
            stats = { hp = 600.0, attack = 45.0 }

            [settings]
            heroSlotRadius = 180.0

            [settings.waves]
            spawnMin = 300.0
            spawnMax = 350.0
            "#,
        )
        .expect("parses");

        let (params, settings) = file.clone().into_parts(None);
        assert_eq!(params.seed, 5);
        assert_eq!(params.level, Level { chapter: 2, stage: 3 });
        assert_eq!(params.crystal.hp, 2_500.0);
        assert_eq!(params.players[0].player_id, PlayerId::new(7));
        assert_eq!(params.players[0].stats.get(&StatKey::Attack), 45.0);
        assert_eq!(settings.hero_slot_radius, 180.0);
        assert_eq!(settings.waves.spawn_max, 350.0);
        assert!(settings.waves.auto_next_wave);

        assert_eq!(file.into_parts(Some(9)).0.seed, 9);
    }
}
