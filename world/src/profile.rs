use std::time::Duration;

use crystal_defence_core::{BeanKind, DamageType};

/// Fixed base profile of a bean variety before wave multipliers apply.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeanProfile {
    /// Starting and maximum health.
    pub hp: f64,
    /// Attack power.
    pub attack: f64,
    /// Physical defense.
    pub defense: f64,
    /// Magical defense.
    pub magic_defense: f64,
    /// Agility; feeds evasion.
    pub speed: f64,
    /// Walking speed in world units per second.
    pub move_speed: f64,
    /// Distance from which the bean can strike.
    pub attack_range: f64,
    /// Time between strikes.
    pub attack_interval: Duration,
    /// Damage category of the bean's strikes.
    pub damage_type: DamageType,
    /// Experience awarded to the hero that lands the killing blow.
    pub exp: u32,
    /// Gold awarded to the hero that lands the killing blow.
    pub gold: u32,
}

impl BeanProfile {
    /// Looks up the profile of `kind`.
    #[must_use]
    pub const fn of(kind: BeanKind) -> Self {
        match kind {
            BeanKind::Normal => profile(100.0, 10.0, 5.0, 5.0, 10.0, 60.0, 50.0, 1_000, 10, 5),
            BeanKind::Swift => profile(70.0, 8.0, 2.0, 2.0, 40.0, 110.0, 45.0, 700, 12, 6),
            BeanKind::Armored => profile(180.0, 12.0, 30.0, 10.0, 5.0, 40.0, 50.0, 1_400, 18, 9),
            BeanKind::Frost => BeanProfile {
                damage_type: DamageType::Magical,
                ..profile(120.0, 11.0, 8.0, 25.0, 10.0, 55.0, 60.0, 1_100, 15, 8)
            },
            BeanKind::Flame => BeanProfile {
                damage_type: DamageType::Fire,
                ..profile(110.0, 14.0, 6.0, 15.0, 15.0, 65.0, 55.0, 1_000, 15, 8)
            },
            BeanKind::Rage => profile(130.0, 9.0, 8.0, 8.0, 20.0, 70.0, 50.0, 900, 16, 8),
            BeanKind::Giant => profile(400.0, 25.0, 20.0, 20.0, 2.0, 30.0, 70.0, 2_000, 40, 20),
            BeanKind::Toxic => BeanProfile {
                damage_type: DamageType::Magical,
                ..profile(90.0, 7.0, 4.0, 12.0, 12.0, 60.0, 120.0, 1_200, 14, 7)
            },
            BeanKind::Boss => {
                profile(1_500.0, 40.0, 40.0, 40.0, 5.0, 35.0, 80.0, 1_800, 150, 100)
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
const fn profile(
    hp: f64,
    attack: f64,
    defense: f64,
    magic_defense: f64,
    speed: f64,
    move_speed: f64,
    attack_range: f64,
    attack_interval_ms: u64,
    exp: u32,
    gold: u32,
) -> BeanProfile {
    BeanProfile {
        hp,
        attack,
        defense,
        magic_defense,
        speed,
        move_speed,
        attack_range,
        attack_interval: Duration::from_millis(attack_interval_ms),
        damage_type: DamageType::Physical,
        exp,
        gold,
    }
}

/// Scales an incoming hit according to the bean variety's resistances.
#[must_use]
pub(crate) fn transform_incoming(kind: BeanKind, amount: f64, damage_type: DamageType) -> f64 {
    match (kind, damage_type) {
        (_, DamageType::Pure) => amount,
        (BeanKind::Armored, _) => amount * 0.5,
        (BeanKind::Frost, DamageType::Fire) => amount * 0.5,
        (BeanKind::Boss, _) => amount * 0.75,
        _ => amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranged_and_elemental_kinds_strike_with_magic() {
        assert_eq!(BeanProfile::of(BeanKind::Flame).damage_type, DamageType::Fire);
        assert_eq!(BeanProfile::of(BeanKind::Toxic).attack_range, 120.0);
        assert_eq!(
            BeanProfile::of(BeanKind::Normal).attack_interval,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn resistances_follow_the_variety() {
        assert_eq!(transform_incoming(BeanKind::Armored, 40.0, DamageType::Magical), 20.0);
        assert_eq!(transform_incoming(BeanKind::Armored, 40.0, DamageType::Pure), 40.0);
        assert_eq!(transform_incoming(BeanKind::Frost, 40.0, DamageType::Fire), 20.0);
        assert_eq!(transform_incoming(BeanKind::Frost, 40.0, DamageType::Physical), 40.0);
        assert_eq!(transform_incoming(BeanKind::Boss, 40.0, DamageType::Dot), 30.0);
        assert_eq!(transform_incoming(BeanKind::Normal, 40.0, DamageType::Fire), 40.0);
    }
}
