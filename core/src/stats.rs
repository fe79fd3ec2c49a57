use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Name of a numeric entity attribute.
///
/// The well-known attributes have dedicated variants; anything else is kept
/// verbatim in [`StatKey::Other`] so buff tables can target custom keys.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatKey {
    /// Current health.
    Hp,
    /// Health ceiling.
    MaxHp,
    /// Current mana.
    Mp,
    /// Mana ceiling.
    MaxMp,
    /// Physical attack power.
    Attack,
    /// Physical defense.
    Defense,
    /// Magical attack power.
    MagicAttack,
    /// Magical defense.
    MagicDefense,
    /// Agility; feeds evasion.
    Speed,
    /// Hit accuracy; counters evasion.
    Accuracy,
    /// Chance to block physical hits.
    BlockRate,
    /// Any other attribute.
    Other(String),
}

impl StatKey {
    /// Canonical camelCase name of the attribute.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Hp => "hp",
            Self::MaxHp => "maxHp",
            Self::Mp => "mp",
            Self::MaxMp => "maxMp",
            Self::Attack => "attack",
            Self::Defense => "defense",
            Self::MagicAttack => "magicAttack",
            Self::MagicDefense => "magicDefense",
            Self::Speed => "speed",
            Self::Accuracy => "accuracy",
            Self::BlockRate => "blockRate",
            Self::Other(name) => name,
        }
    }
}

impl From<&str> for StatKey {
    fn from(name: &str) -> Self {
        match name {
            "hp" => Self::Hp,
            "maxHp" => Self::MaxHp,
            "mp" => Self::Mp,
            "maxMp" => Self::MaxMp,
            "attack" => Self::Attack,
            "defense" => Self::Defense,
            "magicAttack" => Self::MagicAttack,
            "magicDefense" => Self::MagicDefense,
            "speed" => Self::Speed,
            "accuracy" => Self::Accuracy,
            "blockRate" => Self::BlockRate,
            other => Self::Other(other.to_owned()),
        }
    }
}

impl From<String> for StatKey {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<StatKey> for String {
    fn from(key: StatKey) -> Self {
        match key {
            StatKey::Other(name) => name,
            known => known.as_str().to_owned(),
        }
    }
}

/// Ordered map of numeric attributes.
///
/// Missing attributes read as `0.0`. Ordering is deterministic so that
/// fingerprints and serialised snapshots are stable.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stats {
    values: BTreeMap<StatKey, f64>,
}

impl Stats {
    /// Creates an empty attribute map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter used when assembling base stats.
    #[must_use]
    pub fn with(mut self, key: StatKey, value: f64) -> Self {
        self.set(key, value);
        self
    }

    /// Reads an attribute, defaulting to zero when absent.
    #[must_use]
    pub fn get(&self, key: &StatKey) -> f64 {
        self.values.get(key).copied().unwrap_or(0.0)
    }

    /// Reports whether the attribute has been assigned.
    #[must_use]
    pub fn contains(&self, key: &StatKey) -> bool {
        self.values.contains_key(key)
    }

    /// Assigns an attribute.
    pub fn set(&mut self, key: StatKey, value: f64) {
        let _ = self.values.insert(key, value);
    }

    /// Adds a signed delta to an attribute and returns the new value.
    pub fn add(&mut self, key: StatKey, delta: f64) -> f64 {
        let value = self.values.entry(key).or_insert(0.0);
        *value += delta;
        *value
    }

    /// Iterates over the assigned attributes in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&StatKey, f64)> {
        self.values.iter().map(|(key, value)| (key, *value))
    }
}

impl FromIterator<(StatKey, f64)> for Stats {
    fn from_iter<I: IntoIterator<Item = (StatKey, f64)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_keys_survive_string_conversion() {
        let key = StatKey::from("critChance");
        assert_eq!(key, StatKey::Other("critChance".to_owned()));
        assert_eq!(String::from(key), "critChance");
        assert_eq!(StatKey::from("magicDefense"), StatKey::MagicDefense);
    }

    #[test]
    fn stats_serialize_as_camel_case_map() {
        let stats = Stats::new()
            .with(StatKey::MaxHp, 800.0)
            .with(StatKey::Other("luck".to_owned()), 3.0);
        let json = serde_json::to_string(&stats).expect("serialize");
        assert_eq!(json, r#"{"maxHp":800.0,"luck":3.0}"#);
        let restored: Stats = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(restored, stats);
    }

    #[test]
    fn missing_attributes_read_as_zero() {
        let mut stats = Stats::new();
        assert_eq!(stats.get(&StatKey::Attack), 0.0);
        assert_eq!(stats.add(StatKey::Attack, 4.5), 4.5);
        assert!(stats.contains(&StatKey::Attack));
    }
}
