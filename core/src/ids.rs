use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Two-dimensional world position measured in world units.
pub type Position = glam::DVec2;

/// Opaque identifier assigned to every simulation entity.
///
/// The kind of an entity is never encoded in its identifier; it is looked up
/// from the entity registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a new entity identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Identifier of a participating player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(u32);

impl PlayerId {
    /// Creates a new player identifier.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}", self.0)
    }
}

/// Identifier of an active timed effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(u64);

impl EffectId {
    /// Creates a new effect identifier.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Broad category of a simulation entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// Player-controlled defender.
    Hero,
    /// Enemy unit spawned by a wave.
    Bean,
    /// The defended objective.
    Crystal,
    /// Item lying in the world.
    Item,
    /// Projectile in flight.
    Projectile,
}

impl EntityKind {
    /// Stable lower-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::Bean => "bean",
            Self::Crystal => "crystal",
            Self::Item => "item",
            Self::Projectile => "projectile",
        }
    }
}

/// The nine enemy varieties a wave can field.
///
/// Designations are accepted either by name (`"armored"`) or by numeric
/// index (`2`) so that wave tables written for older tooling keep loading.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "BeanKindDesignation", into = "String")]
pub enum BeanKind {
    /// Baseline enemy.
    Normal,
    /// Fast and fragile.
    Swift,
    /// Heavily armoured; halves incoming non-pure damage.
    Armored,
    /// Resists fire damage.
    Frost,
    /// Hits harder than it looks.
    Flame,
    /// Grows stronger each time it is hit.
    Rage,
    /// Slow, durable, heavy-hitting.
    Giant,
    /// Attacks from range.
    Toxic,
    /// Wave boss.
    Boss,
}

impl BeanKind {
    /// Every bean kind in index order.
    pub const ALL: [BeanKind; 9] = [
        Self::Normal,
        Self::Swift,
        Self::Armored,
        Self::Frost,
        Self::Flame,
        Self::Rage,
        Self::Giant,
        Self::Toxic,
        Self::Boss,
    ];

    /// Stable lower-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Swift => "swift",
            Self::Armored => "armored",
            Self::Frost => "frost",
            Self::Flame => "flame",
            Self::Rage => "rage",
            Self::Giant => "giant",
            Self::Toxic => "toxic",
            Self::Boss => "boss",
        }
    }

    /// Numeric index of the kind.
    #[must_use]
    pub const fn index(self) -> u8 {
        self as u8
    }

    /// Resolves a numeric designation.
    #[must_use]
    pub fn from_index(index: u8) -> Option<Self> {
        Self::ALL.get(usize::from(index)).copied()
    }
}

impl fmt::Display for BeanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised when a bean designation names no known kind.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("unknown bean type designation `{0}`")]
pub struct ParseBeanKindError(String);

impl FromStr for BeanKind {
    type Err = ParseBeanKindError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if let Ok(index) = trimmed.parse::<u8>() {
            return Self::from_index(index).ok_or_else(|| ParseBeanKindError(value.to_owned()));
        }

        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| ParseBeanKindError(value.to_owned()))
    }
}

impl From<BeanKind> for String {
    fn from(kind: BeanKind) -> Self {
        kind.as_str().to_owned()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum BeanKindDesignation {
    Index(u8),
    Name(String),
}

impl TryFrom<BeanKindDesignation> for BeanKind {
    type Error = ParseBeanKindError;

    fn try_from(designation: BeanKindDesignation) -> Result<Self, Self::Error> {
        match designation {
            BeanKindDesignation::Index(index) => {
                Self::from_index(index).ok_or_else(|| ParseBeanKindError(index.to_string()))
            }
            BeanKindDesignation::Name(name) => name.parse(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bean_kind_accepts_names_and_indices() {
        assert_eq!("Armored".parse::<BeanKind>(), Ok(BeanKind::Armored));
        assert_eq!("8".parse::<BeanKind>(), Ok(BeanKind::Boss));
        assert!("dragon".parse::<BeanKind>().is_err());
        assert!("9".parse::<BeanKind>().is_err());
    }

    #[test]
    fn bean_kind_deserializes_from_string_or_number() {
        let by_name: BeanKind = serde_json::from_str("\"frost\"").expect("name");
        let by_index: BeanKind = serde_json::from_str("5").expect("index");
        assert_eq!(by_name, BeanKind::Frost);
        assert_eq!(by_index, BeanKind::Rage);
        assert_eq!(serde_json::to_string(&BeanKind::Giant).expect("ser"), "\"giant\"");
    }

    #[test]
    fn indices_are_dense() {
        for (index, kind) in BeanKind::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(kind.index()), index);
        }
    }
}
