#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Crystal Defence battle engine.
//!
//! This crate defines the message surface that connects the input layer, the
//! simulation systems and the view layer. The input layer submits [`Command`]
//! values scheduled for a future logic frame, the battle executes them inside
//! its fixed-rate clock, and every observable change is broadcast as a
//! [`GameEvent`]. Configuration types ([`InitParams`], [`SkillConfig`],
//! [`WaveConfig`]) and the persisted [`ReplayData`] live here so that every
//! system agrees on a single schema.

use std::time::Duration;

mod command;
mod config;
mod event;
mod ids;
mod replay;
mod stats;

pub use command::{Command, CommandAction};
pub use config::{
    AttributeMultipliers, ControlKind, CrystalParams, EffectKind, EffectSpec, EnemyEntry,
    InitParams, Level, PlayerParams, SkillConfig, SkillType, SpecialSpawn, TargetType, WaveConfig,
    WaveConfigError,
};
pub use event::{
    BattleResult, BattleStatistics, BeanState, CrystalState, DamageType, EffectEndReason,
    EventKind, GameEvent, PlaybackState,
};
pub use ids::{BeanKind, EffectId, EntityId, EntityKind, ParseBeanKindError, PlayerId, Position};
pub use replay::{RecordedEvent, ReplayData, ReplayMetadata, REPLAY_FORMAT_VERSION};
pub use stats::{StatKey, Stats};

/// Duration of a single inner (physics/animation) frame.
pub const INNER_FRAME_INTERVAL: Duration = Duration::from_millis(20);

/// Number of inner frames that elapse per logic frame.
pub const INNER_FRAMES_PER_LOGIC_FRAME: u64 = 5;

/// Duration of a single logic (command-synchronised) frame.
pub const LOGIC_FRAME_INTERVAL: Duration = Duration::from_millis(100);

/// Converts a duration into whole milliseconds, saturating at `u64::MAX`.
#[must_use]
pub fn duration_to_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logic_frame_spans_whole_inner_frames() {
        let inner = u32::try_from(INNER_FRAMES_PER_LOGIC_FRAME).expect("fits");
        assert_eq!(INNER_FRAME_INTERVAL * inner, LOGIC_FRAME_INTERVAL);
    }

    #[test]
    fn millis_conversion_truncates_sub_millisecond_precision() {
        assert_eq!(duration_to_millis(Duration::from_micros(20_999)), 20);
    }
}
