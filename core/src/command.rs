use serde::{Deserialize, Serialize};

use crate::{EntityId, PlayerId, Position};

/// Player-issued action scheduled for a specific future logic frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    /// Logic frame on which the command executes.
    pub frame: u64,
    /// Player whose hero performs the action.
    pub player: PlayerId,
    /// Action payload.
    #[serde(flatten)]
    pub action: CommandAction,
}

impl Command {
    /// Creates a command for the provided frame and player.
    #[must_use]
    pub fn new(frame: u64, player: PlayerId, action: CommandAction) -> Self {
        Self {
            frame,
            player,
            action,
        }
    }
}

/// Type-specific command payloads.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum CommandAction {
    /// Casts one of the hero's learned skills.
    CastSkill {
        /// Skill to cast.
        skill_id: String,
        /// Explicit target for single-target skills.
        #[serde(default)]
        target: Option<EntityId>,
        /// Ground position for area skills.
        #[serde(default)]
        position: Option<Position>,
    },
    /// Learns a skill from the battle's skill book, or levels it up.
    LearnSkill {
        /// Skill to learn.
        skill_id: String,
    },
    /// Moves the hero to another slot around the crystal.
    ChangePosition {
        /// Destination slot, 1 through 5.
        slot: u8,
    },
    /// Consumes an item from the hero's inventory.
    UseItem {
        /// Item to consume.
        item_id: String,
    },
    /// Directs the hero at an enemy.
    Attack {
        /// Enemy to attack.
        target: EntityId,
        /// When set the target is only adopted; otherwise an attack is attempted immediately.
        #[serde(default)]
        set_as_target: bool,
    },
}

impl CommandAction {
    /// Stable camelCase name of the command type.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::CastSkill { .. } => "castSkill",
            Self::LearnSkill { .. } => "learnSkill",
            Self::ChangePosition { .. } => "changePosition",
            Self::UseItem { .. } => "useItem",
            Self::Attack { .. } => "attack",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_use_flat_tagged_json() {
        let command = Command::new(
            12,
            PlayerId::new(1),
            CommandAction::Attack {
                target: EntityId::new(40),
                set_as_target: true,
            },
        );
        let json = serde_json::to_value(&command).expect("serialize");
        assert_eq!(
            json,
            serde_json::json!({
                "frame": 12,
                "player": 1,
                "type": "attack",
                "target": 40,
                "setAsTarget": true,
            })
        );
        let restored: Command = serde_json::from_value(json).expect("deserialize");
        assert_eq!(restored, command);
    }
}
