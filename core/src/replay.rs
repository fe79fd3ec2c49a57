use serde::{Deserialize, Serialize};

use crate::{BattleResult, Command, EventKind, GameEvent, InitParams, PlayerId};

/// Version written into every replay's metadata.
pub const REPLAY_FORMAT_VERSION: u32 = 1;

/// Event captured while recording a battle.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedEvent {
    /// Event subscription key.
    pub kind: EventKind,
    /// Logic frame on which the event fired.
    pub frame: u64,
    /// Simulation time in milliseconds.
    pub time_ms: u64,
    /// Event payload.
    pub event: GameEvent,
}

/// Summary describing a recorded battle.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayMetadata {
    /// Replay format version.
    pub version: u32,
    /// Simulated duration in milliseconds.
    pub duration_ms: u64,
    /// Logic frames simulated.
    pub total_frames: u64,
    /// Chapter played.
    pub chapter: u32,
    /// Stage played.
    pub stage: u32,
    /// Participating players.
    pub player_ids: Vec<PlayerId>,
    /// Outcome, once known.
    pub result: Option<BattleResult>,
}

/// Everything needed to reproduce a battle: seed, initial parameters and
/// the command stream, optionally paired with the recorded event stream.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayData {
    /// Replay identifier.
    pub replay_id: String,
    /// Seed the battle ran with.
    pub random_seed: u32,
    /// Parameters the battle was initialised with.
    pub init_params: InitParams,
    /// Commands in processing order.
    pub commands: Vec<Command>,
    /// Recorded events in emission order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<RecordedEvent>,
    /// Battle summary.
    pub metadata: ReplayMetadata,
}

impl ReplayData {
    /// Creates an empty replay for the provided parameters.
    #[must_use]
    pub fn new(replay_id: impl Into<String>, init_params: InitParams) -> Self {
        let metadata = ReplayMetadata {
            version: REPLAY_FORMAT_VERSION,
            chapter: init_params.level.chapter,
            stage: init_params.level.stage,
            player_ids: init_params
                .players
                .iter()
                .map(|player| player.player_id)
                .collect(),
            ..ReplayMetadata::default()
        };
        Self {
            replay_id: replay_id.into(),
            random_seed: init_params.seed,
            init_params,
            commands: Vec::new(),
            events: Vec::new(),
            metadata,
        }
    }
}
