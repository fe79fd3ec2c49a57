use std::{error::Error, fmt};

use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine as _};
use crystal_defence_core::{Command, InitParams, ReplayData, ReplayMetadata};
use crystal_defence_replay::is_valid_replay_id;
use serde::{Deserialize, Serialize};

const SHARE_DOMAIN: &str = "crystal";
const SHARE_VERSION: &str = "v1";

/// Identifier prefix emitted before the encoded replay payload.
pub(crate) const SHARE_HEADER: &str = "crystal:v1";
/// Delimiter used to separate the prefix, seed and payload.
const FIELD_DELIMITER: char = ':';

/// Replay reduced to what reproduces the battle: parameters and commands.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SharedReplay {
    replay_id: String,
    init_params: InitParams,
    commands: Vec<Command>,
    metadata: ReplayMetadata,
}

/// Encodes `replay` into a single-line string suitable for pasting.
///
/// Recorded events are dropped; the battle is rebuilt by resimulation.
pub(crate) fn encode(replay: &ReplayData) -> Result<String, ShareCodeError> {
    let payload = SharedReplay {
        replay_id: replay.replay_id.clone(),
        init_params: replay.init_params.clone(),
        commands: replay.commands.clone(),
        metadata: replay.metadata.clone(),
    };
    let json = serde_json::to_vec(&payload).map_err(ShareCodeError::InvalidPayload)?;
    let encoded = STANDARD_NO_PAD.encode(json);
    Ok(format!("{SHARE_HEADER}:{}:{encoded}", replay.random_seed))
}

/// Decodes a replay from its share code.
pub(crate) fn decode(value: &str) -> Result<ReplayData, ShareCodeError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ShareCodeError::EmptyPayload);
    }

    let mut parts = trimmed.split(FIELD_DELIMITER);
    let domain = parts.next().ok_or(ShareCodeError::MissingPrefix)?;
    let version = parts.next().ok_or(ShareCodeError::MissingVersion)?;
    let seed = parts.next().ok_or(ShareCodeError::MissingSeed)?;
    let payload = parts.next().ok_or(ShareCodeError::MissingPayload)?;

    if domain != SHARE_DOMAIN {
        return Err(ShareCodeError::InvalidPrefix(domain.to_owned()));
    }
    if version != SHARE_VERSION {
        return Err(ShareCodeError::UnsupportedVersion(version.to_owned()));
    }

    let seed = seed
        .trim()
        .parse::<u32>()
        .map_err(|_| ShareCodeError::InvalidSeed(seed.to_owned()))?;
    let bytes = STANDARD_NO_PAD
        .decode(payload.as_bytes())
        .map_err(ShareCodeError::InvalidEncoding)?;
    let shared: SharedReplay =
        serde_json::from_slice(&bytes).map_err(ShareCodeError::InvalidPayload)?;
    if shared.init_params.seed != seed {
        return Err(ShareCodeError::SeedMismatch {
            header: seed,
            payload: shared.init_params.seed,
        });
    }

    if !is_valid_replay_id(&shared.replay_id) {
        return Err(ShareCodeError::InvalidReplayId(shared.replay_id));
    }

    let mut replay = ReplayData::new(shared.replay_id, shared.init_params);
    replay.commands = shared.commands;
    replay.metadata = shared.metadata;
    Ok(replay)
}

/// Errors that can occur while reading or writing share codes.
#[derive(Debug)]
pub(crate) enum ShareCodeError {
    /// The provided string was empty or contained only whitespace.
    EmptyPayload,
    /// The prefix segment was missing.
    MissingPrefix,
    /// The version segment was missing.
    MissingVersion,
    /// The seed segment was missing.
    MissingSeed,
    /// The payload segment was missing.
    MissingPayload,
    /// The code used an unexpected prefix.
    InvalidPrefix(String),
    /// The code used an unsupported version identifier.
    UnsupportedVersion(String),
    /// The seed segment is not a number.
    InvalidSeed(String),
    /// The seed in the header disagrees with the payload.
    SeedMismatch {
        /// Seed in the header.
        header: u32,
        /// Seed in the payload.
        payload: u32,
    },
    /// The payload names a replay id that cannot be stored.
    InvalidReplayId(String),
    /// The base64 payload could not be decoded.
    InvalidEncoding(base64::DecodeError),
    /// The payload could not be (de)serialised.
    InvalidPayload(serde_json::Error),
}

impl fmt::Display for ShareCodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPayload => write!(f, "share code was empty"),
            Self::MissingPrefix => write!(f, "share code is missing the prefix"),
            Self::MissingVersion => write!(f, "share code is missing the version"),
            Self::MissingSeed => write!(f, "share code is missing the seed"),
            Self::MissingPayload => write!(f, "share code is missing the payload"),
            Self::InvalidPrefix(prefix) => write!(f, "share prefix '{prefix}' is not supported"),
            Self::UnsupportedVersion(version) => {
                write!(f, "share code version '{version}' is not supported")
            }
            Self::InvalidSeed(seed) => write!(f, "could not parse seed '{seed}'"),
            Self::SeedMismatch { header, payload } => {
                write!(f, "share code seed {header} does not match payload seed {payload}")
            }
            Self::InvalidReplayId(id) => write!(f, "share code names invalid replay id '{id}'"),
            Self::InvalidEncoding(error) => {
                write!(f, "could not decode share payload: {error}")
            }
            Self::InvalidPayload(error) => {
                write!(f, "could not parse share payload: {error}")
            }
        }
    }
}

impl Error for ShareCodeError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidEncoding(error) => Some(error),
            Self::InvalidPayload(error) => Some(error),
            _ => None,
        }
    }
}
