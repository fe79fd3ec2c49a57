use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crystal_defence_core::{ReplayData, ReplayMetadata};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{codec, ReplayError};

const SIDECAR_SUFFIX: &str = ".meta.json";

/// Sidecar describing a stored replay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaySummary {
    /// Replay identifier.
    pub replay_id: String,
    /// Payload file name within the store.
    pub file: String,
    /// Whether the payload is gzip-compressed.
    pub compressed: bool,
    /// Hex SHA-256 of the payload bytes.
    pub checksum: String,
    /// Recorded commands.
    pub command_count: usize,
    /// Recorded events.
    pub event_count: usize,
    /// Battle summary.
    pub metadata: ReplayMetadata,
}

/// Directory of replays with one sidecar per payload.
#[derive(Clone, Debug)]
pub struct ReplayStore {
    root: PathBuf,
}

impl ReplayStore {
    /// Opens a store rooted at `root`. The directory is created on first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory backing the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Writes `replay` and its sidecar, returning the payload path.
    pub fn save(&self, replay: &ReplayData, compress: bool) -> Result<PathBuf, ReplayError> {
        check_id(&replay.replay_id)?;
        fs::create_dir_all(&self.root)?;
        let bytes = codec::encode(replay, compress)?;
        let file = payload_file(&replay.replay_id, compress);
        let path = self.root.join(&file);
        fs::write(&path, &bytes)?;

        let summary = ReplaySummary {
            replay_id: replay.replay_id.clone(),
            file,
            compressed: compress,
            checksum: checksum(&bytes),
            command_count: replay.commands.len(),
            event_count: replay.events.len(),
            metadata: replay.metadata.clone(),
        };
        fs::write(
            self.sidecar(&replay.replay_id),
            serde_json::to_vec_pretty(&summary)?,
        )?;
        tracing::info!(replay = %replay.replay_id, path = %path.display(), compress, "replay saved");
        Ok(path)
    }

    /// Reads the replay `replay_id`, verifying its checksum.
    pub fn load(&self, replay_id: &str) -> Result<ReplayData, ReplayError> {
        let summary = self.summary(replay_id)?;
        let bytes = read(&self.payload_path(&summary)?, replay_id)?;
        if checksum(&bytes) != summary.checksum {
            tracing::warn!(replay = %replay_id, "replay checksum mismatch");
            return Err(ReplayError::ChecksumMismatch {
                replay_id: replay_id.to_owned(),
            });
        }
        codec::decode(&bytes)
    }

    /// Reads the sidecar of `replay_id`.
    pub fn summary(&self, replay_id: &str) -> Result<ReplaySummary, ReplayError> {
        check_id(replay_id)?;
        let bytes = read(&self.sidecar(replay_id), replay_id)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Sidecars of every stored replay, ordered by id.
    ///
    /// Unreadable sidecars are skipped with a warning.
    pub fn list(&self) -> Result<Vec<ReplaySummary>, ReplayError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(error) => return Err(error.into()),
        };

        let mut summaries = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_sidecar = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(SIDECAR_SUFFIX));
            if !is_sidecar {
                continue;
            }
            match fs::read(&path)
                .map_err(ReplayError::from)
                .and_then(|bytes| Ok(serde_json::from_slice::<ReplaySummary>(&bytes)?))
            {
                Ok(summary) => summaries.push(summary),
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "skipping unreadable sidecar");
                }
            }
        }
        summaries.sort_by(|a, b| a.replay_id.cmp(&b.replay_id));
        Ok(summaries)
    }

    /// Removes a replay and its sidecar.
    pub fn delete(&self, replay_id: &str) -> Result<(), ReplayError> {
        let summary = self.summary(replay_id)?;
        fs::remove_file(self.payload_path(&summary)?)?;
        fs::remove_file(self.sidecar(replay_id))?;
        Ok(())
    }

    fn sidecar(&self, replay_id: &str) -> PathBuf {
        self.root.join(format!("{replay_id}{SIDECAR_SUFFIX}"))
    }

    /// Payload path named by a sidecar. The name must match the replay id.
    fn payload_path(&self, summary: &ReplaySummary) -> Result<PathBuf, ReplayError> {
        check_id(&summary.replay_id)?;
        if summary.file != payload_file(&summary.replay_id, summary.compressed) {
            tracing::warn!(replay = %summary.replay_id, file = %summary.file, "sidecar names a foreign payload");
            return Err(ReplayError::InvalidId(summary.file.clone()));
        }
        Ok(self.root.join(&summary.file))
    }
}

/// Whether `replay_id` can name files inside a store: one or more ASCII
/// letters, digits, `-` or `_`.
#[must_use]
pub fn is_valid_replay_id(replay_id: &str) -> bool {
    !replay_id.is_empty()
        && replay_id
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_')
}

fn check_id(replay_id: &str) -> Result<(), ReplayError> {
    if is_valid_replay_id(replay_id) {
        Ok(())
    } else {
        tracing::warn!(replay = %replay_id, "rejected replay id");
        Err(ReplayError::InvalidId(replay_id.to_owned()))
    }
}

fn payload_file(replay_id: &str, compress: bool) -> String {
    if compress {
        format!("{replay_id}.json.gz")
    } else {
        format!("{replay_id}.json")
    }
}

fn read(path: &Path, replay_id: &str) -> Result<Vec<u8>, ReplayError> {
    fs::read(path).map_err(|error| match error.kind() {
        ErrorKind::NotFound => ReplayError::NotFound(replay_id.to_owned()),
        _ => ReplayError::Io(error),
    })
}

fn checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
