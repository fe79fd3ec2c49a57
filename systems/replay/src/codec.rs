use std::io::{Read, Write};

use crystal_defence_core::ReplayData;
use flate2::{read::GzDecoder, write::GzEncoder, Compression};

use crate::ReplayError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Serializes `replay` as JSON, gzip-compressed when `compress` is set.
pub fn encode(replay: &ReplayData, compress: bool) -> Result<Vec<u8>, ReplayError> {
    let json = serde_json::to_vec(replay)?;
    if !compress {
        return Ok(json);
    }
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&json)?;
    Ok(encoder.finish()?)
}

/// Parses a replay written by [`encode`], detecting compression from the
/// payload itself.
pub fn decode(bytes: &[u8]) -> Result<ReplayData, ReplayError> {
    if !bytes.starts_with(&GZIP_MAGIC) {
        return Ok(serde_json::from_slice(bytes)?);
    }
    let mut json = Vec::new();
    let _ = GzDecoder::new(bytes).read_to_end(&mut json)?;
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystal_defence_core::{
        BattleResult, Command, CommandAction, GameEvent, InitParams, PlayerId, RecordedEvent,
    };

    fn replay() -> ReplayData {
        let mut replay = ReplayData::new("codec", InitParams::new(77));
        replay.commands.push(Command::new(
            3,
            PlayerId::new(1),
            CommandAction::UseItem {
                item_id: "ether".to_owned(),
            },
        ));
        replay.events.push(RecordedEvent {
            kind: GameEvent::BattleStart.kind(),
            frame: 0,
            time_ms: 0,
            event: GameEvent::BattleStart,
        });
        replay.metadata.result = Some(BattleResult::Defeat);
        replay
    }

    #[test]
    fn compressed_and_plain_payloads_decode_identically() {
        let original = replay();
        let plain = encode(&original, false).expect("encode");
        let packed = encode(&original, true).expect("encode");

        assert!(packed.starts_with(&GZIP_MAGIC));
        assert_eq!(decode(&plain).expect("decode"), original);
        assert_eq!(decode(&packed).expect("decode"), original);
    }

    #[test]
    fn garbage_is_reported_as_malformed() {
        assert!(matches!(decode(b"not a replay"), Err(ReplayError::Json(_))));
    }
}
