//! World Snapshot Codec
//!
//! Compact transfer format for the host's spatial map plus the board anchor.
//!
//! ## Frame layout
//!
//! ```text
//! ┌──────────┬─────────┬────────────────────┬───────────────────────┐
//! │ "SWMP"   │ version │ raw length (u32 LE)│ LZ4 block payload     │
//! │ 4 bytes  │ 1 byte  │ 4 bytes            │ bincode SnapshotSchema│
//! └──────────┴─────────┴────────────────────┴───────────────────────┘
//! ```
//!
//! Anything wrong with the frame or the LZ4 block is a decompression
//! failure. Anything wrong with the bytes that come out of it is a
//! deserialization failure. The two are never conflated.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::world::board::BoardAnchor;

/// Frame magic.
pub const SNAPSHOT_MAGIC: [u8; 4] = *b"SWMP";

/// Current frame version.
pub const SNAPSHOT_VERSION: u8 = 1;

/// Upper bound on the declared uncompressed size (64 MiB).
pub const MAX_SNAPSHOT_BYTES: usize = 64 * 1024 * 1024;

const HEADER_LEN: usize = 4 + 1 + 4;

/// Snapshot decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// Frame or compressed stream is malformed.
    #[error("world map decompression failed: {0}")]
    DecompressionFailed(String),

    /// Decompressed bytes do not form a valid snapshot.
    #[error("world map deserialization failed: {0}")]
    DeserializationFailed(String),
}

impl DecodeError {
    /// One-line message for the user-facing alert.
    pub fn user_message(&self) -> &'static str {
        match self {
            DecodeError::DecompressionFailed(_) => {
                "An error occured while loading the WorldMap (Failed to decompress)"
            }
            DecodeError::DeserializationFailed(_) => {
                "An error occured while loading the WorldMap (Failed to read)"
            }
        }
    }
}

/// Snapshot encoding failure.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Anchor is not finite or has no area.
    #[error("board anchor is not valid")]
    InvalidAnchor,

    /// Serializing the schema failed.
    #[error("world map serialization failed: {0}")]
    Serialization(#[from] bincode::Error),

    /// Payload exceeds the transfer limit.
    #[error("world map of {0} bytes exceeds the snapshot limit")]
    TooLarge(usize),
}

/// On-the-wire schema. An anchor *set*, which must hold exactly one anchor.
#[derive(Serialize, Deserialize)]
struct SnapshotSchema {
    anchors: Vec<BoardAnchor>,
    spatial_map: Vec<u8>,
}

/// A decoded world snapshot: exactly one board anchor plus the opaque map.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldSnapshot {
    anchor: BoardAnchor,
    spatial_map: Vec<u8>,
}

impl WorldSnapshot {
    /// Create a snapshot.
    pub fn new(anchor: BoardAnchor, spatial_map: Vec<u8>) -> Self {
        Self { anchor, spatial_map }
    }

    /// The board anchor.
    pub fn anchor(&self) -> BoardAnchor {
        self.anchor
    }

    /// Opaque spatial map blob for the AR collaborator.
    pub fn spatial_map(&self) -> &[u8] {
        &self.spatial_map
    }
}

/// Encoder/decoder for world snapshots.
pub struct WorldSnapshotCodec;

impl WorldSnapshotCodec {
    /// Serialize and compress an anchor and spatial map.
    pub fn encode(anchor: &BoardAnchor, spatial_map: &[u8]) -> Result<Vec<u8>, EncodeError> {
        if !anchor.is_valid() {
            return Err(EncodeError::InvalidAnchor);
        }

        let schema = SnapshotSchema {
            anchors: vec![*anchor],
            spatial_map: spatial_map.to_vec(),
        };
        let raw = bincode::serialize(&schema)?;
        if raw.len() > MAX_SNAPSHOT_BYTES {
            return Err(EncodeError::TooLarge(raw.len()));
        }
        Ok(frame(&raw))
    }

    /// Decompress and deserialize a snapshot.
    pub fn decode(bytes: &[u8]) -> Result<WorldSnapshot, DecodeError> {
        let raw = unframe(bytes)?;

        let schema: SnapshotSchema = bincode::deserialize(&raw)
            .map_err(|e| DecodeError::DeserializationFailed(e.to_string()))?;

        if schema.anchors.len() != 1 {
            return Err(DecodeError::DeserializationFailed(format!(
                "expected exactly one board anchor, found {}",
                schema.anchors.len()
            )));
        }
        let anchor = schema.anchors[0];
        if !anchor.is_valid() {
            return Err(DecodeError::DeserializationFailed(
                "board anchor has a non-finite transform or empty size".to_string(),
            ));
        }

        Ok(WorldSnapshot {
            anchor,
            spatial_map: schema.spatial_map,
        })
    }
}

/// Compress `raw` and wrap it in a snapshot frame.
pub(crate) fn frame(raw: &[u8]) -> Vec<u8> {
    let compressed = lz4_flex::compress(raw);
    let mut out = Vec::with_capacity(HEADER_LEN + compressed.len());
    out.extend_from_slice(&SNAPSHOT_MAGIC);
    out.push(SNAPSHOT_VERSION);
    out.extend_from_slice(&(raw.len() as u32).to_le_bytes());
    out.extend_from_slice(&compressed);
    out
}

/// Validate the frame header and decompress the payload.
fn unframe(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::DecompressionFailed(format!(
            "frame of {} bytes is shorter than the header",
            bytes.len()
        )));
    }
    if bytes[..4] != SNAPSHOT_MAGIC {
        return Err(DecodeError::DecompressionFailed("bad frame magic".to_string()));
    }
    if bytes[4] != SNAPSHOT_VERSION {
        return Err(DecodeError::DecompressionFailed(format!(
            "unsupported frame version {}",
            bytes[4]
        )));
    }

    let mut len_bytes = [0u8; 4];
    len_bytes.copy_from_slice(&bytes[5..9]);
    let expected = u32::from_le_bytes(len_bytes) as usize;
    if expected > MAX_SNAPSHOT_BYTES {
        return Err(DecodeError::DecompressionFailed(format!(
            "declared size {expected} exceeds the snapshot limit"
        )));
    }

    let raw = lz4_flex::decompress(&bytes[HEADER_LEN..], expected)
        .map_err(|e| DecodeError::DecompressionFailed(e.to_string()))?;
    if raw.len() != expected {
        return Err(DecodeError::DecompressionFailed(format!(
            "decompressed {} bytes, header declared {}",
            raw.len(),
            expected
        )));
    }
    Ok(raw)
}
