//! Shared World Module
//!
//! Board anchoring and the compressed world snapshot a host hands to joiners.
//!
//! ## Module Structure
//!
//! - `board`: Board anchor and board setup messages
//! - `snapshot`: World snapshot compression codec

pub mod board;
pub mod snapshot;

pub use board::{BoardAnchor, BoardSetupAction, GameBoardLocation};
pub use snapshot::{DecodeError, EncodeError, WorldSnapshot, WorldSnapshotCodec};
