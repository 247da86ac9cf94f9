//! Protocol Messages
//!
//! Wire format for peer-to-peer messages. Every frame on every transport is
//! one bincode-encoded `PeerMessage`.

use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::hash::StateHash;
use crate::game::action::GameAction;
use crate::game::player::{Player, PlayerId};
use crate::game::state::GameState;
use crate::world::board::BoardSetupAction;

/// Wire encoding failures.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Message could not be encoded.
    #[error("failed to encode peer message: {0}")]
    Encode(bincode::Error),

    /// Bytes are not a peer message.
    #[error("failed to decode peer message: {0}")]
    Decode(bincode::Error),
}

/// A sequenced game action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionEnvelope {
    /// Sender's sequence number, starting at 1.
    pub seq: u64,
    /// Peer that produced the action.
    pub origin: PlayerId,
    /// The action.
    pub action: GameAction,
}

/// Messages exchanged between peers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PeerMessage {
    /// First message on a stream transport: who is on this end.
    Hello { player: Player },

    /// Board location request or answer.
    BoardSetup(BoardSetupAction),

    /// Host → clients: authoritative action, apply in `seq` order.
    Action(ActionEnvelope),

    /// Client → host: please perform this action for me.
    ActionRequest(ActionEnvelope),

    /// Host → late joiner: full state as of `last_seq`.
    StateSync {
        state: GameState,
        last_seq: u64,
        state_hash: StateHash,
    },

    /// Receipt for a sequenced message.
    Ack { seq: u64 },

    /// Sender left the game; drop it from the session.
    Leave,
}

impl PeerMessage {
    /// Sequence number the receiver is expected to acknowledge.
    pub fn ack_seq(&self) -> Option<u64> {
        match self {
            PeerMessage::Action(envelope) | PeerMessage::ActionRequest(envelope) => {
                Some(envelope.seq)
            }
            _ => None,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            PeerMessage::Hello { .. } => "hello",
            PeerMessage::BoardSetup(_) => "board_setup",
            PeerMessage::Action(_) => "action",
            PeerMessage::ActionRequest(_) => "action_request",
            PeerMessage::StateSync { .. } => "state_sync",
            PeerMessage::Ack { .. } => "ack",
            PeerMessage::Leave => "leave",
        }
    }

    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        bincode::serialize(self).map_err(ProtocolError::Encode)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, ProtocolError> {
        bincode::deserialize(data).map_err(ProtocolError::Decode)
    }
}
