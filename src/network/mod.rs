//! Network Layer
//!
//! Peer transports, the wire protocol, and action fan-out.
//! This layer is **non-deterministic** - game state only changes through
//! `game::store`, on the coordinator's tick.
//!
//! ## Module Structure
//!
//! - `peer`: `PeerSession` trait and the inbound event queue
//! - `loopback`: In-process transport
//! - `ws`: WebSocket transport
//! - `protocol`: Wire messages
//! - `broadcaster`: Fan-out and ack tracking
//! - `game`: Session advertisement records

pub mod broadcaster;
pub mod game;
pub mod loopback;
pub mod peer;
pub mod protocol;
pub mod ws;

pub use broadcaster::{ActionBroadcaster, BroadcastError, BroadcastReport};
pub use game::{GameTableLocation, LocationTable, NetworkGame};
pub use loopback::{LoopbackLink, LoopbackPeer};
pub use peer::{
    inbound_channel, ConnectionError, InboundEvent, InboundQueue, InboundSender, PeerInbox,
    PeerSession,
};
pub use protocol::{ActionEnvelope, PeerMessage, ProtocolError};
pub use ws::{TransportError, WsPeer};
