//! Peer Sessions and the Inbound Queue
//!
//! A `PeerSession` is one connection to one remote participant. Transports
//! own their sessions; the coordinator only calls `send` and reads events.
//!
//! Receive paths run on whatever I/O context the transport uses. They never
//! touch game state: they push `InboundEvent`s into an unbounded queue that
//! the coordinator drains on its logic tick.
//!
//! ```text
//!  transport I/O ──► PeerInbox ──► InboundSender ──► InboundQueue ──► tick
//!  blocking pool ──► dispatch() ──┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::game::player::{Player, PlayerId};
use crate::world::snapshot::{DecodeError, EncodeError, WorldSnapshot};

// =============================================================================
// PEER SESSION
// =============================================================================

/// Connection failures. Never fatal to the session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    /// Peer is gone.
    #[error("peer {0} is unavailable")]
    PeerUnavailable(PlayerId),

    /// Transport refused the write.
    #[error("transport error for peer {player}: {reason}")]
    Transport { player: PlayerId, reason: String },
}

impl ConnectionError {
    /// Peer the error concerns.
    pub fn player(&self) -> PlayerId {
        match self {
            ConnectionError::PeerUnavailable(player) => *player,
            ConnectionError::Transport { player, .. } => *player,
        }
    }
}

/// A connection to one remote participant.
pub trait PeerSession: Send + Sync {
    /// The remote participant.
    fn player(&self) -> &Player;

    /// Queue `bytes` for delivery. Fails with `PeerUnavailable` once the
    /// peer has disconnected.
    fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError>;

    /// Check if the connection is still up.
    fn is_connected(&self) -> bool;
}

// =============================================================================
// INBOUND EVENTS
// =============================================================================

/// Everything the coordinator learns between ticks.
pub enum InboundEvent {
    /// A transport finished connecting a peer.
    PeerConnected(Arc<dyn PeerSession>),
    /// Raw bytes from a peer.
    Message { from: PlayerId, bytes: Vec<u8> },
    /// Peer connection closed. Delivered at most once per inbox.
    PeerDisconnected(PlayerId),
    /// Off-tick world map decode finished.
    SnapshotDecoded {
        from: PlayerId,
        result: Result<WorldSnapshot, DecodeError>,
    },
    /// Off-tick world map encode finished.
    SnapshotEncoded {
        generation: u64,
        result: Result<Vec<u8>, EncodeError>,
    },
}

impl fmt::Debug for InboundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InboundEvent::PeerConnected(peer) => {
                f.debug_tuple("PeerConnected").field(&peer.player().id).finish()
            }
            InboundEvent::Message { from, bytes } => f
                .debug_struct("Message")
                .field("from", from)
                .field("len", &bytes.len())
                .finish(),
            InboundEvent::PeerDisconnected(player) => {
                f.debug_tuple("PeerDisconnected").field(player).finish()
            }
            InboundEvent::SnapshotDecoded { from, result } => f
                .debug_struct("SnapshotDecoded")
                .field("from", from)
                .field("ok", &result.is_ok())
                .finish(),
            InboundEvent::SnapshotEncoded { generation, result } => f
                .debug_struct("SnapshotEncoded")
                .field("generation", generation)
                .field("ok", &result.is_ok())
                .finish(),
        }
    }
}

/// Create a connected sender/queue pair.
pub fn inbound_channel() -> (InboundSender, InboundQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InboundSender { tx }, InboundQueue { rx })
}

/// Producer half. Cheap to clone; usable from any thread.
#[derive(Clone)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<InboundEvent>,
}

impl InboundSender {
    /// Announce a newly connected peer.
    pub fn peer_connected(&self, peer: Arc<dyn PeerSession>) {
        let _ = self.tx.send(InboundEvent::PeerConnected(peer));
    }

    /// Receive handle for one peer.
    pub fn inbox(&self, player: PlayerId) -> PeerInbox {
        PeerInbox {
            player,
            tx: self.tx.clone(),
            disconnected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run CPU-bound work off the tick and queue its result.
    ///
    /// Uses tokio's blocking pool when called inside a runtime, runs inline
    /// otherwise. Either way the result arrives through the queue.
    pub fn dispatch<F>(&self, job: F)
    where
        F: FnOnce() -> InboundEvent + Send + 'static,
    {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let tx = self.tx.clone();
                handle.spawn_blocking(move || {
                    let _ = tx.send(job());
                });
            }
            Err(_) => {
                let _ = self.tx.send(job());
            }
        }
    }
}

/// Per-peer receive handle given to transports.
#[derive(Clone)]
pub struct PeerInbox {
    player: PlayerId,
    tx: mpsc::UnboundedSender<InboundEvent>,
    disconnected: Arc<AtomicBool>,
}

impl PeerInbox {
    /// Peer this inbox receives for.
    pub fn player(&self) -> PlayerId {
        self.player
    }

    /// Queue bytes received from the peer.
    ///
    /// Returns false if the peer already disconnected or the queue is gone.
    pub fn on_receive(&self, bytes: Vec<u8>) -> bool {
        if self.disconnected.load(Ordering::Acquire) {
            return false;
        }
        self.tx
            .send(InboundEvent::Message { from: self.player, bytes })
            .is_ok()
    }

    /// Report the disconnect. Only the first call queues an event.
    pub fn on_disconnect(&self) {
        if !self.disconnected.swap(true, Ordering::AcqRel) {
            let _ = self.tx.send(InboundEvent::PeerDisconnected(self.player));
        }
    }

    /// Check if the disconnect was reported.
    pub fn is_disconnected(&self) -> bool {
        self.disconnected.load(Ordering::Acquire)
    }
}

/// Consumer half, owned by the coordinator.
pub struct InboundQueue {
    rx: mpsc::UnboundedReceiver<InboundEvent>,
}

impl InboundQueue {
    /// Next queued event without waiting.
    pub fn try_next(&mut self) -> Option<InboundEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event. None once every sender is gone.
    pub async fn next(&mut self) -> Option<InboundEvent> {
        self.rx.recv().await
    }

    /// Everything queued right now, in arrival order.
    pub fn drain(&mut self) -> Vec<InboundEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.try_next() {
            events.push(event);
        }
        events
    }
}
