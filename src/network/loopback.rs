//! In-Process Peer Transport
//!
//! Two `PeerSession`s joined back to back. Used for local play, the demo
//! binary, and tests that need several coordinators talking to each other.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::game::player::Player;
use crate::network::peer::{ConnectionError, InboundSender, PeerInbox, PeerSession};

/// State shared by both ends of a link.
#[derive(Default)]
struct LinkState {
    connected: AtomicBool,
    failing: AtomicBool,
}

/// One end of a loopback link: represents the remote player.
pub struct LoopbackPeer {
    remote: Player,
    /// Inbox on the remote side that receives what we send.
    deliver: PeerInbox,
    state: Arc<LinkState>,
}

impl PeerSession for LoopbackPeer {
    fn player(&self) -> &Player {
        &self.remote
    }

    fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        if !self.state.connected.load(Ordering::Acquire) {
            return Err(ConnectionError::PeerUnavailable(self.remote.id));
        }
        if self.state.failing.load(Ordering::Acquire) {
            return Err(ConnectionError::Transport {
                player: self.remote.id,
                reason: "loopback link set to fail".to_string(),
            });
        }
        if !self.deliver.on_receive(bytes.to_vec()) {
            return Err(ConnectionError::PeerUnavailable(self.remote.id));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

/// Handle to a connected pair.
pub struct LoopbackLink {
    a_side: Arc<LoopbackPeer>,
    b_side: Arc<LoopbackPeer>,
    state: Arc<LinkState>,
}

impl LoopbackLink {
    /// Session `a` holds (remote is `b`).
    pub fn a_side(&self) -> Arc<LoopbackPeer> {
        self.a_side.clone()
    }

    /// Session `b` holds (remote is `a`).
    pub fn b_side(&self) -> Arc<LoopbackPeer> {
        self.b_side.clone()
    }

    /// Drop the link. Both sides see a single disconnect.
    pub fn disconnect(&self) {
        self.state.connected.store(false, Ordering::Release);
        // a_side delivers into b's inbox for a, and the other way round.
        self.a_side.deliver.on_disconnect();
        self.b_side.deliver.on_disconnect();
    }

    /// Make every send on the link fail while the link stays up.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::Release);
    }

    /// Check if the link is up.
    pub fn is_connected(&self) -> bool {
        self.state.connected.load(Ordering::Acquire)
    }
}

/// Connect `a` and `b`. Each side's inbound queue gets a `PeerConnected`
/// for the other.
pub fn connect(a: Player, a_inbound: &InboundSender, b: Player, b_inbound: &InboundSender) -> LoopbackLink {
    let state = Arc::new(LinkState::default());
    state.connected.store(true, Ordering::Release);

    let a_side = Arc::new(LoopbackPeer {
        deliver: b_inbound.inbox(a.id),
        remote: b.clone(),
        state: state.clone(),
    });
    let b_side = Arc::new(LoopbackPeer {
        deliver: a_inbound.inbox(b.id),
        remote: a,
        state: state.clone(),
    });

    a_inbound.peer_connected(a_side.clone());
    b_inbound.peer_connected(b_side.clone());

    LoopbackLink { a_side, b_side, state }
}
