//! Action Broadcaster
//!
//! Fans messages out to every connected peer and tracks acknowledgements.
//!
//! Delivery is best effort: a failing peer is logged and reported, and the
//! remaining peers still get the message. Acknowledgement round trips feed
//! an advisory "network delay" flag that never blocks the simulation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

use crate::game::player::PlayerId;
use crate::network::peer::{ConnectionError, PeerSession};
use crate::network::protocol::{PeerMessage, ProtocolError};

/// Errors from a single-peer send.
#[derive(Debug, Error)]
pub enum BroadcastError {
    /// Message could not be encoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Peer refused or is gone.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Outcome of one broadcast.
#[derive(Debug, Default)]
pub struct BroadcastReport {
    /// Peers that accepted the message.
    pub delivered: Vec<PlayerId>,
    /// Peers whose send failed, with the reason.
    pub failed: Vec<(PlayerId, ConnectionError)>,
}

impl BroadcastReport {
    /// Check if every peer accepted the message.
    pub fn all_delivered(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Peer fan-out plus ack bookkeeping.
pub struct ActionBroadcaster {
    /// Connected peers, deterministic order.
    peers: BTreeMap<PlayerId, Arc<dyn PeerSession>>,
    /// Send time of each unacknowledged sequenced message.
    pending: BTreeMap<(PlayerId, u64), Instant>,
    /// Most recent ack round trip per peer.
    last_rtt: BTreeMap<PlayerId, Duration>,
    /// Delay threshold.
    threshold: Duration,
    /// Cap on unacknowledged messages tracked per peer.
    max_pending: usize,
    /// Current advisory flag.
    delayed: bool,
    /// Last sequence number handed out.
    seq: u64,
}

impl ActionBroadcaster {
    /// Create an empty broadcaster.
    pub fn new(threshold: Duration, max_pending: usize) -> Self {
        Self {
            peers: BTreeMap::new(),
            pending: BTreeMap::new(),
            last_rtt: BTreeMap::new(),
            threshold,
            max_pending: max_pending.max(1),
            delayed: false,
            seq: 0,
        }
    }

    /// Add a peer. Returns false if a session for that player was replaced.
    pub fn add_peer(&mut self, peer: Arc<dyn PeerSession>) -> bool {
        let id = peer.player().id;
        self.peers.insert(id, peer).is_none()
    }

    /// Remove a peer and forget its pending acks.
    pub fn remove_peer(&mut self, player: &PlayerId) -> Option<Arc<dyn PeerSession>> {
        self.pending.retain(|(peer, _), _| peer != player);
        self.last_rtt.remove(player);
        self.peers.remove(player)
    }

    /// Check if a peer is in the broadcast set.
    pub fn contains(&self, player: &PlayerId) -> bool {
        self.peers.contains_key(player)
    }

    /// Session for a peer.
    pub fn peer(&self, player: &PlayerId) -> Option<&Arc<dyn PeerSession>> {
        self.peers.get(player)
    }

    /// Number of peers.
    pub fn len(&self) -> usize {
        self.peers.len()
    }

    /// Check if there are no peers.
    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    /// Allocate the next outgoing sequence number.
    pub fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Send `msg` to every peer. Individual failures do not stop delivery.
    pub fn broadcast(&mut self, msg: &PeerMessage, now: Instant) -> Result<BroadcastReport, ProtocolError> {
        let bytes = msg.to_bytes()?;
        let mut report = BroadcastReport::default();

        let targets: Vec<PlayerId> = self.peers.keys().copied().collect();
        for player in targets {
            match self.deliver(&player, msg, &bytes, now) {
                Ok(()) => report.delivered.push(player),
                Err(e) => report.failed.push((player, e)),
            }
        }

        Ok(report)
    }

    /// Send `msg` to one peer.
    pub fn send_to(&mut self, player: &PlayerId, msg: &PeerMessage, now: Instant) -> Result<(), BroadcastError> {
        let bytes = msg.to_bytes()?;
        self.deliver(player, msg, &bytes, now)?;
        Ok(())
    }

    fn deliver(
        &mut self,
        player: &PlayerId,
        msg: &PeerMessage,
        bytes: &[u8],
        now: Instant,
    ) -> Result<(), ConnectionError> {
        let peer = self
            .peers
            .get(player)
            .ok_or(ConnectionError::PeerUnavailable(*player))?;

        if let Err(e) = peer.send(bytes) {
            warn!(peer = %player, kind = msg.kind(), error = %e, "send failed");
            return Err(e);
        }

        #[cfg(feature = "debug-tracing")]
        debug!(peer = %player, kind = msg.kind(), len = bytes.len(), "sent");

        if let Some(seq) = msg.ack_seq() {
            self.track(*player, seq, now);
        }
        Ok(())
    }

    fn track(&mut self, player: PlayerId, seq: u64, now: Instant) {
        let outstanding = self.pending.range((player, 0)..=(player, u64::MAX)).count();
        if outstanding >= self.max_pending {
            // Oldest entry for this peer has the lowest seq.
            let oldest = self
                .pending
                .range((player, 0)..=(player, u64::MAX))
                .next()
                .map(|(key, _)| *key);
            if let Some(key) = oldest {
                debug!(peer = %player, seq = key.1, "dropping untracked ack");
                self.pending.remove(&key);
            }
        }
        self.pending.insert((player, seq), now);
    }

    /// Record an ack. Returns the round trip if the message was tracked.
    pub fn record_ack(&mut self, player: &PlayerId, seq: u64, now: Instant) -> Option<Duration> {
        let sent = self.pending.remove(&(*player, seq))?;
        let rtt = now.saturating_duration_since(sent);
        self.last_rtt.insert(*player, rtt);
        Some(rtt)
    }

    /// Number of unacknowledged messages.
    pub fn pending_acks(&self) -> usize {
        self.pending.len()
    }

    /// Last measured round trip for a peer.
    pub fn last_rtt(&self, player: &PlayerId) -> Option<Duration> {
        self.last_rtt.get(player).copied()
    }

    /// Re-evaluate the delay flag. Returns the new value only when it flips.
    pub fn evaluate_delay(&mut self, now: Instant) -> Option<bool> {
        let stale = self
            .pending
            .values()
            .any(|sent| now.saturating_duration_since(*sent) > self.threshold);
        let slow = self.last_rtt.values().any(|rtt| *rtt > self.threshold);

        let delayed = stale || slow;
        if delayed == self.delayed {
            return None;
        }
        self.delayed = delayed;
        Some(delayed)
    }

    /// Current advisory flag.
    pub fn is_delayed(&self) -> bool {
        self.delayed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use crate::game::action::GameAction;
    use crate::game::player::Player;
    use crate::network::protocol::ActionEnvelope;

    /// Records sent bytes; optionally refuses every send.
    struct MockPeer {
        player: Player,
        fail: bool,
        sent: Mutex<Vec<Vec<u8>>>,
    }

    impl MockPeer {
        fn new(name: &str, fail: bool) -> Arc<Self> {
            Arc::new(Self {
                player: Player::new(name),
                fail,
                sent: Mutex::new(Vec::new()),
            })
        }

        fn sent(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    impl PeerSession for MockPeer {
        fn player(&self) -> &Player {
            &self.player
        }

        fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
            if self.fail {
                return Err(ConnectionError::PeerUnavailable(self.player.id));
            }
            self.sent.lock().unwrap().push(bytes.to_vec());
            Ok(())
        }

        fn is_connected(&self) -> bool {
            !self.fail
        }
    }

    fn action_msg(broadcaster: &mut ActionBroadcaster) -> PeerMessage {
        PeerMessage::Action(ActionEnvelope {
            seq: broadcaster.next_seq(),
            origin: PlayerId::new([0; 16]),
            action: GameAction::ResetWorld,
        })
    }

    #[test]
    fn test_one_failing_peer_does_not_block_others() {
        let mut broadcaster = ActionBroadcaster::new(Duration::from_millis(250), 16);
        let bob = MockPeer::new("Bob", false);
        let carol = MockPeer::new("Carol", true);
        let dave = MockPeer::new("Dave", false);
        broadcaster.add_peer(bob.clone());
        broadcaster.add_peer(carol.clone());
        broadcaster.add_peer(dave.clone());

        let msg = action_msg(&mut broadcaster);
        let report = broadcaster.broadcast(&msg, Instant::now()).unwrap();

        assert_eq!(report.delivered.len(), 2);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, carol.player.id);
        assert_eq!(bob.sent(), 1);
        assert_eq!(dave.sent(), 1);
        assert_eq!(broadcaster.pending_acks(), 2, "only delivered messages await acks");

        let received = PeerMessage::from_bytes(&bob.sent.lock().unwrap()[0]).unwrap();
        assert_eq!(received, msg);
    }

    #[test]
    fn test_ack_rtt_and_delay_flag() {
        let mut broadcaster = ActionBroadcaster::new(Duration::from_millis(100), 16);
        let bob = MockPeer::new("Bob", false);
        broadcaster.add_peer(bob.clone());
        let bob_id = bob.player.id;

        let start = Instant::now();
        let msg = action_msg(&mut broadcaster);
        broadcaster.broadcast(&msg, start).unwrap();
        assert_eq!(broadcaster.evaluate_delay(start), None);

        // Unacked for longer than the threshold.
        let late = start + Duration::from_millis(150);
        assert_eq!(broadcaster.evaluate_delay(late), Some(true));
        assert_eq!(broadcaster.evaluate_delay(late), None, "only reports flips");

        // Slow ack keeps the flag up until a fast round trip replaces it.
        assert_eq!(broadcaster.record_ack(&bob_id, 1, late), Some(Duration::from_millis(150)));
        assert_eq!(broadcaster.evaluate_delay(late), None);

        let t = late + Duration::from_millis(10);
        let msg = action_msg(&mut broadcaster);
        broadcaster.broadcast(&msg, t).unwrap();
        broadcaster.record_ack(&bob_id, 2, t + Duration::from_millis(20));
        assert_eq!(broadcaster.evaluate_delay(t + Duration::from_millis(20)), Some(false));
        assert!(!broadcaster.is_delayed());
    }

    #[test]
    fn test_unknown_ack_ignored() {
        let mut broadcaster = ActionBroadcaster::new(Duration::from_millis(100), 16);
        assert_eq!(broadcaster.record_ack(&PlayerId::new([1; 16]), 9, Instant::now()), None);
    }

    #[test]
    fn test_remove_peer_forgets_pending() {
        let mut broadcaster = ActionBroadcaster::new(Duration::from_millis(100), 16);
        let bob = MockPeer::new("Bob", false);
        broadcaster.add_peer(bob.clone());
        let msg = action_msg(&mut broadcaster);
        broadcaster.broadcast(&msg, Instant::now()).unwrap();

        assert!(broadcaster.remove_peer(&bob.player.id).is_some());
        assert_eq!(broadcaster.pending_acks(), 0);
        assert!(broadcaster.is_empty());

        let err = broadcaster.send_to(&bob.player.id, &PeerMessage::Ack { seq: 1 }, Instant::now());
        assert!(matches!(err, Err(BroadcastError::Connection(ConnectionError::PeerUnavailable(_)))));
    }

    #[test]
    fn test_pending_capped_per_peer() {
        let mut broadcaster = ActionBroadcaster::new(Duration::from_millis(100), 2);
        let bob = MockPeer::new("Bob", false);
        broadcaster.add_peer(bob.clone());
        let now = Instant::now();
        for _ in 0..5 {
            let msg = action_msg(&mut broadcaster);
            broadcaster.broadcast(&msg, now).unwrap();
        }
        assert_eq!(broadcaster.pending_acks(), 2);
        assert_eq!(broadcaster.record_ack(&bob.player.id, 1, now), None);
        assert!(broadcaster.record_ack(&bob.player.id, 5, now).is_some());
    }
}
