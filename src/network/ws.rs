//! WebSocket Peer Transport
//!
//! `PeerSession` over tokio-tungstenite. Each connection gets a writer task
//! fed by an mpsc channel and a reader task that pushes into the peer's
//! inbox. Both ends open with `PeerMessage::Hello` so each side knows which
//! player is on the other end before announcing the peer.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{accept_async, connect_async, tungstenite::Message, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::game::player::Player;
use crate::network::peer::{ConnectionError, InboundSender, PeerSession};
use crate::network::protocol::{PeerMessage, ProtocolError};

/// Time allowed for the Hello exchange.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Transport setup errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket or WebSocket failure.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Hello could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The remote did not open with Hello.
    #[error("handshake failed: {0}")]
    Handshake(String),

    /// The remote did not finish the handshake in time.
    #[error("handshake timed out")]
    HandshakeTimeout,
}

/// A WebSocket connection to one remote player.
pub struct WsPeer {
    remote: Player,
    outbox: mpsc::UnboundedSender<Message>,
    connected: Arc<AtomicBool>,
}

impl PeerSession for WsPeer {
    fn player(&self) -> &Player {
        &self.remote
    }

    fn send(&self, bytes: &[u8]) -> Result<(), ConnectionError> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(ConnectionError::PeerUnavailable(self.remote.id));
        }
        self.outbox
            .send(Message::Binary(bytes.to_vec()))
            .map_err(|_| ConnectionError::PeerUnavailable(self.remote.id))
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }
}

/// Accept peers on `listener` until the task is aborted.
pub fn listen(listener: TcpListener, local: Player, inbound: InboundSender) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let (stream, addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Accept error: {}", e);
                    continue;
                }
            };

            let local = local.clone();
            let inbound = inbound.clone();
            tokio::spawn(async move {
                let ws = match accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(e) => {
                        error!("WebSocket handshake failed for {}: {}", addr, e);
                        return;
                    }
                };
                match attach(ws, local, inbound).await {
                    Ok(peer) => info!(peer = %peer.remote.id, %addr, "peer connected"),
                    Err(e) => warn!(%addr, error = %e, "peer rejected"),
                }
            });
        }
    })
}

/// Connect to a listening peer at `url` (e.g. `ws://127.0.0.1:7420`).
pub async fn connect(url: &str, local: Player, inbound: InboundSender) -> Result<Arc<WsPeer>, TransportError> {
    let (ws, _response) = connect_async(url).await?;
    let peer = attach(ws, local, inbound).await?;
    info!(peer = %peer.remote.id, url, "connected to peer");
    Ok(peer)
}

/// Run the Hello exchange, then spawn the reader and writer tasks.
async fn attach<S>(
    ws: WebSocketStream<S>,
    local: Player,
    inbound: InboundSender,
) -> Result<Arc<WsPeer>, TransportError>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut stream) = ws.split();

    let hello = PeerMessage::Hello { player: local }.to_bytes()?;
    sink.send(Message::Binary(hello)).await?;

    let remote = tokio::time::timeout(HANDSHAKE_TIMEOUT, async {
        while let Some(msg) = stream.next().await {
            match msg? {
                Message::Binary(data) => {
                    return match PeerMessage::from_bytes(&data)? {
                        PeerMessage::Hello { player } => Ok(player),
                        other => Err(TransportError::Handshake(format!(
                            "expected hello, got {}",
                            other.kind()
                        ))),
                    };
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Err::<Player, TransportError>(TransportError::Handshake("closed before hello".to_string()))
    })
    .await
    .map_err(|_| TransportError::HandshakeTimeout)??;

    let (outbox, mut outbox_rx) = mpsc::unbounded_channel::<Message>();
    let connected = Arc::new(AtomicBool::new(true));
    let peer = Arc::new(WsPeer {
        remote: remote.clone(),
        outbox,
        connected: connected.clone(),
    });

    let inbox = inbound.inbox(remote.id);
    inbound.peer_connected(peer.clone());

    // Writer
    let writer_connected = connected.clone();
    tokio::spawn(async move {
        while let Some(msg) = outbox_rx.recv().await {
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        writer_connected.store(false, Ordering::Release);
        let _ = sink.close().await;
    });

    // Reader
    tokio::spawn(async move {
        while let Some(msg) = stream.next().await {
            match msg {
                Ok(Message::Binary(data)) => {
                    if !inbox.on_receive(data) {
                        break;
                    }
                }
                Ok(Message::Close(_)) => {
                    debug!(peer = %remote.id, "peer closed connection");
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(peer = %remote.id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
        connected.store(false, Ordering::Release);
        inbox.on_disconnect();
    });

    Ok(peer)
}
