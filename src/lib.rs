//! # SwiftShot Sync
//!
//! Host-authoritative game-state synchronization for a shared-space
//! table-top game.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      SWIFTSHOT SYNC                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/             - Primitives                              │
//! │  ├── transform.rs  - Column-major transforms, board size     │
//! │  ├── hash.rs       - State hashing for verification          │
//! │  └── cache.rs      - Lazy keyed resource cache               │
//! │                                                              │
//! │  game/             - Game state (deterministic)              │
//! │  ├── player.rs     - Players, teams, catapults               │
//! │  ├── action.rs     - State-changing actions                  │
//! │  ├── state.rs      - Shared game state                       │
//! │  └── store.rs      - Single mutator + replay                 │
//! │                                                              │
//! │  world/            - Shared space                            │
//! │  ├── board.rs      - Board anchor, board setup messages      │
//! │  └── snapshot.rs   - Compressed world snapshot codec         │
//! │                                                              │
//! │  network/          - Networking (non-deterministic)          │
//! │  ├── peer.rs       - Peer trait, inbound event queue         │
//! │  ├── loopback.rs   - In-process transport                    │
//! │  ├── ws.rs         - WebSocket transport                     │
//! │  ├── protocol.rs   - Wire messages                           │
//! │  ├── broadcaster.rs- Fan-out, acks, delay detection          │
//! │  └── game.rs       - Session advertisement                   │
//! │                                                              │
//! │  session/          - Lifecycle                               │
//! │  ├── state_machine.rs - Phases and transitions               │
//! │  ├── coordinator.rs   - Frame/tick driver                    │
//! │  └── delegate.rs      - Presentation callbacks               │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Authority
//!
//! One host owns the game state. Clients request actions, the host applies
//! them through `GameStateStore` and broadcasts them in sequence order. Every
//! mutation happens on the coordinator's tick; transports only enqueue.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod network;
pub mod session;
pub mod world;

// Re-export commonly used types
pub use config::{BoardLocatingMode, SessionConfig};
pub use core::transform::{BoardSize, Transform};
pub use game::{GameAction, GameState, GameStateStore, Player, PlayerId, Team};
pub use network::{NetworkGame, PeerSession};
pub use session::{SessionCoordinator, SessionDelegate, SessionState};
pub use world::{BoardAnchor, WorldSnapshotCodec};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Logic tick rate (Hz)
pub const TICK_RATE: u32 = 60;

/// Catapults each team starts with
pub const DEFAULT_CATAPULTS_PER_TEAM: u32 = 3;
