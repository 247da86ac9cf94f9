//! Session Module
//!
//! Lifecycle of one participant's session: the state machine, the
//! coordinator that drives it, and the presentation callbacks.
//!
//! ## Module Structure
//!
//! - `state_machine`: Session phases, triggers, and the transition table
//! - `coordinator`: Frame and tick entry points, authority and board handoff
//! - `delegate`: Presentation callbacks

pub mod coordinator;
pub mod delegate;
pub mod state_machine;

pub use coordinator::{
    CameraSnapshot, FrameInput, FrameOutput, Role, SessionCoordinator, SessionError, SurfaceHit,
    TickReport, TrackingState, HOST_LEFT_MESSAGE,
};
pub use delegate::{NoopDelegate, SessionDelegate, SessionEvent};
pub use state_machine::{transition, Effect, SessionState, Transition, TransitionError, Trigger};
