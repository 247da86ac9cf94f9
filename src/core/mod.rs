//! Core primitives.
//!
//! Spatial math, deterministic state hashing, and the resource cache used by
//! the rest of the crate.

pub mod cache;
pub mod hash;
pub mod transform;

// Re-export core types
pub use cache::ResourceCache;
pub use hash::{StateHash, StateHasher};
pub use transform::{BoardSize, Transform, Vec3};
