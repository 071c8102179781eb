//! Mesh relay path
//!
//! Duplicate suppression and the forward/local/drop decision for inbound
//! frames.

pub mod dedup;
pub mod relay;

pub use self::dedup::{DedupCache, DedupEntry};
pub use self::relay::{DropReason, ForwardLimiter, MeshRelay, RelayDecision};
