//! meshnode: firmware core for a battery-powered LoRa mesh scan node
//!
//! A node reads frequency lists from a scanner over serial, reports its
//! status over a half-duplex radio, and relays frames from other nodes
//! with TTL-limited flooding and duplicate suppression. All state lives in
//! one [`Node`] advanced by a periodic tick.

pub mod board;
pub mod core;
pub mod logging;
pub mod mesh;
pub mod node;
pub mod protocol;
pub mod radio;
pub mod serial;
pub mod tx;
pub mod util;

// Re-export commonly used items
pub use crate::core::{Error, NodeConfig, NodeId, NetworkId, Result, StatusFlags};
pub use crate::node::{Node, NodeStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
