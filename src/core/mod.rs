//! Core types and traits for the mesh node
//!
//! This module contains the fundamental building blocks used throughout the crate.

pub mod error;
pub mod types;
pub mod serde;

pub use self::error::{DecodeError, EncodeError, Error, QueueError, RadioInitError, Result};
pub use self::types::{
    FrameType,
    NetworkId,
    NodeConfig,
    NodeId,
    StatusFlags,
};
