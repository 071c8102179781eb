//! Relay decision for inbound frames
//!
//! Every valid frame from another node on our network is remembered once.
//! Frames for this node (or every frame, on a gateway) are handed to the
//! local path; the rest are rewritten for one more hop when TTL, the
//! no-relay flag and the forward budget allow.

use std::time::Duration;

use tracing::debug;

use crate::core::{NetworkId, NodeConfig, NodeId};
use crate::protocol::frame::{
    crc_valid, decrement_ttl_increment_hop_and_recompute, is_no_relay, peek_header, MAX_FRAME_LEN,
};
use crate::util::{duration_to_ms, elapsed_ms};
use super::dedup::DedupCache;

/// Why an inbound frame went nowhere
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Shorter than header plus CRC or longer than the largest frame
    BadLength,
    BadCrc,
    ForeignNetwork,
    /// Our own frame echoed back by a relay
    OwnFrame,
    Duplicate,
    NoRelay,
    TtlExpired,
    RateLimited,
}

/// Outcome of [`MeshRelay::evaluate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayDecision {
    /// Frame was rewritten in place and should be queued for transmission
    Forward,
    /// Frame is addressed to this node
    Local,
    Drop(DropReason),
}

/// Caps the number of relayed frames per fixed window
#[derive(Debug, Clone)]
pub struct ForwardLimiter {
    window_ms: u32,
    max_per_window: u8,
    window_start_ms: u32,
    count: u8,
}

impl ForwardLimiter {
    pub fn new(window: Duration, max_per_window: u8) -> Self {
        ForwardLimiter {
            window_ms: duration_to_ms(window),
            max_per_window,
            window_start_ms: 0,
            count: 0,
        }
    }

    /// True if another forward fits in the current window
    ///
    /// Opens a new window when the current one has elapsed.
    pub fn allow(&mut self, now_ms: u32) -> bool {
        if elapsed_ms(now_ms, self.window_start_ms) >= self.window_ms {
            self.window_start_ms = now_ms;
            self.count = 0;
        }
        self.count < self.max_per_window
    }

    /// Charges one forward against the current window
    pub fn consume(&mut self) {
        self.count = self.count.saturating_add(1);
    }
}

/// Relay state for one node: duplicate window and forward budget
#[derive(Debug, Clone)]
pub struct MeshRelay {
    network: NetworkId,
    node_id: NodeId,
    is_gateway: bool,
    dedup: DedupCache,
    limiter: ForwardLimiter,
}

impl MeshRelay {
    pub fn new(config: &NodeConfig) -> Self {
        MeshRelay {
            network: config.network_id,
            node_id: config.node_id,
            is_gateway: config.is_gateway,
            dedup: DedupCache::new(config.dedup_capacity),
            limiter: ForwardLimiter::new(config.forward_window, config.max_forwards_per_window),
        }
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    /// Decides what to do with an inbound frame
    ///
    /// On [`RelayDecision::Forward`] the frame has already had its TTL
    /// decremented, hop count incremented and CRC recomputed.
    pub fn evaluate(&mut self, frame: &mut [u8], now_ms: u32) -> RelayDecision {
        if frame.len() > MAX_FRAME_LEN {
            return RelayDecision::Drop(DropReason::BadLength);
        }
        let header = match peek_header(frame) {
            Some(header) => header,
            None => return RelayDecision::Drop(DropReason::BadLength),
        };
        if !crc_valid(frame) {
            return RelayDecision::Drop(DropReason::BadCrc);
        }
        if header.network != self.network {
            return RelayDecision::Drop(DropReason::ForeignNetwork);
        }
        if header.source == self.node_id {
            return RelayDecision::Drop(DropReason::OwnFrame);
        }

        if self.dedup.seen(header.source, header.sequence) {
            debug!(tag = "DUP", src = header.source.raw(), seq = header.sequence, "duplicate frame");
            return RelayDecision::Drop(DropReason::Duplicate);
        }
        self.dedup.remember(header.source, header.sequence, now_ms);

        if self.is_gateway || header.destination == self.node_id {
            return RelayDecision::Local;
        }

        if is_no_relay(frame) {
            return RelayDecision::Drop(DropReason::NoRelay);
        }
        if header.ttl == 0 {
            return RelayDecision::Drop(DropReason::TtlExpired);
        }
        if !self.limiter.allow(now_ms) {
            return RelayDecision::Drop(DropReason::RateLimited);
        }
        if !decrement_ttl_increment_hop_and_recompute(frame) {
            return RelayDecision::Drop(DropReason::TtlExpired);
        }

        self.limiter.consume();
        RelayDecision::Forward
    }
}
