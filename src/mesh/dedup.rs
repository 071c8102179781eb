//! Duplicate suppression for relayed frames

use crate::core::NodeId;
use crate::util::Ring;

/// A remembered (source, message id) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupEntry {
    pub source: NodeId,
    pub message_id: u16,
    /// Arrival time in ms; kept for diagnostics, never used for expiry
    pub timestamp_ms: u32,
}

/// Fixed-size window of recently seen frames
///
/// Slots are overwritten round-robin regardless of age, so a frame is
/// forgotten once `capacity` newer frames have been remembered.
#[derive(Debug, Clone)]
pub struct DedupCache {
    entries: Ring<DedupEntry>,
}

impl DedupCache {
    pub fn new(capacity: usize) -> Self {
        DedupCache {
            entries: Ring::new(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the pair is currently remembered
    pub fn seen(&self, source: NodeId, message_id: u16) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.source == source && entry.message_id == message_id)
    }

    /// Records the pair in the next slot, evicting the oldest entry when full
    pub fn remember(&mut self, source: NodeId, message_id: u16, timestamp_ms: u32) {
        self.entries.push_overwrite(DedupEntry {
            source,
            message_id,
            timestamp_ms,
        });
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
