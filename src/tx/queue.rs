//! Bounded transmit queue

use heapless::Vec as BoundedVec;
use tracing::{debug, warn};

use crate::core::QueueError;
use crate::protocol::frame::{source_and_message_id, MAX_FRAME_LEN};
use crate::util::Ring;

/// Number of frames the queue holds
pub const TX_QUEUE_CAPACITY: usize = 4;

/// Owned copy of one encoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxItem {
    data: BoundedVec<u8, MAX_FRAME_LEN>,
}

impl TxItem {
    /// Copies `frame`, rejecting empty or oversize input
    pub fn new(frame: &[u8]) -> Result<Self, QueueError> {
        if frame.is_empty() {
            return Err(QueueError::InvalidLength(0));
        }
        let data = BoundedVec::from_slice(frame).map_err(|_| QueueError::InvalidLength(frame.len()))?;
        Ok(TxItem { data })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Sequence number from the header, 0 for frames too short to carry one
    pub fn sequence(&self) -> u16 {
        source_and_message_id(&self.data).map_or(0, |(_, seq)| seq)
    }
}

/// FIFO of outbound frames; a full queue drops the newest frame
#[derive(Debug, Clone)]
pub struct TxQueue {
    items: Ring<TxItem>,
    saturated_events: u32,
}

impl Default for TxQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl TxQueue {
    pub fn new() -> Self {
        TxQueue {
            items: Ring::new(TX_QUEUE_CAPACITY),
            saturated_events: 0,
        }
    }

    /// Copies `frame` onto the tail of the queue
    pub fn push(&mut self, frame: &[u8]) -> Result<(), QueueError> {
        let item = TxItem::new(frame)?;
        if self.items.push_back(item).is_err() {
            self.saturated_events += 1;
            warn!(tag = "QSAT", "transmit queue full, frame dropped");
            return Err(QueueError::Full);
        }
        debug!(tag = "QADD", depth = self.items.len(), "frame queued");
        Ok(())
    }

    pub fn front(&self) -> Option<&TxItem> {
        self.items.front()
    }

    pub fn pop(&mut self) -> Option<TxItem> {
        self.items.pop_front()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.is_full()
    }

    /// Number of frames dropped because the queue was full
    pub fn saturated_events(&self) -> u32 {
        self.saturated_events
    }
}
