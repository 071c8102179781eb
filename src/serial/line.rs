//! Line assembly from serial bytes
//!
//! ```text
//! Idle --byte--> Collecting --'\n'--> Idle (line published)
//!                    |
//!                    +--line too long--> Overrun --'\n'--> Idle (nothing published)
//! ```
//!
//! `\r` is ignored everywhere. A `\n` while idle publishes an empty line.

use heapless::Vec as BoundedVec;
use tracing::{debug, warn};

use crate::core::Result;
use super::ByteSource;

/// Line buffer size; one byte is reserved so lines hold at most 63 characters
pub const UART_LINE_MAX: usize = 64;
/// Upper bound on bytes consumed per poll
pub const UART_MAX_BYTES_PER_TICK: usize = 64;

const LINE_CAPACITY: usize = UART_LINE_MAX - 1;

/// Collector state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Idle,
    Collecting,
    /// Transient: a line is being published
    Ready,
    /// Discarding input until the next `\n`
    Overrun,
}

/// The most recently completed line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LastLine {
    pub text: BoundedVec<u8, LINE_CAPACITY>,
    /// Completion time in ms
    pub timestamp_ms: u32,
    /// Incremented on every completed line, starting at 1
    pub generation: u32,
}

/// Byte-at-a-time line collector with overrun recovery
#[derive(Debug, Clone)]
pub struct UartLineCollector {
    state: LineState,
    buf: BoundedVec<u8, LINE_CAPACITY>,
    last_line: Option<LastLine>,
    generation: u32,
    overruns: u32,
}

impl Default for UartLineCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl UartLineCollector {
    pub fn new() -> Self {
        UartLineCollector {
            state: LineState::Idle,
            buf: BoundedVec::new(),
            last_line: None,
            generation: 0,
            overruns: 0,
        }
    }

    pub fn state(&self) -> LineState {
        self.state
    }

    /// Latest completed line, if any line was ever completed
    pub fn last_line(&self) -> Option<&LastLine> {
        self.last_line.as_ref()
    }

    /// True once any line has completed
    pub fn has_valid_line(&self) -> bool {
        self.last_line.is_some()
    }

    /// Number of lines completed since start
    pub fn lines_received(&self) -> u32 {
        self.generation
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Reads at most [`UART_MAX_BYTES_PER_TICK`] bytes from `source` and feeds them
    pub fn poll<S: ByteSource + ?Sized>(&mut self, source: &mut S, now_ms: u32) -> Result<usize> {
        let mut chunk = [0u8; UART_MAX_BYTES_PER_TICK];
        let n = source.read_available(&mut chunk)?;
        Ok(self.feed(&chunk[..n], now_ms))
    }

    /// Processes bytes, stopping after [`UART_MAX_BYTES_PER_TICK`]; returns bytes consumed
    pub fn feed(&mut self, bytes: &[u8], now_ms: u32) -> usize {
        let bytes = &bytes[..bytes.len().min(UART_MAX_BYTES_PER_TICK)];
        for &byte in bytes {
            self.push_byte(byte, now_ms);
        }
        bytes.len()
    }

    fn push_byte(&mut self, byte: u8, now_ms: u32) {
        if self.state == LineState::Overrun {
            if byte == b'\n' {
                self.state = LineState::Idle;
            }
            return;
        }

        match byte {
            b'\r' => {}
            b'\n' => self.finalize(now_ms),
            _ => {
                self.state = LineState::Collecting;
                if self.buf.push(byte).is_err() {
                    self.overrun();
                }
            }
        }
    }

    fn finalize(&mut self, now_ms: u32) {
        self.state = LineState::Ready;
        self.generation = self.generation.wrapping_add(1);
        debug!(tag = "UOK", len = self.buf.len(), "serial line received");

        self.last_line = Some(LastLine {
            text: self.buf.clone(),
            timestamp_ms: now_ms,
            generation: self.generation,
        });
        self.buf.clear();
        self.state = LineState::Idle;
    }

    fn overrun(&mut self) {
        self.state = LineState::Overrun;
        self.buf.clear();
        self.overruns += 1;
        warn!(tag = "UOVR", "serial line overrun, discarding until newline");
    }
}
