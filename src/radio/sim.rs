//! In-memory radio for tests and simulation

use std::collections::VecDeque;

use crate::core::RadioInitError;
use super::{Radio, CODE_READ_NOT_READY, CODE_RX_NOT_READY, CODE_TX_ERROR, CODE_TX_NOT_READY};

/// Radio that records transmissions and replays queued receptions
///
/// Fields are public so tests and the simulation can steer it directly.
#[derive(Debug, Default)]
pub struct SimRadio {
    /// Frames waiting to be read, oldest first
    pub inbox: VecDeque<Vec<u8>>,
    /// Every frame successfully transmitted
    pub sent: Vec<Vec<u8>>,
    /// Reported as not idle while set
    pub busy: bool,
    /// Number of upcoming sends that fail with a TX error
    pub fail_sends: u32,
    /// Result returned by the next `init`
    pub init_error: Option<RadioInitError>,
    /// Number of times reception was armed
    pub rx_armed: u32,
    /// Signal quality reported for every received frame
    pub rssi: i16,
    pub snr: i8,
    ready: bool,
    last_code: u8,
}

impl SimRadio {
    /// Creates a radio that is already up
    pub fn new() -> Self {
        SimRadio {
            ready: true,
            ..Default::default()
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Drains and returns the transmitted frames
    pub fn take_sent(&mut self) -> Vec<Vec<u8>> {
        std::mem::take(&mut self.sent)
    }
}

impl Radio for SimRadio {
    fn init(&mut self) -> Result<(), RadioInitError> {
        match self.init_error {
            Some(err) => {
                self.ready = false;
                self.last_code = err.code();
                Err(err)
            }
            None => {
                self.ready = true;
                self.last_code = 0;
                Ok(())
            }
        }
    }

    fn send_frame(&mut self, frame: &[u8]) -> bool {
        if !self.ready {
            self.last_code = CODE_TX_NOT_READY;
            return false;
        }
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            self.last_code = CODE_TX_ERROR;
            return false;
        }
        self.sent.push(frame.to_vec());
        self.last_code = 0;
        true
    }

    fn is_idle(&self) -> bool {
        self.ready && !self.busy
    }

    fn start_receive(&mut self) -> bool {
        if !self.ready {
            self.last_code = CODE_RX_NOT_READY;
            return false;
        }
        self.rx_armed += 1;
        self.last_code = 0;
        true
    }

    fn read_frame(&mut self, out: &mut [u8]) -> usize {
        if !self.ready {
            self.last_code = CODE_READ_NOT_READY;
            return 0;
        }
        match self.inbox.pop_front() {
            Some(frame) => {
                let len = frame.len().min(out.len());
                out[..len].copy_from_slice(&frame[..len]);
                self.last_code = 0;
                len
            }
            None => 0,
        }
    }

    fn last_error_code(&self) -> u8 {
        self.last_code
    }

    fn last_rssi(&self) -> i16 {
        self.rssi
    }

    fn last_snr(&self) -> i8 {
        self.snr
    }
}
