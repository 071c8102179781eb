//! LoRa transceiver wrapper
//!
//! Bring-up order is probe, begin, profile. Any failure marks the radio not
//! ready and records the stage's code; every later operation then fails
//! with its own not-ready code until `init` succeeds.

use tracing::{info, warn};

use crate::core::RadioInitError;
use super::{
    Radio, CODE_READ_NOT_READY, CODE_RX_ERROR, CODE_RX_NOT_READY, CODE_TX_ERROR,
    CODE_TX_NOT_READY, CODE_TX_TIMEOUT,
};

/// Result of one blocking transmission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxResult {
    Sent,
    Timeout,
    Error,
}

/// Result of polling the receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxPoll {
    /// Nothing received yet
    Empty,
    /// Header error, payload CRC error or receive timeout
    Error,
    /// A packet of `len` bytes was copied into the caller buffer
    Packet { len: usize, rssi: i16, snr: i8 },
}

/// Modulation settings applied at bring-up
#[derive(Debug, Clone, PartialEq)]
pub struct LoraProfile {
    pub frequency_hz: u32,
    pub spreading_factor: u8,
    pub bandwidth_hz: u32,
    /// Coding rate denominator (4/x)
    pub coding_rate: u8,
    /// Used when `coding_rate` is not supported
    pub coding_rate_fallback: u8,
    pub tx_power_dbm: i8,
    /// Re-arm reception after every read
    pub rx_continuous: bool,
}

impl Default for LoraProfile {
    fn default() -> Self {
        LoraProfile {
            frequency_hz: 433_000_000,
            spreading_factor: 9,
            bandwidth_hz: 125_000,
            coding_rate: 6,
            coding_rate_fallback: 5,
            tx_power_dbm: 2,
            rx_continuous: true,
        }
    }
}

impl LoraProfile {
    /// Coding rate actually applied, or `None` if neither value is valid
    pub fn effective_coding_rate(&self) -> Option<u8> {
        let valid = |cr: u8| (5..=8).contains(&cr);
        if valid(self.coding_rate) {
            Some(self.coding_rate)
        } else if valid(self.coding_rate_fallback) {
            Some(self.coding_rate_fallback)
        } else {
            None
        }
    }
}

/// Raw transceiver primitives
pub trait Transceiver {
    /// Reads the chip status; `None` if it is absent or unstable
    fn probe(&mut self) -> Option<u8>;

    /// Starts the driver
    fn begin(&mut self) -> bool;

    /// Applies modulation settings with a resolved coding rate
    fn apply_profile(&mut self, profile: &LoraProfile, coding_rate: u8) -> bool;

    fn transmit(&mut self, frame: &[u8]) -> TxResult;

    /// Enters continuous receive mode, clearing pending interrupts
    fn set_rx(&mut self);

    fn busy(&self) -> bool;

    fn poll_rx(&mut self, out: &mut [u8]) -> RxPoll;
}

/// [`Radio`] implementation over a [`Transceiver`]
#[derive(Debug)]
pub struct LoraRadio<T> {
    phy: T,
    profile: LoraProfile,
    ready: bool,
    last_code: u8,
    last_rssi: i16,
    last_snr: i8,
}

impl<T: Transceiver> LoraRadio<T> {
    pub fn new(phy: T, profile: LoraProfile) -> Self {
        LoraRadio {
            phy,
            profile,
            ready: false,
            last_code: 0,
            last_rssi: 0,
            last_snr: 0,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn phy(&self) -> &T {
        &self.phy
    }

    pub fn phy_mut(&mut self) -> &mut T {
        &mut self.phy
    }

    fn fail_init(&mut self, err: RadioInitError) -> Result<(), RadioInitError> {
        self.ready = false;
        self.last_code = err.code();
        warn!(tag = "RINIT", code = err.code(), "radio init failed: {}", err);
        Err(err)
    }
}

impl<T: Transceiver> Radio for LoraRadio<T> {
    fn init(&mut self) -> Result<(), RadioInitError> {
        match self.phy.probe() {
            Some(status) => info!(status, "radio probe ok"),
            None => return self.fail_init(RadioInitError::ProbeFailed),
        }

        if !self.phy.begin() {
            return self.fail_init(RadioInitError::BeginFailed);
        }

        let coding_rate = match self.profile.effective_coding_rate() {
            Some(cr) => cr,
            None => return self.fail_init(RadioInitError::ProfileFailed),
        };
        if coding_rate != self.profile.coding_rate {
            warn!(coding_rate, "using fallback coding rate");
        }
        if !self.phy.apply_profile(&self.profile, coding_rate) {
            return self.fail_init(RadioInitError::ProfileFailed);
        }
        info!(
            sf = self.profile.spreading_factor,
            bw_hz = self.profile.bandwidth_hz,
            coding_rate,
            tx_power_dbm = self.profile.tx_power_dbm,
            "radio profile applied"
        );

        self.ready = true;
        self.last_code = 0;
        info!(tag = "RINIT", "radio init ok");

        if self.profile.rx_continuous && !self.start_receive() {
            self.ready = false;
        }
        Ok(())
    }

    fn send_frame(&mut self, frame: &[u8]) -> bool {
        if !self.ready {
            self.last_code = CODE_TX_NOT_READY;
            return false;
        }

        match self.phy.transmit(frame) {
            TxResult::Sent => {
                self.last_code = 0;
                true
            }
            TxResult::Timeout => {
                self.last_code = CODE_TX_TIMEOUT;
                false
            }
            TxResult::Error => {
                self.last_code = CODE_TX_ERROR;
                false
            }
        }
    }

    fn is_idle(&self) -> bool {
        self.ready && !self.phy.busy()
    }

    fn start_receive(&mut self) -> bool {
        if !self.ready {
            self.last_code = CODE_RX_NOT_READY;
            warn!("receive mode unavailable, radio not ready");
            return false;
        }
        self.phy.set_rx();
        self.last_code = 0;
        true
    }

    fn read_frame(&mut self, out: &mut [u8]) -> usize {
        if !self.ready {
            self.last_code = CODE_READ_NOT_READY;
            return 0;
        }

        match self.phy.poll_rx(out) {
            RxPoll::Empty => 0,
            RxPoll::Error => {
                self.last_code = CODE_RX_ERROR;
                if self.profile.rx_continuous {
                    self.phy.set_rx();
                }
                0
            }
            RxPoll::Packet { len, rssi, snr } => {
                self.last_rssi = rssi;
                self.last_snr = snr;
                if self.profile.rx_continuous {
                    self.phy.set_rx();
                }
                self.last_code = 0;
                len.min(out.len())
            }
        }
    }

    fn last_error_code(&self) -> u8 {
        self.last_code
    }

    fn last_rssi(&self) -> i16 {
        self.last_rssi
    }

    fn last_snr(&self) -> i8 {
        self.last_snr
    }
}
