//! Half-duplex radio abstraction
//!
//! [`Radio`] is what the scheduler and the node talk to. [`LoraRadio`] maps
//! it onto a raw [`Transceiver`] with readiness tracking and numeric error
//! codes; [`SimRadio`] is an in-memory stand-in for tests and simulation.

pub mod lora;
pub mod sim;

pub use self::lora::{LoraProfile, LoraRadio, RxPoll, Transceiver, TxResult};
pub use self::sim::SimRadio;

use crate::core::RadioInitError;

/// Error code: send attempted while the radio is not ready
pub const CODE_TX_NOT_READY: u8 = 10;
/// Error code: transmission timed out
pub const CODE_TX_TIMEOUT: u8 = 11;
/// Error code: transmission failed
pub const CODE_TX_ERROR: u8 = 12;
/// Error code: receive mode requested while the radio is not ready
pub const CODE_RX_NOT_READY: u8 = 20;
/// Error code: read attempted while the radio is not ready
pub const CODE_READ_NOT_READY: u8 = 30;
/// Error code: packet reception failed (header, CRC or timeout)
pub const CODE_RX_ERROR: u8 = 31;

/// Operations the node needs from its radio
pub trait Radio {
    /// Brings the radio up; a failure leaves it not ready
    fn init(&mut self) -> Result<(), RadioInitError>;

    /// Transmits one frame, blocking until done; false on failure
    fn send_frame(&mut self, frame: &[u8]) -> bool;

    /// True when ready and not busy
    fn is_idle(&self) -> bool;

    /// Arms continuous reception
    fn start_receive(&mut self) -> bool;

    /// Copies a received frame into `out`, returning its length (0 if none)
    fn read_frame(&mut self, out: &mut [u8]) -> usize;

    /// Code of the last failed operation, 0 after a success
    fn last_error_code(&self) -> u8;

    /// RSSI of the last received frame in dBm
    fn last_rssi(&self) -> i16 {
        0
    }

    /// SNR of the last received frame in dB
    fn last_snr(&self) -> i8 {
        0
    }
}
