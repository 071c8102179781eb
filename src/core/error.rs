use std::io;
use thiserror::Error;

/// Reasons an inbound frame is rejected by the decoder
///
/// Each reason maps to a stable numeric code reported in `RXBAD` events.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Wrong frame length: {0} bytes")]
    WrongLength(usize),

    #[error("Wrong network id: {0:#04x}")]
    WrongNetwork(u8),

    #[error("CRC mismatch")]
    CrcMismatch,

    #[error("Wrong frame type: {0:#04x}")]
    WrongType(u8),

    #[error("Malformed TLV payload")]
    MalformedPayload,
}

impl DecodeError {
    /// Numeric reason code
    pub fn code(&self) -> u8 {
        match self {
            DecodeError::WrongLength(_) => 1,
            DecodeError::WrongNetwork(_) => 2,
            DecodeError::CrcMismatch => 3,
            DecodeError::WrongType(_) => 4,
            DecodeError::MalformedPayload => 5,
        }
    }
}

/// Failure to serialize a frame into a caller buffer
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Frame length {0} outside the valid frame range")]
    InvalidFrameLength(usize),
}

/// Transmit queue admission failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("Transmit queue full")]
    Full,

    #[error("Invalid frame length for queue: {0}")]
    InvalidLength(usize),
}

/// Radio bring-up failures
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadioInitError {
    #[error("Transceiver probe failed")]
    ProbeFailed,

    #[error("Transceiver begin failed")]
    BeginFailed,

    #[error("LoRa profile rejected")]
    ProfileFailed,
}

impl RadioInitError {
    /// Numeric code stored as the radio's last error code
    pub fn code(&self) -> u8 {
        match self {
            RadioInitError::ProbeFailed => 1,
            RadioInitError::BeginFailed => 2,
            RadioInitError::ProfileFailed => 3,
        }
    }
}

/// Crate-wide error type
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Radio init error: {0}")]
    RadioInit(#[from] RadioInitError),

    #[error("Serial error: {0}")]
    Serial(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),
}

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Creates a new serial link error
    pub fn serial(msg: impl Into<String>) -> Self {
        Error::Serial(msg.into())
    }

    /// Creates a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Creates a new invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }

    /// Whether the failure comes from the host link and may clear on retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Io(_) | Error::Serial(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_error_codes() {
        assert_eq!(DecodeError::WrongLength(3).code(), 1);
        assert_eq!(DecodeError::WrongNetwork(9).code(), 2);
        assert_eq!(DecodeError::CrcMismatch.code(), 3);
        assert_eq!(DecodeError::WrongType(0xEE).code(), 4);
        assert_eq!(DecodeError::MalformedPayload.code(), 5);
    }

    #[test]
    fn test_error_creation() {
        let err = Error::config("ttl must be non-zero");
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.to_string(), "Configuration error: ttl must be non-zero");
    }

    #[test]
    fn test_error_conversion() {
        let err: Error = QueueError::Full.into();
        assert!(matches!(err, Error::Queue(QueueError::Full)));
        assert!(!err.is_transient());

        let io_err = io::Error::new(io::ErrorKind::Other, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.is_transient());
    }

    #[test]
    fn test_encode_error_messages() {
        let err: Error = EncodeError::InvalidFrameLength(0).into();
        assert_eq!(
            err.to_string(),
            "Encode error: Frame length 0 outside the valid frame range"
        );
    }

    #[test]
    fn test_radio_init_codes() {
        assert_eq!(RadioInitError::ProbeFailed.code(), 1);
        assert_eq!(RadioInitError::BeginFailed.code(), 2);
        assert_eq!(RadioInitError::ProfileFailed.code(), 3);
    }
}
