//! Serial scan-line input
//!
//! Bytes come from a [`ByteSource`], are assembled into lines by
//! [`UartLineCollector`] and turned into frequency lists by
//! [`parse_frequency_list`].

pub mod freq;
pub mod line;

pub use self::freq::{parse_frequency_list, FrequencySet, MAX_FREQS};
pub use self::line::{LastLine, LineState, UartLineCollector, UART_LINE_MAX, UART_MAX_BYTES_PER_TICK};

use std::collections::VecDeque;
use std::io::{self, Read};
use std::time::Duration;

use serialport::SerialPort;

use crate::core::{Error, NodeConfig, Result};

/// Non-blocking source of serial bytes
pub trait ByteSource {
    /// Copies up to `buf.len()` immediately available bytes into `buf`
    ///
    /// Returns 0 when nothing is pending. Bytes beyond `buf.len()` stay
    /// buffered for the next call.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;
}

impl ByteSource for VecDeque<u8> {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.len());
        for (slot, byte) in buf.iter_mut().zip(self.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

/// [`ByteSource`] backed by a host serial port
pub struct SerialPortSource {
    port: Box<dyn SerialPort>,
}

impl SerialPortSource {
    /// Opens the configured device at the configured baud rate
    pub fn open(config: &NodeConfig) -> Result<Self> {
        let port = serialport::new(config.uart_device.as_str(), config.uart_baud)
            .timeout(Duration::from_millis(10))
            .open()
            .map_err(|e| Error::serial(format!("Failed to open {}: {}", config.uart_device, e)))?;
        Ok(SerialPortSource { port })
    }

    pub fn from_port(port: Box<dyn SerialPort>) -> Self {
        SerialPortSource { port }
    }
}

impl ByteSource for SerialPortSource {
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self
            .port
            .bytes_to_read()
            .map_err(|e| Error::serial(format!("Failed to query serial port: {}", e)))?
            as usize;
        if pending == 0 || buf.is_empty() {
            return Ok(0);
        }

        let want = pending.min(buf.len());
        match self.port.read(&mut buf[..want]) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deque_source_limits_read() {
        let mut source: VecDeque<u8> = b"433,868\n".iter().copied().collect();
        let mut buf = [0u8; 4];
        assert_eq!(source.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"433,");
        assert_eq!(source.len(), 4);

        let mut buf = [0u8; 16];
        assert_eq!(source.read_available(&mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"868\n");
        assert_eq!(source.read_available(&mut buf).unwrap(), 0);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let config = NodeConfig {
            uart_device: "/dev/this-port-does-not-exist".to_string(),
            ..NodeConfig::default()
        };
        match SerialPortSource::open(&config) {
            Err(Error::Serial(msg)) => assert!(msg.contains("this-port-does-not-exist")),
            Err(e) => panic!("Expected serial error, got {}", e),
            Ok(_) => panic!("Expected open to fail"),
        }
    }
}
