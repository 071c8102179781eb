use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::{Error, Result};

/// Mesh node address carried in the source/destination header bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u8);

impl NodeId {
    /// Destination id addressing the scanner/gateway
    pub const SCANNER: NodeId = NodeId(0xFF);

    /// Returns the raw id byte
    pub fn raw(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Network identifier shared by every node of one mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NetworkId(pub u8);

/// Frame kinds understood on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Fixed-length keepalive with no payload
    Ping = 0x01,
    /// Status report with frequency list and node status TLVs
    Report = 0x10,
}

impl FrameType {
    /// Parses a raw type byte
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0x01 => Some(FrameType::Ping),
            0x10 => Some(FrameType::Report),
            _ => None,
        }
    }
}

/// Status flag byte sent in the node status TLV
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    /// A serial line arrived within the freshness window
    pub const LINK_FRESH: u8 = 1 << 0;
    /// The last frequency parse produced at least one value
    pub const SCANNER_OK: u8 = 1 << 1;
    /// A serial line has been received since boot
    pub const LINK_VALID: u8 = 1 << 2;
    /// Battery below the low threshold
    pub const LOW_BATTERY: u8 = 1 << 3;

    pub fn empty() -> Self {
        StatusFlags(0)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn contains(&self, bit: u8) -> bool {
        self.0 & bit != 0
    }

    pub fn set(&mut self, bit: u8, on: bool) {
        if on {
            self.0 |= bit;
        } else {
            self.0 &= !bit;
        }
    }
}

/// Runtime configuration for one node
///
/// Defaults match the reference board's build constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// This node's id; must be unique within the mesh
    pub node_id: NodeId,
    /// Mesh network id
    pub network_id: NetworkId,
    /// Gateways consume frames locally instead of relaying them
    pub is_gateway: bool,
    /// TTL written into locally originated frames
    pub data_ttl: u8,
    /// Number of (source, message id) pairs remembered for duplicate suppression
    pub dedup_capacity: usize,
    /// Lower bound of the transmit backoff
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub backoff_min: Duration,
    /// Upper bound of the transmit backoff (inclusive)
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub backoff_max: Duration,
    /// Relay budget per forward window
    pub max_forwards_per_window: u8,
    /// Length of the relay rate-limit window
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub forward_window: Duration,
    /// Serial device carrying the scan lines
    pub uart_device: String,
    /// Serial baud rate
    pub uart_baud: u32,
    /// Periodic status report interval
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub report_period: Duration,
    /// Maximum line age for the link-fresh flag
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub link_fresh: Duration,
    /// Low-battery threshold in millivolts
    pub low_battery_mv: u16,
    /// Battery log interval
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub batt_log_period: Duration,
    /// Heartbeat log interval, disabled when unset
    #[serde(serialize_with = "super::serde::serialize_opt_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_millis")]
    pub heartbeat_period: Option<Duration>,
    /// Periodic ping interval, disabled when unset
    #[serde(serialize_with = "super::serde::serialize_opt_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_opt_millis")]
    pub ping_interval: Option<Duration>,
    /// Encode and decode a ping at start-up and log the result
    pub frame_selftest: bool,
    /// Control loop period
    #[serde(serialize_with = "super::serde::serialize_millis")]
    #[serde(deserialize_with = "super::serde::deserialize_millis")]
    pub tick_period: Duration,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_id: NodeId(1),
            network_id: NetworkId(1),
            is_gateway: false,
            data_ttl: 8,
            dedup_capacity: 128,
            backoff_min: Duration::from_millis(50),
            backoff_max: Duration::from_millis(300),
            max_forwards_per_window: 10,
            forward_window: Duration::from_millis(10_000),
            uart_device: "/dev/ttyUSB0".to_string(),
            uart_baud: 115_200,
            report_period: Duration::from_millis(5000),
            link_fresh: Duration::from_millis(15_000),
            low_battery_mv: 3300,
            batt_log_period: Duration::from_millis(10_000),
            heartbeat_period: None,
            ping_interval: None,
            frame_selftest: false,
            tick_period: Duration::from_millis(10),
        }
    }
}

impl NodeConfig {
    /// Checks that the configuration is usable
    pub fn validate(&self) -> Result<()> {
        if self.node_id == NodeId::SCANNER {
            return Err(Error::config("node id 0xFF is reserved for the scanner address"));
        }
        if self.data_ttl == 0 {
            return Err(Error::config("data TTL must be non-zero"));
        }
        if self.dedup_capacity == 0 {
            return Err(Error::config("dedup capacity must be non-zero"));
        }
        if self.tick_period.is_zero() {
            return Err(Error::config("tick period must be non-zero"));
        }
        if self.uart_baud == 0 {
            return Err(Error::config("UART baud rate must be non-zero"));
        }
        Ok(())
    }
}
