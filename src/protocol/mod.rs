//! Over-the-air frame protocol
//!
//! Frame layout, CRC, TLV payload records and the stream codec used when
//! frames travel over a byte-oriented link.

pub mod codec;
pub mod crc;
pub mod frame;
pub mod tlv;

pub use self::codec::FrameStreamCodec;
pub use self::crc::crc16_ccitt_false;
pub use self::frame::{
    crc_valid, decrement_ttl_increment_hop_and_recompute, hop_count, is_no_relay, peek_header,
    report_len, source_and_message_id, ttl, FrameCodec, FrameHeader, Ping, Report,
    FLAG_NO_RELAY, HEADER_LEN, MAX_FRAME_LEN, MAX_FREQS, MIN_FRAME_LEN, PING_FRAME_LEN,
};
pub use self::tlv::{Tlv, TlvReader, TlvWriter};
