//! Wire frame layout, encoding and header accessors
//!
//! ```text
//! offset  field                width
//! 0       network id           1
//! 1       source id            1
//! 2       destination id       1
//! 3       boot id              1
//! 4       type                 1
//! 5..6    sequence (LE)        2
//! 7       TTL                  1
//! 8       hop count            1
//! 9       flags                1
//! 10..N   TLV payload          var
//! N..N+1  CRC-16 (LE)          2
//! ```
//!
//! The accessors are free functions over raw byte slices because the relay
//! path works on frames it did not encode. Every accessor rejects buffers
//! shorter than header plus CRC.

use heapless::Vec as BoundedVec;

use crate::core::{DecodeError, EncodeError, FrameType, NetworkId, NodeConfig, NodeId, StatusFlags};
use super::crc::crc16_ccitt_false;
use super::tlv::{TlvReader, TlvWriter};

/// Fixed header length
pub const HEADER_LEN: usize = 10;
/// Trailing CRC length
pub const CRC_LEN: usize = 2;
/// Smallest valid frame
pub const MIN_FRAME_LEN: usize = HEADER_LEN + CRC_LEN;
/// Ping frames carry no payload
pub const PING_FRAME_LEN: usize = MIN_FRAME_LEN;
/// Largest frame the node builds, queues or relays
pub const MAX_FRAME_LEN: usize = 64;
/// Maximum number of frequencies carried in one report
pub const MAX_FREQS: usize = 5;

/// Frequency list TLV tag
pub const TLV_FREQ_LIST: u8 = 0x01;
/// Node status TLV tag
pub const TLV_NODE_STATUS: u8 = 0x02;
/// Node status value length: flags byte plus LE age seconds
pub const NODE_STATUS_LEN: u8 = 3;

/// Flags bit forbidding relays from forwarding the frame
pub const FLAG_NO_RELAY: u8 = 0x01;

const IDX_NET: usize = 0;
const IDX_SRC: usize = 1;
const IDX_DST: usize = 2;
const IDX_BOOT: usize = 3;
const IDX_TYPE: usize = 4;
const IDX_SEQ_L: usize = 5;
const IDX_SEQ_H: usize = 6;
const IDX_TTL: usize = 7;
const IDX_HOPS: usize = 8;
const IDX_FLAGS: usize = 9;

/// Decoded header fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub network: NetworkId,
    pub source: NodeId,
    pub destination: NodeId,
    pub boot_id: u8,
    /// Raw type byte, see [`FrameHeader::kind`]
    pub frame_type: u8,
    pub sequence: u16,
    pub ttl: u8,
    pub hops: u8,
    pub flags: u8,
}

impl FrameHeader {
    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_byte(self.frame_type)
    }

    pub fn is_no_relay(&self) -> bool {
        self.flags & FLAG_NO_RELAY != 0
    }
}

/// A validated ping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ping {
    pub sequence: u16,
    pub source: NodeId,
    pub boot_id: u8,
}

/// A validated status report
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub header: FrameHeader,
    pub frequencies: BoundedVec<u16, MAX_FREQS>,
    pub status: StatusFlags,
    pub last_uart_age_s: u16,
}

/// Encoded length of a report carrying `freq_count` frequencies (capped)
pub fn report_len(freq_count: usize) -> usize {
    let freq_bytes = freq_count.min(MAX_FREQS) * 2;
    HEADER_LEN + 2 + freq_bytes + 2 + NODE_STATUS_LEN as usize + CRC_LEN
}

/// Builds and validates frames on behalf of the local node
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    network: NetworkId,
    source: NodeId,
    boot_id: u8,
    data_ttl: u8,
}

impl FrameCodec {
    /// Creates a codec stamping frames with the given identity
    pub fn new(network: NetworkId, source: NodeId, boot_id: u8, data_ttl: u8) -> Self {
        FrameCodec {
            network,
            source,
            boot_id,
            data_ttl,
        }
    }

    /// Creates a codec from node configuration and the current boot id
    pub fn from_config(config: &NodeConfig, boot_id: u8) -> Self {
        Self::new(config.network_id, config.node_id, boot_id, config.data_ttl)
    }

    pub fn network(&self) -> NetworkId {
        self.network
    }

    pub fn source(&self) -> NodeId {
        self.source
    }

    fn write_header(&self, out: &mut [u8], frame_type: FrameType, destination: NodeId, sequence: u16) {
        let [seq_l, seq_h] = sequence.to_le_bytes();
        out[IDX_NET] = self.network.0;
        out[IDX_SRC] = self.source.0;
        out[IDX_DST] = destination.0;
        out[IDX_BOOT] = self.boot_id;
        out[IDX_TYPE] = frame_type as u8;
        out[IDX_SEQ_L] = seq_l;
        out[IDX_SEQ_H] = seq_h;
        out[IDX_TTL] = self.data_ttl;
        out[IDX_HOPS] = 0;
        out[IDX_FLAGS] = 0;
    }

    /// Builds a ping addressed to the scanner
    pub fn encode_ping(&self, sequence: u16) -> [u8; PING_FRAME_LEN] {
        let mut out = [0u8; PING_FRAME_LEN];
        self.write_header(&mut out, FrameType::Ping, NodeId::SCANNER, sequence);
        write_crc(&mut out);
        out
    }

    /// Builds a status report into `out`, returning the frame length
    ///
    /// At most [`MAX_FREQS`] frequencies are encoded. Nothing is written when
    /// `out` cannot hold the whole frame.
    pub fn encode_report(
        &self,
        sequence: u16,
        destination: NodeId,
        frequencies: &[u16],
        status: StatusFlags,
        last_uart_age_s: u16,
        out: &mut [u8],
    ) -> Result<usize, EncodeError> {
        let frequencies = &frequencies[..frequencies.len().min(MAX_FREQS)];
        let needed = report_len(frequencies.len());
        if out.len() < needed {
            return Err(EncodeError::BufferTooSmall {
                needed,
                available: out.len(),
            });
        }

        self.write_header(out, FrameType::Report, destination, sequence);

        let mut tlv = TlvWriter::new(out, HEADER_LEN);
        tlv.record(TLV_FREQ_LIST, (frequencies.len() * 2) as u8);
        for &freq in frequencies {
            tlv.u16_le(freq);
        }
        tlv.record(TLV_NODE_STATUS, NODE_STATUS_LEN)
            .u8(status.bits())
            .u16_le(last_uart_age_s);
        let body_len = tlv.position();

        write_crc(&mut out[..body_len + CRC_LEN]);
        Ok(needed)
    }

    /// Validates a ping frame
    ///
    /// Checks run in order: length, network id, type, CRC.
    pub fn decode_ping(&self, buf: &[u8]) -> Result<Ping, DecodeError> {
        if buf.len() != PING_FRAME_LEN {
            return Err(DecodeError::WrongLength(buf.len()));
        }
        if buf[IDX_NET] != self.network.0 {
            return Err(DecodeError::WrongNetwork(buf[IDX_NET]));
        }
        if buf[IDX_TYPE] != FrameType::Ping as u8 {
            return Err(DecodeError::WrongType(buf[IDX_TYPE]));
        }
        if !crc_valid(buf) {
            return Err(DecodeError::CrcMismatch);
        }

        Ok(Ping {
            sequence: read_sequence(buf),
            source: NodeId(buf[IDX_SRC]),
            boot_id: buf[IDX_BOOT],
        })
    }

    /// Validates a status report and extracts its TLVs
    ///
    /// Unknown TLV tags are skipped; both known records must be present.
    pub fn decode_report(&self, buf: &[u8]) -> Result<Report, DecodeError> {
        if buf.len() < MIN_FRAME_LEN || buf.len() > MAX_FRAME_LEN {
            return Err(DecodeError::WrongLength(buf.len()));
        }
        if buf[IDX_NET] != self.network.0 {
            return Err(DecodeError::WrongNetwork(buf[IDX_NET]));
        }
        if buf[IDX_TYPE] != FrameType::Report as u8 {
            return Err(DecodeError::WrongType(buf[IDX_TYPE]));
        }
        if !crc_valid(buf) {
            return Err(DecodeError::CrcMismatch);
        }

        let header = peek_header(buf).ok_or(DecodeError::WrongLength(buf.len()))?;
        let payload = &buf[HEADER_LEN..buf.len() - CRC_LEN];

        let mut frequencies = None;
        let mut status = None;
        for record in TlvReader::new(payload) {
            let record = record?;
            match record.tag {
                TLV_FREQ_LIST => {
                    if record.value.len() % 2 != 0 {
                        return Err(DecodeError::MalformedPayload);
                    }
                    let mut list = BoundedVec::new();
                    for pair in record.value.chunks_exact(2).take(MAX_FREQS) {
                        let _ = list.push(u16::from_le_bytes([pair[0], pair[1]]));
                    }
                    frequencies = Some(list);
                }
                TLV_NODE_STATUS => {
                    if record.value.len() != NODE_STATUS_LEN as usize {
                        return Err(DecodeError::MalformedPayload);
                    }
                    let age = u16::from_le_bytes([record.value[1], record.value[2]]);
                    status = Some((StatusFlags(record.value[0]), age));
                }
                _ => {}
            }
        }

        match (frequencies, status) {
            (Some(frequencies), Some((status, last_uart_age_s))) => Ok(Report {
                header,
                frequencies,
                status,
                last_uart_age_s,
            }),
            _ => Err(DecodeError::MalformedPayload),
        }
    }
}

fn has_min_len(buf: &[u8]) -> bool {
    buf.len() >= MIN_FRAME_LEN
}

fn read_sequence(buf: &[u8]) -> u16 {
    u16::from_le_bytes([buf[IDX_SEQ_L], buf[IDX_SEQ_H]])
}

/// Computes the CRC over everything but the last two bytes and stores it there
fn write_crc(buf: &mut [u8]) {
    let crc_idx = buf.len() - CRC_LEN;
    let crc = crc16_ccitt_false(&buf[..crc_idx]);
    buf[crc_idx..].copy_from_slice(&crc.to_le_bytes());
}

/// Checks the trailing CRC against all preceding bytes
pub fn crc_valid(buf: &[u8]) -> bool {
    if !has_min_len(buf) {
        return false;
    }
    let crc_idx = buf.len() - CRC_LEN;
    let expected = u16::from_le_bytes([buf[crc_idx], buf[crc_idx + 1]]);
    crc16_ccitt_false(&buf[..crc_idx]) == expected
}

/// Reads the header without validating the CRC
pub fn peek_header(buf: &[u8]) -> Option<FrameHeader> {
    if !has_min_len(buf) {
        return None;
    }
    Some(FrameHeader {
        network: NetworkId(buf[IDX_NET]),
        source: NodeId(buf[IDX_SRC]),
        destination: NodeId(buf[IDX_DST]),
        boot_id: buf[IDX_BOOT],
        frame_type: buf[IDX_TYPE],
        sequence: read_sequence(buf),
        ttl: buf[IDX_TTL],
        hops: buf[IDX_HOPS],
        flags: buf[IDX_FLAGS],
    })
}

/// Source id and message id, the dedup key
pub fn source_and_message_id(buf: &[u8]) -> Option<(NodeId, u16)> {
    if !has_min_len(buf) {
        return None;
    }
    Some((NodeId(buf[IDX_SRC]), read_sequence(buf)))
}

pub fn ttl(buf: &[u8]) -> Option<u8> {
    has_min_len(buf).then(|| buf[IDX_TTL])
}

pub fn hop_count(buf: &[u8]) -> Option<u8> {
    has_min_len(buf).then(|| buf[IDX_HOPS])
}

/// True when relays must not forward the frame; short buffers count as no-relay
pub fn is_no_relay(buf: &[u8]) -> bool {
    if !has_min_len(buf) {
        return true;
    }
    buf[IDX_FLAGS] & FLAG_NO_RELAY != 0
}

/// Relay rewrite: TTL - 1, hops + 1, fresh CRC
///
/// Leaves the buffer untouched and returns false if the CRC is bad or TTL is
/// already zero.
pub fn decrement_ttl_increment_hop_and_recompute(buf: &mut [u8]) -> bool {
    if !crc_valid(buf) {
        return false;
    }
    if buf[IDX_TTL] == 0 {
        return false;
    }

    buf[IDX_TTL] -= 1;
    buf[IDX_HOPS] = buf[IDX_HOPS].wrapping_add(1);
    write_crc(buf);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> FrameCodec {
        FrameCodec::new(NetworkId(1), NodeId(1), 0xAB, 8)
    }

    fn set_byte_and_recrc(frame: &mut [u8], idx: usize, value: u8) {
        frame[idx] = value;
        write_crc(frame);
    }

    #[test]
    fn test_ping_layout() {
        let frame = codec().encode_ping(0x1234);
        assert_eq!(frame.len(), PING_FRAME_LEN);
        assert_eq!(
            &frame[..HEADER_LEN],
            &[0x01, 0x01, 0xFF, 0xAB, 0x01, 0x34, 0x12, 8, 0, 0]
        );
        assert!(crc_valid(&frame));
    }

    #[test]
    fn test_ping_build_and_parse_roundtrip() {
        let frame = codec().encode_ping(0x1234);
        let ping = codec().decode_ping(&frame).unwrap();
        assert_eq!(ping.sequence, 0x1234);
        assert_eq!(ping.source, NodeId(1));
        assert_eq!(ping.boot_id, 0xAB);
    }

    #[test]
    fn test_ping_rejection_reasons() {
        let codec = codec();
        let frame = codec.encode_ping(7);

        assert_eq!(
            codec.decode_ping(&frame[..11]),
            Err(DecodeError::WrongLength(11))
        );

        let mut foreign = frame;
        set_byte_and_recrc(&mut foreign, IDX_NET, 2);
        assert_eq!(codec.decode_ping(&foreign), Err(DecodeError::WrongNetwork(2)));

        let mut bad_type = frame;
        bad_type[IDX_TYPE] = 0xEE;
        assert_eq!(codec.decode_ping(&bad_type).unwrap_err().code(), 4);

        let mut bad_crc = frame;
        bad_crc[IDX_TTL] ^= 0x01;
        assert_eq!(codec.decode_ping(&bad_crc), Err(DecodeError::CrcMismatch));
        assert_eq!(DecodeError::CrcMismatch.code(), 3);
    }

    #[test]
    fn test_ping_rejection_order() {
        let codec = codec();
        // Wrong network and wrong type with bad CRC: network reported first
        let mut frame = codec.encode_ping(7);
        frame[IDX_NET] = 9;
        frame[IDX_TYPE] = 0x10;
        assert_eq!(codec.decode_ping(&frame), Err(DecodeError::WrongNetwork(9)));

        // Wrong type with bad CRC: type reported before CRC
        let mut frame = codec.encode_ping(7);
        frame[IDX_TYPE] = 0x10;
        assert_eq!(codec.decode_ping(&frame), Err(DecodeError::WrongType(0x10)));
    }

    #[test]
    fn test_report_tlv_layout_len_and_crc() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let len = codec()
            .encode_report(9, NodeId::SCANNER, &[433, 434, 435], StatusFlags(0b0110), 5, &mut out)
            .unwrap();
        let frame = &out[..len];
        assert_eq!(len, report_len(3));
        assert_eq!(frame[IDX_TYPE], FrameType::Report as u8);

        let payload = &frame[HEADER_LEN..len - CRC_LEN];
        assert_eq!(payload[0], TLV_FREQ_LIST);
        assert_eq!(payload[1], 6);
        assert_eq!(&payload[2..4], &433u16.to_le_bytes());
        assert_eq!(payload[8], TLV_NODE_STATUS);
        assert_eq!(payload[9], 3);
        assert_eq!(payload[10], 0b0110);
        assert_eq!(payload[11], 5);
        assert_eq!(payload[12], 0);
        assert!(crc_valid(frame));
    }

    #[test]
    fn test_report_caps_frequency_count() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let freqs = [1, 2, 3, 4, 5, 6, 7];
        let len = codec()
            .encode_report(1, NodeId::SCANNER, &freqs, StatusFlags::empty(), 0, &mut out)
            .unwrap();
        assert_eq!(len, report_len(MAX_FREQS));
        assert_eq!(out[HEADER_LEN + 1], (MAX_FREQS * 2) as u8);

        let report = codec().decode_report(&out[..len]).unwrap();
        assert_eq!(report.frequencies.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_report_buffer_too_small_writes_nothing() {
        let mut out = [0xEEu8; 20];
        let err = codec()
            .encode_report(1, NodeId::SCANNER, &[433, 868], StatusFlags::empty(), 0, &mut out)
            .unwrap_err();
        assert_eq!(
            err,
            EncodeError::BufferTooSmall {
                needed: report_len(2),
                available: 20
            }
        );
        assert!(out.iter().all(|&b| b == 0xEE));
    }

    #[test]
    fn test_report_decode() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let len = codec()
            .encode_report(42, NodeId(9), &[868, 915], StatusFlags(0b1011), 300, &mut out)
            .unwrap();
        let report = codec().decode_report(&out[..len]).unwrap();
        assert_eq!(report.header.sequence, 42);
        assert_eq!(report.header.destination, NodeId(9));
        assert_eq!(report.frequencies.as_slice(), &[868, 915]);
        assert_eq!(report.status, StatusFlags(0b1011));
        assert_eq!(report.last_uart_age_s, 300);
    }

    #[test]
    fn test_report_decode_rejects_ping_and_truncated_tlv() {
        let codec = codec();
        let ping = codec.encode_ping(1);
        assert_eq!(codec.decode_report(&ping), Err(DecodeError::WrongType(0x01)));

        // Header-only report with a dangling TLV tag
        let mut frame = [0u8; MIN_FRAME_LEN + 1];
        codec.write_header(&mut frame, FrameType::Report, NodeId::SCANNER, 3);
        frame[HEADER_LEN] = TLV_FREQ_LIST;
        write_crc(&mut frame);
        assert_eq!(codec.decode_report(&frame), Err(DecodeError::MalformedPayload));
    }

    #[test]
    fn test_accessors_reject_short_buffers() {
        let short = [0u8; MIN_FRAME_LEN - 1];
        assert!(!crc_valid(&short));
        assert_eq!(source_and_message_id(&short), None);
        assert_eq!(ttl(&short), None);
        assert_eq!(hop_count(&short), None);
        assert!(is_no_relay(&short));
        assert!(peek_header(&short).is_none());
    }

    #[test]
    fn test_accessors() {
        let frame = codec().encode_ping(0xBEEF);
        assert_eq!(source_and_message_id(&frame), Some((NodeId(1), 0xBEEF)));
        assert_eq!(ttl(&frame), Some(8));
        assert_eq!(hop_count(&frame), Some(0));
        assert!(!is_no_relay(&frame));

        let mut flagged = frame;
        set_byte_and_recrc(&mut flagged, IDX_FLAGS, FLAG_NO_RELAY);
        assert!(is_no_relay(&flagged));
        assert!(peek_header(&flagged).unwrap().is_no_relay());
        assert_eq!(peek_header(&flagged).unwrap().kind(), Some(FrameType::Ping));
    }

    #[test]
    fn test_relay_rewrite_until_ttl_exhausted() {
        let mut frame = codec().encode_ping(42);
        set_byte_and_recrc(&mut frame, IDX_TTL, 1);

        assert!(decrement_ttl_increment_hop_and_recompute(&mut frame));
        assert_eq!(ttl(&frame), Some(0));
        assert_eq!(hop_count(&frame), Some(1));
        assert!(crc_valid(&frame));

        let before = frame;
        assert!(!decrement_ttl_increment_hop_and_recompute(&mut frame));
        assert_eq!(frame, before);
    }

    #[test]
    fn test_relay_rewrite_refuses_bad_crc() {
        let mut frame = codec().encode_ping(42);
        frame[IDX_BOOT] ^= 0xFF;
        let before = frame;
        assert!(!decrement_ttl_increment_hop_and_recompute(&mut frame));
        assert_eq!(frame, before);
    }

    #[test]
    fn test_single_byte_mutation_breaks_crc() {
        let mut out = [0u8; MAX_FRAME_LEN];
        let len = codec()
            .encode_report(3, NodeId::SCANNER, &[433], StatusFlags(1), 2, &mut out)
            .unwrap();
        for idx in 0..len {
            let mut frame = out;
            frame[idx] ^= 0x5A;
            assert!(!crc_valid(&frame[..len]), "mutation at {} went undetected", idx);
        }
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_encoded_report_has_valid_crc(
                seq in any::<u16>(),
                freqs in proptest::collection::vec(1u16.., 0..8),
                flags in any::<u8>(),
                age in any::<u16>(),
            ) {
                let mut out = [0u8; MAX_FRAME_LEN];
                let len = codec()
                    .encode_report(seq, NodeId::SCANNER, &freqs, StatusFlags(flags), age, &mut out)
                    .unwrap();
                prop_assert!(crc_valid(&out[..len]));
            }

            #[test]
            fn prop_any_single_byte_change_is_detected(
                seq in any::<u16>(),
                idx in 0usize..PING_FRAME_LEN,
                delta in 1u8..=255,
            ) {
                let mut frame = codec().encode_ping(seq);
                frame[idx] ^= delta;
                prop_assert!(!crc_valid(&frame));
            }
        }
    }
}
