//! Tag-length-value records carried in frame payloads

use crate::core::DecodeError;

/// Sequential TLV writer over a pre-sized buffer
///
/// The caller sizes the buffer before writing; every method indexes directly.
pub struct TlvWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> TlvWriter<'a> {
    pub fn new(buf: &'a mut [u8], start: usize) -> Self {
        TlvWriter { buf, pos: start }
    }

    /// Writes tag and length bytes
    pub fn record(&mut self, tag: u8, len: u8) -> &mut Self {
        self.u8(tag).u8(len)
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf[self.pos] = value;
        self.pos += 1;
        self
    }

    pub fn u16_le(&mut self, value: u16) -> &mut Self {
        let [lo, hi] = value.to_le_bytes();
        self.u8(lo).u8(hi)
    }

    /// Index of the next byte to be written
    pub fn position(&self) -> usize {
        self.pos
    }
}

/// One decoded TLV record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
}

/// Iterates the TLV records of a payload
pub struct TlvReader<'a> {
    payload: &'a [u8],
}

impl<'a> TlvReader<'a> {
    pub fn new(payload: &'a [u8]) -> Self {
        TlvReader { payload }
    }
}

impl<'a> Iterator for TlvReader<'a> {
    type Item = Result<Tlv<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        let payload: &'a [u8] = self.payload;
        match payload {
            [] => None,
            [tag, len, rest @ ..] if rest.len() >= *len as usize => {
                let (value, remaining) = rest.split_at(*len as usize);
                self.payload = remaining;
                Some(Ok(Tlv { tag: *tag, value }))
            }
            _ => {
                // Truncated record: stop after reporting it
                self.payload = &[];
                Some(Err(DecodeError::MalformedPayload))
            }
        }
    }
}
