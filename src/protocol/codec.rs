use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use crate::core::{EncodeError, Error};
use super::frame::{MAX_FRAME_LEN, MIN_FRAME_LEN};

/// Stream codec framing radio frames with a one-byte length prefix
///
/// This is the form frames take on a serial bridge to a modem. Lengths
/// outside `MIN_FRAME_LEN..=MAX_FRAME_LEN` are skipped one byte at a time
/// until a plausible prefix is found. The frame body is passed through
/// untouched; CRC validation is left to the caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct FrameStreamCodec;

impl FrameStreamCodec {
    /// Creates a new frame stream codec
    pub fn new() -> Self {
        FrameStreamCodec
    }
}

fn check_len(len: usize) -> bool {
    (MIN_FRAME_LEN..=MAX_FRAME_LEN).contains(&len)
}

impl Decoder for FrameStreamCodec {
    type Item = Bytes;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let mut skipped = 0usize;
        while let Some(&prefix) = src.first() {
            if check_len(prefix as usize) {
                break;
            }
            src.advance(1);
            skipped += 1;
        }
        if skipped > 0 {
            warn!(skipped, "skipped bad length prefix bytes");
        }
        if src.is_empty() {
            return Ok(None);
        }

        let length = src[0] as usize;
        if src.len() < 1 + length {
            src.reserve(1 + length - src.len());
            return Ok(None);
        }

        src.advance(1);
        Ok(Some(src.split_to(length).freeze()))
    }
}

impl Encoder<&[u8]> for FrameStreamCodec {
    type Error = Error;

    fn encode(&mut self, item: &[u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        if !check_len(item.len()) {
            return Err(EncodeError::InvalidFrameLength(item.len()).into());
        }

        dst.reserve(1 + item.len());
        dst.put_u8(item.len() as u8);
        dst.extend_from_slice(item);
        Ok(())
    }
}

impl Encoder<Bytes> for FrameStreamCodec {
    type Error = Error;

    fn encode(&mut self, item: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        <Self as Encoder<&[u8]>>::encode(self, &item[..], dst)
    }
}
