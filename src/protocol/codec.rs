use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::core::Error;
use super::crc::checksum;
use super::message::Message;
use super::{FRAME_OVERHEAD, FRAME_START, MAX_FRAME_SIZE, MAX_PAYLOAD_SIZE};

/// Accessory frame codec.
///
/// Wire format:
/// ```text
/// ┌───────┬────────┬──────┬─────────┬─────────────┬──────────────┐
/// │ 0x01  │ length │ type │ options │ payload (N) │ checksum (2) │
/// └───────┴────────┴──────┴─────────┴─────────────┴──────────────┘
/// ```
/// `length` counts the whole frame. The checksum covers everything before
/// it and is sent low byte first. Frames failing the checksum are dropped
/// and decoding resumes at the next start marker.
#[derive(Clone, Default)]
pub struct WatchCodec {
    dropped: u64,
}

impl WatchCodec {
    /// Creates a new message codec
    pub fn new() -> Self {
        WatchCodec { dropped: 0 }
    }

    /// Number of frames discarded because of corruption
    pub fn dropped_frames(&self) -> u64 {
        self.dropped
    }
}

/// Checks the trailing checksum of a complete frame
pub fn verify_frame(frame: &[u8]) -> Result<(), Error> {
    let split = frame.len().saturating_sub(2);
    let (body, trailer) = frame.split_at(split);
    let expected = checksum(body);
    let received = match trailer {
        [lo, hi] => u16::from_le_bytes([*lo, *hi]),
        _ => return Err(Error::protocol("frame shorter than its checksum")),
    };
    if expected != received {
        return Err(Error::FrameIntegrity { expected, received });
    }
    Ok(())
}

impl Decoder for WatchCodec {
    type Item = Message;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Resynchronise on the next start marker
            match src.iter().position(|&b| b == FRAME_START) {
                Some(offset) => src.advance(offset),
                None => {
                    src.clear();
                    return Ok(None);
                }
            }

            if src.len() < 2 {
                return Ok(None);
            }

            let length = src[1] as usize;
            if !(FRAME_OVERHEAD..=MAX_FRAME_SIZE).contains(&length) {
                // Not a frame start after all
                src.advance(1);
                continue;
            }

            if src.len() < length {
                src.reserve(length - src.len());
                return Ok(None);
            }

            if let Err(e) = verify_frame(&src[..length]) {
                self.dropped += 1;
                debug!(error = %e, "dropping corrupt frame");
                src.advance(1);
                continue;
            }

            let mut frame = src.split_to(length);
            frame.advance(2);
            let msg_type = frame.get_u8();
            let options = frame.get_u8();
            frame.truncate(frame.len() - 2);

            return Ok(Some(Message {
                msg_type,
                options,
                payload: frame.freeze(),
            }));
        }
    }
}

impl Encoder<Message> for WatchCodec {
    type Error = Error;

    fn encode(&mut self, item: Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if item.payload.len() > MAX_PAYLOAD_SIZE {
            return Err(Error::PayloadTooLarge {
                len: item.payload.len(),
                max: MAX_PAYLOAD_SIZE,
            });
        }

        let length = item.payload.len() + FRAME_OVERHEAD;
        dst.reserve(length);

        let start = dst.len();
        dst.put_u8(FRAME_START);
        dst.put_u8(length as u8);
        dst.put_u8(item.msg_type);
        dst.put_u8(item.options);
        dst.extend_from_slice(&item.payload);

        let crc = checksum(&dst[start..]);
        dst.put_u16_le(crc);

        Ok(())
    }
}

/// Encodes a single message into a standalone frame
pub fn encode_frame(message: Message) -> Result<Bytes, Error> {
    let mut buf = BytesMut::with_capacity(MAX_FRAME_SIZE);
    WatchCodec::new().encode(message, &mut buf)?;
    Ok(buf.freeze())
}
