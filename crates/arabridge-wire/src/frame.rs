//! Frame codec: one message id plus its arguments per frame.
//!
//! Frames are serialized with bincode. Stream transports prefix each frame with its
//! length as a big-endian `u32`.

use crate::error::{Result, WireError};
use crate::message::{Message, MessageDecoder, MessageEncoder, MessageId};
use serde::{Deserialize, Serialize};

/// Largest frame accepted from a peer.
pub const MAX_FRAME_SIZE: usize = 64 * 1024 * 1024;

#[derive(Serialize, Deserialize)]
struct Frame {
    id: MessageId,
    message: Message,
}

#[derive(Serialize)]
struct FrameRef<'a> {
    id: MessageId,
    message: &'a Message,
}

/// Serialize an outgoing message into a frame.
pub fn encode_frame(id: MessageId, encoder: &MessageEncoder) -> Result<Vec<u8>> {
    let data = bincode::serialize(&FrameRef {
        id,
        message: encoder.message(),
    })?;
    if data.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(data)
}

/// Deserialize a received frame.
pub fn decode_frame(data: &[u8]) -> Result<(MessageId, MessageDecoder)> {
    if data.len() > MAX_FRAME_SIZE {
        return Err(WireError::FrameTooLarge {
            size: data.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    let frame: Frame = bincode::deserialize(data)?;
    Ok((frame.id, MessageDecoder::new(frame.message)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let mut encoder = MessageEncoder::new();
        encoder.append_int32(0, 17);
        encoder.append_string(1, "document");
        encoder.encode_sub_message(2, |sub| sub.append_double(0, 2.5));

        let data = encode_frame(MessageId::new(42), &encoder).unwrap();
        let (id, decoder) = decode_frame(&data).unwrap();

        assert_eq!(id, MessageId::new(42));
        assert_eq!(decoder.read_int32(0), Some(17));
        assert_eq!(decoder.read_string(1), Some("document"));
        assert_eq!(
            decoder.read_sub_message(2).unwrap().read_double(0),
            Some(2.5)
        );
    }

    #[test]
    fn test_two_decoders_over_same_bytes_agree() {
        let mut encoder = MessageEncoder::new();
        encoder.append_bytes(0, &[9, 8, 7]);
        encoder.append_float(1, 0.25);
        let data = encode_frame(MessageId::REPLY, &encoder).unwrap();

        let (id_a, a) = decode_frame(&data).unwrap();
        let (id_b, b) = decode_frame(&data).unwrap();
        assert_eq!(id_a, id_b);
        assert_eq!(a, b);
    }

    #[test]
    fn test_garbage_frame_is_an_error() {
        assert!(matches!(
            decode_frame(&[0xff, 0xff, 0xff]),
            Err(WireError::Serialization(_))
        ));
    }
}
