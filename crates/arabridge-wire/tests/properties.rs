//! Property tests for the value codec and the frame codec.

use arabridge_wire::codec::{Decode, Encode, RawBytes};
use arabridge_wire::payload::{Color, ContentNote, MusicalContextProperties};
use arabridge_wire::{decode_frame, encode_frame, MessageDecoder, MessageEncoder, MessageId};
use proptest::prelude::*;

fn encode_at_zero<T: Encode>(value: &T) -> MessageEncoder {
    let mut encoder = MessageEncoder::new();
    value.encode(0, &mut encoder);
    encoder
}

fn color() -> impl Strategy<Value = Color> {
    (0.0f32..=1.0, 0.0f32..=1.0, 0.0f32..=1.0).prop_map(|(r, g, b)| Color { r, g, b })
}

fn note() -> impl Strategy<Value = ContentNote> {
    (
        20.0f32..20_000.0,
        0i32..128,
        0.0f32..=1.0,
        -1.0e6f64..1.0e6,
        0.0f64..10.0,
        0.0f64..100.0,
        0.0f64..100.0,
    )
        .prop_map(
            |(frequency, pitch_number, volume, start_position, attack_duration, note_duration, signal_duration)| {
                ContentNote {
                    frequency,
                    pitch_number,
                    volume,
                    start_position,
                    attack_duration,
                    note_duration,
                    signal_duration,
                }
            },
        )
}

fn musical_context() -> impl Strategy<Value = MusicalContextProperties> {
    (
        MusicalContextProperties::MIN_STRUCT_SIZE..=MusicalContextProperties::STRUCT_SIZE,
        proptest::option::of("[a-zA-Z ]{0,16}"),
        any::<i32>(),
        proptest::option::of(color()),
    )
        .prop_map(|(struct_size, name, order_index, color)| MusicalContextProperties {
            struct_size,
            name,
            order_index,
            color,
        })
}

proptest! {
    #[test]
    fn notes_roundtrip(notes in proptest::collection::vec(note(), 0..32)) {
        let decoder = MessageDecoder::from(encode_at_zero(&notes));
        prop_assert_eq!(Vec::<ContentNote>::decode(0, &decoder), Some(notes));
    }

    #[test]
    fn raw_bytes_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
        let blob = RawBytes(bytes);
        let decoder = MessageDecoder::from(encode_at_zero(&blob));
        prop_assert_eq!(RawBytes::decode(0, &decoder), Some(blob));
    }

    #[test]
    fn versioned_members_follow_struct_size(props in musical_context()) {
        let decoder = MessageDecoder::from(encode_at_zero(&props));
        let decoded = MusicalContextProperties::decode(0, &decoder).unwrap();

        prop_assert_eq!(&decoded.name, &props.name);
        if props.struct_size > 1 {
            prop_assert_eq!(decoded.order_index, props.order_index);
        } else {
            prop_assert_eq!(decoded.order_index, 0);
        }
        if props.struct_size > 2 {
            prop_assert_eq!(decoded.color, props.color);
        } else {
            prop_assert_eq!(decoded.color, None);
        }
        prop_assert!(decoded.struct_size <= props.struct_size);
    }

    #[test]
    fn frame_decode_is_idempotent(id in any::<i32>(), notes in proptest::collection::vec(note(), 0..8)) {
        let bytes = encode_frame(MessageId(id), &encode_at_zero(&notes)).unwrap();
        let (first_id, first) = decode_frame(&bytes).unwrap();
        let (second_id, second) = decode_frame(&bytes).unwrap();

        prop_assert_eq!(first_id, MessageId(id));
        prop_assert_eq!(first_id, second_id);
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(Vec::<ContentNote>::decode(0, &first), Some(notes));
    }
}
