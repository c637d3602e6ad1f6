//! Value codec: per-type encode/decode rules on top of [`MessageEncoder`]/[`MessageDecoder`].
//!
//! - Scalars map onto the closed [`Value`](crate::Value) catalog.
//! - Aggregates are sub-messages keyed by explicit member tags
//!   ([`compound_struct!`](crate::compound_struct)).
//! - Versioned aggregates carry a `struct_size` discriminator counted in members; an
//!   addendum member with tag `t` is only sent when `struct_size > t`
//!   ([`versioned_struct!`](crate::versioned_struct)).
//! - Variable arrays are sub-messages with the element count at key 0 and the
//!   elements at keys `1..=N`; fixed arrays store element `i` at key `i`.
//! - `Option<T>` is present/absent; [`RawBytes`] bypasses per-element keying.

use crate::error::{Result, WireError};
use crate::message::{keys, ArgKey, MessageDecoder, MessageEncoder};

/// Types that can be written as one argument of a message.
pub trait Encode {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder);
}

/// Types that can be read back from one argument of a message.
///
/// Returns `None` when the key is absent or malformed.
pub trait Decode: Sized {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self>;
}

/// Decode an argument the caller cannot do without.
pub fn decode_required<T: Decode>(key: ArgKey, decoder: &MessageDecoder) -> Result<T> {
    T::decode(key, decoder).ok_or(WireError::MissingArgument { key })
}

impl<T: Encode + ?Sized> Encode for &T {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        (**self).encode(key, encoder);
    }
}

impl Encode for i32 {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_int32(key, *self);
    }
}

impl Decode for i32 {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_int32(key)
    }
}

impl Encode for i64 {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_int64(key, *self);
    }
}

impl Decode for i64 {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_int64(key)
    }
}

impl Encode for u64 {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_size(key, *self);
    }
}

impl Decode for u64 {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_size(key)
    }
}

impl Encode for usize {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_size(key, *self as u64);
    }
}

impl Decode for usize {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_size(key).and_then(|v| usize::try_from(v).ok())
    }
}

impl Encode for u8 {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_int32(key, i32::from(*self));
    }
}

impl Decode for u8 {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_int32(key).and_then(|v| u8::try_from(v).ok())
    }
}

impl Encode for bool {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_int32(key, i32::from(*self));
    }
}

impl Decode for bool {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_int32(key).map(|v| v != 0)
    }
}

impl Encode for f32 {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_float(key, *self);
    }
}

impl Decode for f32 {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_float(key)
    }
}

impl Encode for f64 {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_double(key, *self);
    }
}

impl Decode for f64 {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_double(key)
    }
}

impl Encode for str {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_string(key, self);
    }
}

impl Encode for String {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_string(key, self);
    }
}

impl Decode for String {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_string(key).map(str::to_owned)
    }
}

/// Opaque byte blob (archives, channel arrangements, custom payloads).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBytes(pub Vec<u8>);

impl RawBytes {
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for RawBytes {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl Encode for RawBytes {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.append_bytes(key, &self.0);
    }
}

impl Decode for RawBytes {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        decoder.read_bytes_slice(key).map(|b| RawBytes(b.to_vec()))
    }
}

/// Optional values (nullable pointers in the plug-in API) are simply omitted when `None`.
impl<T: Encode> Encode for Option<T> {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        if let Some(value) = self {
            value.encode(key, encoder);
        }
    }
}

/// Absent decodes as `Some(None)`; present but malformed fails.
impl<T: Decode> Decode for Option<T> {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        if !decoder.has_data_for_key(key) {
            return Some(None);
        }
        T::decode(key, decoder).map(Some)
    }
}

impl<T: Encode> Encode for [T] {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.encode_sub_message(key, |sub| {
            sub.append_size(keys::ARRAY_COUNT, self.len() as u64);
            for (i, item) in self.iter().enumerate() {
                item.encode(i as ArgKey + 1, sub);
            }
        });
    }
}

impl<T: Encode> Encode for Vec<T> {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        self.as_slice().encode(key, encoder);
    }
}

impl<T: Decode> Decode for Vec<T> {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        let sub = decoder.read_sub_message(key)?;
        let count = usize::decode(keys::ARRAY_COUNT, &sub)?;
        (1..=count)
            .map(|i| T::decode(i as ArgKey, &sub))
            .collect()
    }
}

impl<T: Encode, const N: usize> Encode for [T; N] {
    fn encode(&self, key: ArgKey, encoder: &mut MessageEncoder) {
        encoder.encode_sub_message(key, |sub| {
            for (i, item) in self.iter().enumerate() {
                item.encode(i as ArgKey, sub);
            }
        });
    }
}

impl<T: Decode, const N: usize> Decode for [T; N] {
    fn decode(key: ArgKey, decoder: &MessageDecoder) -> Option<Self> {
        let sub = decoder.read_sub_message(key)?;
        let items: Vec<T> = (0..N)
            .map(|i| T::decode(i as ArgKey, &sub))
            .collect::<Option<_>>()?;
        items.try_into().ok()
    }
}

/// Decode a variable array into a caller-provided buffer.
///
/// Returns the number of elements written. When the received count exceeds
/// `out.len()` the result is clipped to the buffer and `success` is cleared; a
/// missing element also clears `success`. An absent array writes nothing and
/// clears `success`.
pub fn decode_array_into<T: Decode>(
    key: ArgKey,
    decoder: &MessageDecoder,
    out: &mut [T],
    success: &mut bool,
) -> usize {
    let Some(sub) = decoder.read_sub_message(key) else {
        *success = false;
        return 0;
    };
    let Some(count) = usize::decode(keys::ARRAY_COUNT, &sub) else {
        *success = false;
        return 0;
    };
    if count > out.len() {
        *success = false;
    }
    decode_elements(&sub, 1, count.min(out.len()), out, success)
}

/// Decode a fixed array into a caller-provided buffer, clipping like [`decode_array_into`].
pub fn decode_fixed_array_into<T: Decode>(
    key: ArgKey,
    decoder: &MessageDecoder,
    out: &mut [T],
    success: &mut bool,
) -> usize {
    let Some(sub) = decoder.read_sub_message(key) else {
        *success = false;
        return 0;
    };
    let count = sub.payload_len();
    if count > out.len() {
        *success = false;
    }
    decode_elements(&sub, 0, count.min(out.len()), out, success)
}

fn decode_elements<T: Decode>(
    sub: &MessageDecoder,
    first_key: ArgKey,
    count: usize,
    out: &mut [T],
    success: &mut bool,
) -> usize {
    let mut written = 0;
    for (i, slot) in out.iter_mut().take(count).enumerate() {
        match T::decode(first_key + i as ArgKey, sub) {
            Some(value) => {
                *slot = value;
                written += 1;
            }
            None => {
                *success = false;
                break;
            }
        }
    }
    written
}

/// Implement [`Encode`]/[`Decode`] for a struct whose members all travel every time.
///
/// Each member is listed with its explicit, stable tag.
///
/// ```ignore
/// compound_struct!(ContentTimeRange { start: 0, duration: 1 });
/// ```
#[macro_export]
macro_rules! compound_struct {
    ($ty:ident { $($field:ident : $tag:expr),* $(,)? }) => {
        impl $crate::codec::Encode for $ty {
            fn encode(&self, key: $crate::ArgKey, encoder: &mut $crate::MessageEncoder) {
                encoder.encode_sub_message(key, |_sub| {
                    $( $crate::codec::Encode::encode(&self.$field, $tag, _sub); )*
                });
            }
        }

        impl $crate::codec::Decode for $ty {
            fn decode(key: $crate::ArgKey, decoder: &$crate::MessageDecoder) -> Option<Self> {
                let _sub = decoder.read_sub_message(key)?;
                Some(Self {
                    $( $field: $crate::codec::Decode::decode($tag, &_sub)?, )*
                })
            }
        }
    };
}

/// Implement [`Encode`]/[`Decode`] for a struct with a `struct_size: usize` discriminator.
///
/// `min_size` is the discriminator of the oldest supported layout (all members listed
/// before `addendum`), `size` the discriminator of the current layout. An addendum
/// member with tag `t` is encoded only when the sender's `struct_size > t`; when it is
/// absent from a received message it takes the listed default, and the decoded
/// `struct_size` only grows past a tag whose member was actually present.
///
/// ```ignore
/// versioned_struct!(MusicalContextProperties, min_size = 1, size = 3, {
///     name: 0,
/// } addendum {
///     order_index: 1 => 0,
///     color: 2 => None,
/// });
/// ```
#[macro_export]
macro_rules! versioned_struct {
    (
        $ty:ident, min_size = $min:expr, size = $size:expr, {
            $($field:ident : $tag:expr),* $(,)?
        } addendum {
            $($afield:ident : $atag:expr => $default:expr),* $(,)?
        }
    ) => {
        impl $ty {
            /// Discriminator of the oldest layout this build still reads.
            pub const MIN_STRUCT_SIZE: usize = $min;
            /// Discriminator of the layout this build writes.
            pub const STRUCT_SIZE: usize = $size;

            /// Whether the member with `tag` is populated according to `struct_size`.
            pub fn implements_member(&self, tag: $crate::ArgKey) -> bool {
                tag >= 0 && self.struct_size > tag as usize
            }
        }

        impl $crate::codec::Encode for $ty {
            fn encode(&self, key: $crate::ArgKey, encoder: &mut $crate::MessageEncoder) {
                encoder.encode_sub_message(key, |sub| {
                    $( $crate::codec::Encode::encode(&self.$field, $tag, sub); )*
                    $(
                        if self.implements_member($atag) {
                            $crate::codec::Encode::encode(&self.$afield, $atag, sub);
                        }
                    )*
                });
            }
        }

        impl $crate::codec::Decode for $ty {
            fn decode(key: $crate::ArgKey, decoder: &$crate::MessageDecoder) -> Option<Self> {
                let sub = decoder.read_sub_message(key)?;
                #[allow(unused_mut)]
                let mut struct_size: usize = $min;
                $( let $field = $crate::codec::Decode::decode($tag, &sub)?; )*
                $(
                    let $afield = if sub.has_data_for_key($atag) {
                        let value = $crate::codec::Decode::decode($atag, &sub)?;
                        struct_size = struct_size.max($atag as usize + 1);
                        value
                    } else {
                        $default
                    };
                )*
                Some(Self {
                    struct_size,
                    $( $field, )*
                    $( $afield, )*
                })
            }
        }
    };
}
