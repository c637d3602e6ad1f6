//! Keyed argument messages.
//!
//! A [`Message`] is a flat map from signed argument keys to values drawn from a
//! small closed catalog ([`Value`]). Aggregates nest as sub-messages. Keys `>= 0`
//! carry payload (struct member tags, argument positions, array indices); negative
//! keys are reserved for protocol control metadata (see [`keys`]).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Argument key inside a message.
pub type ArgKey = i32;

/// Reserved argument keys.
pub mod keys {
    use super::ArgKey;

    /// Primary return value of a reply.
    pub const RETURN_VALUE: ArgKey = 0;

    /// Element count of a variable-length array sub-message.
    pub const ARRAY_COUNT: ArgKey = 0;

    /// Set on every outbound call that participates in an already open transaction.
    pub const RESPONSE_FLAG: ArgKey = -1;

    /// Token of the thread that sent the message (other-threads channel only).
    pub const SENDER_THREAD: ArgKey = -2;

    /// Token of the remote thread the message is addressed to (other-threads channel only).
    pub const RECEIVER_THREAD: ArgKey = -3;

    /// Whether `key` is reserved for protocol control metadata.
    pub const fn is_control(key: ArgKey) -> bool {
        key < 0
    }
}

/// Identifier of a message on the wire.
///
/// `0` marks a reply. Every other value identifies a bootstrap operation, a remote
/// interface method or an application-defined custom message.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(pub i32);

impl MessageId {
    /// The reply message id.
    pub const REPLY: MessageId = MessageId(0);

    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    pub const fn is_reply(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_reply() {
            write!(f, "MessageId(reply)")
        } else {
            write!(f, "MessageId({})", self.0)
        }
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for MessageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

/// A single argument value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Int32(i32),
    Int64(i64),
    Size(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Message(Message),
}

impl Value {
    fn kind(&self) -> &'static str {
        match self {
            Value::Int32(_) => "int32",
            Value::Int64(_) => "int64",
            Value::Size(_) => "size",
            Value::Float(_) => "float",
            Value::Double(_) => "double",
            Value::String(_) => "string",
            Value::Bytes(_) => "bytes",
            Value::Message(_) => "message",
        }
    }
}

/// Keyed argument container shared by encoder and decoder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    args: BTreeMap<ArgKey, Value>,
}

impl Message {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of arguments, control keys included.
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether the message carries no argument at all.
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Whether the message carries no payload argument (control keys are ignored).
    pub fn has_payload(&self) -> bool {
        self.args.keys().any(|&key| !keys::is_control(key))
    }

    pub fn get(&self, key: ArgKey) -> Option<&Value> {
        self.args.get(&key)
    }

    pub fn contains_key(&self, key: ArgKey) -> bool {
        self.args.contains_key(&key)
    }

    /// Payload keys in ascending order.
    pub fn payload_keys(&self) -> impl Iterator<Item = ArgKey> + '_ {
        self.args.keys().copied().filter(|&key| !keys::is_control(key))
    }

    fn insert(&mut self, key: ArgKey, value: Value) {
        let previous = self.args.insert(key, value);
        debug_assert!(previous.is_none(), "argument key {} appended twice", key);
    }
}

// =============================================================================
// Encoder
// =============================================================================

/// Builds an outgoing message argument by argument.
#[derive(Debug, Clone, Default)]
pub struct MessageEncoder {
    message: Message,
}

impl MessageEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append_int32(&mut self, key: ArgKey, value: i32) {
        self.message.insert(key, Value::Int32(value));
    }

    pub fn append_int64(&mut self, key: ArgKey, value: i64) {
        self.message.insert(key, Value::Int64(value));
    }

    pub fn append_size(&mut self, key: ArgKey, value: u64) {
        self.message.insert(key, Value::Size(value));
    }

    pub fn append_float(&mut self, key: ArgKey, value: f32) {
        self.message.insert(key, Value::Float(value));
    }

    pub fn append_double(&mut self, key: ArgKey, value: f64) {
        self.message.insert(key, Value::Double(value));
    }

    pub fn append_string(&mut self, key: ArgKey, value: &str) {
        self.message.insert(key, Value::String(value.to_owned()));
    }

    /// Append a raw byte blob by copying it.
    pub fn append_bytes(&mut self, key: ArgKey, bytes: &[u8]) {
        self.message.insert(key, Value::Bytes(bytes.to_vec()));
    }

    /// Append a raw byte blob, taking ownership of the buffer instead of copying.
    pub fn append_bytes_owned(&mut self, key: ArgKey, bytes: Vec<u8>) {
        self.message.insert(key, Value::Bytes(bytes));
    }

    /// Append an already built sub-message.
    pub fn append_sub_message(&mut self, key: ArgKey, sub: MessageEncoder) {
        self.message.insert(key, Value::Message(sub.message));
    }

    /// Build a sub-message in place.
    pub fn encode_sub_message<F>(&mut self, key: ArgKey, build: F)
    where
        F: FnOnce(&mut MessageEncoder),
    {
        let mut sub = MessageEncoder::new();
        build(&mut sub);
        self.append_sub_message(key, sub);
    }

    /// Mark this message as participating in an already open transaction.
    pub fn append_response_flag(&mut self) {
        self.append_int32(keys::RESPONSE_FLAG, 1);
    }

    /// Append an opaque thread token under one of the thread control keys.
    pub fn append_thread_token(&mut self, key: ArgKey, token: u64) {
        debug_assert!(keys::is_control(key));
        self.append_size(key, token);
    }

    /// Whether nothing has been appended (control keys are ignored).
    pub fn is_empty(&self) -> bool {
        !self.message.has_payload()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }
}

impl From<MessageEncoder> for Message {
    fn from(encoder: MessageEncoder) -> Self {
        encoder.message
    }
}

// =============================================================================
// Decoder
// =============================================================================

/// Reads the arguments of a received message.
///
/// Readers return `None` both for absent keys and for keys holding a value of a
/// different kind; the latter is logged since it means the peers disagree about
/// the shape of a call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageDecoder {
    message: Message,
}

macro_rules! read_scalar {
    ($name:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self, key: ArgKey) -> Option<$ty> {
            match self.message.get(key)? {
                Value::$variant(v) => Some(*v),
                other => self.mismatch(key, stringify!($variant), other),
            }
        }
    };
}

impl MessageDecoder {
    pub fn new(message: Message) -> Self {
        Self { message }
    }

    read_scalar!(read_int32, Int32, i32);
    read_scalar!(read_int64, Int64, i64);
    read_scalar!(read_size, Size, u64);
    read_scalar!(read_float, Float, f32);
    read_scalar!(read_double, Double, f64);

    pub fn read_string(&self, key: ArgKey) -> Option<&str> {
        match self.message.get(key)? {
            Value::String(s) => Some(s.as_str()),
            other => self.mismatch(key, "String", other),
        }
    }

    /// Size in bytes of the blob stored at `key`.
    pub fn read_bytes_size(&self, key: ArgKey) -> Option<usize> {
        self.read_bytes_slice(key).map(<[u8]>::len)
    }

    /// Copy the blob stored at `key` into `out`, returning the number of bytes copied.
    ///
    /// Copies at most `out.len()` bytes.
    pub fn read_bytes(&self, key: ArgKey, out: &mut [u8]) -> Option<usize> {
        let bytes = self.read_bytes_slice(key)?;
        let len = bytes.len().min(out.len());
        out[..len].copy_from_slice(&bytes[..len]);
        Some(len)
    }

    pub fn read_bytes_slice(&self, key: ArgKey) -> Option<&[u8]> {
        match self.message.get(key)? {
            Value::Bytes(b) => Some(b.as_slice()),
            other => self.mismatch(key, "Bytes", other),
        }
    }

    pub fn read_sub_message(&self, key: ArgKey) -> Option<MessageDecoder> {
        match self.message.get(key)? {
            Value::Message(m) => Some(MessageDecoder::new(m.clone())),
            other => self.mismatch(key, "Message", other),
        }
    }

    pub fn has_data_for_key(&self, key: ArgKey) -> bool {
        self.message.contains_key(key)
    }

    /// Whether the message carries no payload (control keys are ignored).
    pub fn is_empty(&self) -> bool {
        !self.message.has_payload()
    }

    /// Whether the sender marked this message as part of an already open transaction.
    pub fn is_response(&self) -> bool {
        self.read_int32(keys::RESPONSE_FLAG).unwrap_or(0) != 0
    }

    pub fn read_thread_token(&self, key: ArgKey) -> Option<u64> {
        debug_assert!(keys::is_control(key));
        self.read_size(key)
    }

    /// Number of payload arguments.
    pub fn payload_len(&self) -> usize {
        self.message.payload_keys().count()
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    fn mismatch<T>(&self, key: ArgKey, expected: &str, found: &Value) -> Option<T> {
        tracing::warn!(
            "argument {} holds {} where {} was expected",
            key,
            found.kind(),
            expected
        );
        None
    }
}

impl From<MessageEncoder> for MessageDecoder {
    fn from(encoder: MessageEncoder) -> Self {
        Self::new(encoder.into_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_id_reply() {
        assert!(MessageId::REPLY.is_reply());
        assert!(!MessageId::new(7).is_reply());
        assert_eq!(format!("{:?}", MessageId::REPLY), "MessageId(reply)");
    }

    #[test]
    fn test_scalar_roundtrip_through_decoder() {
        let mut encoder = MessageEncoder::new();
        encoder.append_int32(0, -5);
        encoder.append_int64(1, i64::MAX);
        encoder.append_size(2, 42);
        encoder.append_float(3, 0.5);
        encoder.append_double(4, 44100.0);
        encoder.append_string(5, "hello");

        let decoder = MessageDecoder::from(encoder);
        assert_eq!(decoder.read_int32(0), Some(-5));
        assert_eq!(decoder.read_int64(1), Some(i64::MAX));
        assert_eq!(decoder.read_size(2), Some(42));
        assert_eq!(decoder.read_float(3), Some(0.5));
        assert_eq!(decoder.read_double(4), Some(44100.0));
        assert_eq!(decoder.read_string(5), Some("hello"));
        assert_eq!(decoder.payload_len(), 6);
    }

    #[test]
    fn test_missing_key_is_not_found() {
        let decoder = MessageDecoder::default();
        assert_eq!(decoder.read_int32(3), None);
        assert!(decoder.read_sub_message(3).is_none());
        assert!(!decoder.has_data_for_key(3));
    }

    #[test]
    fn test_kind_mismatch_reads_as_absent() {
        let mut encoder = MessageEncoder::new();
        encoder.append_double(0, 1.0);
        let decoder = MessageDecoder::from(encoder);
        assert_eq!(decoder.read_int32(0), None);
        assert!(decoder.has_data_for_key(0));
    }

    #[test]
    fn test_bytes_copy_is_clipped() {
        let mut encoder = MessageEncoder::new();
        encoder.append_bytes_owned(0, vec![1, 2, 3, 4, 5]);
        let decoder = MessageDecoder::from(encoder);

        assert_eq!(decoder.read_bytes_size(0), Some(5));
        let mut small = [0u8; 3];
        assert_eq!(decoder.read_bytes(0, &mut small), Some(3));
        assert_eq!(small, [1, 2, 3]);
    }

    #[test]
    fn test_control_keys_are_not_payload() {
        let mut encoder = MessageEncoder::new();
        encoder.append_response_flag();
        encoder.append_thread_token(keys::SENDER_THREAD, 9);
        assert!(encoder.is_empty());

        let decoder = MessageDecoder::from(encoder);
        assert!(decoder.is_empty());
        assert!(decoder.is_response());
        assert_eq!(decoder.read_thread_token(keys::SENDER_THREAD), Some(9));
        assert_eq!(decoder.read_thread_token(keys::RECEIVER_THREAD), None);
    }

    #[test]
    fn test_nested_sub_message() {
        let mut encoder = MessageEncoder::new();
        encoder.encode_sub_message(2, |sub| {
            sub.append_int32(0, 11);
            sub.encode_sub_message(1, |inner| inner.append_string(0, "deep"));
        });

        let decoder = MessageDecoder::from(encoder);
        let sub = decoder.read_sub_message(2).unwrap();
        assert_eq!(sub.read_int32(0), Some(11));
        let inner = sub.read_sub_message(1).unwrap();
        assert_eq!(inner.read_string(0), Some("deep"));
    }
}
