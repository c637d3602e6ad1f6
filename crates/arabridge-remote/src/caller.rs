//! Typed remote calls.

use crate::error::Result;
use crate::method_id::Describe;
use arabridge_ipc::Connection;
use arabridge_wire::codec::{Decode, Encode};
use arabridge_wire::{keys, MessageDecoder, MessageEncoder, MessageId};
use std::sync::Arc;

/// Call arguments, encoded at keys `0..n` in order.
pub trait EncodeArgs {
    fn encode_args(&self, encoder: &mut MessageEncoder);
}

/// Call arguments as decoded by the callee.
pub trait DecodeArgs: Sized {
    fn decode_args(decoder: &MessageDecoder) -> Option<Self>;
}

impl EncodeArgs for () {
    fn encode_args(&self, _encoder: &mut MessageEncoder) {}
}

impl DecodeArgs for () {
    fn decode_args(_decoder: &MessageDecoder) -> Option<Self> {
        Some(())
    }
}

macro_rules! impl_args {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Encode),+> EncodeArgs for ($($name,)+) {
            fn encode_args(&self, encoder: &mut MessageEncoder) {
                $( self.$index.encode($index, encoder); )+
            }
        }

        impl<$($name: Decode),+> DecodeArgs for ($($name,)+) {
            fn decode_args(decoder: &MessageDecoder) -> Option<Self> {
                Some(($( $name::decode($index, decoder)?, )+))
            }
        }
    };
}

impl_args!(A: 0);
impl_args!(A: 0, B: 1);
impl_args!(A: 0, B: 1, C: 2);
impl_args!(A: 0, B: 1, C: 2, D: 3);
impl_args!(A: 0, B: 1, C: 2, D: 3, E: 4);
impl_args!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

/// Encode `args` into a fresh message.
pub fn encode_args(args: &impl EncodeArgs) -> MessageEncoder {
    let mut encoder = MessageEncoder::new();
    args.encode_args(&mut encoder);
    encoder
}

/// Turns "call method X with these arguments" into a blocking round trip over a
/// [`Connection`].
///
/// A reply that lacks the declared return value, or a void call whose reply carries
/// data, is a protocol violation and panics.
#[derive(Clone)]
pub struct RemoteCaller {
    connection: Arc<Connection>,
}

impl RemoteCaller {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    /// Call a method that returns a value at key 0.
    pub fn call<R: Decode>(&self, id: MessageId, args: impl EncodeArgs) -> Result<R> {
        let mut result = None;
        self.call_with_reply(id, args, |reply| {
            result = R::decode(keys::RETURN_VALUE, reply);
        })?;
        match result {
            Some(value) => Ok(value),
            None => panic!(
                "protocol violation: reply to {} lacks its return value",
                Describe(id)
            ),
        }
    }

    /// Call a method without return value.
    pub fn call_void(&self, id: MessageId, args: impl EncodeArgs) -> Result<()> {
        tracing::trace!("Calling {}", Describe(id));
        self.connection.send_message(id, encode_args(&args), None)?;
        Ok(())
    }

    /// Call a method and hand its full reply to `reply_handler`, for replies with
    /// more than one value or that fill caller-provided buffers.
    pub fn call_with_reply(
        &self,
        id: MessageId,
        args: impl EncodeArgs,
        mut reply_handler: impl FnMut(&MessageDecoder),
    ) -> Result<()> {
        tracing::trace!("Calling {}", Describe(id));
        let handler: &mut dyn FnMut(&MessageDecoder) = &mut reply_handler;
        self.connection
            .send_message(id, encode_args(&args), Some(handler))?;
        Ok(())
    }
}
