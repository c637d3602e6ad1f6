//! Message dispatchers: the transaction engine.
//!
//! A dispatcher pairs every outbound call with its reply. While a caller is blocked
//! waiting, the dispatcher keeps servicing messages addressed to that caller, so the
//! peer can issue nested callbacks before answering. Replies conclude calls in strict
//! LIFO order per logical thread of control.
//!
//! Two disciplines exist, one per channel:
//!
//! - [`MainThreadDispatcher`]: cooperative, for the connection's creation thread
//! - [`OtherThreadsDispatcher`]: fully concurrent, routed by thread token

mod main_thread;
mod other_threads;

pub(crate) use main_thread::MainThreadDispatcher;
pub(crate) use other_threads::OtherThreadsDispatcher;

use crate::channel::{MessageChannel, ReceiveRouter};
use crate::config::ConnectionConfig;
use crate::error::Result;
use crate::thread::CreationThreadQueue;
use arabridge_wire::{MessageDecoder, MessageEncoder, MessageId};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::thread::{self, ThreadId};
use std::time::Duration;

/// Callee-side delegate invoked for every newly received call.
pub trait MessageHandler: Send + Sync {
    /// Perform the call identified by `id` and write its results into `reply`.
    ///
    /// A void call leaves `reply` empty.
    fn handle_received_message(
        &self,
        id: MessageId,
        decoder: &MessageDecoder,
        reply: &mut MessageEncoder,
    );
}

/// Consumer of a call's reply. `None` declares the call void: its reply must then
/// carry no payload.
pub type ReplyHandler<'a> = Option<&'a mut dyn FnMut(&MessageDecoder)>;

/// Host event-loop hook run while the creation thread is blocked without IPC work.
pub type WaitDelegate = Arc<dyn Fn() + Send + Sync>;

/// Connection state shared by both dispatchers.
pub(crate) struct Shared {
    pub(crate) creation_thread: ThreadId,
    pub(crate) config: ConnectionConfig,
    pub(crate) tasks: CreationThreadQueue,
    handler: RwLock<Option<Weak<dyn MessageHandler>>>,
    wait_delegate: RwLock<Option<WaitDelegate>>,
}

impl Shared {
    pub(crate) fn new(config: ConnectionConfig) -> Self {
        Self {
            creation_thread: thread::current().id(),
            config,
            tasks: CreationThreadQueue::new(),
            handler: RwLock::new(None),
            wait_delegate: RwLock::new(None),
        }
    }

    pub(crate) fn is_creation_thread(&self) -> bool {
        thread::current().id() == self.creation_thread
    }

    pub(crate) fn set_handler(&self, handler: Weak<dyn MessageHandler>) {
        *self.handler.write() = Some(handler);
    }

    pub(crate) fn set_wait_delegate(&self, delegate: WaitDelegate) {
        *self.wait_delegate.write() = Some(delegate);
    }

    /// Run the message handler for an incoming call and return its reply.
    pub(crate) fn handle(&self, id: MessageId, decoder: &MessageDecoder) -> MessageEncoder {
        let handler = self.handler.read().as_ref().and_then(Weak::upgrade);
        let mut reply = MessageEncoder::new();
        match handler {
            Some(handler) => handler.handle_received_message(id, decoder, &mut reply),
            None => tracing::error!("No message handler installed, answering message {} empty", id),
        }
        reply
    }

    pub(crate) fn run_wait_delegate(&self) {
        let delegate = self.wait_delegate.read().clone();
        if let Some(delegate) = delegate {
            delegate();
        }
    }
}

/// A channel whose sends are serialized by a dedicated lock.
pub(crate) struct SerializedChannel {
    channel: Box<dyn MessageChannel>,
    send_lock: Mutex<()>,
}

impl SerializedChannel {
    pub(crate) fn new(channel: Box<dyn MessageChannel>) -> Self {
        Self {
            channel,
            send_lock: Mutex::new(()),
        }
    }

    pub(crate) fn send(&self, id: MessageId, encoder: &MessageEncoder) -> Result<()> {
        let _guard = self.send_lock.lock();
        tracing::trace!("Sending message {:?} ({} arguments)", id, encoder.message().len());
        self.channel.send_message(id, encoder)
    }

    pub(crate) fn set_receive_router(&self, router: ReceiveRouter) {
        self.channel.set_receive_router(router);
    }

    pub(crate) fn receives_on_current_thread(&self) -> bool {
        self.channel.receives_on_current_thread()
    }

    pub(crate) fn wait_for_message(&self, timeout: Duration) -> bool {
        self.channel.wait_for_message(timeout)
    }

    pub(crate) fn is_open(&self) -> bool {
        self.channel.is_open()
    }
}

/// One outbound call awaiting its reply.
#[derive(Default)]
pub(crate) struct PendingFrame {
    reply: Option<MessageDecoder>,
}

impl PendingFrame {
    /// Store the reply concluding this call.
    pub(crate) fn conclude(&mut self, reply: MessageDecoder) {
        assert!(
            self.reply.is_none(),
            "protocol violation: call concluded by two replies"
        );
        self.reply = Some(reply);
    }

    pub(crate) fn is_concluded(&self) -> bool {
        self.reply.is_some()
    }

    pub(crate) fn into_reply(self) -> Option<MessageDecoder> {
        self.reply
    }
}

/// Hand a concluded call's reply to its consumer.
pub(crate) fn deliver_reply(id: MessageId, reply: MessageDecoder, handler: ReplyHandler<'_>) {
    match handler {
        Some(handler) => handler(&reply),
        None => assert!(
            reply.is_empty(),
            "protocol violation: reply to void message {} carries {} argument(s)",
            id,
            reply.payload_len()
        ),
    }
}
