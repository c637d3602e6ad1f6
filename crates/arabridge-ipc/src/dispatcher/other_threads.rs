//! Concurrent dispatcher for every thread except the creation thread.

use super::{deliver_reply, PendingFrame, ReplyHandler, SerializedChannel, Shared};
use crate::channel::MessageChannel;
use crate::error::{IpcError, Result};
use crate::thread::ThreadToken;
use arabridge_wire::{keys, MessageDecoder, MessageEncoder, MessageId};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use smallvec::SmallVec;
use std::sync::{Arc, Weak};
use std::thread;

/// Transaction state of one physical thread.
#[derive(Default)]
struct ThreadState {
    /// Outbound calls awaiting replies, innermost last.
    frames: SmallVec<[PendingFrame; 4]>,
    /// Remote thread tokens of the incoming calls being handled, innermost last.
    remote_senders: SmallVec<[u64; 4]>,
}

impl ThreadState {
    fn is_idle(&self) -> bool {
        self.frames.is_empty() && self.remote_senders.is_empty()
    }
}

/// A received message waiting for the thread it is addressed to.
struct RoutedMessage {
    target: ThreadToken,
    id: MessageId,
    decoder: MessageDecoder,
}

/// Slots for routed messages not yet claimed by their target thread.
struct RoutedTable {
    slots: Vec<Option<RoutedMessage>>,
}

impl RoutedTable {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
        }
    }

    fn insert(&mut self, message: RoutedMessage) {
        if let Some(slot) = self.slots.iter_mut().find(|slot| slot.is_none()) {
            *slot = Some(message);
            return;
        }
        tracing::warn!(
            "Routed message table full, growing to {} slots",
            self.slots.len() + 1
        );
        self.slots.push(Some(message));
    }

    fn take_for(&mut self, target: ThreadToken) -> Option<RoutedMessage> {
        self.slots
            .iter_mut()
            .find(|slot| matches!(slot, Some(message) if message.target == target))
            .and_then(Option::take)
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

/// Dispatcher for the other-threads channel.
///
/// Every outbound message carries the sender's [`ThreadToken`]; the peer echoes it
/// back as the receiver token of the reply and of any nested callback, and this side
/// routes such messages to exactly that thread:
///
/// - a thread blocked in [`send_message`](Self::send_message) claims messages
///   addressed to it from the routed table, woken by a condition variable broadcast
/// - if the blocked thread is the channel's own receive thread, it pumps the channel
///   synchronously instead
/// - a message without receiver token starts a new transaction and is handled on
///   the thread that received it, unless that thread is itself blocked in a call;
///   then it gets a thread of its own, so replies keep matching their frames
pub(crate) struct OtherThreadsDispatcher {
    channel: SerializedChannel,
    shared: Arc<Shared>,
    threads: DashMap<ThreadToken, ThreadState>,
    routed: Mutex<RoutedTable>,
    routed_signal: Condvar,
    this: Weak<Self>,
}

impl OtherThreadsDispatcher {
    pub(crate) fn new(channel: Box<dyn MessageChannel>, shared: Arc<Shared>) -> Arc<Self> {
        let routed = RoutedTable::with_capacity(shared.config.routed_message_slots);
        let dispatcher = Arc::new_cyclic(|this| Self {
            channel: SerializedChannel::new(channel),
            shared,
            threads: DashMap::new(),
            routed: Mutex::new(routed),
            routed_signal: Condvar::new(),
            this: this.clone(),
        });

        let weak = Arc::downgrade(&dispatcher);
        dispatcher
            .channel
            .set_receive_router(Arc::new(move |id: MessageId, decoder: MessageDecoder| {
                if let Some(dispatcher) = weak.upgrade() {
                    dispatcher.route(id, decoder);
                }
            }));
        dispatcher
    }

    /// Send a call and block the calling thread until its reply has been handed to
    /// `reply_handler`.
    pub(crate) fn send_message(
        &self,
        id: MessageId,
        mut encoder: MessageEncoder,
        reply_handler: ReplyHandler<'_>,
    ) -> Result<()> {
        let me = ThreadToken::current();
        let depth = {
            let mut state = self.threads.entry(me).or_default();
            encoder.append_thread_token(keys::SENDER_THREAD, me.get());
            if let Some(&remote) = state.remote_senders.last() {
                encoder.append_thread_token(keys::RECEIVER_THREAD, remote);
                encoder.append_response_flag();
            }
            state.frames.push(PendingFrame::default());
            state.frames.len()
        };

        if let Err(e) = self.channel.send(id, &encoder) {
            self.abandon(me, depth);
            return Err(e);
        }

        let poll_interval = self.shared.config.poll_interval;
        let reply = loop {
            if let Some(reply) = self.take_reply(me, depth) {
                break reply;
            }

            let open = self.channel.is_open();
            if self.channel.receives_on_current_thread() {
                if self.channel.wait_for_message(poll_interval) {
                    continue;
                }
            } else {
                let routed = {
                    let mut table = self.routed.lock();
                    match table.take_for(me) {
                        Some(message) => Some(message),
                        None if open => {
                            self.routed_signal.wait_for(&mut table, poll_interval);
                            table.take_for(me)
                        }
                        None => None,
                    }
                };
                if let Some(message) = routed {
                    self.process(me, message.id, message.decoder);
                    continue;
                }
            }

            if !open {
                tracing::warn!("Other-threads channel closed while message {} awaited its reply", id);
                self.abandon(me, depth);
                return Err(IpcError::ChannelClosed);
            }
        };

        self.remove_if_idle(me);
        deliver_reply(id, reply, reply_handler);
        Ok(())
    }

    pub(crate) fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    /// Number of routed-message slots currently allocated.
    pub(crate) fn routed_capacity(&self) -> usize {
        self.routed.lock().capacity()
    }

    fn take_reply(&self, me: ThreadToken, depth: usize) -> Option<MessageDecoder> {
        let mut state = self.threads.get_mut(&me)?;
        if state.frames.len() != depth || !state.frames[depth - 1].is_concluded() {
            return None;
        }
        state.frames.pop().and_then(PendingFrame::into_reply)
    }

    fn abandon(&self, me: ThreadToken, depth: usize) {
        if let Some(mut state) = self.threads.get_mut(&me) {
            state.frames.truncate(depth - 1);
        }
        self.remove_if_idle(me);
    }

    fn remove_if_idle(&self, me: ThreadToken) {
        self.threads.remove_if(&me, |_, state| state.is_idle());
    }

    fn route(&self, id: MessageId, decoder: MessageDecoder) {
        let me = ThreadToken::current();
        match decoder
            .read_thread_token(keys::RECEIVER_THREAD)
            .map(ThreadToken::from_raw)
        {
            None => {
                assert!(
                    !id.is_reply(),
                    "protocol violation: reply without receiver thread token"
                );
                if self.is_sending(me) {
                    self.process_detached(id, decoder);
                } else {
                    self.process(me, id, decoder);
                }
            }
            Some(target) if target == me => self.process(me, id, decoder),
            Some(target) => {
                tracing::trace!("Routing message {} to thread {}", id, target.get());
                self.routed.lock().insert(RoutedMessage {
                    target,
                    id,
                    decoder,
                });
                self.routed_signal.notify_all();
            }
        }
    }

    fn is_sending(&self, me: ThreadToken) -> bool {
        self.threads
            .get(&me)
            .is_some_and(|state| !state.frames.is_empty())
    }

    /// Handle a new transaction on a thread of its own.
    fn process_detached(&self, id: MessageId, decoder: MessageDecoder) {
        tracing::trace!("Handling new transaction {} on a call thread", id);
        let this = self.this.clone();
        let spawned = thread::Builder::new()
            .name("arabridge-call".to_string())
            .spawn(move || {
                if let Some(dispatcher) = this.upgrade() {
                    dispatcher.process(ThreadToken::current(), id, decoder);
                }
            });
        if let Err(e) = spawned {
            tracing::error!("Failed to spawn call thread for message {}: {}", id, e);
        }
    }

    /// Process a message addressed to the current thread.
    fn process(&self, me: ThreadToken, id: MessageId, decoder: MessageDecoder) {
        if id.is_reply() {
            let mut state = self
                .threads
                .get_mut(&me)
                .expect("protocol violation: reply for a thread with no pending call");
            state
                .frames
                .last_mut()
                .expect("protocol violation: reply for a thread with no pending call")
                .conclude(decoder);
            return;
        }

        let sender = decoder
            .read_thread_token(keys::SENDER_THREAD)
            .expect("protocol violation: call without sender thread token");

        self.threads.entry(me).or_default().remote_senders.push(sender);
        let mut reply = self.shared.handle(id, &decoder);
        if let Some(mut state) = self.threads.get_mut(&me) {
            state.remote_senders.pop();
        }
        self.remove_if_idle(me);

        reply.append_thread_token(keys::RECEIVER_THREAD, sender);
        reply.append_thread_token(keys::SENDER_THREAD, me.get());
        if let Err(e) = self.channel.send(MessageId::REPLY, &reply) {
            tracing::error!("Failed to send reply to message {}: {}", id, e);
        }
    }
}
