//! Cooperative dispatcher for the connection's creation thread.

use super::{deliver_reply, PendingFrame, ReplyHandler, SerializedChannel, Shared};
use crate::channel::MessageChannel;
use crate::error::{IpcError, Result};
use arabridge_wire::{MessageDecoder, MessageEncoder, MessageId};
use crossbeam_channel::{bounded, select, Receiver, Sender};
use parking_lot::Mutex;
use smallvec::SmallVec;
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Default)]
struct MainThreadState {
    /// Outbound calls awaiting replies, innermost last.
    frames: SmallVec<[PendingFrame; 4]>,
    /// Incoming calls currently being handled.
    handling_depth: usize,
}

/// Dispatcher for the main-thread channel.
///
/// Only the creation thread sends on this channel. While blocked in
/// [`send_message`](Self::send_message) it keeps processing the messages addressed
/// to it:
///
/// - if the channel routes on the creation thread, by pumping the channel in place
/// - otherwise through a single-slot queue filled by the delivery thread, and a task
///   queue for new transactions that arrive off-thread
///
/// When a poll interval passes without work the wait-for-message delegate runs, so
/// the embedding application's event loop stays alive.
pub(crate) struct MainThreadDispatcher {
    channel: SerializedChannel,
    shared: Arc<Shared>,
    state: Mutex<MainThreadState>,
    responses_tx: Sender<(MessageId, MessageDecoder)>,
    responses_rx: Receiver<(MessageId, MessageDecoder)>,
    this: Weak<Self>,
}

impl MainThreadDispatcher {
    pub(crate) fn new(channel: Box<dyn MessageChannel>, shared: Arc<Shared>) -> Arc<Self> {
        let (responses_tx, responses_rx) = bounded(1);
        let dispatcher = Arc::new_cyclic(|this| Self {
            channel: SerializedChannel::new(channel),
            shared,
            state: Mutex::new(MainThreadState::default()),
            responses_tx,
            responses_rx,
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

    /// Send a call and block until its reply has been handed to `reply_handler`.
    pub(crate) fn send_message(
        &self,
        id: MessageId,
        mut encoder: MessageEncoder,
        reply_handler: ReplyHandler<'_>,
    ) -> Result<()> {
        assert!(
            self.shared.is_creation_thread(),
            "protocol violation: main-thread channel used off the creation thread"
        );

        let depth = {
            let mut state = self.state.lock();
            if state.handling_depth > 0 {
                encoder.append_response_flag();
            }
            state.frames.push(PendingFrame::default());
            state.frames.len()
        };

        if let Err(e) = self.channel.send(id, &encoder) {
            self.state.lock().frames.truncate(depth - 1);
            return Err(e);
        }

        let reply = loop {
            if let Some(reply) = self.take_reply(depth) {
                break reply;
            }
            let open = self.channel.is_open();
            if self.process_pending(self.shared.config.poll_interval) {
                continue;
            }
            if !open {
                tracing::warn!("Main-thread channel closed while message {} awaited its reply", id);
                self.state.lock().frames.truncate(depth - 1);
                return Err(IpcError::ChannelClosed);
            }
            self.shared.run_wait_delegate();
        };

        deliver_reply(id, reply, reply_handler);
        Ok(())
    }

    /// Process at most one pending message or creation-thread task, waiting up to
    /// `timeout` for one. Must run on the creation thread.
    pub(crate) fn process_pending(&self, timeout: Duration) -> bool {
        if self.shared.tasks.run_one() {
            return true;
        }

        if self.channel.receives_on_current_thread() {
            return self.channel.wait_for_message(timeout);
        }

        select! {
            recv(self.responses_rx) -> message => {
                if let Ok((id, decoder)) = message {
                    self.process_on_creation_thread(id, decoder);
                }
                true
            }
            recv(self.shared.tasks.receiver()) -> task => {
                if let Ok(task) = task {
                    task();
                }
                true
            }
            default(timeout) => false,
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.channel.is_open()
    }

    fn take_reply(&self, depth: usize) -> Option<MessageDecoder> {
        let mut state = self.state.lock();
        debug_assert_eq!(state.frames.len(), depth, "reply frames out of order");
        if state.frames.len() != depth || !state.frames[depth - 1].is_concluded() {
            return None;
        }
        state.frames.pop().and_then(PendingFrame::into_reply)
    }

    fn route(&self, id: MessageId, decoder: MessageDecoder) {
        if self.shared.is_creation_thread() {
            self.process_on_creation_thread(id, decoder);
        } else if id.is_reply() || decoder.is_response() {
            // Part of a transaction the creation thread is blocked in. The dispatcher
            // owns the receiver, so the send cannot fail.
            let _ = self.responses_tx.send((id, decoder));
        } else {
            tracing::trace!("Deferring new transaction {} to the creation thread", id);
            let this = self.this.clone();
            self.shared.tasks.schedule(Box::new(move || {
                if let Some(dispatcher) = this.upgrade() {
                    dispatcher.process_on_creation_thread(id, decoder);
                }
            }));
        }
    }

    fn process_on_creation_thread(&self, id: MessageId, decoder: MessageDecoder) {
        if id.is_reply() {
            let mut state = self.state.lock();
            let frame = state
                .frames
                .last_mut()
                .expect("protocol violation: reply received while no call is pending");
            frame.conclude(decoder);
            return;
        }

        tracing::trace!("Handling message {} on the creation thread", id);
        self.state.lock().handling_depth += 1;
        let reply = self.shared.handle(id, &decoder);
        self.state.lock().handling_depth -= 1;

        if let Err(e) = self.channel.send(MessageId::REPLY, &reply) {
            tracing::error!("Failed to send reply to message {}: {}", id, e);
        }
    }
}
