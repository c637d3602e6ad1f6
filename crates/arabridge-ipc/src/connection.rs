//! Connection: the façade callers send through.

use crate::channel::MessageChannel;
use crate::config::ConnectionConfig;
use crate::dispatcher::{
    MainThreadDispatcher, MessageHandler, OtherThreadsDispatcher, ReplyHandler, Shared,
};
use crate::error::{IpcError, Result};
use arabridge_wire::{MessageEncoder, MessageId};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

/// One side of a host/plug-in connection.
///
/// A connection owns two channels: the main-thread channel, used only by the thread
/// that created the connection, and the other-threads channel, used by every other
/// thread. [`send_message`](Self::send_message) picks the channel from the calling
/// thread alone.
///
/// ```ignore
/// let connection = Arc::new(Connection::new(ConnectionConfig::default())?);
/// connection.set_main_thread_channel(main)?;
/// connection.set_other_threads_channel(other)?;
/// connection.set_message_handler(&handler);
///
/// let mut sample_rate = 0.0;
/// connection.send_message(id, args, Some(&mut |reply| {
///     sample_rate = reply.read_double(0).unwrap_or_default();
/// }))?;
/// ```
pub struct Connection {
    shared: Arc<Shared>,
    main: OnceLock<Arc<MainThreadDispatcher>>,
    other: OnceLock<Arc<OtherThreadsDispatcher>>,
}

impl Connection {
    /// Create a connection owned by the calling thread.
    pub fn new(config: ConnectionConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!("Creating connection on {:?}", std::thread::current().id());
        Ok(Self {
            shared: Arc::new(Shared::new(config)),
            main: OnceLock::new(),
            other: OnceLock::new(),
        })
    }

    /// Wire the channel for creation-thread traffic. Must precede any traffic.
    pub fn set_main_thread_channel(&self, channel: impl MessageChannel + 'static) -> Result<()> {
        if self.main.get().is_some() {
            return Err(IpcError::ChannelAlreadyConfigured);
        }
        let dispatcher = MainThreadDispatcher::new(Box::new(channel), Arc::clone(&self.shared));
        self.main
            .set(dispatcher)
            .map_err(|_| IpcError::ChannelAlreadyConfigured)?;
        tracing::debug!("Main-thread channel configured");
        Ok(())
    }

    /// Wire the channel for traffic from every other thread. Must precede any traffic.
    pub fn set_other_threads_channel(&self, channel: impl MessageChannel + 'static) -> Result<()> {
        if self.other.get().is_some() {
            return Err(IpcError::ChannelAlreadyConfigured);
        }
        let dispatcher = OtherThreadsDispatcher::new(Box::new(channel), Arc::clone(&self.shared));
        self.other
            .set(dispatcher)
            .map_err(|_| IpcError::ChannelAlreadyConfigured)?;
        tracing::debug!("Other-threads channel configured");
        Ok(())
    }

    /// Install the delegate for incoming calls. The connection does not own it:
    /// once the last `Arc` is dropped, incoming calls are answered empty.
    pub fn set_message_handler<H: MessageHandler + 'static>(&self, handler: &Arc<H>) {
        let handler: Weak<H> = Arc::downgrade(handler);
        let handler: Weak<dyn MessageHandler> = handler;
        self.shared.set_handler(handler);
    }

    /// Install the hook run while the creation thread waits without IPC work.
    pub fn set_wait_for_message_delegate(&self, delegate: impl Fn() + Send + Sync + 'static) {
        self.shared.set_wait_delegate(Arc::new(delegate));
    }

    /// Send a call and block until its reply has been handed to `reply_handler`.
    ///
    /// Incoming calls addressed to the calling thread keep being handled while it
    /// waits. A `None` reply handler declares the call void; a reply carrying data
    /// then panics as a protocol violation.
    pub fn send_message(
        &self,
        id: MessageId,
        encoder: MessageEncoder,
        reply_handler: ReplyHandler<'_>,
    ) -> Result<()> {
        debug_assert!(!id.is_reply(), "replies are sent by the dispatchers");
        if self.was_created_on_current_thread() {
            let main = self.main.get().ok_or(IpcError::ChannelNotConfigured)?;
            main.send_message(id, encoder, reply_handler)
        } else {
            let other = self.other.get().ok_or(IpcError::ChannelNotConfigured)?;
            other.send_message(id, encoder, reply_handler)
        }
    }

    /// Whether the calling thread created this connection.
    pub fn was_created_on_current_thread(&self) -> bool {
        self.shared.is_creation_thread()
    }

    /// Run `task` on the creation thread: inline when already there, otherwise the
    /// next time the creation thread processes pending work.
    pub fn dispatch_to_creation_thread(&self, task: impl FnOnce() + Send + 'static) {
        if self.was_created_on_current_thread() {
            task();
        } else {
            self.shared.tasks.schedule(Box::new(task));
        }
    }

    /// Process one pending message or creation-thread task without blocking.
    /// Returns whether anything was processed.
    pub fn process_pending_message_on_creation_thread_if_needed(&self) -> bool {
        self.wait_for_message_on_creation_thread(Duration::ZERO)
    }

    /// Wait up to `timeout` for one pending message or creation-thread task and
    /// process it. Returns whether anything was processed.
    pub fn wait_for_message_on_creation_thread(&self, timeout: Duration) -> bool {
        assert!(
            self.was_created_on_current_thread(),
            "creation-thread work pumped from another thread"
        );
        match self.main.get() {
            Some(main) => main.process_pending(timeout),
            None => self.shared.tasks.run_one_timeout(timeout),
        }
    }

    /// Whether every configured channel still reaches the peer.
    pub fn is_open(&self) -> bool {
        self.main.get().map_or(true, |main| main.is_open())
            && self.other.get().map_or(true, |other| other.is_open())
    }

    /// Currently allocated routed-message slots of the other-threads channel.
    pub fn routed_message_capacity(&self) -> Option<usize> {
        self.other.get().map(|other| other.routed_capacity())
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }
}
