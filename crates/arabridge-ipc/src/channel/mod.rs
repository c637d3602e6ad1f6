//! Message channels: raw bidirectional message transport between two processes.
//!
//! A channel sends one encoded message at a time and hands every received message
//! to its receive router, exactly once. It carries no threading policy of its own
//! beyond choosing *where* received messages are routed:
//!
//! - [`DeliveryMode::Polled`]: on the bound receive thread, whenever it calls
//!   [`MessageChannel::wait_for_message`]
//! - [`DeliveryMode::Threaded`]: on a dedicated delivery thread owned by the channel

use crate::error::Result;
use arabridge_wire::{decode_frame, MessageDecoder, MessageEncoder, MessageId};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

mod local;
pub use local::LocalChannel;

#[cfg(unix)]
mod socket;
#[cfg(unix)]
pub use socket::{SocketChannel, SocketListener};

/// Callback invoked for every received message.
pub type ReceiveRouter = Arc<dyn Fn(MessageId, MessageDecoder) + Send + Sync>;

/// Bidirectional message transport.
pub trait MessageChannel: Send + Sync {
    /// Send one message. Implementations may be called from any thread but are not
    /// required to be reentrant; dispatchers serialize their sends.
    fn send_message(&self, id: MessageId, encoder: &MessageEncoder) -> Result<()>;

    /// Install the callback that receives every incoming message.
    fn set_receive_router(&self, router: ReceiveRouter);

    /// Whether incoming messages are routed on the calling thread, which then has to
    /// pump them with [`wait_for_message`](Self::wait_for_message).
    fn receives_on_current_thread(&self) -> bool;

    /// Wait up to `timeout` for one incoming message and route it on the calling
    /// thread. Returns whether a message was routed.
    ///
    /// Only meaningful when [`receives_on_current_thread`](Self::receives_on_current_thread).
    fn wait_for_message(&self, timeout: Duration) -> bool;

    /// Whether the peer is still reachable.
    fn is_open(&self) -> bool {
        true
    }
}

/// Where a channel routes its received messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    /// Routed on the bound receive thread while it waits for messages.
    Polled,
    /// Routed on a delivery thread owned by the channel.
    Threaded { poll_interval: Duration },
}

impl DeliveryMode {
    pub fn threaded() -> Self {
        DeliveryMode::Threaded {
            poll_interval: Duration::from_millis(50),
        }
    }
}

/// Receive side shared by every channel implementation: a queue of undecoded
/// frames plus the router they are handed to.
pub(crate) struct Inbox {
    frames: Receiver<Vec<u8>>,
    router: RwLock<Option<ReceiveRouter>>,
    receive_thread: Mutex<Option<ThreadId>>,
    open: AtomicBool,
}

impl Inbox {
    pub(crate) fn new(frames: Receiver<Vec<u8>>) -> Self {
        Self {
            frames,
            router: RwLock::new(None),
            receive_thread: Mutex::new(None),
            open: AtomicBool::new(true),
        }
    }

    pub(crate) fn set_router(&self, router: ReceiveRouter) {
        *self.router.write() = Some(router);
    }

    pub(crate) fn bind_current_thread(&self) {
        *self.receive_thread.lock() = Some(thread::current().id());
    }

    pub(crate) fn receives_on_current_thread(&self) -> bool {
        *self.receive_thread.lock() == Some(thread::current().id())
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Receive and route one frame. Frames stay queued until a router is installed.
    pub(crate) fn wait_for_message(&self, timeout: Duration) -> bool {
        let Some(router) = self.router.read().clone() else {
            thread::sleep(timeout);
            return false;
        };

        match self.frames.recv_timeout(timeout) {
            Ok(frame) => {
                match decode_frame(&frame) {
                    Ok((id, decoder)) => router(id, decoder),
                    Err(e) => tracing::warn!("Dropping undecodable frame ({} bytes): {}", frame.len(), e),
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
            Err(RecvTimeoutError::Disconnected) => {
                if self.open.swap(false, Ordering::SeqCst) {
                    tracing::debug!("Channel peer disconnected");
                }
                false
            }
        }
    }
}

/// Owns the delivery thread of a [`DeliveryMode::Threaded`] channel.
pub(crate) struct Delivery {
    inbox: Arc<Inbox>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl Delivery {
    pub(crate) fn start(inbox: Inbox, mode: DeliveryMode, thread_name: &str) -> Result<Self> {
        let inbox = Arc::new(inbox);
        let stop = Arc::new(AtomicBool::new(false));

        let thread = match mode {
            DeliveryMode::Polled => {
                inbox.bind_current_thread();
                None
            }
            DeliveryMode::Threaded { poll_interval } => {
                let inbox = Arc::clone(&inbox);
                let stop = Arc::clone(&stop);
                let handle = thread::Builder::new()
                    .name(thread_name.to_string())
                    .spawn(move || {
                        inbox.bind_current_thread();
                        while !stop.load(Ordering::SeqCst) && inbox.is_open() {
                            inbox.wait_for_message(poll_interval);
                        }
                        tracing::trace!("Delivery thread finished");
                    })?;
                Some(handle)
            }
        };

        Ok(Self {
            inbox,
            stop,
            thread,
        })
    }

    pub(crate) fn inbox(&self) -> &Inbox {
        &self.inbox
    }
}

impl Drop for Delivery {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.thread.take() {
            // The last owner may be the delivery thread itself (a routed call dropped
            // the connection); it exits on its own once `stop` is seen.
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}
