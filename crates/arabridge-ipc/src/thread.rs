//! Thread identity and creation-thread continuations.

use crossbeam_channel::{unbounded, Receiver, Sender};
use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Opaque per-process identifier of a physical thread.
///
/// Tokens are embedded in messages on the other-threads channel and echoed back by
/// the peer; the peer never interprets them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ThreadToken(u64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT_TOKEN: Cell<u64> = const { Cell::new(0) };
}

impl ThreadToken {
    /// Token of the calling thread, assigned on first use.
    pub fn current() -> Self {
        CURRENT_TOKEN.with(|token| {
            if token.get() == 0 {
                token.set(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
            }
            ThreadToken(token.get())
        })
    }

    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// A continuation to run on the connection's creation thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Queue of continuations waiting for the creation thread.
///
/// Any thread may schedule; only the creation thread runs tasks, from inside a
/// blocked call or from the embedding application's event loop.
pub struct CreationThreadQueue {
    sender: Sender<Task>,
    receiver: Receiver<Task>,
}

impl CreationThreadQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn schedule(&self, task: Task) {
        // The queue owns its receiver, so the send cannot fail.
        let _ = self.sender.send(task);
    }

    /// Run one queued task if there is one.
    pub fn run_one(&self) -> bool {
        match self.receiver.try_recv() {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    /// Wait up to `timeout` for a task and run it.
    pub fn run_one_timeout(&self, timeout: Duration) -> bool {
        match self.receiver.recv_timeout(timeout) {
            Ok(task) => {
                task();
                true
            }
            Err(_) => false,
        }
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    pub(crate) fn receiver(&self) -> &Receiver<Task> {
        &self.receiver
    }
}

impl Default for CreationThreadQueue {
    fn default() -> Self {
        Self::new()
    }
}
