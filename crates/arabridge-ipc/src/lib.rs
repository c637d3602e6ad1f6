//! Transaction engine for the arabridge cross-process plug-in protocol.
//!
//! Turns a local call into a cross-process round trip: the caller blocks until the
//! matching reply arrives, nested callbacks from the peer are handled while it
//! waits, and every reply reaches exactly the thread that sent the call.
//!
//! - [`MessageChannel`]: raw transport ([`LocalChannel`] in-process, `SocketChannel` over
//!   Unix domain sockets)
//! - [`Connection`]: façade that picks the main-thread or other-threads dispatcher
//!   from the calling thread
//! - [`MessageHandler`]: callee-side delegate producing replies
//!
//! ## Usage
//!
//! ```ignore
//! use arabridge_ipc::{Connection, ConnectionConfig, DeliveryMode, LocalChannel};
//!
//! let config = ConnectionConfig::default();
//! let (host_main, plugin_main) = LocalChannel::pair(DeliveryMode::Polled, config.threaded_delivery())?;
//! let (host_other, plugin_other) = LocalChannel::pair(config.threaded_delivery(), config.threaded_delivery())?;
//!
//! let host = Connection::new(config)?;
//! host.set_main_thread_channel(host_main)?;
//! host.set_other_threads_channel(host_other)?;
//! ```

pub mod channel;
pub mod config;
mod connection;
mod dispatcher;
pub mod error;
pub mod thread;

pub use channel::{DeliveryMode, LocalChannel, MessageChannel, ReceiveRouter};
#[cfg(unix)]
pub use channel::{SocketChannel, SocketListener};
pub use config::ConnectionConfig;
pub use connection::Connection;
pub use dispatcher::{MessageHandler, ReplyHandler, WaitDelegate};
pub use error::{IpcError, Result};
pub use thread::{CreationThreadQueue, ThreadToken};
