//! # arabridge - Cross-process plug-in IPC
//!
//! Lets a host and an analysis/editing plug-in living in separate processes talk as
//! if they shared an address space: every call blocks until its reply, callbacks
//! nest arbitrarily deep, and replies always find the thread that is waiting.
//!
//! ## Architecture
//!
//! arabridge is an umbrella crate that coordinates:
//! - **arabridge-wire** - Keyed messages, framing, argument codecs, payload catalog
//! - **arabridge-ipc** - Channels, dispatchers, the [`Connection`] transaction engine
//! - **arabridge-remote** - Method ids, typed remote calls, handles, bootstrap
//! - **arabridge-server** - Socket-based plug-in endpoint process
//!
//! ## Quick Start
//!
//! ```ignore
//! use arabridge::prelude::*;
//!
//! let config = ConnectionConfig::default();
//! let host = Arc::new(Connection::new(config.clone())?);
//! host.set_main_thread_channel(SocketChannel::connect(&main_path, DeliveryMode::Polled)?)?;
//! host.set_other_threads_channel(SocketChannel::connect(&other_path, config.threaded_delivery())?)?;
//!
//! let bootstrap = BootstrapClient::new(Arc::clone(&host));
//! for factory in bootstrap.factories()? {
//!     println!("{} by {}", factory.plugin_name, factory.manufacturer_name);
//! }
//! ```
//!
//! ## Feature Flags
//!
//! - `default` - Everything
//! - `server` - Plug-in endpoint process

mod error;

pub use error::{Error, Result};

/// Re-export of arabridge-wire for direct access
pub use arabridge_wire as wire;

/// Re-export of arabridge-ipc for direct access
pub use arabridge_ipc as ipc;

/// Re-export of arabridge-remote for direct access
pub use arabridge_remote as remote;

#[cfg(feature = "server")]
pub use arabridge_server as server;

pub use arabridge_ipc::{
    Connection, ConnectionConfig, DeliveryMode, LocalChannel, MessageChannel, MessageHandler,
    ReplyHandler,
};
pub use arabridge_remote::{BootstrapClient, BootstrapService, RemoteCaller, RemoteRef};
pub use arabridge_wire::{MessageDecoder, MessageEncoder, MessageId};

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::{Error, Result};

    // Transaction engine
    pub use crate::ipc::{
        Connection, ConnectionConfig, DeliveryMode, LocalChannel, MessageChannel, MessageHandler,
    };
    #[cfg(unix)]
    pub use crate::ipc::{SocketChannel, SocketListener};

    // Messages
    pub use crate::wire::codec::{decode_required, Decode, Encode, RawBytes};
    pub use crate::wire::payload::*;
    pub use crate::wire::{keys, MessageDecoder, MessageEncoder, MessageId};

    // Remote calls
    pub use crate::remote::method_id;
    pub use crate::remote::{
        playback_role, BootstrapClient, BootstrapService, EndpointProvider, RemoteCaller,
        RemoteRef, StaticEndpoint,
    };

    // Endpoint server
    #[cfg(feature = "server")]
    pub use crate::server::{EndpointServer, ServerConfig};

    pub use std::sync::Arc;
}
