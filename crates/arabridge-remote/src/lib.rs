//! Typed remote calls over an arabridge [`Connection`](arabridge_ipc::Connection).
//!
//! - [`method_id`]: the catalog of message ids both processes agree on
//! - [`RemoteCaller`]: "call method X with these arguments" as one blocking round trip
//! - [`HandleRegistry`] / [`RemoteRef`]: opaque cross-process object references
//! - [`bootstrap`]: factory discovery and session setup, host and plug-in side
//!
//! ## Usage
//!
//! ```ignore
//! use arabridge_remote::{method_id::content_access_controller, RemoteCaller};
//!
//! let caller = RemoteCaller::new(connection);
//! let count: usize = caller.call(
//!     content_access_controller::GET_CONTENT_READER_EVENT_COUNT,
//!     (reader,),
//! )?;
//! ```

pub mod bootstrap;
pub mod caller;
pub mod error;
pub mod handle;
pub mod method_id;

pub use bootstrap::{
    playback_role, BindingRecord, BootstrapClient, BootstrapService, DocumentControllerRecord,
    EndpointProvider, StaticEndpoint,
};
pub use caller::{encode_args, DecodeArgs, EncodeArgs, RemoteCaller};
pub use error::{RemoteError, Result};
pub use handle::{HandleRegistry, RemoteRef};
pub use method_id::{classify, method_id, method_name, BootstrapCall, Interface, MessageClass};
