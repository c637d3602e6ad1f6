//! Centralized error type for the arabridge umbrella crate.
//!
//! Wraps all layer errors so `?` propagates naturally across crate boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Wire: {0}")]
    Wire(#[from] arabridge_wire::WireError),

    #[error("IPC: {0}")]
    Ipc(#[from] arabridge_ipc::IpcError),

    #[error("Remote: {0}")]
    Remote(#[from] arabridge_remote::RemoteError),

    #[cfg(feature = "server")]
    #[error("Server: {0}")]
    Server(#[from] arabridge_server::ServerError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
