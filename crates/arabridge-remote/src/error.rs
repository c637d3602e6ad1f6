//! Error types for remote calls and the bootstrap protocol

use crate::handle::RemoteRef;
use arabridge_ipc::IpcError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("IPC error: {0}")]
    Ipc(#[from] IpcError),

    #[error("Unknown factory: {0}")]
    UnknownFactory(String),

    #[error("Factory {0} rejected initialization")]
    InitializationRejected(String),

    #[error("Factory {0} rejected the document controller")]
    DocumentControllerRejected(String),

    #[error("Invalid handle: {0:?}")]
    InvalidHandle(RemoteRef),
}

pub type Result<T> = std::result::Result<T, RemoteError>;
