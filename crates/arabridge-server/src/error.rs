//! Error types for the endpoint server

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Configuration parse error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IPC error: {0}")]
    Ipc(#[from] arabridge_ipc::IpcError),

    #[error("Remote call error: {0}")]
    Remote(#[from] arabridge_remote::RemoteError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
