//! Error types for the IPC layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IpcError {
    #[error("No channel configured for this thread's traffic")]
    ChannelNotConfigured,

    #[error("Channel already configured")]
    ChannelAlreadyConfigured,

    #[error("Channel closed by peer")]
    ChannelClosed,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Wire error: {0}")]
    Wire(#[from] arabridge_wire::WireError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IpcError>;
