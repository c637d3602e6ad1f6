//! Error types for message encoding and framing.

use crate::message::ArgKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WireError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("Frame of {size} bytes exceeds the {max} byte limit")]
    FrameTooLarge { size: usize, max: usize },

    #[error("Missing argument at key {key}")]
    MissingArgument { key: ArgKey },
}

pub type Result<T> = std::result::Result<T, WireError>;
