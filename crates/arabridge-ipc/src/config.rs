//! Connection configuration.

use crate::channel::DeliveryMode;
use crate::error::{IpcError, Result};
use std::time::Duration;

/// Timing and sizing knobs of a [`Connection`](crate::Connection).
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// How long a blocked caller waits for IPC work before checking again
    /// (and, on the creation thread, before calling the wait-for-message delegate).
    pub poll_interval: Duration,

    /// Preallocated routed-message slots on the other-threads channel.
    /// Sized for the number of threads expected to call concurrently; the table
    /// grows past it if needed.
    pub routed_message_slots: usize,

    /// How long a channel delivery thread waits for a frame before checking
    /// whether it should stop.
    pub delivery_poll_interval: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            routed_message_slots: 8,
            delivery_poll_interval: Duration::from_millis(50),
        }
    }
}

impl ConnectionConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() || self.poll_interval > Duration::from_secs(1) {
            return Err(IpcError::InvalidConfig(format!(
                "poll_interval {:?} out of range (0-1s, exclusive of 0)",
                self.poll_interval
            )));
        }
        if self.routed_message_slots == 0 {
            return Err(IpcError::InvalidConfig(
                "routed_message_slots must be at least 1".to_string(),
            ));
        }
        if self.delivery_poll_interval.is_zero() {
            return Err(IpcError::InvalidConfig(
                "delivery_poll_interval must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Delivery mode for channels that route on their own thread, using this
    /// configuration's delivery poll interval.
    pub fn threaded_delivery(&self) -> DeliveryMode {
        DeliveryMode::Threaded {
            poll_interval: self.delivery_poll_interval,
        }
    }
}
