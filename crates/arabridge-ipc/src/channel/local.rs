//! In-process channel pair.

use super::{Delivery, DeliveryMode, Inbox, MessageChannel, ReceiveRouter};
use crate::error::{IpcError, Result};
use arabridge_wire::{encode_frame, MessageEncoder, MessageId};
use crossbeam_channel::{unbounded, Sender};
use std::time::Duration;

/// One end of an in-process channel pair.
///
/// Messages are encoded into frames exactly as on a socket, so both ends exercise
/// the full wire format.
pub struct LocalChannel {
    delivery: Delivery,
    outbox: Sender<Vec<u8>>,
}

impl LocalChannel {
    /// Create two connected ends with the given delivery modes.
    ///
    /// A [`DeliveryMode::Polled`] end is bound to the constructing thread; use
    /// [`bind_receive_thread`](Self::bind_receive_thread) to hand it to another thread.
    pub fn pair(first: DeliveryMode, second: DeliveryMode) -> Result<(Self, Self)> {
        let (to_second, second_frames) = unbounded();
        let (to_first, first_frames) = unbounded();

        let first = Self {
            delivery: Delivery::start(Inbox::new(first_frames), first, "arabridge-local")?,
            outbox: to_second,
        };
        let second = Self {
            delivery: Delivery::start(Inbox::new(second_frames), second, "arabridge-local")?,
            outbox: to_first,
        };
        Ok((first, second))
    }

    /// Make the calling thread the receive thread of a polled end.
    pub fn bind_receive_thread(&self) {
        self.delivery.inbox().bind_current_thread();
    }
}

impl MessageChannel for LocalChannel {
    fn send_message(&self, id: MessageId, encoder: &MessageEncoder) -> Result<()> {
        let frame = encode_frame(id, encoder)?;
        self.outbox
            .send(frame)
            .map_err(|_| IpcError::ChannelClosed)
    }

    fn set_receive_router(&self, router: ReceiveRouter) {
        self.delivery.inbox().set_router(router);
    }

    fn receives_on_current_thread(&self) -> bool {
        self.delivery.inbox().receives_on_current_thread()
    }

    fn wait_for_message(&self, timeout: Duration) -> bool {
        self.delivery.inbox().wait_for_message(timeout)
    }

    fn is_open(&self) -> bool {
        self.delivery.inbox().is_open()
    }
}
