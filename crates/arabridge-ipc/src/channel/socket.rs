//! Unix domain socket channel.
//!
//! Frames travel as a big-endian `u32` length followed by the frame bytes. Socket
//! I/O runs on a private tokio runtime (one reader task, one writer task); received
//! frames are delivered exactly like [`LocalChannel`](super::LocalChannel) frames.

use super::{Delivery, DeliveryMode, Inbox, MessageChannel, ReceiveRouter};
use crate::error::{IpcError, Result};
use arabridge_wire::{encode_frame, MessageEncoder, MessageId, MAX_FRAME_SIZE};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::runtime::Runtime;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

fn io_runtime() -> Result<Runtime> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .thread_name("arabridge-io")
        .enable_all()
        .build()?;
    Ok(runtime)
}

/// Channel over a connected Unix domain socket.
pub struct SocketChannel {
    delivery: Delivery,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    reader: JoinHandle<()>,
    _runtime: Arc<Runtime>,
}

impl SocketChannel {
    /// Connect to a listening endpoint.
    pub fn connect(socket_path: &Path, mode: DeliveryMode) -> Result<Self> {
        let runtime = Arc::new(io_runtime()?);
        let stream = runtime
            .block_on(UnixStream::connect(socket_path))
            .map_err(|e| {
                IpcError::ConnectionFailed(format!("{}: {}", socket_path.display(), e))
            })?;
        tracing::debug!("Connected to {}", socket_path.display());
        Self::from_stream(runtime, stream, mode)
    }

    fn from_stream(runtime: Arc<Runtime>, stream: UnixStream, mode: DeliveryMode) -> Result<Self> {
        let (read_half, write_half) = stream.into_split();
        let (frames_tx, frames_rx) = crossbeam_channel::unbounded();
        let (outbox, outbox_rx) = mpsc::unbounded_channel();

        let reader = runtime.spawn(read_frames(read_half, frames_tx));
        runtime.spawn(write_frames(write_half, outbox_rx));

        Ok(Self {
            delivery: Delivery::start(Inbox::new(frames_rx), mode, "arabridge-socket")?,
            outbox,
            reader,
            _runtime: runtime,
        })
    }

    /// Make the calling thread the receive thread of a polled channel.
    pub fn bind_receive_thread(&self) {
        self.delivery.inbox().bind_current_thread();
    }
}

impl MessageChannel for SocketChannel {
    fn send_message(&self, id: MessageId, encoder: &MessageEncoder) -> Result<()> {
        let frame = encode_frame(id, encoder)?;
        self.outbox.send(frame).map_err(|_| IpcError::ChannelClosed)
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
        self.delivery.inbox().is_open() && !self.outbox.is_closed()
    }
}

impl Drop for SocketChannel {
    fn drop(&mut self) {
        // Dropping the outbox ends the writer task, which shuts down the write half.
        self.reader.abort();
    }
}

async fn read_frames(mut stream: OwnedReadHalf, frames: crossbeam_channel::Sender<Vec<u8>>) {
    loop {
        let len = match stream.read_u32().await {
            Ok(len) => len as usize,
            Err(_) => break,
        };
        if len > MAX_FRAME_SIZE {
            tracing::warn!("Peer sent a {} byte frame, closing channel", len);
            break;
        }
        let mut data = vec![0u8; len];
        if let Err(e) = stream.read_exact(&mut data).await {
            tracing::warn!("Socket read failed: {}", e);
            break;
        }
        if frames.send(data).is_err() {
            break;
        }
    }
    tracing::debug!("Socket reader finished");
}

async fn write_frames(mut stream: OwnedWriteHalf, mut outbox: mpsc::UnboundedReceiver<Vec<u8>>) {
    while let Some(data) = outbox.recv().await {
        let result = async {
            stream.write_u32(data.len() as u32).await?;
            stream.write_all(&data).await?;
            stream.flush().await
        }
        .await;
        if let Err(e) = result {
            tracing::warn!("Socket write failed: {}", e);
            break;
        }
    }
}

/// Listening endpoint that accepts [`SocketChannel`]s.
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
    runtime: Arc<Runtime>,
}

impl SocketListener {
    /// Bind to `socket_path`, replacing a stale socket file.
    pub fn bind(socket_path: &Path) -> Result<Self> {
        let runtime = Arc::new(io_runtime()?);
        let _ = std::fs::remove_file(socket_path);
        let listener = {
            let _guard = runtime.enter();
            UnixListener::bind(socket_path)?
        };
        tracing::debug!("Listening on {}", socket_path.display());
        Ok(Self {
            listener,
            path: socket_path.to_path_buf(),
            runtime,
        })
    }

    /// Block until a peer connects.
    pub fn accept(&self, mode: DeliveryMode) -> Result<SocketChannel> {
        let (stream, _) = self.runtime.block_on(self.listener.accept())?;
        tracing::debug!("Accepted connection on {}", self.path.display());
        SocketChannel::from_stream(Arc::clone(&self.runtime), stream, mode)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}
