//! Test helpers and fixtures for arabridge integration tests
//!
//! A [`Session`] plays both processes inside one test: the test thread is the
//! host's creation thread, and a dedicated "plugin-main" thread owns the plug-in's
//! [`Connection`] and pumps it like a plug-in's main loop would.

#![allow(dead_code)]

use arabridge::prelude::*;
use crossbeam_channel::bounded;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long the plug-in main loop waits per iteration.
pub const PUMP_INTERVAL: Duration = Duration::from_millis(5);

/// [`MessageHandler`] backed by a closure.
pub struct FnHandler<F>(pub F);

impl<F> MessageHandler for FnHandler<F>
where
    F: Fn(MessageId, &MessageDecoder, &mut MessageEncoder) + Send + Sync,
{
    fn handle_received_message(
        &self,
        id: MessageId,
        decoder: &MessageDecoder,
        reply: &mut MessageEncoder,
    ) {
        (self.0)(id, decoder, reply)
    }
}

pub fn handler<F>(f: F) -> Arc<FnHandler<F>>
where
    F: Fn(MessageId, &MessageDecoder, &mut MessageEncoder) + Send + Sync,
{
    Arc::new(FnHandler(f))
}

/// Host connection on the test thread plus a running plug-in endpoint.
pub struct Session {
    pub host: Arc<Connection>,
    pub plugin: Option<Arc<Connection>>,
    stop: Arc<AtomicBool>,
    plugin_thread: Option<JoinHandle<()>>,
}

impl Session {
    /// Start a session whose host main channel is polled on the test thread.
    pub fn start<H, F>(make_handler: F) -> Self
    where
        H: MessageHandler + 'static,
        F: FnOnce(Arc<Connection>) -> Arc<H> + Send + 'static,
    {
        Self::start_with(DeliveryMode::Polled, make_handler)
    }

    /// Start a session. `make_handler` runs on the plug-in main thread and receives
    /// the plug-in side connection, so handlers can call back into the host.
    pub fn start_with<H, F>(host_main_mode: DeliveryMode, make_handler: F) -> Self
    where
        H: MessageHandler + 'static,
        F: FnOnce(Arc<Connection>) -> Arc<H> + Send + 'static,
    {
        let config = ConnectionConfig::default();
        let (host_main, plugin_main) =
            LocalChannel::pair(host_main_mode, DeliveryMode::Polled).expect("main channel");
        let (host_other, plugin_other) =
            LocalChannel::pair(config.threaded_delivery(), config.threaded_delivery())
                .expect("other-threads channel");

        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded(1);

        let plugin_thread = {
            let stop = Arc::clone(&stop);
            let config = config.clone();
            thread::Builder::new()
                .name("plugin-main".to_string())
                .spawn(move || {
                    plugin_main.bind_receive_thread();
                    let connection = Arc::new(Connection::new(config).expect("plugin connection"));
                    connection.set_main_thread_channel(plugin_main).unwrap();
                    connection.set_other_threads_channel(plugin_other).unwrap();

                    let handler = make_handler(Arc::clone(&connection));
                    connection.set_message_handler(&handler);
                    ready_tx.send(Arc::clone(&connection)).unwrap();

                    while !stop.load(Ordering::SeqCst) && connection.is_open() {
                        connection.wait_for_message_on_creation_thread(PUMP_INTERVAL);
                    }
                    drop(handler);
                })
                .expect("spawn plugin thread")
        };
        let plugin = ready_rx.recv().expect("plugin ready");

        let host = Arc::new(Connection::new(config).expect("host connection"));
        host.set_main_thread_channel(host_main).unwrap();
        host.set_other_threads_channel(host_other).unwrap();

        Self {
            host,
            plugin: Some(plugin),
            stop,
            plugin_thread: Some(plugin_thread),
        }
    }

    pub fn caller(&self) -> RemoteCaller {
        RemoteCaller::new(Arc::clone(&self.host))
    }

    /// Stop the plug-in main loop and drop its connection, closing both channels.
    pub fn stop_plugin(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.plugin_thread.take() {
            let _ = handle.join();
        }
        self.plugin = None;
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.stop_plugin();
    }
}
