//! Plug-in endpoint server.
//!
//! Listens on two sockets (one per host dispatcher), wires the accepted channels
//! into a [`Connection`], and answers bootstrap and application calls on the thread
//! that accepted them.

use crate::config::ServerConfig;
use crate::error::Result;
use arabridge_ipc::{
    Connection, ConnectionConfig, DeliveryMode, MessageChannel, MessageHandler, SocketListener,
};
use arabridge_remote::{BootstrapService, EndpointProvider};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Bound but not yet connected endpoint.
pub struct EndpointListener {
    main: SocketListener,
    other: SocketListener,
    connection_config: ConnectionConfig,
}

impl EndpointListener {
    pub fn bind(config: &ServerConfig) -> Result<Self> {
        config.validate()?;
        let main = SocketListener::bind(&config.main_socket_path)?;
        let other = SocketListener::bind(&config.other_socket_path)?;
        info!(
            "Listening on {} (main) and {} (other threads)",
            main.path().display(),
            other.path().display()
        );
        Ok(Self {
            main,
            other,
            connection_config: config.connection_config(),
        })
    }

    /// Wait for the host to connect both channels.
    ///
    /// The calling thread becomes the creation thread: it receives main-thread
    /// traffic and must be the one that calls [`EndpointServer::run`].
    pub fn accept<P: EndpointProvider + 'static>(self, provider: P) -> Result<EndpointServer<P>> {
        let main = self.main.accept(DeliveryMode::Polled)?;
        let other = self
            .other
            .accept(self.connection_config.threaded_delivery())?;
        info!("Host connected");
        EndpointServer::from_channels(self.connection_config, main, other, provider)
    }
}

/// Plug-in side of a connection, serving one host.
pub struct EndpointServer<P> {
    connection: Arc<Connection>,
    service: Arc<BootstrapService<P>>,
    shutdown: Arc<AtomicBool>,
}

impl<P: EndpointProvider + 'static> EndpointServer<P> {
    /// Bind both sockets and block until the host connects.
    pub fn bind_and_accept(config: &ServerConfig, provider: P) -> Result<Self> {
        EndpointListener::bind(config)?.accept(provider)
    }

    /// Serve over already established channels. Must be called on the thread that
    /// receives `main`.
    pub fn from_channels(
        config: ConnectionConfig,
        main: impl MessageChannel + 'static,
        other: impl MessageChannel + 'static,
        provider: P,
    ) -> Result<Self> {
        let connection = Arc::new(Connection::new(config)?);
        connection.set_main_thread_channel(main)?;
        connection.set_other_threads_channel(other)?;

        let service = Arc::new(BootstrapService::new(provider));
        connection.set_message_handler(&service);

        Ok(Self {
            connection,
            service,
            shutdown: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn service(&self) -> &Arc<BootstrapService<P>> {
        &self.service
    }

    /// Install the handler for every non-bootstrap call.
    pub fn set_application_handler(&self, handler: Arc<dyn MessageHandler>) {
        self.service.set_application_handler(handler);
    }

    /// Flag that makes [`run`](Self::run) return after the current wait.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Serve until the host disconnects or shutdown is requested.
    pub fn run(&self) -> Result<()> {
        let poll_interval = self.connection.config().poll_interval.max(Duration::from_millis(1));
        while !self.shutdown.load(Ordering::SeqCst) && self.connection.is_open() {
            self.connection
                .wait_for_message_on_creation_thread(poll_interval);
        }

        if self.connection.is_open() {
            info!("Shutdown requested");
        } else {
            info!("Host disconnected");
        }
        debug!(
            "{} document controller(s) still alive at exit",
            self.service.document_controller_count()
        );
        Ok(())
    }
}
