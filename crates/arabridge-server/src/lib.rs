//! Plug-in endpoint process for arabridge.
//!
//! Binds the main-thread and other-threads sockets, waits for a host, and serves
//! bootstrap calls for the factories listed in its [`ServerConfig`].
//!
//! ## Usage
//!
//! ```ignore
//! use arabridge_remote::StaticEndpoint;
//! use arabridge_server::{EndpointServer, ServerConfig};
//!
//! let config = ServerConfig::load("endpoint.json")?;
//! let server = EndpointServer::bind_and_accept(&config, StaticEndpoint::new(config.factories.clone()))?;
//! server.run()?;
//! ```

pub mod config;
pub mod error;
pub mod server;

pub use config::ServerConfig;
pub use error::{Result, ServerError};
pub use server::{EndpointListener, EndpointServer};
