//! Plug-in endpoint binary.
//!
//! Usage: arabridge-server [config.json]

use arabridge_remote::StaticEndpoint;
use arabridge_server::{EndpointServer, ServerConfig, ServerError};
use std::env;

fn main() -> Result<(), ServerError> {
    tracing_subscriber::fmt::init();

    let config = match env::args().nth(1) {
        Some(path) => ServerConfig::load(path)?,
        None => ServerConfig::default(),
    };
    tracing::info!("Serving {} factory(ies)", config.factories.len());

    let server = EndpointServer::bind_and_accept(&config, StaticEndpoint::new(config.factories.clone()))?;
    server.run()
}
