//! Environment-driven server configuration.

use crate::server::RestServer;
use std::env;

/// The knobs the server owns, read from the environment (with `.env`
/// support): `AQUA_ADDR`, `AQUA_PORT`, `AQUA_PRETTY`, `AQUA_VENDOR`.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub port: u16,
    pub pretty: String,
    pub vendor: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            addr: "0.0.0.0".into(),
            port: 8090,
            pretty: String::new(),
            vendor: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> ServerConfig {
        let _ = dotenvy::dotenv();
        let defaults = ServerConfig::default();
        ServerConfig {
            addr: env::var("AQUA_ADDR").unwrap_or(defaults.addr),
            port: env::var("AQUA_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            pretty: env::var("AQUA_PRETTY").unwrap_or_default(),
            vendor: env::var("AQUA_VENDOR").unwrap_or_default(),
        }
    }

    /// Apply onto a server: address and port always, fixture defaults only
    /// when set.
    pub fn apply(&self, server: &mut RestServer) {
        server.addr = self.addr.clone();
        server.port = self.port;
        if !self.pretty.is_empty() {
            server.fixture.pretty = self.pretty.clone();
        }
        if !self.vendor.is_empty() {
            server.fixture.vendor = self.vendor.clone();
        }
    }
}
