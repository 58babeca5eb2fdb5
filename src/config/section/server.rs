//! `[server]` section configuration.
//!
//! The render server is the built bundle started as a subprocess; pages are
//! fetched from it over loopback HTTP.
//!
//! # Example
//!
//! ```toml
//! [server]
//! command = ["node", "server.js"]
//! interface = "127.0.0.1"
//! port = 8084
//! ```

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use url::Url;

/// Render server settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Command starting the render server, as an argv array.
    /// Run from the project root; terminated once generation settles.
    pub command: Vec<String>,

    /// Interface the render server listens on.
    pub interface: IpAddr,

    /// Port the render server listens on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: vec!["node".into(), "server.js".into()],
            interface: IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)),
            port: 8084,
        }
    }
}

impl ServerConfig {
    /// Socket address probed for readiness.
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.interface, self.port)
    }

    /// Base URL pages are fetched from.
    pub fn base_url(&self) -> Url {
        // SocketAddr's Display brackets IPv6 addresses, so the result is
        // always a parseable authority.
        Url::parse(&format!("http://{}", self.addr()))
            .unwrap_or_else(|_| unreachable!("loopback base url is always valid"))
    }
}
