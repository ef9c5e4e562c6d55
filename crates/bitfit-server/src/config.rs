//! Proxy configuration.

use std::net::SocketAddr;
use std::path::PathBuf;

use crate::auth::ProxyCredentials;

/// Default listen address (`:9090`).
pub const DEFAULT_BIND_ADDRESS: SocketAddr =
    SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), 9090);

/// Default max inbound body size forwarded upstream (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// PEM certificate chain and private key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsConfig {
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
}

/// Proxy configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind_address: SocketAddr,

    /// Credentials every caller must present.
    pub credentials: ProxyCredentials,

    /// `None` serves plain HTTP.
    pub tls: Option<TlsConfig>,

    /// Maximum inbound request body size in bytes.
    pub max_body_size: usize,
}

impl ServerConfig {
    /// Plain-HTTP config on the default address.
    pub fn new(credentials: ProxyCredentials) -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS,
            credentials,
            tls: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
        }
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_tls(mut self, cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        self.tls = Some(TlsConfig {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
        });
        self
    }

    pub fn with_max_body_size(mut self, bytes: usize) -> Self {
        self.max_body_size = bytes;
        self
    }
}
