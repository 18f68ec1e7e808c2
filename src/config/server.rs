//! Server configuration types
//!
//! Defines the main configuration structures for the Sockrelay server.

use super::TcpConfig;
use crate::error::SockrelayError;
use crate::helper::{duration_from_secs, DEFAULT_CONNECT_TIMEOUT_SECS};
use crate::socks::DEFAULT_BUFFER_SIZE;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;

/// Default listen address
fn default_listen_addr() -> String {
    "127.0.0.1:1080".to_string()
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SockrelayError> {
        self.server.validate()
    }
}

/// Server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address the proxy listens on (e.g., "0.0.0.0:1080")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// SOCKS5 behavior
    #[serde(default)]
    pub socks: SocksConfig,

    /// Socket options
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            socks: SocksConfig::default(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SockrelayError> {
        if self.listen_addr.trim().is_empty() {
            return Err(SockrelayError::Config("listen_addr is empty".to_string()));
        }
        self.socks.validate()
    }
}

fn default_true() -> bool {
    true
}

/// Default handshake timeout in seconds
fn default_handshake_timeout() -> u64 {
    10
}

/// Default request timeout in seconds
fn default_request_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

/// Default BIND accept timeout in seconds
fn default_bind_timeout() -> u64 {
    120
}

fn default_relay_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// Inclusive port range used for BIND listeners
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    /// First port to try
    pub start: u16,
    /// Last port to try
    pub end: u16,
}

impl PortRange {
    /// Iterate over the ports of the range
    pub fn ports(&self) -> impl Iterator<Item = u16> {
        self.start..=self.end
    }
}

/// SOCKS5 server configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocksConfig {
    /// Allow BIND command
    #[serde(default = "default_true")]
    pub allow_bind: bool,

    /// Allow UDP associate command
    #[serde(default = "default_true")]
    pub allow_udp: bool,

    /// Local IP for BIND listeners (defaults to the client connection's local IP)
    #[serde(default)]
    pub bind_addr: Option<IpAddr>,

    /// Ports for BIND listeners (defaults to an ephemeral port)
    #[serde(default)]
    pub bind_port_range: Option<PortRange>,

    /// Local IP for the client-facing UDP relay socket
    #[serde(default)]
    pub udp_bind_addr: Option<IpAddr>,

    /// Greeting + request timeout in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// Outbound connect timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// How long a BIND listener waits for its peer, in seconds
    #[serde(default = "default_bind_timeout")]
    pub bind_timeout: u64,

    /// Relay chunk size for stream sessions
    #[serde(default = "default_relay_buffer_size")]
    pub relay_buffer_size: usize,
}

impl Default for SocksConfig {
    fn default() -> Self {
        Self {
            allow_bind: true,
            allow_udp: true,
            bind_addr: None,
            bind_port_range: None,
            udp_bind_addr: None,
            handshake_timeout: default_handshake_timeout(),
            request_timeout: default_request_timeout(),
            bind_timeout: default_bind_timeout(),
            relay_buffer_size: default_relay_buffer_size(),
        }
    }
}

impl SocksConfig {
    /// Handshake timeout as a Duration
    pub fn handshake_timeout(&self) -> Duration {
        duration_from_secs(self.handshake_timeout)
    }

    /// Outbound connect timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        duration_from_secs(self.request_timeout)
    }

    /// BIND accept timeout as a Duration
    pub fn bind_timeout(&self) -> Duration {
        duration_from_secs(self.bind_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), SockrelayError> {
        if let Some(range) = self.bind_port_range {
            if range.start > range.end {
                return Err(SockrelayError::Config(format!(
                    "bind_port_range start {} is after end {}",
                    range.start, range.end
                )));
            }
            if range.start == 0 {
                return Err(SockrelayError::Config(
                    "bind_port_range must not include port 0".to_string(),
                ));
            }
        }
        if self.relay_buffer_size == 0 {
            return Err(SockrelayError::Config(
                "relay_buffer_size must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("handshake_timeout", self.handshake_timeout),
            ("request_timeout", self.request_timeout),
            ("bind_timeout", self.bind_timeout),
        ] {
            if value == 0 {
                return Err(SockrelayError::Config(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}
