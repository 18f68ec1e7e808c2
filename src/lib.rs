//! # Sockrelay - SOCKS5 Proxy Server
//!
//! Sockrelay is a SOCKS5 proxy server (RFC 1928) supporting the CONNECT, BIND
//! and UDP ASSOCIATE commands without authentication.
//!
//! ## Features
//!
//! - **Full command set**: TCP CONNECT, TCP BIND and UDP ASSOCIATE
//! - **Fault isolation**: every client session runs on its own; a failing or
//!   panicking session never affects the listener or its siblings
//! - **Structured session logs**: every event is tagged with the session label
//! - **Graceful shutdown**: running sessions are cancelled and drained
//!
//! ## Usage
//!
//! ```rust,ignore
//! use sockrelay::config::load_config;
//! use sockrelay::server::run_server;
//! use tokio::sync::broadcast;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//!
//!     run_server(config, shutdown_rx).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS5 Client -> Server (accept) -> Session (handshake -> connector -> relay) -> Target
//! ```
//!
//! The server accepts connections and hands each one to a session pool. A
//! session negotiates the handshake, the connector establishes the requested
//! downstream, and the relay engine copies data until either side closes.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod relay;
pub mod server;
pub mod socks;
pub mod transport;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{Socks5Error, SockrelayError};
pub use server::{run_server, Server};

/// Version of the Sockrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
