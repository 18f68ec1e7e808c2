//! Target connector
//!
//! Turns a [`RequestedTarget`] into the downstream channel for the session
//! and writes the reply that goes with it.

mod associate;
mod bind;
mod connect;

pub use associate::associate;
pub use bind::bind;
pub use connect::connect;

use crate::config::SocksConfig;
use crate::error::{Socks5Error, Socks5ReplyCode};
use crate::socks::types::{RequestedTarget, SocksCommand};
use crate::socks::udp::UdpAssociation;
use crate::transport::SocketOpts;
use anyhow::Result;
use std::net::SocketAddr;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tracing::warn;

/// Downstream channel established for a session
#[derive(Debug)]
pub enum Downstream {
    /// Outbound (CONNECT) or accepted (BIND) TCP connection
    Stream(TcpStream),
    /// UDP relay sockets (UDP ASSOCIATE)
    Datagram(UdpAssociation),
}

/// Establishes downstream channels for one client connection
#[derive(Debug)]
pub struct Connector<'a> {
    config: &'a SocksConfig,
    socket_opts: &'a SocketOpts,
    peer_addr: SocketAddr,
    local_addr: SocketAddr,
}

impl<'a> Connector<'a> {
    /// Create a connector for a client connected from `peer_addr` to our `local_addr`
    pub fn new(
        config: &'a SocksConfig,
        socket_opts: &'a SocketOpts,
        peer_addr: SocketAddr,
        local_addr: SocketAddr,
    ) -> Self {
        Connector {
            config,
            socket_opts,
            peer_addr,
            local_addr,
        }
    }

    /// Establish the downstream channel for `target` and write the reply.
    ///
    /// Every failure path has already answered the client when this returns
    /// an error.
    pub async fn establish<S>(&self, client: &mut S, target: &RequestedTarget) -> Result<Downstream>
    where
        S: AsyncWrite + Unpin,
    {
        match target.command {
            SocksCommand::Connect => connect(
                client,
                &target.addr,
                self.config.request_timeout(),
                self.socket_opts,
            )
            .await
            .map(Downstream::Stream),
            SocksCommand::Bind if self.config.allow_bind => bind(
                client,
                self.config.bind_addr.unwrap_or(self.local_addr.ip()),
                self.local_addr.ip(),
                self.config.bind_port_range,
                self.config.bind_timeout(),
                self.socket_opts,
            )
            .await
            .map(Downstream::Stream),
            SocksCommand::UdpAssociate if self.config.allow_udp => associate(
                client,
                self.peer_addr.ip(),
                self.config.udp_bind_addr.unwrap_or(self.local_addr.ip()),
                self.local_addr.ip(),
            )
            .await
            .map(Downstream::Datagram),
            command => {
                warn!("{} not allowed by configuration", command);
                connect::reply_failure(client, Socks5ReplyCode::CommandNotSupported).await;
                Err(Socks5Error::CommandNotSupported(command.to_byte()).into())
            }
        }
    }
}
