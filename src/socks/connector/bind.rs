//! BIND: wait for one inbound connection on the client's behalf
//!
//! Two replies are written, as RFC 1928 prescribes: the first carries the
//! listening address as soon as the listener is up, the second carries the
//! peer's address once it connects.

use super::connect::reply_failure;
use crate::config::PortRange;
use crate::error::{Socks5ReplyCode, SockrelayError};
use crate::socks::command::send_success;
use crate::transport::SocketOpts;
use anyhow::{Context, Result};
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

/// Handle BIND command
///
/// Listens on `bind_ip` (an ephemeral port, or the first free port of
/// `port_range`), then accepts exactly one connection within `accept_timeout`.
/// The listener is dropped as soon as that connection arrives. When `bind_ip`
/// is a wildcard, the first reply reports `reply_ip` instead.
pub async fn bind<S>(
    client: &mut S,
    bind_ip: IpAddr,
    reply_ip: IpAddr,
    port_range: Option<PortRange>,
    accept_timeout: Duration,
    socket_opts: &SocketOpts,
) -> Result<TcpStream>
where
    S: AsyncWrite + Unpin,
{
    let (listener, bound) = match open_listener(bind_ip, port_range).await {
        Ok(opened) => opened,
        Err(e) => {
            warn!("BIND listener on {} failed: {}", bind_ip, e);
            reply_failure(client, Socks5ReplyCode::GeneralFailure).await;
            return Err(e).with_context(|| format!("Failed to bind listener on {}", bind_ip));
        }
    };

    let mut advertised = bound;
    if advertised.ip().is_unspecified() {
        advertised.set_ip(reply_ip);
    }

    send_success(client, advertised)
        .await
        .context("Failed to send first BIND reply")?;
    info!("BIND listening on {} (advertised as {})", bound, advertised);

    let (stream, peer) = match tokio::time::timeout(accept_timeout, listener.accept()).await {
        Ok(Ok(accepted)) => accepted,
        Ok(Err(e)) => {
            warn!("BIND accept on {} failed: {}", bound, e);
            reply_failure(client, Socks5ReplyCode::from(&e)).await;
            return Err(e).with_context(|| format!("Failed to accept on {}", bound));
        }
        Err(_) => {
            warn!("No peer connected to {} within {:?}", bound, accept_timeout);
            reply_failure(client, Socks5ReplyCode::TtlExpired).await;
            return Err(SockrelayError::Timeout(format!("BIND accept on {}", bound)).into());
        }
    };
    drop(listener);

    socket_opts.hint(&stream);
    send_success(client, peer)
        .await
        .context("Failed to send second BIND reply")?;

    debug!("BIND peer {} connected to {}", peer, bound);
    Ok(stream)
}

async fn open_listener(
    ip: IpAddr,
    port_range: Option<PortRange>,
) -> io::Result<(TcpListener, SocketAddr)> {
    let listener = match port_range {
        None => TcpListener::bind(SocketAddr::new(ip, 0)).await?,
        Some(range) => bind_in_range(ip, range).await?,
    };
    let bound = listener.local_addr()?;
    Ok((listener, bound))
}

async fn bind_in_range(ip: IpAddr, range: PortRange) -> io::Result<TcpListener> {
    let mut last_err = None;
    for port in range.ports() {
        match TcpListener::bind(SocketAddr::new(ip, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::AddrInUse,
            format!("no free port in {}-{}", range.start, range.end),
        )
    }))
}
