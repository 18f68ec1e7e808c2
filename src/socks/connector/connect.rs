//! CONNECT: outbound TCP connection to the requested target

use crate::error::Socks5ReplyCode;
use crate::helper::io_timeout;
use crate::socks::command::{send_failure, send_success};
use crate::socks::types::TargetAddr;
use crate::transport::SocketOpts;
use anyhow::{Context, Result};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Handle TCP CONNECT command
///
/// Resolves and connects to `target` within `timeout`, then writes the reply.
/// Resolution and connection share the one deadline; each resolved address
/// is tried in turn. The success reply echoes the requested address. On
/// failure the I/O error is mapped to the closest reply code and no stream is
/// returned.
pub async fn connect<S>(
    client: &mut S,
    target: &TargetAddr,
    timeout: Duration,
    socket_opts: &SocketOpts,
) -> Result<TcpStream>
where
    S: AsyncWrite + Unpin,
{
    let deadline = Instant::now() + timeout;

    let candidates = match io_timeout(timeout, "resolve", target.resolve_all()).await {
        Ok(addrs) => addrs,
        Err(e) => {
            warn!("Failed to resolve {}: {}", target, e);
            reply_failure(client, Socks5ReplyCode::HostUnreachable).await;
            return Err(e).with_context(|| format!("Failed to resolve address: {}", target));
        }
    };

    debug!("Connecting to target {}: {:?}", target, candidates);

    let remaining = deadline.saturating_duration_since(Instant::now());
    let stream = match io_timeout(remaining, "connect", connect_any(&candidates)).await {
        Ok(stream) => stream,
        Err(e) => {
            warn!("Failed to connect to {}: {}", target, e);
            reply_failure(client, Socks5ReplyCode::from(&e)).await;
            return Err(e).with_context(|| format!("Failed to connect to {}", target));
        }
    };

    socket_opts.hint(&stream);
    send_success(client, target.clone())
        .await
        .context("Failed to send CONNECT reply")?;

    info!("SOCKS5 tunnel established to {}", target);
    Ok(stream)
}

/// First address that accepts the connection; otherwise the last error
async fn connect_any(candidates: &[SocketAddr]) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in candidates {
        match TcpStream::connect(*addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => {
                debug!("Connect to {} failed: {}", addr, e);
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable)))
}

/// Best-effort failure reply; the session is ending either way
pub(super) async fn reply_failure<S>(client: &mut S, code: Socks5ReplyCode)
where
    S: AsyncWrite + Unpin,
{
    if let Err(e) = send_failure(client, code).await {
        debug!("Failed to send {:?} reply: {:#}", code, e);
    }
}
