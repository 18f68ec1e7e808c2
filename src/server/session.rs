//! One client session
//!
//! A session owns the accepted client stream from the handshake until both
//! it and the downstream channel are closed:
//!
//! ```text
//! handshake -> connector -> relay (stream pair, or datagrams + control watch) -> closed
//! ```

use super::log::SessionLog;
use crate::config::ServerConfig;
use crate::error::SockrelayError;
use crate::relay::{relay_pair, RelayStats};
use crate::socks::udp::{watch_control, UdpAssociation};
use crate::socks::{negotiate, Connector, Downstream, RequestedTarget, UDP_RELAY_BUFFER_SIZE};
use crate::transport::{SocketOpts, StreamChannel};
use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::sync::CancellationToken;
use tracing::Level;

/// Identity of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionContext {
    /// Sequence number assigned at accept time
    pub id: u64,
    /// Client address
    pub peer_addr: SocketAddr,
    /// Our end of the client connection
    pub local_addr: SocketAddr,
}

impl SessionContext {
    /// Label that tags every log record of the session
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SessionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sess#{} {}", self.id, self.peer_addr)
    }
}

/// Settings shared by every session of a server
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Server configuration
    pub config: ServerConfig,
    /// Options for outbound and accepted sockets
    pub socket_opts: SocketOpts,
}

impl SessionSettings {
    /// Derive settings from configuration
    pub fn new(config: ServerConfig) -> Self {
        let socket_opts = SocketOpts::from_tcp_config(&config.tcp);
        SessionSettings {
            config,
            socket_opts,
        }
    }
}

/// A client session over stream `S`
pub struct Session<S> {
    ctx: SessionContext,
    stream: S,
    settings: Arc<SessionSettings>,
    log: Arc<dyn SessionLog>,
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Create a session for an accepted client stream
    pub fn new(
        ctx: SessionContext,
        stream: S,
        settings: Arc<SessionSettings>,
        log: Arc<dyn SessionLog>,
    ) -> Self {
        Session {
            ctx,
            stream,
            settings,
            log,
        }
    }

    /// Drive the session to completion.
    ///
    /// Cancellation before the relay starts drops whatever is in progress;
    /// once relaying, it is passed down so both directions stop cleanly.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let Session {
            ctx,
            mut stream,
            settings,
            log,
        } = self;
        let label = ctx.label();

        log.record(&label, Level::DEBUG, "session started", None);

        let (target, downstream) = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log.record(&label, Level::DEBUG, "cancelled before relay", None);
                return Ok(());
            }
            established = establish(&mut stream, &ctx, &settings) => established?,
        };

        log.record(&label, Level::INFO, &format!("{} established", target), None);

        let stats = match downstream {
            Downstream::Stream(remote) => {
                relay_pair(
                    StreamChannel::new(stream),
                    StreamChannel::new(remote),
                    settings.config.socks.relay_buffer_size,
                    &cancel,
                )
                .await?
            }
            Downstream::Datagram(association) => {
                relay_datagrams(&mut stream, association, &cancel).await?
            }
        };

        log.record(
            &label,
            Level::DEBUG,
            &format!(
                "relay closed: {} bytes up, {} bytes down",
                stats.upstream, stats.downstream
            ),
            None,
        );
        Ok(())
    }
}

/// Handshake then connect, bounded by the handshake timeout for the first part
async fn establish<S>(
    stream: &mut S,
    ctx: &SessionContext,
    settings: &SessionSettings,
) -> Result<(RequestedTarget, Downstream)>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let socks = &settings.config.socks;

    let target = tokio::time::timeout(socks.handshake_timeout(), negotiate(stream))
        .await
        .map_err(|_| SockrelayError::Timeout("SOCKS5 handshake".to_string()))?
        .context("SOCKS5 handshake failed")?;

    let connector = Connector::new(socks, &settings.socket_opts, ctx.peer_addr, ctx.local_addr);
    let downstream = connector
        .establish(stream, &target)
        .await
        .with_context(|| format!("Failed to establish {}", target))?;

    Ok((target, downstream))
}

/// Relay datagrams for as long as the control stream stays open
async fn relay_datagrams<S>(
    control: &mut S,
    association: UdpAssociation,
    cancel: &CancellationToken,
) -> Result<RelayStats>
where
    S: AsyncRead + Unpin,
{
    let (client, remote) = association.split();
    let scope = cancel.child_token();

    let relay = relay_pair(client, remote, UDP_RELAY_BUFFER_SIZE, &scope);
    tokio::pin!(relay);

    tokio::select! {
        result = &mut relay => result,
        _ = watch_control(control) => {
            scope.cancel();
            relay.await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Socks5ReplyCode;
    use crate::server::log::MemoryLog;
    use crate::socks::codec::decode_reply;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn context() -> SessionContext {
        SessionContext {
            id: 7,
            peer_addr: "127.0.0.1:40000".parse().unwrap(),
            local_addr: "127.0.0.1:1080".parse().unwrap(),
        }
    }

    fn settings() -> Arc<SessionSettings> {
        Arc::new(SessionSettings::new(ServerConfig::default()))
    }

    fn connect_request(target: SocketAddr) -> Vec<u8> {
        let mut data = vec![0x05, 0x01, 0x00, 0x05, 0x01, 0x00, 0x01];
        match target.ip() {
            std::net::IpAddr::V4(ip) => data.extend_from_slice(&ip.octets()),
            std::net::IpAddr::V6(_) => unreachable!("tests use IPv4"),
        }
        data.extend_from_slice(&target.port().to_be_bytes());
        data
    }

    #[test]
    fn test_session_label() {
        assert_eq!(context().label(), "sess#7 127.0.0.1:40000");
    }

    #[tokio::test]
    async fn test_session_connect_and_relay() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let target = listener.local_addr().unwrap();
        let (mut client, server_side) = duplex(4096);
        let log = Arc::new(MemoryLog::new());

        let session = Session::new(context(), server_side, settings(), log.clone());
        let task = tokio::spawn(session.run(CancellationToken::new()));

        client.write_all(&connect_request(target)).await.unwrap();
        let (mut remote, _) = listener.accept().await.unwrap();

        let mut selection = [0u8; 2];
        client.read_exact(&mut selection).await.unwrap();
        assert_eq!(selection, [0x05, 0x00]);
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(decode_reply(&reply).unwrap().code, Socks5ReplyCode::Succeeded);

        client.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        remote.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
        remote.write_all(&buf).await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");

        drop(remote);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();

        let records = log.records_for("sess#7 ");
        assert!(records.iter().any(|r| r.message.contains("established")));
        assert!(records.iter().any(|r| r.message.contains("5 bytes up")));
    }

    #[tokio::test]
    async fn test_session_handshake_timeout() {
        let mut config = ServerConfig::default();
        config.socks.handshake_timeout = 1;
        let (_client, server_side) = duplex(64);

        let session = Session::new(
            context(),
            server_side,
            Arc::new(SessionSettings::new(config)),
            Arc::new(MemoryLog::new()),
        );

        let err = session.run(CancellationToken::new()).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SockrelayError>(),
            Some(SockrelayError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_session_cancelled_during_handshake() {
        let (_client, server_side) = duplex(64);
        let session = Session::new(context(), server_side, settings(), Arc::new(MemoryLog::new()));
        let cancel = CancellationToken::new();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(1), session.run(cancel))
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_relay_datagrams_ends_with_control_stream() {
        let localhost = std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST);
        let association = UdpAssociation::open(localhost, localhost).await.unwrap();
        let (client, mut control) = duplex(64);
        drop(client);

        let stats = tokio::time::timeout(
            Duration::from_secs(1),
            relay_datagrams(&mut control, association, &CancellationToken::new()),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stats, RelayStats::default());
    }
}
