//! Test utilities for Sockrelay
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use sockrelay::config::ServerConfig;
use sockrelay::server::{MemoryLog, PoolStats, Server};
use sockrelay::socks::codec::{addr_body_len, decode_reply};
use sockrelay::socks::{AddrType, Reply};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Upper bound for any single step of an integration test
pub const STEP_TIMEOUT: Duration = Duration::from_secs(5);

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Start a TCP echo server; it serves any number of connections
pub async fn spawn_echo_server() -> SocketAddr {
    let (listener, addr) = create_test_listener().await;
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut reader, mut writer) = stream.split();
                let _ = tokio::io::copy(&mut reader, &mut writer).await;
            });
        }
    });
    addr
}

/// Start a UDP echo server
pub async fn spawn_udp_echo_server() -> SocketAddr {
    let socket = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = socket.local_addr().unwrap();
    tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        while let Ok((n, from)) = socket.recv_from(&mut buf).await {
            let _ = socket.send_to(&buf[..n], from).await;
        }
    });
    addr
}

/// A proxy running on a loopback port
pub struct TestProxy {
    /// Proxy address
    pub addr: SocketAddr,
    /// Captured session log
    pub log: Arc<MemoryLog>,
    /// Pool counters
    pub stats: Arc<PoolStats>,
    /// Shutdown trigger
    pub shutdown_tx: broadcast::Sender<bool>,
    /// Server task
    pub handle: JoinHandle<anyhow::Result<()>>,
}

impl TestProxy {
    /// Stop the server and wait for it to drain
    pub async fn shutdown(self) {
        self.shutdown_tx.send(true).unwrap();
        tokio::time::timeout(STEP_TIMEOUT, self.handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

/// Server configuration listening on an ephemeral loopback port
pub fn test_config() -> ServerConfig {
    ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    }
}

/// Start a proxy with `config`
pub async fn start_proxy(config: ServerConfig) -> TestProxy {
    let log = Arc::new(MemoryLog::new());
    let server = Server::bind(config).await.unwrap().with_log(log.clone());
    let addr = server.local_addr().unwrap();
    let stats = server.stats();
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let handle = tokio::spawn(server.run(shutdown_rx));

    TestProxy {
        addr,
        log,
        stats,
        shutdown_tx,
        handle,
    }
}

/// Wait until `check` holds, polling every few milliseconds
pub async fn wait_until<F: Fn() -> bool>(check: F) {
    tokio::time::timeout(STEP_TIMEOUT, async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
}

/// SOCKS5 request bytes
pub mod socks5_mock {
    use sockrelay::socks::*;
    use std::net::SocketAddr;

    /// Create a no-auth method selection request
    pub fn create_auth_request_no_auth() -> Vec<u8> {
        vec![SOCKS5_VERSION, 1, SOCKS5_AUTH_METHOD_NONE]
    }

    /// Create a request for `command` to an IP address
    pub fn create_request(command: u8, addr: SocketAddr) -> Vec<u8> {
        let mut cmd = vec![SOCKS5_VERSION, command, SOCKS5_RESERVED];
        match addr {
            SocketAddr::V4(v4) => {
                cmd.push(SOCKS5_ADDR_TYPE_IPV4);
                cmd.extend_from_slice(&v4.ip().octets());
            }
            SocketAddr::V6(v6) => {
                cmd.push(SOCKS5_ADDR_TYPE_IPV6);
                cmd.extend_from_slice(&v6.ip().octets());
            }
        }
        cmd.extend_from_slice(&addr.port().to_be_bytes());
        cmd
    }

    /// Create a connect command to domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = vec![
            SOCKS5_VERSION,
            SOCKS5_CMD_TCP_CONNECT,
            SOCKS5_RESERVED,
            SOCKS5_ADDR_TYPE_DOMAIN,
            domain.len() as u8,
        ];
        cmd.extend_from_slice(domain.as_bytes());
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd
    }
}

/// Connect to the proxy and complete the method negotiation
pub async fn connect_client(proxy: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(proxy).await.unwrap();
    stream
        .write_all(&socks5_mock::create_auth_request_no_auth())
        .await
        .unwrap();
    let mut selection = [0u8; 2];
    stream.read_exact(&mut selection).await.unwrap();
    assert_eq!(selection, [0x05, 0x00]);
    stream
}

/// Read one complete reply from the proxy
pub async fn read_reply(stream: &mut TcpStream) -> Reply {
    let mut reply = vec![0u8; 4];
    tokio::time::timeout(STEP_TIMEOUT, stream.read_exact(&mut reply))
        .await
        .unwrap()
        .unwrap();

    let addr_type = AddrType::from_byte(reply[3]).unwrap();
    let domain_len = match addr_type {
        AddrType::Domain => stream.read_u8().await.unwrap(),
        _ => 0,
    };
    if addr_type == AddrType::Domain {
        reply.push(domain_len);
    }

    let start = reply.len();
    reply.resize(4 + addr_body_len(addr_type, domain_len), 0);
    stream.read_exact(&mut reply[start..]).await.unwrap();

    decode_reply(&reply).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_test_listener() {
        let (listener, addr) = create_test_listener().await;
        assert!(addr.port() > 0);
        drop(listener);
    }

    #[tokio::test]
    async fn test_echo_server() {
        let addr = spawn_echo_server().await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(b"hello").await.unwrap();
        let mut buf = [0u8; 5];
        stream.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_socks5_mock_request() {
        let cmd = socks5_mock::create_request(0x01, "192.168.1.1:8080".parse().unwrap());
        assert_eq!(cmd[0], 5); // SOCKS5 version
        assert_eq!(cmd[1], 1); // CONNECT
        assert_eq!(cmd[3], 1); // IPv4
        assert_eq!(&cmd[4..8], &[192, 168, 1, 1]);
        assert_eq!(&cmd[8..], &8080u16.to_be_bytes());
    }
}
