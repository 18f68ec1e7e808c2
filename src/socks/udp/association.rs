//! UDP ASSOCIATE relay sockets
//!
//! An association owns two sockets. The client-facing socket receives
//! framed datagrams from the client and sends framed replies back to it; the
//! outbound socket talks plain UDP to destinations. Both are exposed as
//! duplex channels whose chunks are whole framed datagrams, so the generic
//! relay pumps them like any other channel:
//!
//! ```text
//! client --framed--> ClientDatagrams --> RemoteDatagrams --payload--> destination
//! client <--framed-- ClientDatagrams <-- RemoteDatagrams <--payload-- destination
//! ```

use super::packet::{parse_udp_packet, put_udp_header, MAX_IP_UDP_HEADER_LEN};
use crate::socks::types::TargetAddr;
use crate::transport::{ChannelReader, ChannelWriter, DuplexChannel};
use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, OnceLock};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

/// Sockets backing one UDP ASSOCIATE session
#[derive(Debug)]
pub struct UdpAssociation {
    client_socket: Arc<UdpSocket>,
    remote_socket: Arc<UdpSocket>,
    client_ip: IpAddr,
}

impl UdpAssociation {
    /// Bind the client-facing socket on `bind_ip` and an outbound socket.
    ///
    /// Only datagrams whose source IP is `client_ip` are relayed.
    pub async fn open(client_ip: IpAddr, bind_ip: IpAddr) -> io::Result<Self> {
        let client_socket = UdpSocket::bind(SocketAddr::new(bind_ip, 0)).await?;
        let remote_socket = bind_outbound()?;

        debug!(
            "UDP association bound: client side {:?}, outbound {:?}",
            client_socket.local_addr(),
            remote_socket.local_addr()
        );

        Ok(UdpAssociation {
            client_socket: Arc::new(client_socket),
            remote_socket: Arc::new(remote_socket),
            client_ip: client_ip.to_canonical(),
        })
    }

    /// Address the client must send its datagrams to
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.client_socket.local_addr()
    }

    /// Split into the client-facing and the destination-facing channels
    pub fn split(self) -> (ClientDatagrams, RemoteDatagrams) {
        let ipv6 = matches!(self.remote_socket.local_addr(), Ok(SocketAddr::V6(_)));
        (
            ClientDatagrams {
                socket: self.client_socket,
                client_ip: self.client_ip,
                client_addr: Arc::new(OnceLock::new()),
            },
            RemoteDatagrams {
                socket: self.remote_socket,
                ipv6,
            },
        )
    }
}

/// Outbound socket: dual-stack where the host allows it, IPv4 otherwise
fn bind_outbound() -> io::Result<UdpSocket> {
    let socket = match dual_stack_socket() {
        Ok(socket) => socket,
        Err(e) => {
            debug!("Dual-stack UDP socket unavailable ({}), using IPv4", e);
            let socket = std::net::UdpSocket::bind(SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)))?;
            socket.set_nonblocking(true)?;
            socket
        }
    };
    UdpSocket::from_std(socket)
}

fn dual_stack_socket() -> io::Result<std::net::UdpSocket> {
    let socket = Socket::new(Domain::IPV6, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_only_v6(false)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)).into())?;
    Ok(socket.into())
}

fn canonical(addr: SocketAddr) -> SocketAddr {
    SocketAddr::new(addr.ip().to_canonical(), addr.port())
}

/// ICMP errors surface on some platforms as reset/refused on the next receive
fn is_transient(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionRefused
    )
}

/// Client-facing side of an association.
///
/// Reads yield framed datagrams sent by the client; writes send framed
/// datagrams back to it. The client's port is learned from its first datagram.
#[derive(Debug, Clone)]
pub struct ClientDatagrams {
    socket: Arc<UdpSocket>,
    client_ip: IpAddr,
    client_addr: Arc<OnceLock<SocketAddr>>,
}

impl ClientDatagrams {
    /// Client endpoint, once it has sent something
    pub fn client_addr(&self) -> Option<SocketAddr> {
        self.client_addr.get().copied()
    }
}

impl DuplexChannel for ClientDatagrams {
    type Reader = ClientDatagrams;
    type Writer = ClientDatagrams;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (self.clone(), self)
    }
}

#[async_trait]
impl ChannelReader for ClientDatagrams {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            let (n, from) = match self.socket.recv_from(buf).await {
                Ok(received) => received,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e),
            };
            let from = canonical(from);

            if from.ip() != self.client_ip {
                debug!("Dropping datagram from unexpected host {}", from);
                continue;
            }
            let expected = *self.client_addr.get_or_init(|| from);
            if expected != from {
                debug!("Dropping datagram from {}, association belongs to {}", from, expected);
                continue;
            }
            if n == 0 {
                continue;
            }
            return Ok(n);
        }
    }
}

#[async_trait]
impl ChannelWriter for ClientDatagrams {
    async fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        match self.client_addr.get() {
            Some(addr) => {
                if let Err(e) = self.socket.send_to(data, addr).await {
                    debug!("Failed to send datagram to client {}: {}", addr, e);
                }
            }
            None => debug!("Dropping reply datagram, client endpoint not known yet"),
        }
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Destination-facing side of an association.
///
/// Writes take a framed datagram, strip the header and send the payload to
/// the named destination. Reads wrap each reply in a header naming its source.
#[derive(Debug, Clone)]
pub struct RemoteDatagrams {
    socket: Arc<UdpSocket>,
    ipv6: bool,
}

impl RemoteDatagrams {
    fn outbound_addr(&self, dest: SocketAddr) -> io::Result<SocketAddr> {
        match (dest, self.ipv6) {
            (SocketAddr::V4(v4), true) => Ok(SocketAddr::new(
                IpAddr::V6(v4.ip().to_ipv6_mapped()),
                v4.port(),
            )),
            (SocketAddr::V6(_), false) => Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no IPv6 socket to reach {}", dest),
            )),
            _ => Ok(dest),
        }
    }
}

impl DuplexChannel for RemoteDatagrams {
    type Reader = RemoteDatagrams;
    type Writer = RemoteDatagrams;

    fn split(self) -> (Self::Reader, Self::Writer) {
        (self.clone(), self)
    }
}

#[async_trait]
impl ChannelReader for RemoteDatagrams {
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.len() <= MAX_IP_UDP_HEADER_LEN {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "buffer too small for a framed datagram",
            ));
        }

        loop {
            // Receive past the largest header so the real one can be slid in front.
            let (n, from) = match self.socket.recv_from(&mut buf[MAX_IP_UDP_HEADER_LEN..]).await {
                Ok(received) => received,
                Err(e) if is_transient(&e) => continue,
                Err(e) => return Err(e),
            };

            let mut header = Vec::with_capacity(MAX_IP_UDP_HEADER_LEN);
            put_udp_header(&mut header, &TargetAddr::from(canonical(from)))
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

            let start = MAX_IP_UDP_HEADER_LEN;
            buf.copy_within(start..start + n, header.len());
            buf[..header.len()].copy_from_slice(&header);
            return Ok(header.len() + n);
        }
    }
}

#[async_trait]
impl ChannelWriter for RemoteDatagrams {
    async fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        let packet = match parse_udp_packet(data) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Dropping client datagram: {}", e);
                return Ok(());
            }
        };

        let dest = match packet.addr.resolve().await {
            Ok(dest) => dest,
            Err(e) => {
                debug!("Dropping datagram for {}: {}", packet.addr, e);
                return Ok(());
            }
        };

        let sent = match self.outbound_addr(dest) {
            Ok(target) => self.socket.send_to(packet.data, target).await.map(|_| ()),
            Err(e) => Err(e),
        };
        if let Err(e) = sent {
            debug!("Failed to send datagram to {}: {}", dest, e);
        }
        Ok(())
    }

    async fn close(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wait until the TCP control connection of an association closes.
///
/// The association lives exactly as long as this connection.
pub async fn watch_control<S>(stream: &mut S)
where
    S: AsyncRead + Unpin,
{
    let mut buf = [0u8; 64];

    loop {
        match stream.read(&mut buf).await {
            Ok(0) => {
                debug!("Control stream closed, terminating UDP association");
                break;
            }
            Ok(_) => {
                warn!("Unexpected data on UDP control stream");
            }
            Err(e) => {
                debug!("Control stream error: {}", e);
                break;
            }
        }
    }
}
