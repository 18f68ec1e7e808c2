//! SOCKS5 type definitions
//!
//! Defines the core value types used in SOCKS5 protocol handling. None of
//! them carry behavior beyond construction, field access and formatting.

use super::codec;
use super::consts::*;
use crate::error::{Socks5Error, Socks5ReplyCode};
use std::fmt;
use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

/// SOCKS5 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SocksCommand {
    /// TCP CONNECT - establish a TCP connection to target
    Connect,
    /// TCP BIND - wait for an incoming connection from target
    Bind,
    /// UDP ASSOCIATE - establish UDP relay
    UdpAssociate,
}

impl SocksCommand {
    /// Parse a command byte into SocksCommand
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS5_CMD_TCP_CONNECT => Some(SocksCommand::Connect),
            SOCKS5_CMD_TCP_BIND => Some(SocksCommand::Bind),
            SOCKS5_CMD_UDP_ASSOCIATE => Some(SocksCommand::UdpAssociate),
            _ => None,
        }
    }

    /// Convert SocksCommand to byte
    pub fn to_byte(self) -> u8 {
        match self {
            SocksCommand::Connect => SOCKS5_CMD_TCP_CONNECT,
            SocksCommand::Bind => SOCKS5_CMD_TCP_BIND,
            SocksCommand::UdpAssociate => SOCKS5_CMD_UDP_ASSOCIATE,
        }
    }
}

impl fmt::Display for SocksCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SocksCommand::Connect => write!(f, "CONNECT"),
            SocksCommand::Bind => write!(f, "BIND"),
            SocksCommand::UdpAssociate => write!(f, "UDP ASSOCIATE"),
        }
    }
}

/// Address type byte (`ATYP`) and the shape of the address it announces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddrType {
    /// 4 raw bytes
    Ipv4,
    /// 1 length byte followed by that many bytes
    Domain,
    /// 16 raw bytes
    Ipv6,
}

impl AddrType {
    /// Parse an `ATYP` byte. Unknown values are an error, never a default.
    pub fn from_byte(byte: u8) -> Result<Self, Socks5Error> {
        match byte {
            SOCKS5_ADDR_TYPE_IPV4 => Ok(AddrType::Ipv4),
            SOCKS5_ADDR_TYPE_DOMAIN => Ok(AddrType::Domain),
            SOCKS5_ADDR_TYPE_IPV6 => Ok(AddrType::Ipv6),
            other => Err(Socks5Error::AddressTypeNotSupported(other)),
        }
    }

    /// Convert to the `ATYP` byte
    pub fn to_byte(self) -> u8 {
        match self {
            AddrType::Ipv4 => SOCKS5_ADDR_TYPE_IPV4,
            AddrType::Domain => SOCKS5_ADDR_TYPE_DOMAIN,
            AddrType::Ipv6 => SOCKS5_ADDR_TYPE_IPV6,
        }
    }

    /// Length of the raw address bytes, or `None` when a length prefix decides it
    pub fn fixed_len(self) -> Option<usize> {
        match self {
            AddrType::Ipv4 => Some(4),
            AddrType::Ipv6 => Some(16),
            AddrType::Domain => None,
        }
    }
}

/// Target address for SOCKS5 requests
///
/// Represents the destination address in a SOCKS5 request.
/// Can be an IP address (v4 or v6) or a domain name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TargetAddr {
    /// IP address with port
    Ip(SocketAddr),
    /// Domain name with port
    Domain(String, u16),
}

impl TargetAddr {
    /// Create a new TargetAddr from an IPv4 address and port
    pub fn ipv4(ip: Ipv4Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(ip), port))
    }

    /// Create a new TargetAddr from an IPv6 address and port
    pub fn ipv6(ip: Ipv6Addr, port: u16) -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V6(ip), port))
    }

    /// Create a new TargetAddr from a domain name and port
    pub fn domain(domain: impl Into<String>, port: u16) -> Self {
        TargetAddr::Domain(domain.into(), port)
    }

    /// Get the port number
    pub fn port(&self) -> u16 {
        match self {
            TargetAddr::Ip(addr) => addr.port(),
            TargetAddr::Domain(_, port) => *port,
        }
    }

    /// Get the address type for the SOCKS5 encoding
    pub fn addr_type(&self) -> AddrType {
        match self {
            TargetAddr::Ip(SocketAddr::V4(_)) => AddrType::Ipv4,
            TargetAddr::Ip(SocketAddr::V6(_)) => AddrType::Ipv6,
            TargetAddr::Domain(_, _) => AddrType::Domain,
        }
    }

    /// Resolve the address to a SocketAddr
    ///
    /// For IP addresses, this returns immediately.
    /// For domain names, this performs DNS resolution.
    pub async fn resolve(&self) -> io::Result<SocketAddr> {
        self.resolve_all()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| io::Error::from(io::ErrorKind::AddrNotAvailable))
    }

    /// Resolve the address to every SocketAddr it names, in resolver order.
    ///
    /// Never returns an empty list.
    pub async fn resolve_all(&self) -> io::Result<Vec<SocketAddr>> {
        match self {
            TargetAddr::Ip(addr) => Ok(vec![*addr]),
            TargetAddr::Domain(domain, port) => {
                let addrs: Vec<SocketAddr> =
                    tokio::net::lookup_host((domain.as_str(), *port)).await?.collect();
                if addrs.is_empty() {
                    return Err(io::Error::new(
                        io::ErrorKind::AddrNotAvailable,
                        format!("No addresses found for domain: {}", domain),
                    ));
                }
                Ok(addrs)
            }
        }
    }

    /// Serialize the address to bytes for SOCKS5 protocol (`ATYP ADDR PORT`)
    pub fn to_bytes(&self) -> Result<Vec<u8>, Socks5Error> {
        let mut bytes = Vec::with_capacity(MAX_ADDR_LEN);
        codec::put_addr(&mut bytes, self)?;
        Ok(bytes)
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetAddr::Ip(addr) => write!(f, "{}", addr),
            TargetAddr::Domain(domain, port) => write!(f, "{}:{}", domain, port),
        }
    }
}

impl From<SocketAddr> for TargetAddr {
    fn from(addr: SocketAddr) -> Self {
        TargetAddr::Ip(addr)
    }
}

impl Default for TargetAddr {
    fn default() -> Self {
        TargetAddr::Ip(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))
    }
}

/// What the client asked for, as produced by the handshake
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedTarget {
    /// Requested command
    pub command: SocksCommand,
    /// Requested destination (or, for UDP ASSOCIATE, the client's expected source)
    pub addr: TargetAddr,
}

impl RequestedTarget {
    /// Create a new requested target
    pub fn new(command: SocksCommand, addr: TargetAddr) -> Self {
        RequestedTarget { command, addr }
    }
}

impl fmt::Display for RequestedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.command, self.addr)
    }
}

/// Reply status and bound address written back to the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// Reply status
    pub code: Socks5ReplyCode,
    /// Bound (or echoed) address
    pub bind_addr: TargetAddr,
}

impl Reply {
    /// Create a reply
    pub fn new(code: Socks5ReplyCode, bind_addr: TargetAddr) -> Self {
        Reply { code, bind_addr }
    }

    /// Success reply carrying `bind_addr`
    pub fn success(bind_addr: impl Into<TargetAddr>) -> Self {
        Reply::new(Socks5ReplyCode::Succeeded, bind_addr.into())
    }

    /// Failure reply; the address field is `0.0.0.0:0`
    pub fn failure(code: Socks5ReplyCode) -> Self {
        Reply::new(code, TargetAddr::default())
    }
}
