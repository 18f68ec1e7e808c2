//! SOCKS5 wire codec
//!
//! Pure encode/decode functions for the greeting, method selection, request
//! and reply messages. Callers hand in complete, length-known byte regions;
//! nothing here performs I/O.
//!
//! Address encoding is shared by every message (and by the UDP datagram
//! header) and is driven by [`AddrType`]:
//!
//! ```text
//! ATYP 0x01: 4 raw bytes
//! ATYP 0x03: 1 length byte + that many UTF-8 bytes
//! ATYP 0x04: 16 raw bytes
//! followed in all cases by a 2-byte big-endian port
//! ```

use super::consts::*;
use super::types::{AddrType, Reply, RequestedTarget, SocksCommand, TargetAddr};
use crate::error::{Socks5Error, Socks5ReplyCode};
use bytes::{Buf, BufMut};
use std::net::{Ipv4Addr, Ipv6Addr};

/// Client greeting: protocol version and advertised authentication methods
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Greeting {
    /// Protocol version byte
    pub version: u8,
    /// Advertised method bytes, in client order
    pub methods: Vec<u8>,
}

impl Greeting {
    /// Whether the client advertised `method`
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

/// Decoded fixed header of a request: `VER CMD RSV ATYP`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    /// Requested command
    pub command: SocksCommand,
    /// Type of the address that follows
    pub addr_type: AddrType,
}

fn ensure_len(buf: &[u8], needed: usize) -> Result<(), Socks5Error> {
    if buf.len() < needed {
        return Err(Socks5Error::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

/// Decode a client greeting: `VER NMETHODS METHODS...`
pub fn decode_greeting(bytes: &[u8]) -> Result<Greeting, Socks5Error> {
    ensure_len(bytes, SOCKS5_GREETING_PREFIX_LEN)?;

    let version = bytes[0];
    if version != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(version));
    }

    let count = bytes[1] as usize;
    ensure_len(bytes, SOCKS5_GREETING_PREFIX_LEN + count)?;

    Ok(Greeting {
        version,
        methods: bytes[SOCKS5_GREETING_PREFIX_LEN..SOCKS5_GREETING_PREFIX_LEN + count].to_vec(),
    })
}

/// Encode a client greeting advertising `methods`
pub fn encode_greeting(methods: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(SOCKS5_GREETING_PREFIX_LEN + methods.len());
    buf.put_u8(SOCKS5_VERSION);
    buf.put_u8(methods.len() as u8);
    buf.put_slice(methods);
    buf
}

/// Encode the server's method selection: `VER METHOD`
pub fn encode_method_selection(method: u8) -> [u8; 2] {
    [SOCKS5_VERSION, method]
}

/// Decode the 4-byte request header.
///
/// Checks run in wire order, so a request with both a bad command and a bad
/// address type reports the command.
pub fn decode_request_header(header: &[u8]) -> Result<RequestHeader, Socks5Error> {
    ensure_len(header, SOCKS5_HEADER_LEN)?;

    if header[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(header[0]));
    }
    let command =
        SocksCommand::from_byte(header[1]).ok_or(Socks5Error::CommandNotSupported(header[1]))?;
    if header[2] != SOCKS5_RESERVED {
        return Err(Socks5Error::InvalidReserved(header[2]));
    }
    let addr_type = AddrType::from_byte(header[3])?;

    Ok(RequestHeader { command, addr_type })
}

/// Decode a complete request: header, address and port
pub fn decode_request(bytes: &[u8]) -> Result<RequestedTarget, Socks5Error> {
    let header = decode_request_header(bytes)?;
    let (addr, _) = decode_addr(header.addr_type, &bytes[SOCKS5_HEADER_LEN..])?;
    Ok(RequestedTarget::new(header.command, addr))
}

/// Encode a request (the inverse of [`decode_request`])
pub fn encode_request(target: &RequestedTarget) -> Result<Vec<u8>, Socks5Error> {
    let mut buf = Vec::with_capacity(3 + MAX_ADDR_LEN);
    buf.put_u8(SOCKS5_VERSION);
    buf.put_u8(target.command.to_byte());
    buf.put_u8(SOCKS5_RESERVED);
    put_addr(&mut buf, &target.addr)?;
    Ok(buf)
}

/// Encode a reply: `VER REP RSV ATYP BND.ADDR BND.PORT`
pub fn encode_reply(reply: &Reply) -> Result<Vec<u8>, Socks5Error> {
    let mut buf = Vec::with_capacity(3 + MAX_ADDR_LEN);
    buf.put_u8(SOCKS5_VERSION);
    buf.put_u8(reply.code.into());
    buf.put_u8(SOCKS5_RESERVED);
    put_addr(&mut buf, &reply.bind_addr)?;
    Ok(buf)
}

/// Decode a reply (the inverse of [`encode_reply`])
pub fn decode_reply(bytes: &[u8]) -> Result<Reply, Socks5Error> {
    ensure_len(bytes, SOCKS5_HEADER_LEN)?;

    if bytes[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(bytes[0]));
    }
    let code = Socks5ReplyCode::try_from(bytes[1])?;
    if bytes[2] != SOCKS5_RESERVED {
        return Err(Socks5Error::InvalidReserved(bytes[2]));
    }
    let addr_type = AddrType::from_byte(bytes[3])?;
    let (bind_addr, _) = decode_addr(addr_type, &bytes[SOCKS5_HEADER_LEN..])?;

    Ok(Reply::new(code, bind_addr))
}

/// Number of bytes that follow `ATYP` for an address of `addr_type`.
///
/// `domain_len` is the length prefix and is only consulted for domains.
pub fn addr_body_len(addr_type: AddrType, domain_len: u8) -> usize {
    match addr_type.fixed_len() {
        Some(len) => len + 2,
        None => 1 + domain_len as usize + 2,
    }
}

/// Append `ATYP ADDR PORT` for `addr`
pub fn put_addr<B: BufMut>(buf: &mut B, addr: &TargetAddr) -> Result<(), Socks5Error> {
    match addr {
        TargetAddr::Ip(std::net::SocketAddr::V4(v4)) => {
            buf.put_u8(AddrType::Ipv4.to_byte());
            buf.put_slice(&v4.ip().octets());
        }
        TargetAddr::Ip(std::net::SocketAddr::V6(v6)) => {
            buf.put_u8(AddrType::Ipv6.to_byte());
            buf.put_slice(&v6.ip().octets());
        }
        TargetAddr::Domain(domain, _) => {
            if domain.is_empty() {
                return Err(Socks5Error::InvalidDomain("empty domain".to_string()));
            }
            if domain.len() > MAX_DOMAIN_LEN {
                return Err(Socks5Error::DomainTooLong(domain.len()));
            }
            buf.put_u8(AddrType::Domain.to_byte());
            buf.put_u8(domain.len() as u8);
            buf.put_slice(domain.as_bytes());
        }
    }
    buf.put_u16(addr.port());
    Ok(())
}

/// Decode `ADDR PORT` (the bytes after `ATYP`).
///
/// Returns the address and the number of bytes consumed.
pub fn decode_addr(addr_type: AddrType, bytes: &[u8]) -> Result<(TargetAddr, usize), Socks5Error> {
    let mut buf = bytes;

    let addr = match addr_type {
        AddrType::Ipv4 => {
            ensure_len(buf, addr_body_len(addr_type, 0))?;
            let mut octets = [0u8; 4];
            buf.copy_to_slice(&mut octets);
            let port = buf.get_u16();
            TargetAddr::ipv4(Ipv4Addr::from(octets), port)
        }
        AddrType::Ipv6 => {
            ensure_len(buf, addr_body_len(addr_type, 0))?;
            let mut octets = [0u8; 16];
            buf.copy_to_slice(&mut octets);
            let port = buf.get_u16();
            TargetAddr::ipv6(Ipv6Addr::from(octets), port)
        }
        AddrType::Domain => {
            ensure_len(buf, 1)?;
            let len = buf[0];
            ensure_len(buf, addr_body_len(addr_type, len))?;
            buf.advance(1);
            if len == 0 {
                return Err(Socks5Error::InvalidDomain("empty domain".to_string()));
            }
            let domain = std::str::from_utf8(&buf[..len as usize])
                .map_err(|_| Socks5Error::InvalidDomain("not valid UTF-8".to_string()))?
                .to_string();
            buf.advance(len as usize);
            let port = buf.get_u16();
            TargetAddr::Domain(domain, port)
        }
    };

    Ok((addr, bytes.len() - buf.len()))
}
