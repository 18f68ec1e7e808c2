//! UDP packet encoding/decoding for SOCKS5
//!
//! Handles the encapsulation format for UDP packets in SOCKS5.

use crate::error::Socks5Error;
use crate::socks::codec::{decode_addr, put_addr};
use crate::socks::types::{AddrType, TargetAddr};
use bytes::{Buf, BufMut};

/// `RSV(2) FRAG(1)` ahead of the address
pub const UDP_HEADER_PREFIX_LEN: usize = 3;

/// Longest header for an IP-addressed datagram (`RSV FRAG ATYP` + IPv6 + port)
pub const MAX_IP_UDP_HEADER_LEN: usize = UDP_HEADER_PREFIX_LEN + 1 + 16 + 2;

/// A decoded, unfragmented SOCKS5 UDP datagram
///
/// # UDP Request/Response Format
///
/// ```text
/// +----+------+------+----------+----------+----------+
/// |RSV | FRAG | ATYP | DST.ADDR | DST.PORT |   DATA   |
/// +----+------+------+----------+----------+----------+
/// | 2  |  1   |  1   | Variable |    2     | Variable |
/// +----+------+------+----------+----------+----------+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpPacket<'a> {
    /// Destination (client to remote) or source (remote to client)
    pub addr: TargetAddr,
    /// Payload after the header
    pub data: &'a [u8],
}

/// Parse a SOCKS5 UDP datagram.
///
/// Fragments are rejected with [`Socks5Error::Fragmented`]: reassembly is
/// not supported, so they are dropped by the relay.
pub fn parse_udp_packet(data: &[u8]) -> Result<UdpPacket<'_>, Socks5Error> {
    if data.len() < UDP_HEADER_PREFIX_LEN + 1 {
        return Err(Socks5Error::Truncated {
            needed: UDP_HEADER_PREFIX_LEN + 1,
            available: data.len(),
        });
    }

    let mut buf = data;

    let rsv = buf.get_u16();
    if rsv != 0 {
        return Err(Socks5Error::InvalidReserved(
            rsv.to_be_bytes().into_iter().find(|b| *b != 0).unwrap_or_default(),
        ));
    }

    let frag = buf.get_u8();
    if frag != 0 {
        return Err(Socks5Error::Fragmented(frag));
    }

    let addr_type = AddrType::from_byte(buf.get_u8())?;
    let (addr, consumed) = decode_addr(addr_type, buf)?;

    Ok(UdpPacket {
        addr,
        data: &buf[consumed..],
    })
}

/// Append the datagram header naming `addr`
pub fn put_udp_header<B: BufMut>(buf: &mut B, addr: &TargetAddr) -> Result<(), Socks5Error> {
    buf.put_u16(0);
    buf.put_u8(0);
    put_addr(buf, addr)
}

/// Encode a complete datagram
pub fn encode_udp_packet(packet: &UdpPacket<'_>) -> Result<Vec<u8>, Socks5Error> {
    let mut buf = Vec::with_capacity(MAX_IP_UDP_HEADER_LEN + packet.data.len());
    put_udp_header(&mut buf, &packet.addr)?;
    buf.extend_from_slice(packet.data);
    Ok(buf)
}
