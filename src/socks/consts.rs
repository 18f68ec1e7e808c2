//! SOCKS5 protocol constants
//!
//! Defines all constants used in the SOCKS5 protocol implementation.

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication (advertised by clients, never selected)
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Commands
/// TCP CONNECT command
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;
/// TCP BIND command
pub const SOCKS5_CMD_TCP_BIND: u8 = 0x02;
/// UDP ASSOCIATE command
pub const SOCKS5_CMD_UDP_ASSOCIATE: u8 = 0x03;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

// Message sizes
/// Fixed part of a request or reply: VER CMD/REP RSV ATYP
pub const SOCKS5_HEADER_LEN: usize = 4;
/// Length of a greeting prefix: VER NMETHODS
pub const SOCKS5_GREETING_PREFIX_LEN: usize = 2;
/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;
/// Largest possible encoded address: ATYP + LEN + domain + PORT
pub const MAX_ADDR_LEN: usize = 1 + 1 + MAX_DOMAIN_LEN + 2;

// Buffer sizes
/// Relay chunk size for stream channels
pub const DEFAULT_BUFFER_SIZE: usize = 4096;
/// Maximum UDP payload
pub const MAX_UDP_PACKET: usize = 65535;
/// Relay chunk size for datagram channels: one payload plus its SOCKS5 UDP header
pub const UDP_RELAY_BUFFER_SIZE: usize = MAX_UDP_PACKET + 3 + MAX_ADDR_LEN;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_socks5_version() {
        assert_eq!(SOCKS5_VERSION, 5);
    }

    #[test]
    fn test_commands() {
        assert_eq!(SOCKS5_CMD_TCP_CONNECT, 1);
        assert_eq!(SOCKS5_CMD_TCP_BIND, 2);
        assert_eq!(SOCKS5_CMD_UDP_ASSOCIATE, 3);
    }

    #[test]
    fn test_address_types() {
        assert_eq!(SOCKS5_ADDR_TYPE_IPV4, 1);
        assert_eq!(SOCKS5_ADDR_TYPE_DOMAIN, 3);
        assert_eq!(SOCKS5_ADDR_TYPE_IPV6, 4);
    }

    #[test]
    fn test_buffer_sizes() {
        assert_eq!(DEFAULT_BUFFER_SIZE, 4096);
        assert_eq!(MAX_ADDR_LEN, 259);
        assert!(UDP_RELAY_BUFFER_SIZE > MAX_UDP_PACKET);
    }
}
