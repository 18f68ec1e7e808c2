//! UDP ASSOCIATE support
//!
//! Datagram framing and the socket pair that relays it.

mod association;
mod packet;

pub use association::{watch_control, ClientDatagrams, RemoteDatagrams, UdpAssociation};
pub use packet::{encode_udp_packet, parse_udp_packet, put_udp_header, UdpPacket};
