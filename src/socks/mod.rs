//! SOCKS5 module for Sockrelay
//!
//! Wire codec, handshake negotiation and the connector that establishes the
//! downstream side of a session for CONNECT, BIND and UDP ASSOCIATE.

mod auth;
pub mod codec;
mod command;
pub mod connector;
mod consts;
mod handshake;
mod types;
pub mod udp;

pub use auth::{negotiate_auth, select_auth_method, AuthMethod};
pub use command::{read_request, send_failure, send_reply, send_success};
pub use connector::{Connector, Downstream};
pub use consts::*;
pub use handshake::{negotiate, HandshakeState, Negotiator};
pub use types::{AddrType, Reply, RequestedTarget, SocksCommand, TargetAddr};
