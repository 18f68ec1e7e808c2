//! SOCKS5 command parsing module
//!
//! Reads SOCKS5 requests off the client stream and writes replies back.

mod parser;
mod reply;

pub use parser::read_request;
pub use reply::{send_failure, send_reply, send_success};
