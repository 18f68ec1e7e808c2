//! Duplex channel traits
//!
//! A channel is anything the relay can pull chunks from and push chunks to.
//! Stream sockets hand out arbitrary byte runs; datagram channels hand out
//! exactly one framed datagram per call.

use async_trait::async_trait;
use std::io;

/// Read side of a channel
#[async_trait]
pub trait ChannelReader: Send {
    /// Read the next chunk into `buf`, returning its length.
    ///
    /// `Ok(0)` means the peer has finished sending.
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Write side of a channel
#[async_trait]
pub trait ChannelWriter: Send {
    /// Write one whole chunk
    async fn write_chunk(&mut self, data: &[u8]) -> io::Result<()>;

    /// Signal that no more chunks follow
    async fn close(&mut self) -> io::Result<()>;
}

/// A channel that can be split into independently owned halves
pub trait DuplexChannel: Send {
    /// Read half
    type Reader: ChannelReader + 'static;
    /// Write half
    type Writer: ChannelWriter + 'static;

    /// Split into read and write halves
    fn split(self) -> (Self::Reader, Self::Writer);
}
