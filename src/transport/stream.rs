//! Stream adapter for the duplex channel traits

use super::{ChannelReader, ChannelWriter, DuplexChannel};
use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};

/// Duplex channel over any tokio byte stream
#[derive(Debug)]
pub struct StreamChannel<S> {
    inner: S,
}

impl<S> StreamChannel<S> {
    /// Wrap a stream
    pub fn new(inner: S) -> Self {
        StreamChannel { inner }
    }
}

/// Read half of a [`StreamChannel`]
#[derive(Debug)]
pub struct StreamReader<S>(ReadHalf<S>);

/// Write half of a [`StreamChannel`]
#[derive(Debug)]
pub struct StreamWriter<S>(WriteHalf<S>);

impl<S> DuplexChannel for StreamChannel<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    type Reader = StreamReader<S>;
    type Writer = StreamWriter<S>;

    fn split(self) -> (Self::Reader, Self::Writer) {
        let (reader, writer) = tokio::io::split(self.inner);
        (StreamReader(reader), StreamWriter(writer))
    }
}

#[async_trait]
impl<S> ChannelReader for StreamReader<S>
where
    S: AsyncRead + Send,
{
    async fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf).await
    }
}

#[async_trait]
impl<S> ChannelWriter for StreamWriter<S>
where
    S: AsyncWrite + Send,
{
    async fn write_chunk(&mut self, data: &[u8]) -> io::Result<()> {
        self.0.write_all(data).await?;
        self.0.flush().await
    }

    async fn close(&mut self) -> io::Result<()> {
        self.0.shutdown().await
    }
}
