//! Session supervisor: both relay directions as one scope

use super::forward::forward;
use crate::error::SockrelayError;
use crate::transport::DuplexChannel;
use anyhow::Result;
use std::fmt;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Relay direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Client channel to downstream channel
    Upstream,
    /// Downstream channel to client channel
    Downstream,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Upstream => write!(f, "client->target"),
            Direction::Downstream => write!(f, "target->client"),
        }
    }
}

/// Bytes moved by a finished relay
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Bytes forwarded client to target
    pub upstream: u64,
    /// Bytes forwarded target to client
    pub downstream: u64,
}

impl RelayStats {
    fn record(&mut self, direction: Direction, bytes: u64) {
        match direction {
            Direction::Upstream => self.upstream = bytes,
            Direction::Downstream => self.downstream = bytes,
        }
    }
}

/// Relay between `client` and `target` until either direction ends.
///
/// Each direction runs as its own task under a child of `cancel`. The first
/// direction to finish, for any reason, cancels the other, which is then
/// awaited; both channels are dropped before this returns. The result is an
/// error only if a direction failed, and then it is the first such failure.
pub async fn relay_pair<A, B>(
    client: A,
    target: B,
    buffer_size: usize,
    cancel: &CancellationToken,
) -> Result<RelayStats>
where
    A: DuplexChannel,
    B: DuplexChannel,
{
    let scope = cancel.child_token();
    let (client_rx, client_tx) = client.split();
    let (target_rx, target_tx) = target.split();

    let mut directions = JoinSet::new();
    {
        let scope = scope.clone();
        directions.spawn(async move {
            let result = forward(client_rx, target_tx, buffer_size, scope).await;
            (Direction::Upstream, result)
        });
    }
    {
        let scope = scope.clone();
        directions.spawn(async move {
            let result = forward(target_rx, client_tx, buffer_size, scope).await;
            (Direction::Downstream, result)
        });
    }

    let mut stats = RelayStats::default();
    let mut failure: Option<anyhow::Error> = None;

    while let Some(joined) = directions.join_next().await {
        scope.cancel();

        let error = match joined {
            Ok((direction, Ok(outcome))) => {
                debug!("{} finished: {:?}", direction, outcome);
                stats.record(direction, outcome.bytes());
                continue;
            }
            Ok((direction, Err(e))) => {
                debug!("{} failed: {}", direction, e);
                Some(anyhow::Error::new(e).context(format!("{} relay failed", direction)))
            }
            Err(e) => Some(SockrelayError::Session(format!("relay task failed: {}", e)).into()),
        };

        if failure.is_none() {
            failure = error;
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(stats),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{ChannelReader, ChannelWriter, StreamChannel};
    use async_trait::async_trait;
    use std::io;
    use std::time::Duration;
    use tokio::io::{duplex, AsyncReadExt, AsyncWriteExt};

    /// Channel whose reads fail and whose writes vanish
    struct FailingChannel;

    struct FailingReader;
    struct NullWriter;

    #[async_trait]
    impl ChannelReader for FailingReader {
        async fn read_chunk(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from(io::ErrorKind::ConnectionReset))
        }
    }

    #[async_trait]
    impl ChannelWriter for NullWriter {
        async fn write_chunk(&mut self, _data: &[u8]) -> io::Result<()> {
            Ok(())
        }

        async fn close(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl DuplexChannel for FailingChannel {
        type Reader = FailingReader;
        type Writer = NullWriter;

        fn split(self) -> (Self::Reader, Self::Writer) {
            (FailingReader, NullWriter)
        }
    }

    #[tokio::test]
    async fn test_relay_echo_then_client_close() {
        let (client_local, mut client) = duplex(1024);
        let (target_local, mut target) = duplex(1024);
        let cancel = CancellationToken::new();

        let relay = tokio::spawn(async move {
            relay_pair(
                StreamChannel::new(client_local),
                StreamChannel::new(target_local),
                4096,
                &cancel,
            )
            .await
        });

        client.write_all(b"ping").await.unwrap();
        let mut buf = [0u8; 4];
        target.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");

        target.write_all(b"pong").await.unwrap();
        client.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"pong");

        // The target never closes; the client finishing must still end the relay
        client.shutdown().await.unwrap();
        drop(client);

        let stats = tokio::time::timeout(Duration::from_secs(1), relay)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.upstream, 4);
        assert_eq!(stats.downstream, 4);

        // The target saw its write side closed
        let mut rest = Vec::new();
        assert_eq!(target.read_to_end(&mut rest).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_relay_error_cancels_other_direction() {
        let (target_local, _target) = duplex(1024);
        let cancel = CancellationToken::new();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            relay_pair(FailingChannel, StreamChannel::new(target_local), 4096, &cancel),
        )
        .await
        .unwrap();

        let err = result.unwrap_err();
        assert!(err.to_string().contains("client->target"));
        assert_eq!(
            err.downcast_ref::<io::Error>().map(|e| e.kind()),
            Some(io::ErrorKind::ConnectionReset)
        );
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_relay_parent_cancellation() {
        let (client_local, _client) = duplex(1024);
        let (target_local, _target) = duplex(1024);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let stats = tokio::time::timeout(
            Duration::from_secs(1),
            relay_pair(
                StreamChannel::new(client_local),
                StreamChannel::new(target_local),
                4096,
                &cancel,
            ),
        )
        .await
        .unwrap()
        .unwrap();
        assert_eq!(stats, RelayStats::default());
    }

    #[test]
    fn test_direction_display() {
        assert_eq!(Direction::Upstream.to_string(), "client->target");
        assert_eq!(Direction::Downstream.to_string(), "target->client");
    }
}
