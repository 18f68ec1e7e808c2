//! One relay direction

use crate::transport::{ChannelReader, ChannelWriter};
use std::io;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// How a forwarding direction ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// The source reached end-of-stream; bytes forwarded
    Eof(u64),
    /// The direction was cancelled; bytes forwarded until then
    Cancelled(u64),
}

impl ForwardOutcome {
    /// Bytes forwarded before the direction ended
    pub fn bytes(&self) -> u64 {
        match self {
            ForwardOutcome::Eof(bytes) | ForwardOutcome::Cancelled(bytes) => *bytes,
        }
    }
}

/// Pump chunks from `source` to `sink` until end-of-stream, error or
/// cancellation.
///
/// At most one chunk of `buffer_size` bytes is in flight. Cancellation is
/// observed before every read and while a write is pending. The sink is
/// closed however the loop ends.
pub async fn forward<R, W>(
    mut source: R,
    mut sink: W,
    buffer_size: usize,
    cancel: CancellationToken,
) -> io::Result<ForwardOutcome>
where
    R: ChannelReader,
    W: ChannelWriter,
{
    let mut buf = vec![0u8; buffer_size];
    let mut total = 0u64;

    let outcome = loop {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(ForwardOutcome::Cancelled(total)),
            read = source.read_chunk(&mut buf) => match read {
                Ok(0) => break Ok(ForwardOutcome::Eof(total)),
                Ok(n) => n,
                Err(e) => break Err(e),
            },
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break Ok(ForwardOutcome::Cancelled(total)),
            written = sink.write_chunk(&buf[..n]) => {
                if let Err(e) = written {
                    break Err(e);
                }
            }
        }

        total += n as u64;
    };

    if let Err(e) = sink.close().await {
        debug!("Failed to close relay sink: {}", e);
    }

    outcome
}
