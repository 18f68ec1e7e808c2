//! Helper utilities for Sockrelay
//!
//! This module provides common utility functions used throughout the application.

use std::future::Future;
use std::io;
use std::time::Duration;

/// Default timeout in seconds for resolving and connecting a request target
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Parse duration from seconds
pub fn duration_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

/// Run an I/O future under a deadline.
///
/// Elapsing maps to [`io::ErrorKind::TimedOut`] so callers can treat it like
/// any other I/O failure.
pub async fn io_timeout<F, T>(duration: Duration, what: &str, fut: F) -> io::Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(io::Error::new(
            io::ErrorKind::TimedOut,
            format!("{} timed out after {:?}", what, duration),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(5), Duration::from_secs(5));
        assert_eq!(duration_from_secs(0), Duration::from_secs(0));
        assert_eq!(duration_from_secs(3600), Duration::from_secs(3600));
    }

    #[tokio::test]
    async fn test_io_timeout_passes_result_through() {
        let value = io_timeout(Duration::from_secs(1), "noop", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);

        let err = io_timeout(Duration::from_secs(1), "noop", async {
            Err::<(), _>(io::Error::from(io::ErrorKind::ConnectionRefused))
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
    }

    #[tokio::test]
    async fn test_io_timeout_elapses() {
        let err = io_timeout(
            Duration::from_millis(10),
            "sleep",
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        assert!(err.to_string().contains("sleep"));
    }
}
