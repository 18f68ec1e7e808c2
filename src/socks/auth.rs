//! SOCKS5 authentication negotiation
//!
//! Only "no authentication required" is ever selected. A client that does not
//! offer it receives `0xFF` and the session ends.

use super::codec::{decode_greeting, encode_method_selection};
use super::consts::*;
use crate::error::Socks5Error;
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

/// Authentication method chosen by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    NoAuth,
    /// None of the offered methods is acceptable
    NotAcceptable,
}

impl AuthMethod {
    /// Convert to SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::NoAuth => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::NotAcceptable => SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
        }
    }
}

/// Pick a method from the client's list. Order is not significant.
pub fn select_auth_method(methods: &[u8]) -> AuthMethod {
    if methods.contains(&SOCKS5_AUTH_METHOD_NONE) {
        AuthMethod::NoAuth
    } else {
        AuthMethod::NotAcceptable
    }
}

/// Read the client greeting and answer with the selected method.
///
/// Reads exactly `2 + NMETHODS` bytes. A version mismatch fails before any
/// reply is written.
pub async fn negotiate_auth<S>(stream: &mut S) -> Result<AuthMethod>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut greeting = vec![0u8; SOCKS5_GREETING_PREFIX_LEN];
    stream
        .read_exact(&mut greeting)
        .await
        .context("Failed to read greeting")?;

    if greeting[0] != SOCKS5_VERSION {
        return Err(Socks5Error::UnsupportedVersion(greeting[0]).into());
    }

    let num_methods = greeting[1] as usize;
    greeting.resize(SOCKS5_GREETING_PREFIX_LEN + num_methods, 0);
    stream
        .read_exact(&mut greeting[SOCKS5_GREETING_PREFIX_LEN..])
        .await
        .context("Failed to read authentication methods")?;

    let greeting = decode_greeting(&greeting)?;
    let method = select_auth_method(&greeting.methods);
    debug!(
        "Client offered methods {:?}, selected {:?}",
        greeting.methods, method
    );

    stream
        .write_all(&encode_method_selection(method.to_byte()))
        .await?;
    stream.flush().await?;

    match method {
        AuthMethod::NoAuth => Ok(method),
        AuthMethod::NotAcceptable => Err(Socks5Error::NoAcceptableMethod.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    #[test]
    fn test_auth_method_to_byte() {
        assert_eq!(AuthMethod::NoAuth.to_byte(), 0x00);
        assert_eq!(AuthMethod::NotAcceptable.to_byte(), 0xFF);
    }

    #[test]
    fn test_select_auth_method() {
        assert_eq!(select_auth_method(&[0x02, 0x00]), AuthMethod::NoAuth);
        assert_eq!(select_auth_method(&[0x00]), AuthMethod::NoAuth);
        assert_eq!(
            select_auth_method(&[SOCKS5_AUTH_METHOD_PASSWORD]),
            AuthMethod::NotAcceptable
        );
        assert_eq!(select_auth_method(&[]), AuthMethod::NotAcceptable);
    }

    #[tokio::test]
    async fn test_negotiate_no_auth() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x05, 0x02, 0x02, 0x00]).await.unwrap();

        let method = negotiate_auth(&mut server).await.unwrap();
        assert_eq!(method, AuthMethod::NoAuth);

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0x00]);
    }

    #[tokio::test]
    async fn test_negotiate_rejects_without_no_auth() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();

        let err = negotiate_auth(&mut server).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<Socks5Error>(),
            Some(&Socks5Error::NoAcceptableMethod)
        );

        let mut reply = [0u8; 2];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply, [0x05, 0xFF]);
    }

    #[tokio::test]
    async fn test_negotiate_bad_version_sends_nothing() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

        let err = negotiate_auth(&mut server).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<Socks5Error>(),
            Some(&Socks5Error::UnsupportedVersion(4))
        );

        drop(server);
        let mut rest = Vec::new();
        client.read_to_end(&mut rest).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_negotiate_short_method_list_is_transport_error() {
        let (mut client, mut server) = duplex(64);
        client.write_all(&[0x05, 0x03, 0x00]).await.unwrap();
        client.shutdown().await.unwrap();

        let err = negotiate_auth(&mut server).await.unwrap_err();
        assert!(err.downcast_ref::<Socks5Error>().is_none());
        assert!(err.root_cause().downcast_ref::<std::io::Error>().is_some());
    }
}
