//! SOCKS5 handshake negotiation
//!
//! Drives the greeting and request exchange on one client stream:
//!
//! ```text
//! AwaitGreeting --(no-auth selected)--> AwaitRequest --(request decoded)--> Resolved
//!       \                                     \
//!        `-------------> Failed <--------------'
//! ```
//!
//! The success reply is not written here: it depends on what the connector
//! actually establishes.

use super::auth::negotiate_auth;
use super::command::{read_request, send_failure};
use super::types::RequestedTarget;
use crate::error::Socks5Error;
use anyhow::Result;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Position of a [`Negotiator`] in the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// Waiting for the client greeting
    AwaitGreeting,
    /// Method selected, waiting for the request
    AwaitRequest,
    /// Request decoded
    Resolved,
    /// Handshake failed; the session must end
    Failed,
}

/// Handshake state machine over one client stream
pub struct Negotiator<'a, S> {
    stream: &'a mut S,
    state: HandshakeState,
}

impl<'a, S> Negotiator<'a, S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Create a negotiator in [`HandshakeState::AwaitGreeting`]
    pub fn new(stream: &'a mut S) -> Self {
        Negotiator {
            stream,
            state: HandshakeState::AwaitGreeting,
        }
    }

    /// Current state
    pub fn state(&self) -> HandshakeState {
        self.state
    }

    /// Run the handshake to completion.
    ///
    /// Protocol errors in the request are answered with a best-effort error
    /// reply. Short reads are not answered.
    pub async fn run(&mut self) -> Result<RequestedTarget> {
        let result = self.advance().await;
        self.state = match result {
            Ok(_) => HandshakeState::Resolved,
            Err(_) => HandshakeState::Failed,
        };
        result
    }

    async fn advance(&mut self) -> Result<RequestedTarget> {
        negotiate_auth(self.stream).await?;
        self.state = HandshakeState::AwaitRequest;

        match read_request(self.stream).await {
            Ok(target) => Ok(target),
            Err(e) => {
                if let Some(code) = e.downcast_ref::<Socks5Error>().and_then(|e| e.reply_code()) {
                    if let Err(reply_err) = send_failure(self.stream, code).await {
                        debug!("Failed to send error reply: {:#}", reply_err);
                    }
                }
                Err(e)
            }
        }
    }
}

/// Run a full handshake on `stream`
pub async fn negotiate<S>(stream: &mut S) -> Result<RequestedTarget>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    Negotiator::new(stream).run().await
}
