//! SOCKS5 reply writer
//!
//! Encodes and sends SOCKS5 reply messages.

use crate::error::Socks5ReplyCode;
use crate::socks::codec::encode_reply;
use crate::socks::types::{Reply, TargetAddr};
use anyhow::Result;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Encode and send a SOCKS5 reply
///
/// # SOCKS5 Reply Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | REP |  RSV  | ATYP | BND.ADDR | BND.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
pub async fn send_reply<S>(stream: &mut S, reply: &Reply) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    let bytes = encode_reply(reply)?;

    stream.write_all(&bytes).await?;
    stream.flush().await?;

    Ok(())
}

/// Send a success reply carrying `bind_addr`
pub async fn send_success<S>(stream: &mut S, bind_addr: impl Into<TargetAddr>) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, &Reply::success(bind_addr)).await
}

/// Send a failure reply with an unspecified bound address
pub async fn send_failure<S>(stream: &mut S, code: Socks5ReplyCode) -> Result<()>
where
    S: AsyncWrite + Unpin,
{
    send_reply(stream, &Reply::failure(code)).await
}
