//! SOCKS5 command parser
//!
//! Parses SOCKS5 command requests from the client.

use crate::socks::codec::{addr_body_len, decode_addr, decode_request_header};
use crate::socks::consts::*;
use crate::socks::types::{AddrType, RequestedTarget};
use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// Read a SOCKS5 request from the stream
///
/// # SOCKS5 Request Format
///
/// ```text
/// +----+-----+-------+------+----------+----------+
/// |VER | CMD |  RSV  | ATYP | DST.ADDR | DST.PORT |
/// +----+-----+-------+------+----------+----------+
/// | 1  |  1  | X'00' |  1   | Variable |    2     |
/// +----+-----+-------+------+----------+----------+
/// ```
///
/// Every field is read with an exact length, so a short read surfaces as an
/// I/O error while a malformed field surfaces as a
/// [`Socks5Error`](crate::error::Socks5Error).
pub async fn read_request<S>(stream: &mut S) -> Result<RequestedTarget>
where
    S: AsyncRead + Unpin,
{
    // Read: VER CMD RSV ATYP
    let mut header = [0u8; SOCKS5_HEADER_LEN];
    stream
        .read_exact(&mut header)
        .await
        .context("Failed to read command header")?;

    let header = decode_request_header(&header)?;

    let body = read_address_body(stream, header.addr_type).await?;
    let (addr, _) = decode_addr(header.addr_type, &body)?;

    tracing::debug!("Parsed SOCKS5 command: {} to {}", header.command, addr);

    Ok(RequestedTarget::new(header.command, addr))
}

/// Read exactly the bytes of `DST.ADDR DST.PORT` for `addr_type`
async fn read_address_body<S>(stream: &mut S, addr_type: AddrType) -> Result<Vec<u8>>
where
    S: AsyncRead + Unpin,
{
    let mut body = Vec::with_capacity(MAX_ADDR_LEN);

    let domain_len = match addr_type.fixed_len() {
        Some(_) => 0,
        None => {
            let len = stream
                .read_u8()
                .await
                .context("Failed to read domain length")?;
            body.push(len);
            len
        }
    };

    let start = body.len();
    body.resize(addr_body_len(addr_type, domain_len), 0);
    stream
        .read_exact(&mut body[start..])
        .await
        .context("Failed to read target address")?;

    Ok(body)
}
