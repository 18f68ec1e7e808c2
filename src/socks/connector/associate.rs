//! UDP ASSOCIATE: open the relay sockets and report the client-facing one

use super::connect::reply_failure;
use crate::error::Socks5ReplyCode;
use crate::socks::command::send_success;
use crate::socks::udp::UdpAssociation;
use anyhow::{Context, Result};
use std::net::{IpAddr, SocketAddr};
use tokio::io::AsyncWrite;
use tracing::{info, warn};

/// Handle UDP ASSOCIATE command
///
/// The reply names the socket the client must send datagrams to. When
/// `bind_ip` is a wildcard, `reply_ip` (the address the client reached us
/// on) is reported instead.
pub async fn associate<S>(
    client: &mut S,
    client_ip: IpAddr,
    bind_ip: IpAddr,
    reply_ip: IpAddr,
) -> Result<UdpAssociation>
where
    S: AsyncWrite + Unpin,
{
    let association = match UdpAssociation::open(client_ip, bind_ip).await {
        Ok(association) => association,
        Err(e) => {
            warn!("UDP ASSOCIATE on {} failed: {}", bind_ip, e);
            reply_failure(client, Socks5ReplyCode::GeneralFailure).await;
            return Err(e).with_context(|| format!("Failed to open UDP relay on {}", bind_ip));
        }
    };

    let mut bound: SocketAddr = association
        .local_addr()
        .context("Failed to read UDP relay address")?;
    if bound.ip().is_unspecified() {
        bound.set_ip(reply_ip);
    }

    send_success(client, bound)
        .await
        .context("Failed to send UDP ASSOCIATE reply")?;

    info!("UDP ASSOCIATE established on {}", bound);
    Ok(association)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socks::codec::decode_reply;
    use crate::socks::types::TargetAddr;
    use std::net::Ipv4Addr;

    #[tokio::test]
    async fn test_associate_reports_bound_socket() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let mut reply = Vec::new();

        let association = associate(&mut reply, localhost, localhost, localhost)
            .await
            .unwrap();

        let decoded = decode_reply(&reply).unwrap();
        assert_eq!(decoded.code, Socks5ReplyCode::Succeeded);
        assert_eq!(
            decoded.bind_addr,
            TargetAddr::from(association.local_addr().unwrap())
        );
    }

    #[tokio::test]
    async fn test_associate_wildcard_reports_reply_ip() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let mut reply = Vec::new();

        let association = associate(
            &mut reply,
            localhost,
            IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            localhost,
        )
        .await
        .unwrap();

        let port = association.local_addr().unwrap().port();
        let decoded = decode_reply(&reply).unwrap();
        assert_eq!(
            decoded.bind_addr,
            TargetAddr::from(SocketAddr::new(localhost, port))
        );
    }
}
