//! SOCKS5 CONNECT (RFC 1928) with the "no authentication" method only.

use ecs_forwarder_domain::DomainError;
use std::net::IpAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

const SOCKS_VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_NONE_ACCEPTABLE: u8 = 0xFF;
const CMD_CONNECT: u8 = 0x01;
const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Open a TCP connection to `proxy` and ask it to CONNECT to the target.
///
/// Reaching the proxy and negotiating with it are each bounded by
/// `connect_timeout`.
pub(crate) async fn connect_via_proxy(
    proxy_host: &str,
    proxy_port: u16,
    target_host: &str,
    target_port: u16,
    connect_timeout: Duration,
) -> Result<TcpStream, DomainError> {
    let mut stream = tokio::time::timeout(
        connect_timeout,
        TcpStream::connect((proxy_host, proxy_port)),
    )
    .await
    .map_err(|_| {
        DomainError::DialError(format!(
            "Timeout connecting to SOCKS5 proxy {}:{}",
            proxy_host, proxy_port
        ))
    })?
    .map_err(|e| {
        DomainError::DialError(format!(
            "SOCKS5 proxy {}:{} unreachable: {}",
            proxy_host, proxy_port, e
        ))
    })?;

    tokio::time::timeout(
        connect_timeout,
        negotiate(&mut stream, target_host, target_port),
    )
    .await
    .map_err(|_| {
        DomainError::HandshakeError(format!(
            "Timeout negotiating with SOCKS5 proxy {}:{}",
            proxy_host, proxy_port
        ))
    })??;

    debug!(
        proxy_host,
        proxy_port,
        target_host,
        target_port,
        "SOCKS5 tunnel established"
    );
    Ok(stream)
}

/// Method selection followed by a CONNECT request. On success the stream is
/// positioned at the first byte of the tunnelled connection.
pub(crate) async fn negotiate<S>(
    stream: &mut S,
    target_host: &str,
    target_port: u16,
) -> Result<(), DomainError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream
        .write_all(&[SOCKS_VERSION, 1, METHOD_NO_AUTH])
        .await
        .map_err(handshake_io("send method selection"))?;

    let mut method_reply = [0u8; 2];
    stream
        .read_exact(&mut method_reply)
        .await
        .map_err(handshake_io("read method selection"))?;

    if method_reply[0] != SOCKS_VERSION {
        return Err(DomainError::HandshakeError(format!(
            "Proxy answered with SOCKS version {}",
            method_reply[0]
        )));
    }
    match method_reply[1] {
        METHOD_NO_AUTH => {}
        METHOD_NONE_ACCEPTABLE => {
            return Err(DomainError::HandshakeError(
                "Proxy requires authentication".to_string(),
            ))
        }
        other => {
            return Err(DomainError::HandshakeError(format!(
                "Proxy selected unsupported method 0x{:02x}",
                other
            )))
        }
    }

    let request = connect_request(target_host, target_port)?;
    stream
        .write_all(&request)
        .await
        .map_err(handshake_io("send CONNECT request"))?;

    let mut reply = [0u8; 4];
    stream
        .read_exact(&mut reply)
        .await
        .map_err(handshake_io("read CONNECT reply"))?;

    if reply[1] != 0x00 {
        return Err(DomainError::HandshakeError(format!(
            "Proxy refused CONNECT to {}:{}: {}",
            target_host,
            target_port,
            reply_message(reply[1])
        )));
    }

    // Bound address is not needed, but must be consumed.
    let remaining = match reply[3] {
        ATYP_IPV4 => 4 + 2,
        ATYP_IPV6 => 16 + 2,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream
                .read_exact(&mut len)
                .await
                .map_err(handshake_io("read bound address length"))?;
            len[0] as usize + 2
        }
        other => {
            return Err(DomainError::HandshakeError(format!(
                "Invalid address type 0x{:02x} in CONNECT reply",
                other
            )))
        }
    };
    let mut bound = vec![0u8; remaining];
    stream
        .read_exact(&mut bound)
        .await
        .map_err(handshake_io("read bound address"))?;

    Ok(())
}

fn connect_request(target_host: &str, target_port: u16) -> Result<Vec<u8>, DomainError> {
    let mut request = vec![SOCKS_VERSION, CMD_CONNECT, 0x00];

    match target_host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let name = target_host.as_bytes();
            if name.is_empty() || name.len() > u8::MAX as usize {
                return Err(DomainError::HandshakeError(format!(
                    "Target host '{}' cannot be sent to a SOCKS5 proxy",
                    target_host
                )));
            }
            request.push(ATYP_DOMAIN);
            request.push(name.len() as u8);
            request.extend_from_slice(name);
        }
    }

    request.extend_from_slice(&target_port.to_be_bytes());
    Ok(request)
}

fn reply_message(code: u8) -> &'static str {
    match code {
        0x01 => "general SOCKS server failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown reply code",
    }
}

fn handshake_io(step: &'static str) -> impl Fn(std::io::Error) -> DomainError {
    move |e| DomainError::HandshakeError(format!("Failed to {}: {}", step, e))
}
