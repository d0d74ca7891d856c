//! RFC 1035 §4.2.2 stream framing: every DNS message on a stream is preceded
//! by its length as a big-endian u16. Shared by DoT and the TCP listener.

use ecs_forwarder_domain::DomainError;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const MAX_TCP_MESSAGE_SIZE: usize = u16::MAX as usize;

pub(crate) async fn send_with_length_prefix<S>(
    stream: &mut S,
    message_bytes: &[u8],
) -> Result<(), DomainError>
where
    S: AsyncWriteExt + Unpin,
{
    if message_bytes.len() > MAX_TCP_MESSAGE_SIZE {
        return Err(DomainError::EncodeError(format!(
            "Message too large for stream framing: {} bytes (max {})",
            message_bytes.len(),
            MAX_TCP_MESSAGE_SIZE
        )));
    }

    // One buffer so prefix and body leave in a single write where possible.
    let mut framed = Vec::with_capacity(2 + message_bytes.len());
    framed.extend_from_slice(&(message_bytes.len() as u16).to_be_bytes());
    framed.extend_from_slice(message_bytes);

    stream
        .write_all(&framed)
        .await
        .map_err(|e| DomainError::TransportIo(format!("Failed to write DNS message: {}", e)))?;
    stream
        .flush()
        .await
        .map_err(|e| DomainError::TransportIo(format!("Failed to flush stream: {}", e)))?;

    Ok(())
}

pub(crate) async fn read_with_length_prefix<S>(stream: &mut S) -> Result<Vec<u8>, DomainError>
where
    S: AsyncReadExt + Unpin,
{
    let mut len_buf = [0u8; 2];
    stream.read_exact(&mut len_buf).await.map_err(|e| {
        DomainError::TransportIo(format!("Failed to read message length: {}", e))
    })?;

    let message_len = u16::from_be_bytes(len_buf) as usize;
    if message_len == 0 {
        return Err(DomainError::DecodeError(
            "Zero-length message on stream".to_string(),
        ));
    }

    let mut message = vec![0u8; message_len];
    stream.read_exact(&mut message).await.map_err(|e| {
        DomainError::TransportIo(format!("Failed to read message body: {}", e))
    })?;

    Ok(message)
}
