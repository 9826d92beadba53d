use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Wire-format errors: framing (length prefix, truncated read) and JSON
/// encoding, kept distinct so a connection handler can log which half of
/// the protocol broke.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("message of {0} bytes exceeds the maximum of {1} bytes")]
    TooLarge(u32, u32),
}

/// No single request/response in this protocol carries a repository tree
/// or AI completion — 16 MiB is generous headroom over the largest
/// realistic session projection.
const MAX_MESSAGE_BYTES: u32 = 16 * 1024 * 1024;

/// Reads one length-prefixed message: a 4-byte big-endian length followed
/// by that many bytes of payload.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > MAX_MESSAGE_BYTES {
        return Err(ProtocolError::TooLarge(len, MAX_MESSAGE_BYTES));
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

/// Writes `payload` prefixed with its 4-byte big-endian length.
pub async fn write_message<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<(), ProtocolError> {
    let len = u32::try_from(payload.len()).map_err(|_| ProtocolError::TooLarge(u32::MAX, MAX_MESSAGE_BYTES))?;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one message and decodes it as `T`.
pub async fn read_value<R: AsyncRead + Unpin, T: DeserializeOwned>(reader: &mut R) -> Result<T, ProtocolError> {
    let payload = read_message(reader).await?;
    Ok(serde_json::from_slice(&payload)?)
}

/// Encodes `value` and writes it as one length-prefixed message.
pub async fn write_value<W: AsyncWrite + Unpin, T: Serialize>(writer: &mut W, value: &T) -> Result<(), ProtocolError> {
    let payload = serde_json::to_vec(value)?;
    write_message(writer, &payload).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Request, Response};

    #[tokio::test]
    async fn read_write_message_roundtrip() {
        let original = b"hello world";
        let mut buffer = Vec::new();
        write_message(&mut buffer, original).await.unwrap();
        assert_eq!(buffer.len(), 4 + original.len());

        let mut cursor = std::io::Cursor::new(buffer);
        let read_back = read_message(&mut cursor).await.unwrap();
        assert_eq!(read_back, original);
    }

    #[tokio::test]
    async fn value_roundtrip_preserves_request_shape() {
        let request = Request::GetStatus { session_id: "deploy-abc".to_string() };
        let mut buffer = Vec::new();
        write_value(&mut buffer, &request).await.unwrap();
        let mut cursor = std::io::Cursor::new(buffer);
        let back: Request = read_value(&mut cursor).await.unwrap();
        assert!(matches!(back, Request::GetStatus { session_id } if session_id == "deploy-abc"));
    }

    #[tokio::test]
    async fn rejects_messages_over_the_size_cap() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&(MAX_MESSAGE_BYTES + 1).to_be_bytes());
        let mut cursor = std::io::Cursor::new(buffer);
        let err = read_message(&mut cursor).await.unwrap_err();
        assert!(matches!(err, ProtocolError::TooLarge(_, _)));
    }

    #[tokio::test]
    async fn truncated_payload_is_an_io_error() {
        let mut buffer = Vec::new();
        buffer.extend_from_slice(&10u32.to_be_bytes());
        buffer.extend_from_slice(b"short");
        let mut cursor = std::io::Cursor::new(buffer);
        assert!(read_message(&mut cursor).await.is_err());
    }

    #[test]
    fn response_error_variant_round_trips_through_json() {
        let response = Response::Error { message: "boom".to_string() };
        let json = serde_json::to_string(&response).unwrap();
        let back: Response = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, Response::Error { message } if message == "boom"));
    }
}
