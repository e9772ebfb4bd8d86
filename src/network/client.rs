//! Client side of the sound socket

use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixStream;

use crate::error::{Error, Result};
use crate::protocol::Response;

/// Send one request line and wait for the server's answer
///
/// The write half is closed after sending so the server sees the whole
/// request in its single read.
pub async fn send_request(socket_path: &Path, message: &str) -> Result<Response> {
    let mut stream = UnixStream::connect(socket_path).await?;
    stream.write_all(message.as_bytes()).await?;
    stream.shutdown().await?;

    let mut reply = String::new();
    stream.read_to_string(&mut reply).await?;

    if reply.trim().is_empty() {
        return Err(Error::Protocol(
            "connection closed without a response".to_string(),
        ));
    }
    Response::parse(&reply)
        .ok_or_else(|| Error::Protocol(format!("unexpected response {:?}", reply.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::UnixListener;

    #[tokio::test]
    async fn test_missing_socket_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = send_request(&dir.path().join("nobody.sock"), "warning").await;
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[tokio::test]
    async fn test_garbage_response_is_protocol_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("odd.sock");
        let listener = UnixListener::bind(&path).unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = String::new();
            stream.read_to_string(&mut request).await.unwrap();
            stream.write_all(b"HELLO\n").await.unwrap();
            request
        });

        let result = send_request(&path, "warning:1").await;
        assert!(matches!(result, Err(Error::Protocol(msg)) if msg.contains("HELLO")));
        assert_eq!(server.await.unwrap(), "warning:1");
    }
}
