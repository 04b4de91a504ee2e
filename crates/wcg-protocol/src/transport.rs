//! The frame transport: a message-boundary-preserving, binary-safe,
//! bidirectional byte channel. Delivers whole frames in order; the core
//! does not depend on HTTP semantics once a connection is established.
//!
//! Three implementations ship here: a `tokio-tungstenite`-backed client,
//! an `axum`-websocket-upgrade-backed server side, and an in-process
//! length-delimited transport over a duplex pipe for tests.

use async_trait::async_trait;
use axum::extract::ws::{Message as AxumMessage, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_tungstenite::tungstenite::Message as TungsteniteMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::error::ProtocolError;

/// A message-boundary-preserving, bidirectional, binary-safe channel.
///
/// `recv` returns `Ok(None)` when the peer closed the channel cleanly;
/// any other failure (I/O error, protocol violation) is `Err`.
#[async_trait]
pub trait FrameTransport: Send {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), ProtocolError>;
    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError>;
    async fn close(&mut self) -> Result<(), ProtocolError>;
}

/// Client-side transport: a `tokio-tungstenite` WebSocket connection.
pub struct WsClientTransport {
    inner: WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl WsClientTransport {
    /// Connect to `ws://<addr>` (or `wss://`) and wrap the resulting
    /// connection as a [`FrameTransport`].
    pub async fn connect(url: &str) -> Result<Self, ProtocolError> {
        let (stream, _response) = tokio_tungstenite::connect_async(url)
            .await
            .map_err(|e| ProtocolError::Network(e.to_string()))?;
        Ok(Self { inner: stream })
    }
}

#[async_trait]
impl FrameTransport for WsClientTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), ProtocolError> {
        self.inner
            .send(TungsteniteMessage::Binary(frame.into()))
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            match self.inner.next().await {
                Some(Ok(TungsteniteMessage::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(TungsteniteMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ProtocolError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.inner
            .close(None)
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }
}

/// Server-side transport: one `axum` websocket-upgrade connection.
pub struct AxumWsTransport {
    inner: WebSocket,
}

impl AxumWsTransport {
    pub fn new(socket: WebSocket) -> Self {
        Self { inner: socket }
    }

    /// Split into independent send and receive halves so a connection
    /// handler can read the next frame while a prior one is still being
    /// dispatched, without serializing on a single `&mut self`.
    pub fn split(self) -> (AxumWsSender, AxumWsReceiver) {
        let (sink, stream) = self.inner.split();
        (AxumWsSender { inner: sink }, AxumWsReceiver { inner: stream })
    }
}

/// The write half of a split [`AxumWsTransport`].
pub struct AxumWsSender {
    inner: SplitSink<WebSocket, AxumMessage>,
}

impl AxumWsSender {
    pub async fn send(&mut self, frame: Vec<u8>) -> Result<(), ProtocolError> {
        self.inner
            .send(AxumMessage::Binary(frame.into()))
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }

    pub async fn close(&mut self) -> Result<(), ProtocolError> {
        self.inner
            .close()
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }
}

/// The read half of a split [`AxumWsTransport`].
pub struct AxumWsReceiver {
    inner: SplitStream<WebSocket>,
}

impl AxumWsReceiver {
    pub async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            match self.inner.next().await {
                Some(Ok(AxumMessage::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(AxumMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ProtocolError::ReceiveFailed(e.to_string())),
            }
        }
    }
}

#[async_trait]
impl FrameTransport for AxumWsTransport {
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), ProtocolError> {
        self.inner
            .send(AxumMessage::Binary(frame.into()))
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        loop {
            match self.inner.recv().await {
                Some(Ok(AxumMessage::Binary(bytes))) => return Ok(Some(bytes.to_vec())),
                Some(Ok(AxumMessage::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => return Err(ProtocolError::ReceiveFailed(e.to_string())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.inner
            .close()
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }
}

/// In-process transport over a [`tokio::io::DuplexStream`] half, framing
/// messages with a 4-byte big-endian length prefix. Used to pair a
/// client and server transport in tests without touching the network.
pub struct DuplexFrameTransport<S> {
    inner: S,
}

impl<S> DuplexFrameTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<S> FrameTransport for DuplexFrameTransport<S>
where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send,
{
    async fn send(&mut self, frame: Vec<u8>) -> Result<(), ProtocolError> {
        let len = u32::try_from(frame.len())
            .map_err(|_| ProtocolError::SendFailed("frame too large".to_string()))?;
        self.inner
            .write_all(&len.to_be_bytes())
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))?;
        self.inner
            .write_all(&frame)
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>, ProtocolError> {
        let mut len_bytes = [0u8; 4];
        match self.inner.read_exact(&mut len_bytes).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(ProtocolError::ReceiveFailed(e.to_string())),
        }
        let len = u32::from_be_bytes(len_bytes) as usize;
        let mut buf = vec![0u8; len];
        self.inner
            .read_exact(&mut buf)
            .await
            .map_err(|e| ProtocolError::ReceiveFailed(e.to_string()))?;
        Ok(Some(buf))
    }

    async fn close(&mut self) -> Result<(), ProtocolError> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| ProtocolError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn duplex_transport_roundtrips_frames() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let mut client = DuplexFrameTransport::new(client_io);
        let mut server = DuplexFrameTransport::new(server_io);

        client.send(b"hello".to_vec()).await.unwrap();
        let received = server.recv().await.unwrap().unwrap();
        assert_eq!(received, b"hello");

        server.send(b"world".to_vec()).await.unwrap();
        let received = client.recv().await.unwrap().unwrap();
        assert_eq!(received, b"world");
    }

    #[tokio::test]
    async fn duplex_transport_reports_close_as_none() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let mut client = DuplexFrameTransport::new(client_io);
        let mut server = DuplexFrameTransport::new(server_io);
        client.close().await.unwrap();
        assert!(server.recv().await.unwrap().is_none());
    }
}
