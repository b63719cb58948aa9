//! Streaming transport to the relay.
//!
//! [`Connector`] opens a [`Transport`]; the subscriber loop only sees these
//! traits, so tests can script connections without a network.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;

use crate::errors::ClientError;

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// A frame the subscriber cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    /// A UTF-8 text frame carrying one record.
    Text(String),
    /// The relay closed the stream.
    Close,
}

/// An open stream from the relay.
#[async_trait]
pub trait Transport: Send {
    /// Next frame, `None` once the stream has ended.
    async fn next_frame(&mut self) -> Option<Result<Frame, ClientError>>;

    /// Close the stream gracefully.
    async fn close(&mut self) -> Result<(), ClientError>;
}

/// Opens transports to the relay.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Connect to `url`, identifying as `user_agent`.
    async fn connect(&self, url: &str, user_agent: &str) -> Result<Box<dyn Transport>, ClientError>;
}

/// `WebSocket` connector backed by `tokio-tungstenite`.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, url: &str, user_agent: &str) -> Result<Box<dyn Transport>, ClientError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| ClientError::InvalidUrl {
                url: redact_query(url),
                reason: e.to_string(),
            })?;
        let agent = HeaderValue::from_str(user_agent)
            .map_err(|e| ClientError::Connect(format!("invalid user agent: {e}")))?;
        let _ = request.headers_mut().insert(USER_AGENT, agent);

        let (stream, _response) = tokio_tungstenite::connect_async(request)
            .await
            .map_err(|e| ClientError::Connect(e.to_string()))?;
        Ok(Box::new(WsTransport { stream }))
    }
}

struct WsTransport {
    stream: WsStream,
}

#[async_trait]
impl Transport for WsTransport {
    async fn next_frame(&mut self) -> Option<Result<Frame, ClientError>> {
        loop {
            match self.stream.next().await? {
                Ok(tungstenite::Message::Text(text)) => return Some(Ok(Frame::Text(text.to_string()))),
                Ok(tungstenite::Message::Binary(data)) => {
                    let text = String::from_utf8_lossy(&data).into_owned();
                    return Some(Ok(Frame::Text(text)));
                }
                Ok(tungstenite::Message::Close(_)) => return Some(Ok(Frame::Close)),
                // Pongs are queued by tungstenite and flushed on the next read.
                Ok(tungstenite::Message::Ping(_) | tungstenite::Message::Pong(_) | tungstenite::Message::Frame(_)) => {}
                Err(e) => return Some(Err(ClientError::Transport(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) -> Result<(), ClientError> {
        match self.stream.send(tungstenite::Message::Close(None)).await {
            Ok(()) | Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(ClientError::Transport(e.to_string())),
        }
    }
}

/// Strip the query string so tickets never reach logs or errors.
pub fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{base}?<redacted>"),
        None => url.to_string(),
    }
}
