use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{Message, client::IntoClientRequest},
};
use url::Url;

use crate::ApiResult;

#[async_trait]
pub trait FeedConnector: Send + Sync + 'static {
    type Socket: FeedSocket;

    async fn connect(&self, url: &Url) -> ApiResult<Self::Socket>;
}

/// Text-level view of one open feed connection.
#[async_trait]
pub trait FeedSocket: Send + 'static {
    async fn send_text(&mut self, text: String) -> ApiResult<()>;

    /// Next text payload. `None` once the peer has closed the connection.
    /// Frames that cannot carry text are skipped, not reported. Must be
    /// cancel safe: it is raced against timers.
    async fn next_text(&mut self) -> Option<ApiResult<String>>;

    async fn close(&mut self);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TungsteniteConnector;

pub struct TungsteniteSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl FeedConnector for TungsteniteConnector {
    type Socket = TungsteniteSocket;

    async fn connect(&self, url: &Url) -> ApiResult<Self::Socket> {
        let request = url.as_str().into_client_request()?;
        let (stream, response) = connect_async(request).await?;
        log::debug!("ranking feed handshake completed: {}", response.status());
        Ok(TungsteniteSocket { stream })
    }
}

#[async_trait]
impl FeedSocket for TungsteniteSocket {
    async fn send_text(&mut self, text: String) -> ApiResult<()> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Option<ApiResult<String>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(err.into())),
            };

            match message {
                Message::Text(text) => return Some(Ok(text.as_str().to_owned())),
                Message::Binary(payload) => match String::from_utf8(payload.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => {
                        log::warn!(
                            "discarding non-utf8 binary ranking frame ({} bytes)",
                            payload.len()
                        );
                    }
                },
                Message::Close(frame) => {
                    match frame {
                        Some(frame) => log::debug!(
                            "ranking feed close frame: code={:?} reason={}",
                            frame.code,
                            frame.reason
                        ),
                        None => log::debug!("ranking feed closed without close frame"),
                    }
                    return None;
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            log::debug!("ranking feed close handshake failed: {err}");
        }
    }
}
