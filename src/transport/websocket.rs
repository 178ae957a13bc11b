use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::error::RelayError;
use crate::transport::codec;
use crate::transport::dispatcher::{ChannelEvent, Correlation, Disposition, ResponseDispatcher};
use crate::transport::{RequestId, Response, ResultSource};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One websocket connection, alive for a single request/response exchange.
pub struct ChannelTransport {
    endpoint: String,
    stream: WsStream,
    correlation: Correlation,
}

impl ChannelTransport {
    pub async fn connect(
        endpoint: &str,
        connect_timeout: Duration,
        correlation: Correlation,
    ) -> Result<Self, RelayError> {
        debug!(endpoint = %endpoint, timeout_ms = %connect_timeout.as_millis(), "opening channel");

        let (stream, _) = timeout(connect_timeout, connect_async(endpoint))
            .await
            .map_err(|_| RelayError::Connection {
                endpoint: endpoint.to_string(),
                reason: format!("timed out after {:?}", connect_timeout),
            })?
            .map_err(|e| RelayError::Connection {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        info!(endpoint = %endpoint, "channel connected");
        Ok(Self {
            endpoint: endpoint.to_string(),
            stream,
            correlation,
        })
    }

    /// Serialize and write one `Command` or `Query`.
    pub async fn send<T: Serialize>(&mut self, message: &T) -> Result<(), RelayError> {
        let text = codec::encode(message)?;
        self.stream
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| RelayError::Transport(format!("write to {} failed: {e}", self.endpoint)))
    }

    /// Read frames until the dispatcher recognises the answer for `request_id`.
    ///
    /// Irrelevant and malformed frames are skipped. Close, read error or deadline
    /// yields [`RelayError::ChannelInterrupted`].
    pub async fn receive_matching(
        &mut self,
        request_id: &RequestId,
        deadline: Duration,
    ) -> Result<Response, RelayError> {
        let until = Instant::now() + deadline;
        let mut dispatcher = ResponseDispatcher::new(request_id.clone(), self.correlation);

        loop {
            let event = self.next_event(until).await;
            match dispatcher.dispatch(event) {
                Disposition::Terminal(response) => {
                    debug!(request_id = %request_id, success = response.success, "terminal message received");
                    return Ok(response);
                }
                Disposition::Discard(reason) => {
                    debug!(request_id = %request_id, reason = %reason, "discarding message");
                }
                Disposition::Interrupted(reason) => {
                    warn!(request_id = %request_id, reason = %reason, "channel interrupted");
                    return Err(RelayError::ChannelInterrupted {
                        request_id: request_id.to_string(),
                        reason,
                    });
                }
            }
        }
    }

    async fn next_event(&mut self, until: Instant) -> ChannelEvent {
        loop {
            let next = match timeout_at(until, self.stream.next()).await {
                Ok(next) => next,
                Err(_) => return ChannelEvent::TimedOut,
            };
            return match next {
                None => ChannelEvent::Closed(None),
                Some(Err(e)) => ChannelEvent::Failed(e.to_string()),
                Some(Ok(Message::Text(text))) => ChannelEvent::Text(text.as_str().to_owned()),
                Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => ChannelEvent::Text(text),
                    Err(_) => {
                        debug!(len = bytes.len(), "skipping non-UTF-8 binary frame");
                        continue;
                    }
                },
                Some(Ok(Message::Close(frame))) => {
                    ChannelEvent::Closed(frame.map(|f| f.reason.as_str().to_owned()))
                }
                // ping/pong are answered by tungstenite itself
                Some(Ok(_)) => continue,
            };
        }
    }

    pub async fn close(mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!(endpoint = %self.endpoint, error = %e, "close handshake failed");
        }
    }
}

#[async_trait]
impl ResultSource for ChannelTransport {
    fn label(&self) -> &'static str {
        "channel"
    }

    async fn await_result(
        &mut self,
        request_id: &RequestId,
        deadline: Duration,
    ) -> Result<Response, RelayError> {
        self.receive_matching(request_id, deadline).await
    }
}
