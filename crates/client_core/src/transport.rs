//! Server-push transport: one WebSocket per subscribed collection.
//!
//! A [`Subscription`] is a lazy, in-order stream of raw frames. It never reconnects; a
//! failed open or a receive error is yielded once as `Err` and the stream then ends.
//! Closing or dropping the subscription releases the socket, after which no further
//! frames are delivered even if some were already buffered.

use std::{
    mem,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{Stream, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};
use tracing::{debug, info, warn};

use crate::error::TransportError;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// One undecoded frame as received from the push channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage(Vec<u8>);

impl RawMessage {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RawMessage {
    fn from(text: String) -> Self {
        Self(text.into_bytes())
    }
}

impl From<&str> for RawMessage {
    fn from(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for RawMessage {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

enum State {
    Open(Socket),
    Failed(TransportError),
    Closed,
}

pub struct Subscription {
    url: String,
    state: State,
}

/// Opens exactly one socket to `url`.
///
/// Connection failures do not surface here; they are the first and only item of the
/// returned stream.
pub async fn connect(url: impl Into<String>) -> Subscription {
    let url = url.into();
    let state = match connect_async(url.as_str()).await {
        Ok((socket, _response)) => {
            info!(url = %url, "transport: subscription opened");
            State::Open(socket)
        }
        Err(err) => {
            warn!(url = %url, "transport: failed to open subscription: {err}");
            State::Failed(TransportError::Connect {
                url: url.clone(),
                source: Box::new(err),
            })
        }
    };
    Subscription { url, state }
}

impl Subscription {
    /// Releases the socket immediately. Buffered frames are discarded.
    pub fn close(&mut self) {
        if let State::Open(_) = mem::replace(&mut self.state, State::Closed) {
            debug!(url = %self.url, "transport: subscription released");
        }
    }

    /// Like [`Subscription::close`] but sends a close frame first, best effort.
    pub async fn shutdown(mut self) {
        if let State::Open(mut socket) = mem::replace(&mut self.state, State::Closed) {
            if let Err(err) = socket.close(None).await {
                debug!(url = %self.url, "transport: close handshake failed: {err}");
            }
            debug!(url = %self.url, "transport: subscription shut down");
        }
    }
}

impl Stream for Subscription {
    type Item = Result<RawMessage, TransportError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        loop {
            let mut socket = match mem::replace(&mut this.state, State::Closed) {
                State::Closed => return Poll::Ready(None),
                State::Failed(err) => return Poll::Ready(Some(Err(err))),
                State::Open(socket) => socket,
            };

            let frame = match socket.poll_next_unpin(cx) {
                Poll::Pending => {
                    this.state = State::Open(socket);
                    return Poll::Pending;
                }
                Poll::Ready(frame) => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    this.state = State::Open(socket);
                    return Poll::Ready(Some(Ok(RawMessage::from(text))));
                }
                Some(Ok(Message::Binary(bytes))) => {
                    this.state = State::Open(socket);
                    return Poll::Ready(Some(Ok(RawMessage::from(bytes))));
                }
                Some(Ok(Message::Close(_))) | None => {
                    info!(url = %this.url, "transport: remote closed subscription");
                    return Poll::Ready(None);
                }
                Some(Ok(_)) => {
                    // ping/pong/raw frames carry no collection data
                    this.state = State::Open(socket);
                }
                Some(Err(err)) => {
                    warn!(url = %this.url, "transport: receive failed: {err}");
                    return Poll::Ready(Some(Err(TransportError::Receive {
                        url: this.url.clone(),
                        source: Box::new(err),
                    })));
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
