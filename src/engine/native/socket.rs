//! WebSocket connections over tokio-tungstenite, addressed by numeric handle.

use super::connect::{self, ProxyConfig};
use super::profiles::{Profile, DEFAULT_PROFILE};
use crate::base::neterror::NetError;
use crate::engine::{ConnectionHandle, SocketCallbacks, SocketOptions};
use crate::ws::{CloseCode, CloseFrame, Message};
use bytes::Bytes;
use dashmap::DashMap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use http::{HeaderName, HeaderValue};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async_tls, tungstenite, MaybeTlsStream, WebSocketStream};
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, tungstenite::Message>;

/// Open connections, keyed by handle.
pub(crate) struct SocketRegistry {
    sinks: DashMap<u64, Arc<Mutex<WsSink>>>,
    next_handle: AtomicU64,
}

impl Default for SocketRegistry {
    fn default() -> Self {
        Self {
            sinks: DashMap::new(),
            next_handle: AtomicU64::new(1),
        }
    }
}

impl SocketRegistry {
    pub(crate) fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Connect, register the write half, and spawn the reader task.
    pub(crate) async fn open(
        self: &Arc<Self>,
        options: SocketOptions,
    ) -> Result<ConnectionHandle, NetError> {
        let url = Url::parse(&options.url).map_err(|_| NetError::InvalidUrl {
            url: options.url.clone(),
        })?;
        let proxy = options
            .proxy
            .as_deref()
            .map(ProxyConfig::parse)
            .transpose()?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| NetError::InvalidResponse {
                reason: e.to_string(),
            })?;

        let profile_id = options
            .browser
            .as_deref()
            .unwrap_or(DEFAULT_PROFILE);
        if let Some(profile) = Profile::find(profile_id) {
            let user_agent = profile.user_agent();
            if let Ok(value) = HeaderValue::from_str(&user_agent) {
                request.headers_mut().insert(http::header::USER_AGENT, value);
            }
        }
        for (name, value) in &options.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                NetError::InvalidHeaderName { name: name.clone() }
            })?;
            let value = HeaderValue::from_str(value).map_err(|_| NetError::InvalidHeaderValue {
                name: name.to_string(),
            })?;
            request.headers_mut().insert(name, value);
        }

        let stream = connect::connect_raw(&url, proxy.as_ref()).await?;
        let (ws_stream, _response) = client_async_tls(request, stream).await.map_err(|e| {
            tracing::debug!(url = %url, error = %e, "WebSocket handshake failed");
            NetError::engine(format!("WebSocket handshake failed: {e}"))
        })?;

        let (sink, stream) = ws_stream.split();
        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.sinks.insert(id, Arc::new(Mutex::new(sink)));

        tokio::spawn(read_loop(Arc::clone(self), id, stream, options.callbacks));

        tracing::debug!(url = %url, handle = id, "WebSocket connected");
        Ok(ConnectionHandle(id))
    }

    pub(crate) async fn send(&self, handle: ConnectionHandle, message: Message) -> Result<(), NetError> {
        let sink = self.sink(handle)?;
        let mut sink = sink.lock().await;
        sink.send(to_tungstenite(message)).await.map_err(|e| {
            tracing::debug!(handle = handle.0, error = %e, "WebSocket send failed");
            NetError::SocketClosed
        })
    }

    /// Send a close frame and deregister. Unknown handles are ignored.
    pub(crate) async fn close(&self, handle: ConnectionHandle) -> Result<(), NetError> {
        let Some((_, sink)) = self.sinks.remove(&handle.0) else {
            return Ok(());
        };
        let mut sink = sink.lock().await;
        let frame = tungstenite::protocol::CloseFrame {
            code: tungstenite::protocol::frame::coding::CloseCode::Normal,
            reason: "".into(),
        };
        if let Err(e) = sink.send(tungstenite::Message::Close(Some(frame))).await {
            tracing::debug!(handle = handle.0, error = %e, "close frame not delivered");
        }
        Ok(())
    }

    fn sink(&self, handle: ConnectionHandle) -> Result<Arc<Mutex<WsSink>>, NetError> {
        self.sinks
            .get(&handle.0)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(NetError::UnknownConnection { handle: handle.0 })
    }
}

async fn read_loop(
    registry: Arc<SocketRegistry>,
    id: u64,
    mut stream: SplitStream<WsStream>,
    callbacks: SocketCallbacks,
) {
    let mut close_reported = false;
    while let Some(next) = stream.next().await {
        match next {
            Ok(tungstenite::Message::Text(s)) => (callbacks.on_message)(Message::Text(s.to_string())),
            Ok(tungstenite::Message::Binary(b)) => {
                (callbacks.on_message)(Message::Binary(Bytes::from(b.to_vec())))
            }
            Ok(tungstenite::Message::Close(frame)) => {
                (callbacks.on_close)(frame.map(|f| {
                    CloseFrame::new(CloseCode(u16::from(f.code)), f.reason.to_string())
                }));
                close_reported = true;
                break;
            }
            // Ping/pong are answered by tungstenite.
            Ok(_) => {}
            Err(e) => {
                (callbacks.on_error)(e.to_string());
                break;
            }
        }
    }

    registry.sinks.remove(&id);
    if !close_reported {
        (callbacks.on_close)(None);
    }
    tracing::debug!(handle = id, "WebSocket reader finished");
}

fn to_tungstenite(message: Message) -> tungstenite::Message {
    match message {
        Message::Text(s) => tungstenite::Message::Text(s.into()),
        Message::Binary(b) => tungstenite::Message::Binary(b.to_vec().into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_handle() {
        let registry = SocketRegistry::default();
        let err = registry
            .send(ConnectionHandle(42), Message::from("hi"))
            .await
            .unwrap_err();
        assert_eq!(err, NetError::UnknownConnection { handle: 42 });
        // Closing an unknown handle is a no-op.
        registry.close(ConnectionHandle(42)).await.unwrap();
    }

    #[test]
    fn test_to_tungstenite() {
        assert!(to_tungstenite(Message::from("a")).is_text());
        assert!(to_tungstenite(Message::from(vec![1u8])).is_binary());
    }
}
