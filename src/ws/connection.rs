//! WebSocket connection over an engine handle.

use super::message::{CloseFrame, Message};
use crate::base::neterror::NetError;
use crate::client::Client;
use crate::engine::{ConnectionHandle, Engine, SocketCallbacks, SocketOptions};
use crate::fetch::HeadersInit;
use bytes::Bytes;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use url::Url;

/// Options for [`Client::websocket`].
#[derive(Debug, Clone, Default)]
pub struct WebSocketInit {
    pub browser: Option<String>,
    pub headers: HeadersInit,
    pub proxy: Option<String>,
}

impl WebSocketInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = headers.into();
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }
}

/// Something that happened on the connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    Message(Message),
    /// The connection closed, with the peer's close frame if it sent one.
    Close(Option<CloseFrame>),
    Error(String),
}

/// WebSocket connection.
///
/// Inbound events are queued until read with [`recv`](WebSocket::recv).
/// Dropping an open socket closes it in the background.
pub struct WebSocket {
    engine: Arc<dyn Engine>,
    handle: ConnectionHandle,
    url: Url,
    events: Mutex<mpsc::UnboundedReceiver<SocketEvent>>,
    closed: Arc<AtomicBool>,
}

impl WebSocket {
    pub(crate) async fn connect(
        client: &Client,
        url: &str,
        init: WebSocketInit,
    ) -> Result<Self, NetError> {
        let parsed = Url::parse(url.trim()).map_err(|_| NetError::InvalidUrl {
            url: url.to_string(),
        })?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(NetError::InvalidSocketScheme {
                scheme: parsed.scheme().to_string(),
            });
        }

        let browser = init.browser.or_else(|| client.default_browser());
        if let Some(browser) = &browser {
            client.validate_profile(browser).await?;
        }
        let headers = init.headers.into_headers()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let closed = Arc::new(AtomicBool::new(false));
        let callbacks = callbacks(tx, Arc::clone(&closed));

        let engine = Arc::clone(client.engine());
        let handle = engine
            .open_socket_connection(SocketOptions {
                url: parsed.to_string(),
                browser,
                headers: headers.to_pairs(),
                proxy: init.proxy.or_else(|| client.default_proxy()),
                callbacks,
            })
            .await
            .map_err(NetError::from_engine)?;

        tracing::debug!(url = %parsed, handle = %handle, "WebSocket opened");
        Ok(Self {
            engine,
            handle,
            url: parsed,
            events: Mutex::new(rx),
            closed,
        })
    }

    /// Get the URL this WebSocket is connected to.
    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn handle(&self) -> ConnectionHandle {
        self.handle
    }

    /// True once either side closed the connection.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a message.
    pub async fn send(&self, message: impl Into<Message>) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::SocketClosed);
        }
        self.engine
            .send_on_connection(self.handle, message.into())
            .await
            .map_err(NetError::from_engine)
    }

    /// Send a text message.
    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), NetError> {
        self.send(Message::Text(text.into())).await
    }

    /// Send binary data.
    pub async fn send_binary(&self, data: impl Into<Bytes>) -> Result<(), NetError> {
        self.send(Message::Binary(data.into())).await
    }

    /// Receive the next event.
    ///
    /// Returns `None` once the connection is gone and every queued event
    /// has been read.
    pub async fn recv(&self) -> Option<SocketEvent> {
        let mut events = self.events.lock().await;
        events.recv().await
    }

    /// Close the connection. Idempotent.
    pub async fn close(&self) -> Result<(), NetError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.engine
            .close_connection(self.handle)
            .await
            .map_err(NetError::from_engine)
    }
}

impl Drop for WebSocket {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let close = self.engine.close_connection(self.handle);
        let handle = self.handle;
        if let Ok(rt) = tokio::runtime::Handle::try_current() {
            rt.spawn(async move {
                if let Err(e) = close.await {
                    tracing::debug!(handle = %handle, error = %e, "background close failed");
                }
            });
        }
    }
}

impl fmt::Debug for WebSocket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("url", &self.url.as_str())
            .field("handle", &self.handle)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Engine callbacks that feed the event queue.
fn callbacks(tx: mpsc::UnboundedSender<SocketEvent>, closed: Arc<AtomicBool>) -> SocketCallbacks {
    let on_message = {
        let tx = tx.clone();
        move |message: Message| {
            let _ = tx.send(SocketEvent::Message(message));
        }
    };
    let on_error = {
        let tx = tx.clone();
        move |error: String| {
            let _ = tx.send(SocketEvent::Error(error));
        }
    };
    let on_close = move |frame: Option<CloseFrame>| {
        closed.store(true, Ordering::Release);
        let _ = tx.send(SocketEvent::Close(frame));
    };

    SocketCallbacks {
        on_message: Arc::new(on_message),
        on_close: Arc::new(on_close),
        on_error: Arc::new(on_error),
    }
}
