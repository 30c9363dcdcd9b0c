//! WebSocket client support.
//!
//! Connections are opened by the engine and addressed by handle; the
//! [`WebSocket`] wrapper queues inbound events and closes the handle when
//! dropped.
//!
//! # Example
//! ```ignore
//! use fetchkit::ws::{SocketEvent, WebSocketInit};
//!
//! let ws = client.websocket("wss://echo.websocket.org", WebSocketInit::new()).await?;
//! ws.send_text("Hello").await?;
//! if let Some(SocketEvent::Message(msg)) = ws.recv().await {
//!     println!("{:?}", msg.as_text());
//! }
//! ws.close().await?;
//! ```

mod connection;
mod message;

pub use connection::{SocketEvent, WebSocket, WebSocketInit};
pub use message::{CloseCode, CloseFrame, Message};
