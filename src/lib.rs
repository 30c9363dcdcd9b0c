//! # fetchkit
//!
//! A fetch-style request and session layer over a browser-impersonating
//! HTTP engine.
//!
//! ## Features
//!
//! - **Fetch API**: `fetch(url, init)` with validated options and a buffered [`Response`]
//! - **Cookie Isolation**: every request without a session gets a throwaway cookie jar
//! - **Sessions**: persistent cookie jars with a browser profile fixed at creation
//! - **Cancellation**: [`AbortController`] rejects in-flight requests immediately
//! - **WebSocket**: engine-backed connections with queued inbound events
//! - **Pluggable Engine**: the real [`NativeEngine`] (HTTP/1.1 over BoringSSL) or a test [`StubEngine`]
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use fetchkit::{RequestInit, SessionOptions};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), fetchkit::NetError> {
//!     let resp = fetchkit::fetch("https://example.com", RequestInit::new()).await?;
//!     println!("Status: {}", resp.status());
//!
//!     let session = fetchkit::create_session(SessionOptions::new().browser("chrome_142")).await?;
//!     session.fetch("https://example.com/login", RequestInit::new()).await?;
//!     session.close().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`base`] - Core types and error definitions
//! - [`client`] - Client configuration and the default client
//! - [`engine`] - The engine contract and its implementations
//! - [`fetch`] - Request options, cancellation and dispatch
//! - [`http`] - Headers, request bodies and responses
//! - [`session`] - Persistent sessions and session resolution
//! - [`ws`] - WebSocket connections

pub mod base;
pub mod client;
pub mod engine;
pub mod fetch;
pub mod http;
pub mod session;
pub mod ws;

pub use base::{ErrorKind, LoadState, NetError};
pub use client::{create_session, default_client, fetch, profiles, Client, ClientBuilder};
pub use engine::{Engine, NativeEngine, StubEngine};
pub use fetch::{AbortController, AbortSignal, RedirectMode, RequestInit};
pub use http::{Headers, RequestBody, Response};
pub use session::{CookieMode, Session, SessionOptions};
pub use ws::{Message, SocketEvent, WebSocket, WebSocketInit};
