//! The impersonation engine capability.
//!
//! The request layer never touches sockets itself: every network effect goes
//! through the [`Engine`] trait. Two implementations ship with the crate:
//!
//! - [`NativeEngine`]: real HTTP/1.1 + TLS + WebSocket engine with per-session cookie state
//! - [`StubEngine`]: scriptable, call-recording engine for tests

pub mod native;
pub mod stub;

pub use native::NativeEngine;
pub use stub::{EngineCall, StubEngine};

use crate::base::neterror::BoxError;
use crate::ws::{CloseFrame, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Alias for the `Future` type returned by engine calls.
pub type EngineFuture<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// A fully normalized request, as handed to [`Engine::perform_request`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineRequest {
    pub url: String,
    pub method: String,
    /// Header pairs in caller order, one entry per name.
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
    pub proxy: Option<String>,
    pub timeout_ms: Option<u64>,
    /// Browser profile id, already checked against [`Engine::list_profiles`].
    pub browser: Option<String>,
    /// Suppress the profile's default headers.
    pub disable_default_headers: bool,
    pub session_id: String,
    /// The session id was fabricated for this request only.
    pub ephemeral: bool,
}

/// Completed exchange as reported by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NativeResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub cookies: HashMap<String, String>,
    /// Final URL after redirects.
    pub url: String,
}

/// Options for [`Engine::create_session_state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStateOptions {
    pub session_id: String,
    pub browser: String,
    pub proxy: Option<String>,
}

/// Opaque handle to an engine-side bidirectional connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionHandle(pub u64);

impl fmt::Display for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Callbacks the engine invokes for inbound socket events.
#[derive(Clone)]
pub struct SocketCallbacks {
    pub on_message: Arc<dyn Fn(Message) + Send + Sync>,
    pub on_close: Arc<dyn Fn(Option<CloseFrame>) + Send + Sync>,
    pub on_error: Arc<dyn Fn(String) + Send + Sync>,
}

impl fmt::Debug for SocketCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketCallbacks").finish_non_exhaustive()
    }
}

/// Options for [`Engine::open_socket_connection`].
#[derive(Debug, Clone)]
pub struct SocketOptions {
    pub url: String,
    pub browser: Option<String>,
    pub headers: Vec<(String, String)>,
    pub proxy: Option<String>,
    pub callbacks: SocketCallbacks,
}

/// The narrow contract the request layer consumes.
///
/// Implementations must be thread-safe and return `'static` futures so the
/// dispatch pipeline can detach an in-flight call when the caller aborts.
pub trait Engine: Send + Sync {
    /// Perform one request (following redirects) and buffer the whole body.
    fn perform_request(&self, request: EngineRequest) -> EngineFuture<NativeResponse>;

    /// Supported browser profile ids, in display order.
    fn list_profiles(&self) -> EngineFuture<Vec<String>>;

    /// Allocate state for a session id. Returns the id the engine will use.
    fn create_session_state(&self, options: SessionStateOptions) -> EngineFuture<String>;

    /// Forget every cookie stored for the session, keeping the session.
    fn clear_session_state(&self, session_id: &str) -> EngineFuture<()>;

    /// Release all state for the session.
    fn drop_session_state(&self, session_id: &str) -> EngineFuture<()>;

    /// Open a WebSocket-style connection.
    fn open_socket_connection(&self, options: SocketOptions) -> EngineFuture<ConnectionHandle>;

    /// Send one message on an open connection.
    fn send_on_connection(&self, handle: ConnectionHandle, message: Message) -> EngineFuture<()>;

    /// Close and deregister a connection.
    fn close_connection(&self, handle: ConnectionHandle) -> EngineFuture<()>;
}

/// Blanket implementation for Arc-wrapped engines.
impl<E: Engine + ?Sized> Engine for Arc<E> {
    fn perform_request(&self, request: EngineRequest) -> EngineFuture<NativeResponse> {
        (**self).perform_request(request)
    }

    fn list_profiles(&self) -> EngineFuture<Vec<String>> {
        (**self).list_profiles()
    }

    fn create_session_state(&self, options: SessionStateOptions) -> EngineFuture<String> {
        (**self).create_session_state(options)
    }

    fn clear_session_state(&self, session_id: &str) -> EngineFuture<()> {
        (**self).clear_session_state(session_id)
    }

    fn drop_session_state(&self, session_id: &str) -> EngineFuture<()> {
        (**self).drop_session_state(session_id)
    }

    fn open_socket_connection(&self, options: SocketOptions) -> EngineFuture<ConnectionHandle> {
        (**self).open_socket_connection(options)
    }

    fn send_on_connection(&self, handle: ConnectionHandle, message: Message) -> EngineFuture<()> {
        (**self).send_on_connection(handle, message)
    }

    fn close_connection(&self, handle: ConnectionHandle) -> EngineFuture<()> {
        (**self).close_connection(handle)
    }
}
