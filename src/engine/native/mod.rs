//! Network-backed engine: HTTP/1.1 over BoringSSL, cookie jars per session,
//! and WebSocket connections.

mod connect;
mod cookies;
pub mod profiles;
mod request;
mod socket;

pub use profiles::{Profile, DEFAULT_PROFILE, PROFILES};

use crate::base::neterror::NetError;
use crate::engine::{
    ConnectionHandle, Engine, EngineFuture, EngineRequest, NativeResponse, SessionStateOptions,
    SocketOptions,
};
use crate::ws::Message;
use cookies::CookieStore;
use dashmap::DashMap;
use socket::SocketRegistry;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use url::Url;

/// Timeout applied when a request carries none.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Engine-side state for one session id.
#[derive(Debug, Default)]
pub(crate) struct SessionState {
    pub(crate) browser: Option<String>,
    pub(crate) proxy: Option<String>,
    cookies: Mutex<CookieStore>,
}

impl SessionState {
    fn new(browser: Option<String>, proxy: Option<String>) -> Self {
        Self {
            browser,
            proxy,
            cookies: Mutex::new(CookieStore::new()),
        }
    }

    fn jar(&self) -> std::sync::MutexGuard<'_, CookieStore> {
        self.cookies.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn cookie_header(&self, url: &Url) -> Option<String> {
        self.jar().header_for(url)
    }

    pub(crate) fn store_cookies<'a, I>(&self, url: &Url, values: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.jar().store_response_cookies(url, values)
    }

    fn clear_cookies(&self) {
        self.jar().clear();
    }

    fn cookie_count(&self) -> usize {
        self.jar().len()
    }
}

struct NativeInner {
    sessions: DashMap<String, Arc<SessionState>>,
    sockets: Arc<SocketRegistry>,
    default_timeout: Duration,
}

/// The real engine.
///
/// Cheap to clone; clones share sessions and open sockets.
///
/// # Example
/// ```ignore
/// use fetchkit::{Client, NativeEngine};
///
/// let client = Client::builder()
///     .engine(NativeEngine::new().with_default_timeout(Duration::from_secs(10)))
///     .build();
/// ```
#[derive(Clone)]
pub struct NativeEngine {
    inner: Arc<NativeInner>,
}

impl Default for NativeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NativeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeEngine")
            .field("sessions", &self.inner.sessions.len())
            .field("sockets", &self.inner.sockets.len())
            .field("default_timeout", &self.inner.default_timeout)
            .finish()
    }
}

impl NativeEngine {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(NativeInner {
                sessions: DashMap::new(),
                sockets: Arc::new(SocketRegistry::default()),
                default_timeout: DEFAULT_TIMEOUT,
            }),
        }
    }

    /// Timeout for requests that carry none. Only applies to engines not yet cloned.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.default_timeout = timeout;
        }
        self
    }

    /// Number of live session states.
    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Number of cookies stored for a session, if it exists.
    pub fn cookie_count(&self, session_id: &str) -> Option<usize> {
        self.inner
            .sessions
            .get(session_id)
            .map(|state| state.cookie_count())
    }

    /// Number of open WebSocket connections.
    pub fn socket_count(&self) -> usize {
        self.inner.sockets.len()
    }

    /// State for `session_id`, allocated on first use.
    fn session(&self, session_id: &str) -> Arc<SessionState> {
        self.inner
            .sessions
            .entry(session_id.to_string())
            .or_default()
            .value()
            .clone()
    }
}

impl Engine for NativeEngine {
    fn perform_request(&self, request: EngineRequest) -> EngineFuture<NativeResponse> {
        let state = self.session(&request.session_id);
        let timeout = request
            .timeout_ms
            .map(Duration::from_millis)
            .unwrap_or(self.inner.default_timeout);

        Box::pin(async move {
            let timeout_ms = timeout.as_millis() as u64;
            match tokio::time::timeout(timeout, request::execute(request, &state)).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => {
                    tracing::debug!(timeout_ms, "request timed out");
                    Err(NetError::TimedOut { timeout_ms }.into())
                }
            }
        })
    }

    fn list_profiles(&self) -> EngineFuture<Vec<String>> {
        Box::pin(async { Ok(PROFILES.iter().map(|p| p.to_string()).collect()) })
    }

    fn create_session_state(&self, options: SessionStateOptions) -> EngineFuture<String> {
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            inner
                .sessions
                .entry(options.session_id.clone())
                .or_insert_with(|| {
                    Arc::new(SessionState::new(Some(options.browser), options.proxy))
                });
            tracing::debug!(session = %options.session_id, "session state created");
            Ok(options.session_id)
        })
    }

    fn clear_session_state(&self, session_id: &str) -> EngineFuture<()> {
        let state = self.inner.sessions.get(session_id).map(|s| Arc::clone(s.value()));
        Box::pin(async move {
            if let Some(state) = state {
                state.clear_cookies();
            }
            Ok(())
        })
    }

    fn drop_session_state(&self, session_id: &str) -> EngineFuture<()> {
        let removed = self.inner.sessions.remove(session_id).is_some();
        let session_id = session_id.to_string();
        Box::pin(async move {
            tracing::debug!(session = %session_id, removed, "session state dropped");
            Ok(())
        })
    }

    fn open_socket_connection(&self, options: SocketOptions) -> EngineFuture<ConnectionHandle> {
        let sockets = Arc::clone(&self.inner.sockets);
        Box::pin(async move {
            sockets.open(options).await.map_err(Into::into)
        })
    }

    fn send_on_connection(&self, handle: ConnectionHandle, message: Message) -> EngineFuture<()> {
        let sockets = Arc::clone(&self.inner.sockets);
        Box::pin(async move { sockets.send(handle, message).await.map_err(Into::into) })
    }

    fn close_connection(&self, handle: ConnectionHandle) -> EngineFuture<()> {
        let sockets = Arc::clone(&self.inner.sockets);
        Box::pin(async move { sockets.close(handle).await.map_err(Into::into) })
    }
}
