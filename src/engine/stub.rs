//! Scriptable in-process engine.
//!
//! `StubEngine` fulfils the [`Engine`] contract without any network access.
//! Every call is recorded so tests can assert on what the request layer asked
//! for, e.g. that an ephemeral session was dropped exactly once.

use super::{
    ConnectionHandle, Engine, EngineFuture, EngineRequest, NativeResponse, SessionStateOptions,
    SocketCallbacks, SocketOptions,
};
use crate::base::neterror::{BoxError, NetError};
use crate::ws::{CloseFrame, Message};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Produces the payload for a request.
pub type Responder =
    Arc<dyn Fn(&EngineRequest) -> Result<NativeResponse, BoxError> + Send + Sync>;

/// One recorded engine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    PerformRequest(EngineRequest),
    ListProfiles,
    CreateSessionState(SessionStateOptions),
    ClearSessionState(String),
    DropSessionState(String),
    OpenSocket { url: String },
    Send(ConnectionHandle, Message),
    CloseConnection(ConnectionHandle),
}

/// Profiles reported when none are configured.
pub const DEFAULT_STUB_PROFILES: &[&str] = &["chrome_142", "firefox_139", "safari_18"];

/// Call-recording engine for tests.
#[derive(Clone)]
pub struct StubEngine {
    inner: Arc<StubInner>,
}

struct StubInner {
    profiles: Vec<String>,
    responder: Responder,
    latency: Option<Duration>,
    fail_session_calls: bool,
    calls: Mutex<Vec<EngineCall>>,
    sockets: Mutex<HashMap<u64, SocketCallbacks>>,
    next_handle: AtomicU64,
}

impl Default for StubEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StubEngine {
    /// Stub with the default profiles and an echo responder.
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> StubEngineBuilder {
        StubEngineBuilder::default()
    }

    /// Snapshot of every call made so far, in order.
    pub fn calls(&self) -> Vec<EngineCall> {
        lock(&self.inner.calls).clone()
    }

    /// Requests passed to `perform_request`, in order.
    pub fn requests(&self) -> Vec<EngineRequest> {
        lock(&self.inner.calls)
            .iter()
            .filter_map(|c| match c {
                EngineCall::PerformRequest(r) => Some(r.clone()),
                _ => None,
            })
            .collect()
    }

    /// Session ids passed to `drop_session_state`, in order.
    pub fn dropped_sessions(&self) -> Vec<String> {
        lock(&self.inner.calls)
            .iter()
            .filter_map(|c| match c {
                EngineCall::DropSessionState(id) => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    /// Number of recorded calls matching `predicate`.
    pub fn count(&self, predicate: impl Fn(&EngineCall) -> bool) -> usize {
        lock(&self.inner.calls).iter().filter(|c| predicate(c)).count()
    }

    /// Deliver an inbound message on an open connection.
    pub fn push_message(&self, handle: ConnectionHandle, message: Message) -> bool {
        match lock(&self.inner.sockets).get(&handle.0) {
            Some(callbacks) => {
                (callbacks.on_message)(message);
                true
            }
            None => false,
        }
    }

    /// Simulate the peer closing a connection.
    pub fn push_close(&self, handle: ConnectionHandle, frame: Option<CloseFrame>) -> bool {
        match lock(&self.inner.sockets).remove(&handle.0) {
            Some(callbacks) => {
                (callbacks.on_close)(frame);
                true
            }
            None => false,
        }
    }

    /// Simulate a transport error on a connection.
    pub fn push_error(&self, handle: ConnectionHandle, error: impl Into<String>) -> bool {
        match lock(&self.inner.sockets).get(&handle.0) {
            Some(callbacks) => {
                (callbacks.on_error)(error.into());
                true
            }
            None => false,
        }
    }

    /// Whether a connection is still registered.
    pub fn is_open(&self, handle: ConnectionHandle) -> bool {
        lock(&self.inner.sockets).contains_key(&handle.0)
    }

    fn record(&self, call: EngineCall) {
        lock(&self.inner.calls).push(call);
    }

    fn session_call(&self, call: EngineCall) -> EngineFuture<()> {
        self.record(call);
        let fail = self.inner.fail_session_calls;
        Box::pin(async move {
            if fail {
                return Err(NetError::engine("session state unavailable").into());
            }
            Ok(())
        })
    }
}

impl fmt::Debug for StubEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StubEngine")
            .field("profiles", &self.inner.profiles)
            .field("latency", &self.inner.latency)
            .field("call_count", &lock(&self.inner.calls).len())
            .finish_non_exhaustive()
    }
}

impl Engine for StubEngine {
    fn perform_request(&self, request: EngineRequest) -> EngineFuture<NativeResponse> {
        self.record(EngineCall::PerformRequest(request.clone()));
        let inner = Arc::clone(&self.inner);
        Box::pin(async move {
            if let Some(latency) = inner.latency {
                tokio::time::sleep(latency).await;
            }
            (inner.responder)(&request)
        })
    }

    fn list_profiles(&self) -> EngineFuture<Vec<String>> {
        self.record(EngineCall::ListProfiles);
        let profiles = self.inner.profiles.clone();
        Box::pin(async move { Ok(profiles) })
    }

    fn create_session_state(&self, options: SessionStateOptions) -> EngineFuture<String> {
        self.record(EngineCall::CreateSessionState(options.clone()));
        let fail = self.inner.fail_session_calls;
        Box::pin(async move {
            if fail {
                return Err(NetError::engine("session state unavailable").into());
            }
            Ok(options.session_id)
        })
    }

    fn clear_session_state(&self, session_id: &str) -> EngineFuture<()> {
        self.session_call(EngineCall::ClearSessionState(session_id.to_string()))
    }

    fn drop_session_state(&self, session_id: &str) -> EngineFuture<()> {
        self.session_call(EngineCall::DropSessionState(session_id.to_string()))
    }

    fn open_socket_connection(&self, options: SocketOptions) -> EngineFuture<ConnectionHandle> {
        self.record(EngineCall::OpenSocket {
            url: options.url.clone(),
        });
        let id = self.inner.next_handle.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.sockets).insert(id, options.callbacks);
        Box::pin(async move { Ok(ConnectionHandle(id)) })
    }

    fn send_on_connection(&self, handle: ConnectionHandle, message: Message) -> EngineFuture<()> {
        self.record(EngineCall::Send(handle, message));
        let open = self.is_open(handle);
        Box::pin(async move {
            if !open {
                return Err(NetError::UnknownConnection { handle: handle.0 }.into());
            }
            Ok(())
        })
    }

    fn close_connection(&self, handle: ConnectionHandle) -> EngineFuture<()> {
        self.record(EngineCall::CloseConnection(handle));
        lock(&self.inner.sockets).remove(&handle.0);
        Box::pin(async { Ok(()) })
    }
}

/// Builder for [`StubEngine`].
#[must_use]
pub struct StubEngineBuilder {
    profiles: Vec<String>,
    responder: Responder,
    latency: Option<Duration>,
    fail_session_calls: bool,
}

impl Default for StubEngineBuilder {
    fn default() -> Self {
        Self {
            profiles: DEFAULT_STUB_PROFILES.iter().map(|p| p.to_string()).collect(),
            responder: Arc::new(echo),
            latency: None,
            fail_session_calls: false,
        }
    }
}

impl StubEngineBuilder {
    /// Set the profile ids reported by `list_profiles`.
    pub fn profiles<I, S>(mut self, profiles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.profiles = profiles.into_iter().map(Into::into).collect();
        self
    }

    /// Answer every request with `responder`.
    pub fn respond_with<F>(mut self, responder: F) -> Self
    where
        F: Fn(&EngineRequest) -> Result<NativeResponse, BoxError> + Send + Sync + 'static,
    {
        self.responder = Arc::new(responder);
        self
    }

    /// Answer every request with a clone of `response`.
    pub fn respond(self, response: NativeResponse) -> Self {
        self.respond_with(move |_| Ok(response.clone()))
    }

    /// Delay every `perform_request` by `latency`.
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make create/clear/drop session calls fail.
    pub fn fail_session_calls(mut self) -> Self {
        self.fail_session_calls = true;
        self
    }

    pub fn build(self) -> StubEngine {
        StubEngine {
            inner: Arc::new(StubInner {
                profiles: self.profiles,
                responder: self.responder,
                latency: self.latency,
                fail_session_calls: self.fail_session_calls,
                calls: Mutex::new(Vec::new()),
                sockets: Mutex::new(HashMap::new()),
                next_handle: AtomicU64::new(1),
            }),
        }
    }
}

/// Default responder: 200 with a JSON description of the request.
fn echo(request: &EngineRequest) -> Result<NativeResponse, BoxError> {
    let headers: serde_json::Map<String, serde_json::Value> = request
        .headers
        .iter()
        .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
        .collect();
    let body = serde_json::json!({
        "method": request.method,
        "url": request.url,
        "headers": headers,
        "body": request.body,
        "browser": request.browser,
        "sessionId": request.session_id,
        "ephemeral": request.ephemeral,
    });

    Ok(NativeResponse {
        status: 200,
        headers: HashMap::from([(
            "content-type".to_string(),
            "application/json".to_string(),
        )]),
        body: body.to_string(),
        cookies: HashMap::new(),
        url: request.url.clone(),
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
