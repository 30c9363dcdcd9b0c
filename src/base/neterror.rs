use crate::fetch::init::RedirectMode;
use thiserror::Error;

/// Boxed error returned by [`Engine`](crate::engine::Engine) implementations.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Broad category of a [`NetError`].
///
/// Callers that only care about the class of failure (e.g. to special-case
/// cancellation) should match on this instead of individual variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad input, detected before any engine call.
    Validation,
    /// Contradictory session options or an attempt to mutate session identity.
    Conflict,
    /// Operation on a closed session or socket.
    ClosedResource,
    /// The caller's abort signal fired.
    Cancellation,
    /// The engine call itself failed.
    Engine,
    /// Response body is not valid JSON.
    Parse,
    /// Misuse of a consumed response body.
    Type,
}

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum NetError {
    // Validation Errors
    #[error("URL must not be empty")]
    EmptyUrl,
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },
    #[error("Unsupported redirect mode: {mode}. Only 'follow' is supported")]
    UnsupportedRedirect { mode: RedirectMode },
    #[error("Invalid browser profile '{profile}'. Available: {available}")]
    InvalidProfile { profile: String, available: String },
    #[error("Unsupported HTTP method: {method}")]
    UnsupportedMethod { method: String },
    #[error("Request with {method} method cannot have a body")]
    BodyNotAllowed { method: String },
    #[error("Unsupported body type: {kind}")]
    UnsupportedBodyType { kind: &'static str },
    #[error("Header name must not be empty")]
    EmptyHeaderName,
    #[error("Invalid header name: {name}")]
    InvalidHeaderName { name: String },
    #[error("Invalid value for header {name}")]
    InvalidHeaderValue { name: String },
    #[error("sessionId must not be empty")]
    EmptySessionId,
    #[error("Invalid WebSocket URL scheme: {scheme}. Expected ws or wss")]
    InvalidSocketScheme { scheme: String },

    // Conflict Errors
    #[error("Provide either `session` or `sessionId`, not both")]
    SessionAndSessionId,
    #[error("Cannot use cookieMode 'ephemeral' together with a sessionId")]
    EphemeralWithSessionId,
    #[error("cookieMode 'session' requires a session or sessionId")]
    SessionModeWithoutSession,
    #[error("Session browser cannot be changed (session uses '{current}', request asked for '{requested}')")]
    BrowserChange { current: String, requested: String },
    #[error("Session proxy cannot be changed (session uses {current}, request asked for {requested})")]
    ProxyChange { current: String, requested: String },

    // Closed Resource Errors
    #[error("Session {id} has been closed")]
    SessionClosed { id: String },
    #[error("WebSocket connection has been closed")]
    SocketClosed,

    // Cancellation
    #[error("Request was aborted{}", .reason.as_ref().map(|r| format!(": {r}")).unwrap_or_default())]
    Aborted { reason: Option<String> },

    // Engine Errors
    #[error("Engine request failed: {message}")]
    Engine { message: String },
    #[error("Request timed out after {timeout_ms}ms")]
    TimedOut { timeout_ms: u64 },
    #[error("Name not resolved: {host}")]
    NameNotResolved { host: String },
    #[error("Connection to {host}:{port} failed: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },
    #[error("Tunnel connection failed: {status}")]
    TunnelConnectionFailed { status: String },
    #[error("SSL protocol error: {reason}")]
    SslProtocolError { reason: String },
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("Invalid response: {reason}")]
    InvalidResponse { reason: String },
    #[error("Unknown connection handle {handle}")]
    UnknownConnection { handle: u64 },

    // Parse Errors
    #[error("Failed to parse response body as JSON: {message}")]
    JsonParse { message: String },

    // Type Errors
    #[error("Body has already been used")]
    BodyUsed,
    #[error("Cannot clone a response whose body has already been used")]
    CloneAfterConsume,
}

impl NetError {
    /// The taxonomy bucket this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetError::EmptyUrl
            | NetError::InvalidUrl { .. }
            | NetError::UnsupportedRedirect { .. }
            | NetError::InvalidProfile { .. }
            | NetError::UnsupportedMethod { .. }
            | NetError::BodyNotAllowed { .. }
            | NetError::UnsupportedBodyType { .. }
            | NetError::EmptyHeaderName
            | NetError::InvalidHeaderName { .. }
            | NetError::InvalidHeaderValue { .. }
            | NetError::EmptySessionId
            | NetError::InvalidSocketScheme { .. } => ErrorKind::Validation,

            NetError::SessionAndSessionId
            | NetError::EphemeralWithSessionId
            | NetError::SessionModeWithoutSession
            | NetError::BrowserChange { .. }
            | NetError::ProxyChange { .. } => ErrorKind::Conflict,

            NetError::SessionClosed { .. } | NetError::SocketClosed => ErrorKind::ClosedResource,

            NetError::Aborted { .. } => ErrorKind::Cancellation,

            NetError::Engine { .. }
            | NetError::TimedOut { .. }
            | NetError::NameNotResolved { .. }
            | NetError::ConnectionFailed { .. }
            | NetError::TunnelConnectionFailed { .. }
            | NetError::SslProtocolError { .. }
            | NetError::TooManyRedirects
            | NetError::InvalidResponse { .. }
            | NetError::UnknownConnection { .. } => ErrorKind::Engine,

            NetError::JsonParse { .. } => ErrorKind::Parse,

            NetError::BodyUsed | NetError::CloneAfterConsume => ErrorKind::Type,
        }
    }

    /// Returns true if the caller's abort signal caused this error.
    pub fn is_cancellation(&self) -> bool {
        self.kind() == ErrorKind::Cancellation
    }

    /// Returns true if the error was raised before the engine was called.
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    /// Create an engine error from any displayable failure.
    pub fn engine(message: impl Into<String>) -> Self {
        NetError::Engine {
            message: message.into(),
        }
    }

    /// Normalize a boxed engine failure.
    ///
    /// A `NetError` that travelled through the box is returned as-is; anything
    /// else becomes [`NetError::Engine`] carrying the full source chain.
    pub fn from_engine(err: BoxError) -> Self {
        match err.downcast::<NetError>() {
            Ok(net) => *net,
            Err(other) => {
                let mut message = other.to_string();
                let mut source = other.source();
                while let Some(cause) = source {
                    message.push_str(": ");
                    message.push_str(&cause.to_string());
                    source = cause.source();
                }
                NetError::Engine { message }
            }
        }
    }
}
