//! Fetch client with builder pattern.
//!
//! A [`Client`] owns an [`Engine`], the client-level defaults (browser,
//! proxy, timeout), and the memoized profile list. Cloning is cheap.
//!
//! # Example
//!
//! ```rust,ignore
//! use fetchkit::{Client, RequestInit};
//!
//! let client = Client::builder()
//!     .browser("chrome_142")
//!     .timeout(Duration::from_secs(10))
//!     .build();
//!
//! let resp = client.fetch("https://example.com", RequestInit::new()).await?;
//! println!("{}", resp.text().await?);
//! ```

use crate::base::neterror::NetError;
use crate::engine::{Engine, NativeEngine, SessionStateOptions};
use crate::fetch::{pipeline, AbortSignal, RequestInit};
use crate::http::{RequestBody, Response};
use crate::session::{Session, SessionOptions};
use crate::ws::{WebSocket, WebSocketInit};
use once_cell::sync::Lazy;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;

/// Profile used for sessions when neither the options nor the client name one.
pub const DEFAULT_BROWSER: &str = "chrome_142";

struct ClientInner {
    engine: Arc<dyn Engine>,
    profiles: OnceCell<Arc<[String]>>,
    browser: Option<String>,
    proxy: Option<String>,
    timeout: Option<Duration>,
}

/// Client for making fetch-style requests.
///
/// Use [`Client::builder()`] to configure and create a client.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("browser", &self.inner.browser)
            .field("proxy", &self.inner.proxy)
            .field("timeout", &self.inner.timeout)
            .field("profiles_cached", &self.inner.profiles.initialized())
            .finish()
    }
}

impl Client {
    /// Create a client over a fresh [`NativeEngine`] with default settings.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::default()
    }

    /// Create a client over `engine` with default settings.
    pub fn with_engine<E: Engine + 'static>(engine: E) -> Self {
        Self::builder().engine(engine).build()
    }

    pub(crate) fn engine(&self) -> &Arc<dyn Engine> {
        &self.inner.engine
    }

    pub(crate) fn default_browser(&self) -> Option<String> {
        self.inner.browser.clone()
    }

    pub(crate) fn default_proxy(&self) -> Option<String> {
        self.inner.proxy.clone()
    }

    pub(crate) fn default_timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    /// Perform a request.
    pub async fn fetch(&self, url: &str, init: RequestInit) -> Result<Response, NetError> {
        pipeline::dispatch(self, url, init).await
    }

    /// Start building a GET request.
    pub fn get<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request("GET", url)
    }

    /// Start building a POST request.
    pub fn post<U: AsRef<str>>(&self, url: U) -> RequestBuilder {
        self.request("POST", url)
    }

    /// Start building a request with custom method.
    pub fn request<U: AsRef<str>>(&self, method: &str, url: U) -> RequestBuilder {
        RequestBuilder {
            client: self.clone(),
            url: url.as_ref().to_string(),
            init: RequestInit::new().method(method),
        }
    }

    /// Supported browser profiles.
    ///
    /// The engine is asked once per client; failures are not cached.
    pub async fn profiles(&self) -> Result<Arc<[String]>, NetError> {
        let engine = Arc::clone(&self.inner.engine);
        self.inner
            .profiles
            .get_or_try_init(|| async move {
                let list = engine.list_profiles().await.map_err(NetError::from_engine)?;
                tracing::debug!(count = list.len(), "loaded browser profiles");
                Ok::<_, NetError>(Arc::from(list))
            })
            .await
            .map(Arc::clone)
    }

    pub(crate) async fn validate_profile(&self, profile: &str) -> Result<(), NetError> {
        let profiles = self.profiles().await?;
        if profiles.iter().any(|p| p == profile) {
            return Ok(());
        }
        Err(NetError::InvalidProfile {
            profile: profile.to_string(),
            available: profiles.join(", "),
        })
    }

    /// Create a persistent cookie session.
    pub async fn create_session(&self, options: SessionOptions) -> Result<Session, NetError> {
        let browser = options
            .browser
            .or_else(|| self.inner.browser.clone())
            .unwrap_or_else(|| DEFAULT_BROWSER.to_string());
        self.validate_profile(&browser).await?;

        let requested_id = match options.session_id {
            Some(id) => {
                let id = id.trim();
                if id.is_empty() {
                    return Err(NetError::EmptySessionId);
                }
                id.to_string()
            }
            None => uuid::Uuid::new_v4().to_string(),
        };
        let proxy = options.proxy.or_else(|| self.inner.proxy.clone());
        let timeout = options.timeout.or(self.inner.timeout);

        let id = self
            .inner
            .engine
            .create_session_state(SessionStateOptions {
                session_id: requested_id,
                browser: browser.clone(),
                proxy: proxy.clone(),
            })
            .await
            .map_err(NetError::from_engine)?;

        tracing::debug!(session = %id, browser = %browser, "session created");
        Ok(Session::new(id, browser, proxy, timeout, self.clone()))
    }

    /// Run `f` with a fresh session, closing it afterwards even if `f` fails.
    ///
    /// `f`'s error wins over a close failure.
    ///
    /// # Example
    /// ```ignore
    /// let body = client
    ///     .with_session(SessionOptions::new(), |session| async move {
    ///         session.fetch("https://example.com/login", RequestInit::new()).await?;
    ///         session.fetch("https://example.com/me", RequestInit::new()).await?.text().await
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_session<F, Fut, T, E>(&self, options: SessionOptions, f: F) -> Result<T, E>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<NetError>,
    {
        let session = self.create_session(options).await?;
        let result = f(session.clone()).await;
        let closed = session.close().await;

        match (result, closed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(e)) => Err(e.into()),
            (Err(e), closed) => {
                if let Err(close_err) = closed {
                    tracing::debug!(session = %session.id(), error = %close_err, "session close failed");
                }
                Err(e)
            }
        }
    }

    /// Open a WebSocket connection.
    pub async fn websocket(&self, url: &str, init: WebSocketInit) -> Result<WebSocket, NetError> {
        WebSocket::connect(self, url, init).await
    }
}

/// Builder for creating a [`Client`].
#[derive(Default)]
pub struct ClientBuilder {
    engine: Option<Arc<dyn Engine>>,
    browser: Option<String>,
    proxy: Option<String>,
    timeout: Option<Duration>,
}

impl ClientBuilder {
    /// Set the engine. Defaults to [`NativeEngine`].
    pub fn engine<E: Engine + 'static>(mut self, engine: E) -> Self {
        self.engine = Some(Arc::new(engine));
        self
    }

    /// Set the default browser profile.
    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    /// Set the default proxy URL.
    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// Take the default proxy from `HTTPS_PROXY`/`HTTP_PROXY` (either case).
    pub fn proxy_from_env(mut self) -> Self {
        self.proxy = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty())
            .or(self.proxy);
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client.
    pub fn build(self) -> Client {
        let engine = self
            .engine
            .unwrap_or_else(|| Arc::new(NativeEngine::new()));
        Client {
            inner: Arc::new(ClientInner {
                engine,
                profiles: OnceCell::new(),
                browser: self.browser,
                proxy: self.proxy,
                timeout: self.timeout,
            }),
        }
    }
}

/// Builder for a single request.
pub struct RequestBuilder {
    client: Client,
    url: String,
    init: RequestInit,
}

impl RequestBuilder {
    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.init = self.init.header(name, value);
        self
    }

    /// Set request body.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.init = self.init.body(body);
        self
    }

    /// Set JSON body.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self, NetError> {
        self.init = self.init.json(value)?;
        Ok(self)
    }

    /// Override the browser profile for this request.
    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.init = self.init.browser(browser);
        self
    }

    pub fn session(mut self, session: &Session) -> Self {
        self.init = self.init.session(session);
        self
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.init = self.init.signal(signal);
        self
    }

    /// Set request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.init = self.init.timeout(timeout);
        self
    }

    /// Send the request.
    pub async fn send(self) -> Result<Response, NetError> {
        self.client.fetch(&self.url, self.init).await
    }
}

static DEFAULT_CLIENT: Lazy<Client> = Lazy::new(Client::new);

/// The process-wide client used by [`fetch`], [`create_session`] and [`profiles`].
pub fn default_client() -> &'static Client {
    &DEFAULT_CLIENT
}

/// Perform a request with the default client.
pub async fn fetch(url: &str, init: RequestInit) -> Result<Response, NetError> {
    DEFAULT_CLIENT.fetch(url, init).await
}

/// Create a session on the default client.
pub async fn create_session(options: SessionOptions) -> Result<Session, NetError> {
    DEFAULT_CLIENT.create_session(options).await
}

/// Profiles supported by the default client's engine.
pub async fn profiles() -> Result<Arc<[String]>, NetError> {
    DEFAULT_CLIENT.profiles().await
}
