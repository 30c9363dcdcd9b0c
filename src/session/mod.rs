//! Persistent cookie sessions with fixed browser identity.
//!
//! A [`Session`] binds a browser profile (and optionally a proxy and a
//! timeout) at creation time. Every request made through it shares one
//! engine-side cookie jar, and the bound profile and proxy cannot be
//! changed per request.

pub mod resolver;

pub use resolver::{resolve_session, CookieMode, SessionContext};

use crate::base::neterror::NetError;
use crate::client::Client;
use crate::fetch::RequestInit;
use crate::http::Response;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Options for [`Client::create_session`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionOptions {
    /// Reuse a caller-chosen id instead of a random one.
    pub session_id: Option<String>,
    /// Browser profile; defaults to the client's, then the engine default.
    pub browser: Option<String>,
    pub proxy: Option<String>,
    /// Default timeout for requests in this session.
    pub timeout: Option<Duration>,
}

impl SessionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn browser(mut self, browser: impl Into<String>) -> Self {
        self.browser = Some(browser.into());
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

struct SessionInner {
    id: String,
    browser: String,
    proxy: Option<String>,
    timeout: Option<Duration>,
    closed: AtomicBool,
    client: Client,
}

/// Handle to an engine-side cookie session.
///
/// Clones refer to the same session; closing one closes all.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl Session {
    pub(crate) fn new(
        id: String,
        browser: String,
        proxy: Option<String>,
        timeout: Option<Duration>,
        client: Client,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id,
                browser,
                proxy,
                timeout,
                closed: AtomicBool::new(false),
                client,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn browser(&self) -> &str {
        &self.inner.browser
    }

    pub fn proxy(&self) -> Option<&str> {
        self.inner.proxy.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.inner.timeout
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), NetError> {
        if self.is_closed() {
            return Err(NetError::SessionClosed {
                id: self.inner.id.clone(),
            });
        }
        Ok(())
    }

    /// Reject per-request browser/proxy changes and fill in session defaults.
    pub(crate) fn stamp(&self, init: &mut RequestInit) -> Result<(), NetError> {
        self.ensure_open()?;

        if let Some(requested) = init.browser.as_deref() {
            if requested != self.inner.browser {
                return Err(NetError::BrowserChange {
                    current: self.inner.browser.clone(),
                    requested: requested.to_string(),
                });
            }
        }
        if let Some(requested) = init.proxy.as_deref() {
            if Some(requested) != self.inner.proxy.as_deref() {
                return Err(NetError::ProxyChange {
                    current: self.inner.proxy.clone().unwrap_or_else(|| "none".to_string()),
                    requested: requested.to_string(),
                });
            }
        }

        init.browser = Some(self.inner.browser.clone());
        init.proxy = self.inner.proxy.clone();
        if init.timeout.is_none() {
            init.timeout = self.inner.timeout;
        }
        Ok(())
    }

    /// Fetch within this session. Cookies persist across calls.
    ///
    /// # Example
    /// ```ignore
    /// let session = client.create_session(SessionOptions::new().browser("chrome_142")).await?;
    /// session.fetch("https://example.com/login", RequestInit::new()).await?;
    /// let resp = session.fetch("https://example.com/account", RequestInit::new()).await?;
    /// session.close().await?;
    /// ```
    pub async fn fetch(&self, url: &str, mut init: RequestInit) -> Result<Response, NetError> {
        self.stamp(&mut init)?;
        init.session = Some(self.clone());
        init.cookie_mode = Some(CookieMode::Session);
        self.inner.client.fetch(url, init).await
    }

    /// Remove every cookie in this session. The session stays usable.
    pub async fn clear_cookies(&self) -> Result<(), NetError> {
        self.ensure_open()?;
        self.inner
            .client
            .engine()
            .clear_session_state(&self.inner.id)
            .await
            .map_err(NetError::from_engine)
    }

    /// Release the engine-side state. Idempotent.
    pub async fn close(&self) -> Result<(), NetError> {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        tracing::debug!(session = %self.inner.id, "closing session");
        self.inner
            .client
            .engine()
            .drop_session_state(&self.inner.id)
            .await
            .map_err(NetError::from_engine)
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("browser", &self.inner.browser)
            .field("proxy", &self.inner.proxy)
            .field("timeout", &self.inner.timeout)
            .field("closed", &self.is_closed())
            .finish()
    }
}
