//! Per-request options.

use super::abort::AbortSignal;
use crate::base::neterror::NetError;
use crate::http::{Headers, RequestBody};
use crate::session::{CookieMode, Session};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

/// Redirect handling. Only [`RedirectMode::Follow`] is supported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RedirectMode {
    #[default]
    Follow,
    Manual,
    Error,
}

impl fmt::Display for RedirectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RedirectMode::Follow => "follow",
            RedirectMode::Manual => "manual",
            RedirectMode::Error => "error",
        })
    }
}

/// Headers as supplied by the caller, validated when the request is dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadersInit {
    Headers(Headers),
    Pairs(Vec<(String, String)>),
    Map(HashMap<String, String>),
}

impl Default for HeadersInit {
    fn default() -> Self {
        HeadersInit::Pairs(Vec::new())
    }
}

impl HeadersInit {
    /// Normalize into a [`Headers`] container.
    pub fn into_headers(self) -> Result<Headers, NetError> {
        match self {
            HeadersInit::Headers(h) => Ok(h),
            HeadersInit::Pairs(pairs) => Headers::try_from(pairs),
            HeadersInit::Map(map) => Headers::try_from(map),
        }
    }

    fn push(&mut self, name: String, value: String) {
        let mut pairs = match std::mem::take(self) {
            HeadersInit::Pairs(pairs) => pairs,
            HeadersInit::Headers(h) => h.to_pairs(),
            HeadersInit::Map(map) => map.into_iter().collect(),
        };
        pairs.push((name, value));
        *self = HeadersInit::Pairs(pairs);
    }
}

impl From<Headers> for HeadersInit {
    fn from(h: Headers) -> Self {
        HeadersInit::Headers(h)
    }
}

impl From<Vec<(String, String)>> for HeadersInit {
    fn from(pairs: Vec<(String, String)>) -> Self {
        HeadersInit::Pairs(pairs)
    }
}

impl From<HashMap<String, String>> for HeadersInit {
    fn from(map: HashMap<String, String>) -> Self {
        HeadersInit::Map(map)
    }
}

impl<const N: usize> From<[(&str, &str); N]> for HeadersInit {
    fn from(pairs: [(&str, &str); N]) -> Self {
        HeadersInit::Pairs(
            pairs
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }
}

/// Options for a single fetch.
///
/// Every field is optional. Values set here win over session defaults,
/// which win over client defaults.
///
/// # Example
/// ```ignore
/// let init = RequestInit::new()
///     .method("POST")
///     .header("Content-Type", "text/plain")
///     .body("hello")
///     .browser("firefox_139")
///     .timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: HeadersInit,
    pub body: RequestBody,
    pub signal: Option<AbortSignal>,
    pub redirect: Option<RedirectMode>,
    pub browser: Option<String>,
    pub proxy: Option<String>,
    pub timeout: Option<Duration>,
    pub cookie_mode: Option<CookieMode>,
    pub session: Option<Session>,
    pub session_id: Option<String>,
    /// Send only the caller's headers, none of the profile defaults.
    pub disable_default_headers: bool,
}

impl RequestInit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Replace all headers.
    pub fn headers(mut self, headers: impl Into<HeadersInit>) -> Self {
        self.headers = headers.into();
        self
    }

    /// Add one header. Validation happens at dispatch.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push(name.into(), value.into());
        self
    }

    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = body.into();
        self
    }

    /// Serialize `value` as the body and set `Content-Type: application/json`.
    #[cfg(feature = "json")]
    pub fn json<T: serde::Serialize + ?Sized>(mut self, value: &T) -> Result<Self, NetError> {
        let body = serde_json::to_string(value)
            .map_err(|_| NetError::UnsupportedBodyType { kind: "json" })?;
        self.body = RequestBody::Text(body);
        self.headers
            .push("Content-Type".to_string(), "application/json".to_string());
        Ok(self)
    }

    pub fn signal(mut self, signal: AbortSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    pub fn redirect(mut self, mode: RedirectMode) -> Self {
        self.redirect = Some(mode);
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

    pub fn cookie_mode(mut self, mode: CookieMode) -> Self {
        self.cookie_mode = Some(mode);
        self
    }

    pub fn session(mut self, session: &Session) -> Self {
        self.session = Some(session.clone());
        self
    }

    pub fn session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn disable_default_headers(mut self, disable: bool) -> Self {
        self.disable_default_headers = disable;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redirect_display() {
        assert_eq!(RedirectMode::Follow.to_string(), "follow");
        assert_eq!(RedirectMode::Manual.to_string(), "manual");
        assert_eq!(RedirectMode::default(), RedirectMode::Follow);
    }

    #[test]
    fn test_header_setter_accumulates() {
        let init = RequestInit::new().header("A", "1").header("B", "2").header("a", "3");
        let headers = init.headers.into_headers().unwrap();
        assert_eq!(headers.get("a").as_deref(), Some("1, 3"));
        assert_eq!(headers.get("b").as_deref(), Some("2"));
    }

    #[test]
    fn test_header_after_headers_keeps_both() {
        let base = Headers::try_from([("X-One", "1")]).unwrap();
        let init = RequestInit::new().headers(base).header("X-Two", "2");
        let headers = init.headers.into_headers().unwrap();
        assert!(headers.has("x-one"));
        assert!(headers.has("x-two"));
    }

    #[test]
    fn test_invalid_header_detected_on_normalize() {
        let init = RequestInit::new().header("bad name", "v");
        assert!(matches!(
            init.headers.into_headers(),
            Err(NetError::InvalidHeaderName { .. })
        ));
    }

    #[cfg(feature = "json")]
    #[test]
    fn test_json_body() {
        let init = RequestInit::new()
            .json(&serde_json::json!({"a": 1}))
            .unwrap();
        assert!(matches!(&init.body, RequestBody::Text(s) if s == r#"{"a":1}"#));
        let headers = init.headers.into_headers().unwrap();
        assert_eq!(headers.get("content-type").as_deref(), Some("application/json"));
    }
}
