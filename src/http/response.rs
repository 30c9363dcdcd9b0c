//! Fetch-style response over a fully buffered engine payload.

use crate::base::neterror::NetError;
use crate::engine::NativeResponse;
use crate::http::Headers;
use http::StatusCode;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// HTTP response returned by `fetch`.
///
/// The body is already buffered; it can still be read only once, through
/// [`text`](Response::text) or [`json`](Response::json). Clone with
/// [`try_clone`](Response::try_clone) before reading to get a second copy.
pub struct Response {
    payload: NativeResponse,
    request_url: String,
    headers: Headers,
    status_text: &'static str,
    body_used: AtomicBool,
}

impl Response {
    /// Build from an engine payload. `request_url` is the normalized URL the
    /// caller asked for, used to derive [`redirected`](Response::redirected).
    pub(crate) fn from_native(payload: NativeResponse, request_url: &str) -> Self {
        let mut names: Vec<&String> = payload.headers.keys().collect();
        names.sort();

        let mut headers = Headers::new();
        for name in names {
            let value = &payload.headers[name];
            if let Err(e) = headers.append(name, value) {
                tracing::debug!(header = %name, error = %e, "dropping invalid response header");
            }
        }

        let status_text = StatusCode::from_u16(payload.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .unwrap_or("");

        Self {
            request_url: request_url.to_string(),
            headers,
            status_text,
            body_used: AtomicBool::new(false),
            payload,
        }
    }

    pub fn status(&self) -> u16 {
        self.payload.status
    }

    /// Canonical reason phrase, empty for unregistered codes.
    pub fn status_text(&self) -> &str {
        self.status_text
    }

    /// True for 2xx statuses.
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.payload.status)
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Final URL after redirects.
    pub fn url(&self) -> &str {
        &self.payload.url
    }

    /// True when the final URL differs from the requested one.
    pub fn redirected(&self) -> bool {
        self.payload.url != self.request_url
    }

    /// Cookies set by the final response, by name.
    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.payload.cookies
    }

    pub fn body_used(&self) -> bool {
        self.body_used.load(Ordering::Acquire)
    }

    /// Consume the body as text.
    pub async fn text(&self) -> Result<String, NetError> {
        if self.body_used.swap(true, Ordering::AcqRel) {
            return Err(NetError::BodyUsed);
        }
        Ok(self.payload.body.clone())
    }

    /// Consume the body and parse it as JSON.
    pub async fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, NetError> {
        let text = self.text().await?;
        serde_json::from_str(&text).map_err(|e| NetError::JsonParse {
            message: e.to_string(),
        })
    }

    /// Independent copy with an unread body.
    ///
    /// Fails once this response's body has been read.
    pub fn try_clone(&self) -> Result<Response, NetError> {
        if self.body_used() {
            return Err(NetError::CloneAfterConsume);
        }
        Ok(Response::from_native(self.payload.clone(), &self.request_url))
    }
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.payload.status)
            .field("url", &self.payload.url)
            .field("redirected", &self.redirected())
            .field("headers", &self.headers)
            .field("body_used", &self.body_used())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> NativeResponse {
        NativeResponse {
            status: 200,
            headers: HashMap::from([
                ("content-type".to_string(), "application/json".to_string()),
                ("x-request-id".to_string(), "abc".to_string()),
            ]),
            body: r#"{"ok":true,"n":3}"#.to_string(),
            cookies: HashMap::from([("sid".to_string(), "1".to_string())]),
            url: "https://example.com/final".to_string(),
        }
    }

    #[test]
    fn test_status_fields() {
        let resp = Response::from_native(payload(), "https://example.com/start");
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.status_text(), "OK");
        assert!(resp.ok());
        assert!(resp.redirected());
        assert_eq!(resp.url(), "https://example.com/final");
        assert_eq!(resp.cookies().get("sid").map(String::as_str), Some("1"));
    }

    #[test]
    fn test_not_redirected_when_urls_match() {
        let resp = Response::from_native(payload(), "https://example.com/final");
        assert!(!resp.redirected());
    }

    #[test]
    fn test_ok_range() {
        for (status, ok) in [(199, false), (200, true), (204, true), (299, true), (300, false), (404, false)] {
            let resp = Response::from_native(
                NativeResponse {
                    status,
                    ..payload()
                },
                "https://example.com/",
            );
            assert_eq!(resp.ok(), ok, "status {status}");
        }
    }

    #[test]
    fn test_unknown_status_text_is_empty() {
        let resp = Response::from_native(
            NativeResponse {
                status: 599,
                ..payload()
            },
            "https://example.com/",
        );
        assert_eq!(resp.status_text(), "");
    }

    #[test]
    fn test_headers_case_insensitive() {
        let resp = Response::from_native(payload(), "https://example.com/");
        assert_eq!(resp.headers().get("Content-Type").as_deref(), Some("application/json"));
    }

    #[tokio::test]
    async fn test_body_single_use() {
        let resp = Response::from_native(payload(), "https://example.com/");
        assert!(!resp.body_used());
        assert_eq!(resp.text().await.unwrap(), r#"{"ok":true,"n":3}"#);
        assert!(resp.body_used());
        assert_eq!(resp.text().await, Err(NetError::BodyUsed));
        assert!(matches!(resp.json::<serde_json::Value>().await, Err(NetError::BodyUsed)));
    }

    #[tokio::test]
    async fn test_json() {
        #[derive(serde::Deserialize)]
        struct Body {
            ok: bool,
            n: u32,
        }
        let resp = Response::from_native(payload(), "https://example.com/");
        let body: Body = resp.json().await.unwrap();
        assert!(body.ok);
        assert_eq!(body.n, 3);
    }

    #[tokio::test]
    async fn test_json_parse_error() {
        let resp = Response::from_native(
            NativeResponse {
                body: "not json".to_string(),
                ..payload()
            },
            "https://example.com/",
        );
        let err = resp.json::<serde_json::Value>().await.unwrap_err();
        assert!(matches!(err, NetError::JsonParse { .. }));
    }

    #[tokio::test]
    async fn test_clone_is_independent() {
        let resp = Response::from_native(payload(), "https://example.com/start");
        let copy = resp.try_clone().unwrap();

        resp.text().await.unwrap();
        assert!(!copy.body_used());
        assert_eq!(copy.text().await.unwrap(), r#"{"ok":true,"n":3}"#);
        assert_eq!(copy.status(), resp.status());
        assert_eq!(copy.redirected(), resp.redirected());
    }

    #[tokio::test]
    async fn test_clone_after_consume_fails() {
        let resp = Response::from_native(payload(), "https://example.com/");
        resp.text().await.unwrap();
        assert!(matches!(resp.try_clone(), Err(NetError::CloneAfterConsume)));
    }
}
