//! Request body for POST/PUT/PATCH/DELETE operations.

use crate::base::neterror::NetError;
use bytes::Bytes;
use futures::stream::BoxStream;
use std::fmt;

/// Request body shapes accepted by [`RequestInit`](crate::fetch::RequestInit).
///
/// Every supported shape is serialized to a UTF-8 string before it reaches
/// the engine. `Stream` exists so streaming callers get a typed error
/// instead of a silently buffered body.
#[derive(Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// Text, sent as-is.
    Text(String),
    /// Raw bytes, decoded as UTF-8 (invalid sequences replaced).
    Bytes(Bytes),
    /// `application/x-www-form-urlencoded` pairs.
    Form(Vec<(String, String)>),
    /// Streaming body. Not supported by the engine contract.
    Stream(BoxStream<'static, Bytes>),
}

impl RequestBody {
    /// Build a url-encoded form body.
    pub fn form<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        RequestBody::Form(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        matches!(self, RequestBody::Empty)
    }

    /// Short name of the shape, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RequestBody::Empty => "empty",
            RequestBody::Text(_) => "text",
            RequestBody::Bytes(_) => "bytes",
            RequestBody::Form(_) => "form",
            RequestBody::Stream(_) => "stream",
        }
    }

    /// Serialize into the string the engine transports. `Empty` yields `None`.
    pub fn into_text(self) -> Result<Option<String>, NetError> {
        match self {
            RequestBody::Empty => Ok(None),
            RequestBody::Text(s) => Ok(Some(s)),
            RequestBody::Bytes(b) => Ok(Some(String::from_utf8_lossy(&b).into_owned())),
            RequestBody::Form(pairs) => {
                let encoded = url::form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(pairs.iter())
                    .finish();
                Ok(Some(encoded))
            }
            RequestBody::Stream(_) => Err(NetError::UnsupportedBodyType { kind: "stream" }),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Text(s) => f.debug_tuple("Text").field(s).finish(),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(b).finish(),
            RequestBody::Form(p) => f.debug_tuple("Form").field(p).finish(),
            RequestBody::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Text(s)
    }
}

impl From<&str> for RequestBody {
    fn from(s: &str) -> Self {
        RequestBody::Text(s.to_owned())
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&[u8]> for RequestBody {
    fn from(v: &[u8]) -> Self {
        RequestBody::Bytes(Bytes::copy_from_slice(v))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_body() {
        let body = RequestBody::Empty;
        assert!(body.is_empty());
        assert_eq!(body.into_text().unwrap(), None);
    }

    #[test]
    fn test_text_body_passes_through() {
        let body: RequestBody = "hello world".into();
        assert_eq!(body.into_text().unwrap().as_deref(), Some("hello world"));
    }

    #[test]
    fn test_bytes_decoded_as_utf8() {
        let body: RequestBody = "héllo".as_bytes().to_vec().into();
        assert_eq!(body.into_text().unwrap().as_deref(), Some("héllo"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let body: RequestBody = vec![b'a', 0xff, b'b'].into();
        assert_eq!(body.into_text().unwrap().as_deref(), Some("a\u{fffd}b"));
    }

    #[test]
    fn test_form_is_url_encoded() {
        let body = RequestBody::form([("q", "rust lang"), ("page", "2&3")]);
        assert_eq!(
            body.into_text().unwrap().as_deref(),
            Some("q=rust+lang&page=2%263")
        );
    }

    #[test]
    fn test_stream_is_rejected() {
        let body = RequestBody::Stream(Box::pin(futures::stream::empty()));
        assert_eq!(body.kind(), "stream");
        assert_eq!(
            body.into_text(),
            Err(NetError::UnsupportedBodyType { kind: "stream" })
        );
    }

    #[test]
    fn test_default_is_empty() {
        assert!(RequestBody::default().is_empty());
    }
}
