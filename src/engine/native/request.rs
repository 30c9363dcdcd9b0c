//! One logical request: connect, send, follow redirects, buffer the body.

use super::connect::{self, ProxyConfig};
use super::profiles::{Profile, DEFAULT_PROFILE};
use super::SessionState;
use crate::base::neterror::NetError;
use crate::engine::{EngineRequest, NativeResponse};
use crate::http::Headers;
use bytes::Bytes;
use http::{header, Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper_util::rt::TokioIo;
use std::collections::HashMap;
use url::Url;

/// Redirect hops followed before giving up.
pub(crate) const MAX_REDIRECTS: usize = 10;

/// Perform `request` against the network using `state` for cookies and defaults.
pub(crate) async fn execute(
    request: EngineRequest,
    state: &SessionState,
) -> Result<NativeResponse, NetError> {
    let mut url = Url::parse(&request.url).map_err(|_| NetError::InvalidUrl {
        url: request.url.clone(),
    })?;

    let proxy = request
        .proxy
        .as_deref()
        .or(state.proxy.as_deref())
        .map(ProxyConfig::parse)
        .transpose()?;

    let profile_id = request
        .browser
        .as_deref()
        .or(state.browser.as_deref())
        .unwrap_or(DEFAULT_PROFILE);
    let mut headers = merge_headers(profile_id, request.disable_default_headers, &request.headers)?;

    let mut method = Method::from_bytes(request.method.as_bytes()).map_err(|_| {
        NetError::UnsupportedMethod {
            method: request.method.clone(),
        }
    })?;
    let mut body = request.body;

    for hop in 0..=MAX_REDIRECTS {
        let cookie_header = state.cookie_header(&url);
        let response = send_once(
            &url,
            &method,
            &headers,
            body.clone(),
            proxy.as_ref(),
            cookie_header,
        )
        .await?;

        let status = response.status();
        let set_cookies = state.store_cookies(
            &url,
            response
                .headers()
                .get_all(header::SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok()),
        );

        let location = status
            .is_redirection()
            .then(|| response.headers().get(header::LOCATION))
            .flatten()
            .and_then(|v| v.to_str().ok());

        if let Some(location) = location {
            if hop == MAX_REDIRECTS {
                return Err(NetError::TooManyRedirects);
            }
            let next = url.join(location).map_err(|_| NetError::InvalidResponse {
                reason: format!("bad redirect location: {location}"),
            })?;

            if status == StatusCode::SEE_OTHER
                || (method == Method::POST
                    && matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND))
            {
                method = Method::GET;
                body = None;
            }

            if next.origin() != url.origin() {
                strip_credentials(&mut headers);
            }

            tracing::debug!(status = %status, from = %url, to = %next, "following redirect");
            url = next;
            continue;
        }

        let headers = collect_headers(response.headers());
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| NetError::InvalidResponse {
                reason: e.to_string(),
            })?
            .to_bytes();

        return Ok(NativeResponse {
            status: status.as_u16(),
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
            cookies: set_cookies,
            url: url.to_string(),
        });
    }

    Err(NetError::TooManyRedirects)
}

/// Caller credentials never follow a redirect to another origin.
/// Jar cookies are unaffected; they are matched per hop.
fn strip_credentials(headers: &mut Headers) {
    for name in ["authorization", "cookie", "proxy-authorization"] {
        if headers.delete(name) {
            tracing::debug!(header = name, "dropping header on cross-origin redirect");
        }
    }
}

/// Profile defaults first, caller headers overriding them case-insensitively.
fn merge_headers(
    profile_id: &str,
    disable_defaults: bool,
    caller: &[(String, String)],
) -> Result<Headers, NetError> {
    let mut merged = Headers::new();
    if !disable_defaults {
        if let Some(profile) = Profile::find(profile_id) {
            for (name, value) in profile.default_headers() {
                merged.append(name, &value)?;
            }
        }
    }
    for (name, value) in caller {
        merged.set(name, value)?;
    }
    Ok(merged)
}

async fn send_once(
    url: &Url,
    method: &Method,
    headers: &Headers,
    body: Option<String>,
    proxy: Option<&ProxyConfig>,
    cookie_header: Option<String>,
) -> Result<Response<Incoming>, NetError> {
    let connection = connect::connect(url, proxy).await?;
    let io = TokioIo::new(connection.socket);

    let (mut sender, conn) = http1::handshake::<_, Full<Bytes>>(io)
        .await
        .map_err(|e| NetError::InvalidResponse {
            reason: e.to_string(),
        })?;

    tokio::spawn(async move {
        if let Err(e) = conn.await {
            tracing::debug!(error = %e, "connection driver exited");
        }
    });

    let target = if connection.absolute_form {
        url.as_str().to_string()
    } else {
        match url.query() {
            Some(q) => format!("{}?{}", url.path(), q),
            None => url.path().to_string(),
        }
    };

    let mut builder = Request::builder().method(method.clone()).uri(target);
    if !headers.has("host") {
        builder = builder.header(header::HOST, host_header(url));
    }
    // The jar's cookies are merged into a single `Cookie` line after the caller's.
    for (name, value) in headers.iter() {
        if cookie_header.is_some() && name.eq_ignore_ascii_case("cookie") {
            continue;
        }
        builder = builder.header(name, value);
    }
    if let Some(jar) = cookie_header {
        let value = match headers.get("cookie") {
            Some(existing) => format!("{existing}; {jar}"),
            None => jar,
        };
        builder = builder.header(header::COOKIE, value);
    }
    if connection.absolute_form {
        if let Some(auth) = proxy.and_then(ProxyConfig::auth_header) {
            builder = builder.header(header::PROXY_AUTHORIZATION, auth);
        }
    }

    let request = builder
        .body(Full::new(Bytes::from(body.unwrap_or_default())))
        .map_err(|e| NetError::InvalidResponse {
            reason: e.to_string(),
        })?;

    tracing::debug!(method = %method, url = %url, "sending request");
    sender
        .send_request(request)
        .await
        .map_err(|e| NetError::InvalidResponse {
            reason: e.to_string(),
        })
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Flatten a header map, joining repeated names with `", "`.
fn collect_headers(map: &http::HeaderMap) -> HashMap<String, String> {
    let mut out: HashMap<String, String> = HashMap::with_capacity(map.keys_len());
    for (name, value) in map {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        out.entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    out
}
