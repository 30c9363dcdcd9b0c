//! Per-session cookie jar.
//!
//! Parsing is delegated to the `cookie` crate; matching follows RFC 6265
//! section 5 (host-only vs. domain cookies, path prefix, secure flag).
//! `Domain=` attributes naming a public suffix are refused using Mozilla's
//! Public Suffix List from the `psl` crate.

use cookie::time::{Duration, OffsetDateTime};
use cookie::Cookie;
use psl::{List, Psl};
use std::collections::HashMap;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredCookie {
    name: String,
    value: String,
    domain: String,
    host_only: bool,
    path: String,
    secure: bool,
    expires: Option<OffsetDateTime>,
}

impl StoredCookie {
    fn same_identity(&self, other: &StoredCookie) -> bool {
        self.name == other.name && self.domain == other.domain && self.path == other.path
    }

    fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    fn matches(&self, url: &Url, now: OffsetDateTime) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        let host = host.to_ascii_lowercase();
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(&host, &self.domain)
        };
        domain_ok
            && path_match(url.path(), &self.path)
            && (!self.secure || url.scheme() == "https")
            && !self.is_expired(now)
    }
}

/// Cookies stored for one session.
#[derive(Debug, Default)]
pub(crate) struct CookieStore {
    cookies: Vec<StoredCookie>,
}

impl CookieStore {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Store every `Set-Cookie` value from a response to `url`.
    ///
    /// Returns the name/value pairs this response set (deletions excluded).
    pub(crate) fn store_response_cookies<'a, I>(&mut self, url: &Url, values: I) -> HashMap<String, String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut set = HashMap::new();
        let Some(host) = url.host_str().map(str::to_ascii_lowercase) else {
            return set;
        };
        let now = OffsetDateTime::now_utc();
        self.cookies.retain(|c| !c.is_expired(now));

        for raw in values {
            let parsed = match Cookie::parse(raw.to_string()) {
                Ok(c) => c,
                Err(e) => {
                    tracing::debug!(error = %e, "ignoring malformed Set-Cookie");
                    continue;
                }
            };

            let (domain, host_only) = match parsed.domain() {
                Some(d) if !d.trim_start_matches('.').is_empty() => {
                    let d = d.trim_start_matches('.').to_ascii_lowercase();
                    if !domain_match(&host, &d) {
                        tracing::debug!(host = %host, domain = %d, "rejecting cookie for foreign domain");
                        continue;
                    }
                    if is_public_suffix(&d) {
                        // RFC 6265 5.3 step 5: a suffix equal to the host degrades to host-only.
                        if d != host {
                            tracing::debug!(host = %host, domain = %d, "rejecting cookie for public suffix");
                            continue;
                        }
                        (d, true)
                    } else {
                        (d, false)
                    }
                }
                _ => (host.clone(), true),
            };

            let path = match parsed.path() {
                Some(p) if p.starts_with('/') => p.to_string(),
                _ => default_path(url.path()),
            };

            // Max-Age takes precedence over Expires.
            let expires = match parsed.max_age() {
                Some(age) if age <= Duration::ZERO => Some(OffsetDateTime::UNIX_EPOCH),
                Some(age) => Some(now + age),
                None => parsed.expires_datetime(),
            };

            let cookie = StoredCookie {
                name: parsed.name().to_string(),
                value: parsed.value().to_string(),
                domain,
                host_only,
                path,
                secure: parsed.secure().unwrap_or(false),
                expires,
            };

            self.cookies.retain(|c| !c.same_identity(&cookie));
            if cookie.is_expired(now) {
                continue;
            }
            set.insert(cookie.name.clone(), cookie.value.clone());
            self.cookies.push(cookie);
        }

        set
    }

    /// `Cookie` header value for a request to `url`, if any cookie applies.
    pub(crate) fn header_for(&self, url: &Url) -> Option<String> {
        let now = OffsetDateTime::now_utc();
        let mut matching: Vec<&StoredCookie> =
            self.cookies.iter().filter(|c| c.matches(url, now)).collect();
        if matching.is_empty() {
            return None;
        }
        // Longer paths first; stable sort keeps creation order otherwise.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        Some(
            matching
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub(crate) fn clear(&mut self) {
        self.cookies.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.cookies.len()
    }
}

fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || (host.ends_with(domain)
            && host.as_bytes().get(host.len() - domain.len() - 1) == Some(&b'.')
            && host.parse::<std::net::IpAddr>().is_err())
}

/// True when `domain` is itself a public suffix such as `com` or `co.uk`.
fn is_public_suffix(domain: &str) -> bool {
    let bytes = domain.as_bytes();
    List.suffix(bytes).is_some_and(|suffix| suffix.as_bytes() == bytes)
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/')))
}

fn default_path(request_path: &str) -> String {
    match request_path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => request_path[..i].to_string(),
    }
}
