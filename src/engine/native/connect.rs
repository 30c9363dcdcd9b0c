//! Connection establishment: DNS -> TCP -> (proxy tunnel) -> TLS.

use crate::base::context::IoResultExt;
use crate::base::neterror::NetError;
use boring::ssl::{SslConnector, SslMethod, SslVersion};
use hickory_resolver::config::{LookupIpStrategy, ResolverConfig};
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use once_cell::sync::Lazy;
use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use url::Url;
use zeroize::Zeroizing;

/// Upper bound on a proxy's CONNECT response head.
const MAX_TUNNEL_RESPONSE: usize = 8 * 1024;

/// A connected socket (TCP or TLS over TCP).
#[derive(Debug)]
pub(crate) enum SocketType {
    Tcp(TcpStream),
    Ssl(tokio_boring::SslStream<TcpStream>),
}

impl AsyncRead for SocketType {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for SocketType {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            SocketType::Ssl(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_flush(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            SocketType::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            SocketType::Ssl(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Parsed proxy URL with optional Basic credentials.
#[derive(Clone)]
pub(crate) struct ProxyConfig {
    url: Url,
    username: Option<String>,
    /// Zeroized on drop.
    password: Option<Zeroizing<String>>,
}

impl ProxyConfig {
    /// Accepts `http://[user:pass@]host[:port]` and `https://...`.
    pub(crate) fn parse(raw: &str) -> Result<Self, NetError> {
        let mut url = Url::parse(raw).map_err(|_| NetError::InvalidUrl {
            url: raw.to_string(),
        })?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(NetError::engine(format!(
                    "Unsupported proxy scheme: {other}"
                )))
            }
        }
        url.host_str().ok_or_else(|| NetError::InvalidUrl {
            url: raw.to_string(),
        })?;

        let username = (!url.username().is_empty()).then(|| decode(url.username()));
        let password = url.password().map(|p| Zeroizing::new(decode(p)));
        // Credentials travel in Proxy-Authorization, never in the URL.
        let _ = url.set_username("");
        let _ = url.set_password(None);

        Ok(Self {
            url,
            username,
            password,
        })
    }

    pub(crate) fn host_port(&self) -> (&str, u16) {
        let host = self.url.host_str().unwrap_or_default();
        let port = self.url.port_or_known_default().unwrap_or(80);
        (host, port)
    }

    /// `Proxy-Authorization` header value, if credentials were given.
    pub(crate) fn auth_header(&self) -> Option<String> {
        use base64::{engine::general_purpose, Engine as _};
        let user = self.username.as_deref()?;
        let pass = self.password.as_deref().map(String::as_str).unwrap_or("");
        let creds = Zeroizing::new(format!("{user}:{pass}"));
        Some(format!(
            "Basic {}",
            general_purpose::STANDARD.encode(creds.as_bytes())
        ))
    }
}

impl fmt::Debug for ProxyConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProxyConfig")
            .field("url", &self.url.as_str())
            .field("has_auth", &self.username.is_some())
            .finish()
    }
}

fn decode(component: &str) -> String {
    url::form_urlencoded::parse(format!("x={component}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_default()
}

/// Target host and port of a URL, with the scheme's default port.
pub(crate) fn target(url: &Url) -> Result<(&str, u16), NetError> {
    let invalid = || NetError::InvalidUrl {
        url: url.to_string(),
    };
    let host = url.host_str().ok_or_else(invalid)?;
    let port = url.port_or_known_default().ok_or_else(invalid)?;
    Ok((host, port))
}

/// Process-wide resolver, configured from the system on first use.
static RESOLVER: Lazy<TokioResolver> = Lazy::new(|| {
    let mut builder = match TokioResolver::builder_tokio() {
        Ok(builder) => builder,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read system DNS config, using defaults");
            TokioResolver::builder_with_config(
                ResolverConfig::default(),
                TokioConnectionProvider::default(),
            )
        }
    };
    builder.options_mut().ip_strategy = LookupIpStrategy::Ipv4AndIpv6;
    builder.build()
});

/// Addresses for `host:port`. IP literals skip the resolver.
pub(crate) async fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>, NetError> {
    let bare = host.trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = bare.parse::<IpAddr>() {
        return Ok(vec![SocketAddr::new(ip, port)]);
    }

    tracing::debug!(host = %bare, "resolving via hickory-dns");
    let lookup = RESOLVER
        .lookup_ip(bare)
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::NotFound, e.to_string()))
        .dns_context(host)?;

    let addrs: Vec<SocketAddr> = lookup.iter().map(|ip| SocketAddr::new(ip, port)).collect();
    if addrs.is_empty() {
        return Err(io::Error::new(io::ErrorKind::NotFound, "no addresses returned"))
            .dns_context(host);
    }
    Ok(addrs)
}

/// Resolve `host` and connect to the first address that accepts.
pub(crate) async fn connect_tcp(host: &str, port: u16) -> Result<TcpStream, NetError> {
    let addrs = resolve(host, port).await?;

    let mut last_err = None;
    for addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                let _ = stream.set_nodelay(true);
                tracing::debug!(host = %host, addr = %addr, "TCP connected");
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no addresses")))
        .connection_context(host, port)
}

/// Connect to `proxy` and ask it to tunnel to `host:port` with HTTP CONNECT.
pub(crate) async fn open_tunnel(
    proxy: &ProxyConfig,
    host: &str,
    port: u16,
) -> Result<TcpStream, NetError> {
    let (proxy_host, proxy_port) = proxy.host_port();
    let mut stream = connect_tcp(proxy_host, proxy_port).await?;

    let authority = format!("{host}:{port}");
    let mut connect_req = format!("CONNECT {authority} HTTP/1.1\r\nHost: {authority}\r\n");
    if let Some(auth) = proxy.auth_header() {
        connect_req.push_str(&format!("Proxy-Authorization: {auth}\r\n"));
    }
    connect_req.push_str("\r\n");

    stream
        .write_all(connect_req.as_bytes())
        .await
        .connection_context(proxy_host, proxy_port)?;

    // Read until the end of the response head; a tunnel has no body.
    let mut head = Vec::with_capacity(256);
    let mut buf = [0u8; 512];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream
            .read(&mut buf)
            .await
            .connection_context(proxy_host, proxy_port)?;
        if n == 0 || head.len() + n > MAX_TUNNEL_RESPONSE {
            return Err(NetError::TunnelConnectionFailed {
                status: "incomplete proxy response".to_string(),
            });
        }
        head.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&head);
    let status_line = head.lines().next().unwrap_or_default();
    let accepted = status_line
        .split_whitespace()
        .nth(1)
        .is_some_and(|code| code == "200");
    if !accepted {
        tracing::debug!(proxy = %proxy_host, status = %status_line, "proxy refused tunnel");
        return Err(NetError::TunnelConnectionFailed {
            status: status_line.to_string(),
        });
    }

    tracing::debug!(proxy = %proxy_host, target = %authority, "tunnel established");
    Ok(stream)
}

/// TLS handshake with BoringSSL, offering only HTTP/1.1 over ALPN.
pub(crate) async fn tls_handshake(
    stream: TcpStream,
    host: &str,
) -> Result<tokio_boring::SslStream<TcpStream>, NetError> {
    let ssl_err = |reason: String| NetError::SslProtocolError { reason };

    let mut builder =
        SslConnector::builder(SslMethod::tls()).map_err(|e| ssl_err(e.to_string()))?;
    builder
        .set_min_proto_version(Some(SslVersion::TLS1_2))
        .map_err(|e| ssl_err(e.to_string()))?;
    builder
        .set_alpn_protos(b"\x08http/1.1")
        .map_err(|e| ssl_err(e.to_string()))?;

    let connector = builder.build();
    let mut config = connector.configure().map_err(|e| ssl_err(e.to_string()))?;
    // RFC 6066: no SNI for IP literals.
    config.set_use_server_name_indication(should_set_sni(host));

    tokio_boring::connect(config, host, stream)
        .await
        .map_err(|e| {
            tracing::debug!(host = %host, error = %e, "TLS handshake failed");
            ssl_err(e.to_string())
        })
}

fn should_set_sni(host: &str) -> bool {
    host.trim_matches(|c| c == '[' || c == ']')
        .parse::<std::net::IpAddr>()
        .is_err()
}

/// How a request reaches its origin.
pub(crate) struct Connection {
    pub(crate) socket: SocketType,
    /// Request-target must be absolute-form (plain HTTP through a forward proxy).
    pub(crate) absolute_form: bool,
}

/// Open a ready-to-use connection for `url`.
///
/// HTTPS through a proxy is tunnelled with CONNECT; plain HTTP through a
/// proxy is forwarded with an absolute-form request-target.
pub(crate) async fn connect(url: &Url, proxy: Option<&ProxyConfig>) -> Result<Connection, NetError> {
    let (host, port) = target(url)?;
    let secure = url.scheme() == "https";

    match (proxy, secure) {
        (Some(proxy), true) => {
            let tunnel = open_tunnel(proxy, host, port).await?;
            let tls = tls_handshake(tunnel, host).await?;
            Ok(Connection {
                socket: SocketType::Ssl(tls),
                absolute_form: false,
            })
        }
        (Some(proxy), false) => {
            let (proxy_host, proxy_port) = proxy.host_port();
            let stream = connect_tcp(proxy_host, proxy_port).await?;
            Ok(Connection {
                socket: SocketType::Tcp(stream),
                absolute_form: true,
            })
        }
        (None, true) => {
            let stream = connect_tcp(host, port).await?;
            let tls = tls_handshake(stream, host).await?;
            Ok(Connection {
                socket: SocketType::Ssl(tls),
                absolute_form: false,
            })
        }
        (None, false) => {
            let stream = connect_tcp(host, port).await?;
            Ok(Connection {
                socket: SocketType::Tcp(stream),
                absolute_form: false,
            })
        }
    }
}

/// Plain TCP stream to the origin, tunnelled through `proxy` if given.
///
/// Used for WebSocket, where the TLS layer belongs to the WebSocket client.
pub(crate) async fn connect_raw(url: &Url, proxy: Option<&ProxyConfig>) -> Result<TcpStream, NetError> {
    let (host, port) = target(url)?;
    match proxy {
        Some(proxy) => open_tunnel(proxy, host, port).await,
        None => connect_tcp(host, port).await,
    }
}
