//! NativeEngine tests against a local HTTP/1.1 server.

use fetchkit::{Client, NativeEngine, NetError, RequestInit, SessionOptions};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Minimal server. One request per connection, answered by path.
async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                return;
            };
            tokio::spawn(handle(stream));
        }
    });
    addr
}

async fn handle(mut stream: TcpStream) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
        }
    }
    let head_end = buf.windows(4).position(|w| w == b"\r\n\r\n").unwrap_or(0) + 4;
    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();

    // Drain the body so closing the socket does not reset it.
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())
                .flatten()
        })
        .unwrap_or(0);
    let mut received = buf.len() - head_end;
    while received < content_length {
        match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => received += n,
        }
    }

    let path = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .unwrap_or("/")
        .to_string();
    let cookie = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("cookie")
                .then(|| value.trim().to_string())
        })
        .unwrap_or_default();

    let response = match path.as_str() {
        "/set" => respond(200, &["Set-Cookie: sid=abc; Path=/"], "set"),
        "/cookies" => respond(200, &[], &cookie),
        "/redirect" => respond(
            302,
            &["Location: /cookies", "Set-Cookie: hop=1; Path=/"],
            "",
        ),
        "/loop" => respond(302, &["Location: /loop"], ""),
        "/to-head" => respond(302, &["Location: /head"], ""),
        away if away.starts_with("/away/") => {
            let location = format!("Location: http://127.0.0.1:{}/head", &away["/away/".len()..]);
            respond(302, &[location.as_str()], "")
        }
        "/see-other" => respond(303, &["Location: /method"], ""),
        "/method" => respond(200, &[], head.split_whitespace().next().unwrap_or("")),
        "/head" => respond(200, &[], &head),
        "/slow" => {
            tokio::time::sleep(Duration::from_secs(5)).await;
            respond(200, &[], "late")
        }
        _ => respond(404, &[], "not found"),
    };
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

fn respond(status: u16, headers: &[&str], body: &str) -> String {
    let reason = match status {
        200 => "OK",
        302 => "Found",
        303 => "See Other",
        _ => "Not Found",
    };
    let mut out = format!("HTTP/1.1 {status} {reason}\r\n");
    for header in headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    ));
    out
}

fn setup() -> (NativeEngine, Client) {
    let engine = NativeEngine::new();
    let client = Client::with_engine(engine.clone());
    (engine, client)
}

#[tokio::test]
async fn test_plain_get() {
    let addr = start_server().await;
    let (engine, client) = setup();

    let resp = client
        .fetch(&format!("http://{addr}/cookies"), RequestInit::new())
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!resp.redirected());
    assert_eq!(resp.headers().get("content-length").as_deref(), Some("0"));
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn test_profile_headers_sent() {
    let addr = start_server().await;
    let (_engine, client) = setup();

    let resp = client
        .fetch(
            &format!("http://{addr}/head"),
            RequestInit::new().browser("chrome_142").header("X-Trace", "t-1"),
        )
        .await
        .unwrap();
    let head = resp.text().await.unwrap().to_ascii_lowercase();

    assert!(head.contains("user-agent: mozilla/5.0"));
    assert!(head.contains("chrome/142"));
    assert!(head.contains("sec-ch-ua:"));
    assert!(head.contains("x-trace: t-1"));
    assert!(head.contains(&format!("host: {addr}")));
}

#[tokio::test]
async fn test_disable_default_headers() {
    let addr = start_server().await;
    let (_engine, client) = setup();

    let resp = client
        .fetch(
            &format!("http://{addr}/head"),
            RequestInit::new().disable_default_headers(true),
        )
        .await
        .unwrap();
    let head = resp.text().await.unwrap().to_ascii_lowercase();
    assert!(!head.contains("user-agent:"));
    assert!(!head.contains("sec-ch-ua"));
}

#[tokio::test]
async fn test_redirect_followed_with_cookie() {
    let addr = start_server().await;
    let (_engine, client) = setup();

    let resp = client
        .fetch(&format!("http://{addr}/redirect"), RequestInit::new())
        .await
        .unwrap();

    assert!(resp.redirected());
    assert_eq!(resp.url(), format!("http://{addr}/cookies"));
    // The cookie set on the first hop is sent on the second.
    assert_eq!(resp.text().await.unwrap(), "hop=1");
}

#[tokio::test]
async fn test_see_other_switches_to_get() {
    let addr = start_server().await;
    let (_engine, client) = setup();

    let resp = client
        .fetch(
            &format!("http://{addr}/see-other"),
            RequestInit::new().method("POST").body("data"),
        )
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "GET");
}

#[tokio::test]
async fn test_redirect_loop_fails() {
    let addr = start_server().await;
    let (engine, client) = setup();

    let err = client
        .fetch(&format!("http://{addr}/loop"), RequestInit::new())
        .await
        .unwrap_err();
    assert_eq!(err, NetError::TooManyRedirects);
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn test_session_keeps_cookies() {
    let addr = start_server().await;
    let (engine, client) = setup();
    let session = client.create_session(SessionOptions::new()).await.unwrap();

    let resp = session
        .fetch(&format!("http://{addr}/set"), RequestInit::new())
        .await
        .unwrap();
    assert_eq!(resp.cookies().get("sid").map(String::as_str), Some("abc"));
    assert_eq!(engine.cookie_count(session.id()), Some(1));

    let resp = session
        .fetch(&format!("http://{addr}/cookies"), RequestInit::new())
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "sid=abc");

    session.clear_cookies().await.unwrap();
    let resp = session
        .fetch(&format!("http://{addr}/cookies"), RequestInit::new())
        .await
        .unwrap();
    assert_eq!(resp.text().await.unwrap(), "");

    session.close().await.unwrap();
    assert_eq!(engine.cookie_count(session.id()), None);
}

#[tokio::test]
async fn test_ephemeral_requests_are_isolated() {
    let addr = start_server().await;
    let (engine, client) = setup();

    client
        .fetch(&format!("http://{addr}/set"), RequestInit::new())
        .await
        .unwrap();
    let resp = client
        .fetch(&format!("http://{addr}/cookies"), RequestInit::new())
        .await
        .unwrap();

    assert_eq!(resp.text().await.unwrap(), "");
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn test_shared_session_id_keeps_cookies() {
    let addr = start_server().await;
    let (engine, client) = setup();

    client
        .fetch(
            &format!("http://{addr}/set"),
            RequestInit::new().session_id("shared"),
        )
        .await
        .unwrap();
    let resp = client
        .fetch(
            &format!("http://{addr}/cookies"),
            RequestInit::new().session_id("shared"),
        )
        .await
        .unwrap();

    assert_eq!(resp.text().await.unwrap(), "sid=abc");
    assert_eq!(engine.session_count(), 1);
}

#[tokio::test]
async fn test_timeout() {
    let addr = start_server().await;
    let (engine, client) = setup();

    let err = client
        .fetch(
            &format!("http://{addr}/slow"),
            RequestInit::new().timeout(Duration::from_millis(100)),
        )
        .await
        .unwrap_err();
    assert_eq!(err, NetError::TimedOut { timeout_ms: 100 });
    assert_eq!(engine.session_count(), 0);
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let (_engine, client) = setup();

    let err = client
        .fetch(&format!("http://{addr}/"), RequestInit::new())
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::ConnectionFailed { .. }));
}

fn header_lines<'a>(head: &'a str, name: &str) -> Vec<&'a str> {
    head.lines()
        .filter(|line| {
            line.split_once(':')
                .is_some_and(|(n, _)| n.trim().eq_ignore_ascii_case(name))
        })
        .collect()
}

#[tokio::test]
async fn test_caller_cookie_merged_with_jar() {
    let addr = start_server().await;
    let (_engine, client) = setup();
    let session = client.create_session(SessionOptions::new()).await.unwrap();

    session
        .fetch(&format!("http://{addr}/set"), RequestInit::new())
        .await
        .unwrap();
    let resp = session
        .fetch(
            &format!("http://{addr}/head"),
            RequestInit::new().header("Cookie", "mine=1"),
        )
        .await
        .unwrap();
    let head = resp.text().await.unwrap();

    let cookies = header_lines(&head, "cookie");
    assert_eq!(cookies.len(), 1, "{head}");
    assert!(cookies[0].ends_with("mine=1; sid=abc"));
    session.close().await.unwrap();
}

#[tokio::test]
async fn test_cross_origin_redirect_drops_credentials() {
    let addr = start_server().await;
    let other = start_server().await;
    let (_engine, client) = setup();

    let resp = client
        .fetch(
            &format!("http://{addr}/away/{}", other.port()),
            RequestInit::new()
                .header("Authorization", "Bearer secret")
                .header("Cookie", "mine=1")
                .header("X-Trace", "t-1"),
        )
        .await
        .unwrap();
    assert!(resp.redirected());
    assert_eq!(resp.url(), format!("http://127.0.0.1:{}/head", other.port()));
    let head = resp.text().await.unwrap();

    assert!(header_lines(&head, "authorization").is_empty(), "{head}");
    assert!(header_lines(&head, "cookie").is_empty(), "{head}");
    assert_eq!(header_lines(&head, "x-trace").len(), 1);
}

#[tokio::test]
async fn test_same_origin_redirect_keeps_credentials() {
    let addr = start_server().await;
    let (_engine, client) = setup();

    let resp = client
        .fetch(
            &format!("http://{addr}/to-head"),
            RequestInit::new().header("Authorization", "Bearer secret"),
        )
        .await
        .unwrap();
    let head = resp.text().await.unwrap();
    assert_eq!(header_lines(&head, "authorization").len(), 1, "{head}");
}
