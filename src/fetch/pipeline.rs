//! Request dispatch: validate, resolve the session, call the engine, wrap
//! the result, and release ephemeral state.

use super::abort::AbortWatch;
use super::init::{RedirectMode, RequestInit};
use crate::base::loadstate::LoadState;
use crate::base::neterror::NetError;
use crate::client::Client;
use crate::engine::{Engine, EngineRequest};
use crate::http::{RequestBody, Response};
use crate::session::{resolve_session, SessionContext};
use std::sync::Arc;
use url::Url;

const SUPPORTED_METHODS: &[&str] = &["GET", "POST", "PUT", "DELETE", "PATCH", "HEAD"];

/// Tracks and logs a dispatch's [`LoadState`].
struct Progress {
    url: String,
    state: LoadState,
}

impl Progress {
    fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            state: LoadState::Idle,
        }
    }

    fn enter(&mut self, next: LoadState) {
        tracing::trace!(url = %self.url, from = ?self.state, to = ?next, "fetch state");
        self.state = next;
    }

    fn finish(&mut self, result: &Result<Response, NetError>) {
        let next = match result {
            Ok(_) => LoadState::Succeeded,
            Err(e) if e.is_cancellation() => LoadState::Cancelled,
            Err(e) => {
                tracing::debug!(url = %self.url, state = ?self.state, error = %e, "fetch failed");
                LoadState::Failed
            }
        };
        self.enter(next);
    }
}

/// Drops a fabricated ephemeral session exactly once.
///
/// Normally released with [`release`](EphemeralCleanup::release) after the
/// engine call settles. If the dispatch future is dropped first, the drop is
/// spawned onto the current runtime instead.
struct EphemeralCleanup {
    engine: Arc<dyn Engine>,
    session_id: Option<String>,
}

impl EphemeralCleanup {
    fn new(engine: Arc<dyn Engine>, ctx: &SessionContext) -> Self {
        Self {
            engine,
            session_id: ctx.drop_after_request.then(|| ctx.session_id.clone()),
        }
    }

    async fn release(mut self) {
        if let Some(id) = self.session_id.take() {
            if let Err(e) = self.engine.drop_session_state(&id).await {
                tracing::debug!(session = %id, error = %e, "ephemeral session cleanup failed");
            }
        }
    }
}

impl Drop for EphemeralCleanup {
    fn drop(&mut self) {
        let Some(id) = self.session_id.take() else {
            return;
        };
        let cleanup = self.engine.drop_session_state(&id);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = cleanup.await {
                        tracing::debug!(session = %id, error = %e, "ephemeral session cleanup failed");
                    }
                });
            }
            Err(_) => tracing::debug!(session = %id, "no runtime for ephemeral session cleanup"),
        }
    }
}

/// Run one fetch through `client`.
pub(crate) async fn dispatch(
    client: &Client,
    input: &str,
    init: RequestInit,
) -> Result<Response, NetError> {
    let mut progress = Progress::new(input);
    let result = run(client, input, init, &mut progress).await;
    progress.finish(&result);
    result
}

async fn run(
    client: &Client,
    input: &str,
    mut init: RequestInit,
    progress: &mut Progress,
) -> Result<Response, NetError> {
    progress.enter(LoadState::Validating);

    let url = parse_url(input)?;
    if let Some(mode) = init.redirect {
        if mode != RedirectMode::Follow {
            return Err(NetError::UnsupportedRedirect { mode });
        }
    }

    // Session requests are checked against the session's own profile later.
    let browser = init
        .browser
        .clone()
        .or_else(|| init.session.is_none().then(|| client.default_browser()).flatten());
    if let Some(browser) = &browser {
        client.validate_profile(browser).await?;
    }

    let headers = std::mem::take(&mut init.headers).into_headers()?;
    let method = normalize_method(init.method.as_deref())?;
    let body = serialize_body(&method, std::mem::take(&mut init.body))?;

    let watch = AbortWatch::attach(init.signal.as_ref())?;

    progress.enter(LoadState::ResolvingSession);
    if let Some(session) = init.session.clone() {
        session.stamp(&mut init)?;
    }
    let ctx = resolve_session(
        init.session.as_ref(),
        init.session_id.as_deref(),
        init.cookie_mode,
    )?;
    let cleanup = EphemeralCleanup::new(Arc::clone(client.engine()), &ctx);

    progress.enter(LoadState::CallingEngine);
    let request = EngineRequest {
        url: url.clone(),
        method,
        headers: headers.to_pairs(),
        body,
        proxy: init.proxy.or_else(|| client.default_proxy()),
        timeout_ms: init
            .timeout
            .or_else(|| client.default_timeout())
            .map(|t| t.as_millis() as u64),
        browser: init.browser.or(browser),
        disable_default_headers: init.disable_default_headers,
        session_id: ctx.session_id.clone(),
        ephemeral: ctx.drop_after_request,
    };

    // Spawned so an abort can detach the in-flight call without cancelling it.
    let call = tokio::spawn(client.engine().perform_request(request));
    let outcome = watch
        .race(async {
            match call.await {
                Ok(result) => result.map_err(NetError::from_engine),
                Err(e) => Err(NetError::engine(e.to_string())),
            }
        })
        .await;

    let response = outcome.map(|payload| Response::from_native(payload, &url));
    cleanup.release().await;
    response
}

fn parse_url(input: &str) -> Result<String, NetError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(NetError::EmptyUrl);
    }
    Url::parse(trimmed)
        .map(String::from)
        .map_err(|_| NetError::InvalidUrl {
            url: input.to_string(),
        })
}

fn normalize_method(method: Option<&str>) -> Result<String, NetError> {
    let method = method.map(str::trim).filter(|m| !m.is_empty()).unwrap_or("GET");
    let upper = method.to_ascii_uppercase();
    if !SUPPORTED_METHODS.contains(&upper.as_str()) {
        return Err(NetError::UnsupportedMethod {
            method: method.to_string(),
        });
    }
    Ok(upper)
}

fn serialize_body(method: &str, body: RequestBody) -> Result<Option<String>, NetError> {
    let has_body = !body.is_empty();
    let text = body.into_text()?;
    if has_body && matches!(method, "GET" | "HEAD") {
        return Err(NetError::BodyNotAllowed {
            method: method.to_string(),
        });
    }
    Ok(text)
}
