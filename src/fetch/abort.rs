//! Request cancellation.
//!
//! An [`AbortController`] hands out [`AbortSignal`]s. Aborting rejects every
//! pending fetch that carries one of its signals with
//! [`NetError::Aborted`], without waiting for the engine.

use crate::base::neterror::NetError;
use once_cell::sync::OnceCell;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Read side of an abort. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AbortSignal {
    token: CancellationToken,
    /// Set once, by the first abort.
    reason: Arc<OnceCell<Option<String>>>,
}

impl AbortSignal {
    /// A signal that is already aborted.
    pub fn aborted(reason: impl Into<String>) -> Self {
        let signal = Self::default();
        signal.abort(Some(reason.into()));
        signal
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Reason given to the first abort, if any.
    pub fn reason(&self) -> Option<String> {
        self.reason.get().cloned().flatten()
    }

    /// Wait until aborted.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    fn abort(&self, reason: Option<String>) {
        let _ = self.reason.set(reason);
        self.token.cancel();
    }

    pub(crate) fn to_error(&self) -> NetError {
        NetError::Aborted {
            reason: self.reason(),
        }
    }
}

/// Write side of an abort.
///
/// # Example
/// ```ignore
/// let controller = AbortController::new();
/// let request = client.fetch(url, RequestInit::new().signal(controller.signal()));
/// controller.abort_with("user navigated away");
/// assert!(request.await.unwrap_err().is_cancellation());
/// ```
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    signal: AbortSignal,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        self.signal.clone()
    }

    /// Abort without a reason. Later calls have no effect.
    pub fn abort(&self) {
        self.signal.abort(None);
    }

    /// Abort with a reason. Only the first abort's reason is kept.
    pub fn abort_with(&self, reason: impl Into<String>) {
        self.signal.abort(Some(reason.into()));
    }
}

/// Races a pending operation against an optional signal.
#[derive(Debug)]
pub struct AbortWatch {
    signal: Option<AbortSignal>,
}

impl AbortWatch {
    /// Start watching. Fails at once if the signal already fired.
    pub fn attach(signal: Option<&AbortSignal>) -> Result<Self, NetError> {
        if let Some(signal) = signal {
            if signal.is_aborted() {
                return Err(signal.to_error());
            }
        }
        Ok(Self {
            signal: signal.cloned(),
        })
    }

    /// Settle with whichever finishes first: `fut` or the abort.
    ///
    /// On abort, `fut` is dropped without being polled again.
    pub async fn race<T, F>(&self, fut: F) -> Result<T, NetError>
    where
        F: Future<Output = Result<T, NetError>>,
    {
        let Some(signal) = &self.signal else {
            return fut.await;
        };
        tokio::select! {
            biased;
            _ = signal.cancelled() => {
                tracing::debug!(reason = ?signal.reason(), "request aborted");
                Err(signal.to_error())
            }
            result = fut => result,
        }
    }
}
