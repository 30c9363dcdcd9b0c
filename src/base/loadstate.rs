/// The current state of a dispatched request.
///
/// Transitions strictly follow
/// `Validating -> ResolvingSession -> CallingEngine -> {Succeeded | Failed | Cancelled}`;
/// a request that fails validation goes straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadState {
    /// Not started.
    #[default]
    Idle,

    /// Checking URL, redirect mode, profile, method, headers and body.
    Validating,

    /// Deciding the cookie scope and session id.
    ResolvingSession,

    /// Waiting on the engine (raced against the abort signal).
    CallingEngine,

    /// The engine returned a response.
    Succeeded,

    /// Validation, session resolution or the engine call failed.
    Failed,

    /// The abort signal fired first.
    Cancelled,
}

impl LoadState {
    /// Whether the request has settled.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LoadState::Succeeded | LoadState::Failed | LoadState::Cancelled
        )
    }
}
