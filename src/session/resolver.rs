//! Picks the engine session a request runs in.

use super::Session;
use crate::base::neterror::NetError;
use std::fmt;

/// Cookie persistence for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CookieMode {
    /// Cookies persist in a caller-provided session.
    Session,
    /// Cookies live only for this request, in a fabricated session.
    Ephemeral,
}

impl fmt::Display for CookieMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CookieMode::Session => "session",
            CookieMode::Ephemeral => "ephemeral",
        })
    }
}

/// Result of session resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub session_id: String,
    pub cookie_mode: CookieMode,
    /// The session was fabricated for this request and must be dropped after it.
    pub drop_after_request: bool,
}

impl SessionContext {
    fn persistent(session_id: String) -> Self {
        Self {
            session_id,
            cookie_mode: CookieMode::Session,
            drop_after_request: false,
        }
    }

    fn ephemeral() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            cookie_mode: CookieMode::Ephemeral,
            drop_after_request: true,
        }
    }
}

/// Resolve the session for one request.
///
/// Rules, first match wins:
/// 1. `session` and `session_id` together conflict.
/// 2. A `session` is used unless it is closed.
/// 3. A non-empty `session_id` is used unless the mode is ephemeral.
/// 4. Session mode with neither conflicts.
/// 5. Otherwise a fresh ephemeral id is fabricated.
pub fn resolve_session(
    session: Option<&Session>,
    session_id: Option<&str>,
    cookie_mode: Option<CookieMode>,
) -> Result<SessionContext, NetError> {
    if session.is_some() && session_id.is_some() {
        return Err(NetError::SessionAndSessionId);
    }

    if let Some(session) = session {
        session.ensure_open()?;
        return Ok(SessionContext::persistent(session.id().to_string()));
    }

    if let Some(id) = session_id {
        let id = id.trim();
        if id.is_empty() {
            return Err(NetError::EmptySessionId);
        }
        if cookie_mode == Some(CookieMode::Ephemeral) {
            return Err(NetError::EphemeralWithSessionId);
        }
        return Ok(SessionContext::persistent(id.to_string()));
    }

    if cookie_mode == Some(CookieMode::Session) {
        return Err(NetError::SessionModeWithoutSession);
    }

    Ok(SessionContext::ephemeral())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_ephemeral() {
        let ctx = resolve_session(None, None, None).unwrap();
        assert_eq!(ctx.cookie_mode, CookieMode::Ephemeral);
        assert!(ctx.drop_after_request);
        assert!(uuid::Uuid::parse_str(&ctx.session_id).is_ok());
    }

    #[test]
    fn test_fresh_ids_differ() {
        let a = resolve_session(None, None, Some(CookieMode::Ephemeral)).unwrap();
        let b = resolve_session(None, None, Some(CookieMode::Ephemeral)).unwrap();
        assert_ne!(a.session_id, b.session_id);
    }

    #[test]
    fn test_session_id_is_persistent() {
        let ctx = resolve_session(None, Some("abc"), None).unwrap();
        assert_eq!(ctx, SessionContext::persistent("abc".to_string()));

        let ctx = resolve_session(None, Some("  abc "), Some(CookieMode::Session)).unwrap();
        assert_eq!(ctx.session_id, "abc");
        assert!(!ctx.drop_after_request);
    }

    #[test]
    fn test_empty_session_id() {
        assert_eq!(
            resolve_session(None, Some("   "), None),
            Err(NetError::EmptySessionId)
        );
    }

    #[test]
    fn test_ephemeral_with_session_id_conflicts() {
        assert_eq!(
            resolve_session(None, Some("abc"), Some(CookieMode::Ephemeral)),
            Err(NetError::EphemeralWithSessionId)
        );
    }

    #[test]
    fn test_session_mode_requires_session() {
        assert_eq!(
            resolve_session(None, None, Some(CookieMode::Session)),
            Err(NetError::SessionModeWithoutSession)
        );
    }

    #[test]
    fn test_cookie_mode_display() {
        assert_eq!(CookieMode::Session.to_string(), "session");
        assert_eq!(CookieMode::Ephemeral.to_string(), "ephemeral");
    }
}
