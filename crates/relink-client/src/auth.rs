//! Opaque authentication material
//!
//! The pipeline core only requires an already-authenticated client; this
//! context carries the raw material the HTTP layer needs and nothing else
//! ever inspects it. Credential acquisition (environment, env files) is the
//! CLI's concern - platform-specific credential discovery does not belong
//! in this repository at all.

use std::fmt;

/// API key plus optional session cookie for the hosting platform
///
/// The `Debug` impl redacts both values so the context can appear in logs
/// and error chains without leaking secrets.
#[derive(Clone)]
pub struct AuthContext {
    api_key: String,
    session_cookie: Option<String>,
}

impl AuthContext {
    /// Create a context from an API key
    #[inline]
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            session_cookie: None,
        }
    }

    /// Attach a session cookie value
    #[inline]
    #[must_use]
    pub fn with_session_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.session_cookie = Some(cookie.into());
        self
    }

    /// The API key, for the publish endpoint
    #[inline]
    #[must_use]
    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The session cookie value, if any
    #[inline]
    #[must_use]
    pub(crate) fn session_cookie(&self) -> Option<&str> {
        self.session_cookie.as_deref()
    }
}

impl fmt::Debug for AuthContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthContext")
            .field("api_key", &"<redacted>")
            .field(
                "session_cookie",
                &self.session_cookie.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}
