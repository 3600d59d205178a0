//! Remote signing session state.
//!
//! A session moves from `Pending` to exactly one terminal state. Browser
//! failures and local outcomes (expiry, cancellation) are both carried as
//! [`SessionFailure`], which the awaiting caller receives verbatim.

use std::fmt;

use base64::Engine;

/// Random bytes behind every nonce (192 bits).
pub const NONCE_BYTES: usize = 24;

/// Single-use session token handed to the browser in the page URL.
#[derive(Clone, PartialEq, Eq)]
pub struct Nonce(String);

impl Nonce {
    /// Fresh URL-safe nonce from the thread RNG.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; NONCE_BYTES];
        rand::fill(&mut bytes);
        Self(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a token supplied by a request.
    #[must_use]
    pub fn matches(&self, candidate: &str) -> bool {
        let expected = self.0.as_bytes();
        let candidate = candidate.as_bytes();
        // the length of a generated nonce is public
        expected.len() == candidate.len() && openssl::memcmp::eq(expected, candidate)
    }
}

impl fmt::Debug for Nonce {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Nonce(len={})", self.0.len())
    }
}

/// Why a remote signing session did not produce a signature.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionFailure {
    #[error("signing session expired before the browser returned a result")]
    SessionExpired,

    #[error("signing session was cancelled")]
    UserCancelled,

    #[error("signing plugin not found in the browser (failed sources: {})", .failed_sources.join(", "))]
    PluginNotFound { failed_sources: Vec<String> },

    #[error("signing plugin is installed but not permitted for this page origin")]
    PluginOriginUnavailable,

    #[error("signing was cancelled in the browser")]
    SigningCancelledByUser,

    #[error("browser reported an error: {0}")]
    Browser(String),
}

/// Error codes a browser page may report with `status: "error"`.
pub mod error_codes {
    pub const PLUGIN_NOT_FOUND: &str = "plugin_not_found";
    pub const PLUGIN_ORIGIN_UNAVAILABLE: &str = "plugin_origin_unavailable";
    pub const CANCELLED_BY_USER: &str = "cancelled_by_user";
}

impl SessionFailure {
    /// Map a browser-reported failure to a session outcome.
    #[must_use]
    pub fn from_browser(
        error_code: Option<&str>,
        message: Option<&str>,
        failed_sources: Vec<String>,
    ) -> Self {
        match error_code {
            Some(error_codes::PLUGIN_NOT_FOUND) => SessionFailure::PluginNotFound { failed_sources },
            Some(error_codes::PLUGIN_ORIGIN_UNAVAILABLE) => SessionFailure::PluginOriginUnavailable,
            Some(error_codes::CANCELLED_BY_USER) => SessionFailure::SigningCancelledByUser,
            _ => SessionFailure::Browser(
                message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or("unspecified error")
                    .to_string(),
            ),
        }
    }
}

/// Lifecycle state of one signing session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Pending,
    /// Signature bytes accepted from the browser, not yet parsed.
    Completed(Vec<u8>),
    Failed(SessionFailure),
    Expired,
}

impl SessionState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionState::Pending)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Completed(_) => "completed",
            SessionState::Failed(_) => "failed",
            SessionState::Expired => "expired",
        }
    }
}

/// Why the endpoint refused a request. Responses stay minimal; details go to
/// the session log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("nonce mismatch")]
    NonceMismatch,

    #[error("session already finished ({0})")]
    SessionReplay(&'static str),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error("request from non-loopback peer {0}")]
    ForeignPeer(String),
}
