/// Errors surfaced by the session and API-access layer.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The OAuth provider redirected back with an `error` parameter.
    #[error("OAuth authorization denied: {error}")]
    OAuthDenied {
        error: String,
        description: Option<String>,
    },

    /// The code exchange request failed (transport error or non-2xx).
    #[error("Code exchange failed: {detail}")]
    ExchangeFailed { status: Option<u16>, detail: String },

    /// The code exchange succeeded but carried no access token.
    #[error("Code exchange response contained no access token")]
    MalformedExchangeResponse,

    /// No token is held, or the backend rejected the token.
    #[error("Not authenticated")]
    Unauthenticated { status: Option<u16> },

    /// Any other failed backend call. `detail` is safe to display.
    #[error("{operation} failed: {detail}")]
    Api {
        operation: &'static str,
        status: Option<u16>,
        detail: String,
    },

    /// An access token must be a non-empty string.
    #[error("Access token must not be empty")]
    InvalidToken,

    /// Persistent session storage could not be written.
    #[error("Session storage error: {0}")]
    Storage(String),

    /// Missing or invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether a view should drop the session and send the user back to sign in.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated { .. })
    }

    /// HTTP status attached to the failure, if the backend answered at all.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ExchangeFailed { status, .. }
            | Self::Unauthenticated { status }
            | Self::Api { status, .. } => *status,
            _ => None,
        }
    }

    /// Human-readable message for a view's inline error state.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Api { detail, .. } | Self::ExchangeFailed { detail, .. } => detail.clone(),
            Self::Unauthenticated { .. } => "Your session has ended. Please sign in again.".into(),
            other => other.to_string(),
        }
    }
}
