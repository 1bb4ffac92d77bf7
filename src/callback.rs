use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::ApiClient;
use crate::error::Error;
use crate::session::SessionStore;
use crate::types::Route;

/// Query parameters of the OAuth redirect landing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

impl CallbackParams {
    #[must_use]
    pub fn with_code(code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_error(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Parse a raw query string (`code=...&state=...`). Unknown keys are ignored.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::default();
        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let value = Some(value.into_owned()).filter(|v| !v.is_empty());
            match key.as_ref() {
                "code" => params.code = value,
                "error" => params.error = value,
                "error_description" => params.error_description = value,
                _ => {}
            }
        }
        params
    }

    /// Parse the parameters from the full redirect URL.
    #[must_use]
    pub fn from_url(url: &Url) -> Self {
        Self::from_query(url.query().unwrap_or_default())
    }
}

/// Where the callback view goes next.
#[derive(Debug)]
pub enum CallbackOutcome {
    /// Terminal: leave the callback view. `failure` is set on every path that
    /// did not produce a session.
    Navigate { to: Route, failure: Option<Error> },
    /// No `code` or `error` yet; keep showing the loading state.
    Waiting,
    /// This code was already handled by this view.
    Duplicate,
    /// The view went away while the exchange was running. Any token was
    /// still committed, but there is no view left to navigate.
    Detached { failure: Option<Error> },
}

impl CallbackOutcome {
    /// Navigation target, if the view should move.
    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        match self {
            Self::Navigate { to, .. } => Some(to),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&Error> {
        match self {
            Self::Navigate { failure, .. } | Self::Detached { failure } => failure.as_ref(),
            Self::Waiting | Self::Duplicate => None,
        }
    }

    /// Whether this invocation produced a session.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Navigate { failure: None, .. } | Self::Detached { failure: None }
        )
    }
}

/// Turns the OAuth redirect into a session and a navigation decision.
///
/// One handler belongs to one callback view. It remembers the codes it has
/// exchanged so a duplicate event never submits the same code twice.
pub struct AuthCallbackHandler {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
    success_route: Route,
    failure_route: Route,
    handled: Mutex<HashSet<String>>,
}

impl AuthCallbackHandler {
    /// Create a handler using the dashboard and entry routes from the client's config.
    #[must_use]
    pub fn new(client: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        let success_route = client.config().dashboard_route().clone();
        let failure_route = client.config().entry_route().clone();
        Self {
            client,
            session,
            success_route,
            failure_route,
            handled: Mutex::new(HashSet::new()),
        }
    }

    #[must_use]
    pub fn with_success_route(mut self, route: impl Into<Route>) -> Self {
        self.success_route = route.into();
        self
    }

    #[must_use]
    pub fn with_failure_route(mut self, route: impl Into<Route>) -> Self {
        self.failure_route = route.into();
        self
    }

    /// Handle a redirect landing for a view that stays mounted.
    pub async fn handle(&self, params: CallbackParams) -> CallbackOutcome {
        self.handle_with_cancel(params, &CancellationToken::new())
            .await
    }

    /// Handle a redirect landing.
    ///
    /// Cancelling `view` does not abort an exchange already in flight: a
    /// token that arrives is still saved to the process-wide session, and the
    /// outcome becomes [`CallbackOutcome::Detached`].
    pub async fn handle_with_cancel(
        &self,
        params: CallbackParams,
        view: &CancellationToken,
    ) -> CallbackOutcome {
        let outcome = self.run(params).await;
        match outcome {
            CallbackOutcome::Navigate { failure, .. } if view.is_cancelled() => {
                tracing::debug!("Callback view closed before the sign-in finished");
                CallbackOutcome::Detached { failure }
            }
            other => other,
        }
    }

    async fn run(&self, params: CallbackParams) -> CallbackOutcome {
        if let Some(error) = params.error.filter(|e| !e.is_empty()) {
            let description = params.error_description;
            tracing::warn!(
                error = %error,
                description = description.as_deref().unwrap_or("none"),
                "GitHub OAuth error"
            );
            return self.fail(Error::OAuthDenied { error, description });
        }

        let Some(code) = params.code.filter(|c| !c.is_empty()) else {
            return CallbackOutcome::Waiting;
        };

        if !self.mark_handled(&code) {
            tracing::debug!("Authorization code already handled, skipping exchange");
            return CallbackOutcome::Duplicate;
        }

        let token = match self.client.exchange_code(&code).await {
            Ok(token) => token,
            Err(e @ Error::MalformedExchangeResponse) => {
                tracing::error!(error = %e, "No access token was returned from the backend");
                return self.fail(e);
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to exchange authorization code for token");
                return self.fail(e);
            }
        };

        if let Err(e) = self.session.save(token) {
            tracing::error!(error = %e, "Failed to persist session");
            return self.fail(e);
        }

        tracing::info!("GitHub sign-in complete");
        CallbackOutcome::Navigate {
            to: self.success_route.clone(),
            failure: None,
        }
    }

    // Check-and-insert under one lock so concurrent duplicates cannot both win.
    fn mark_handled(&self, code: &str) -> bool {
        self.handled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(code.to_owned())
    }

    fn fail(&self, error: Error) -> CallbackOutcome {
        CallbackOutcome::Navigate {
            to: self.failure_route.clone(),
            failure: Some(error),
        }
    }
}
