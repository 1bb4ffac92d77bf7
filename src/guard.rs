use std::future::Future;
use std::sync::Arc;

use crate::error::Error;
use crate::session::SessionStore;
use crate::types::{AccessToken, Route};

/// Result of checking the session on entry to a protected view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// A session exists; the view may render and fetch data.
    Allow(AccessToken),
    /// No session; go to the entry point without rendering anything.
    Redirect(Route),
}

/// What a protected view should do after [`RouteGuard::enter`].
#[derive(Debug)]
pub enum ViewOutcome<T> {
    Render(T),
    Redirect(Route),
    /// The data fetch failed but the session is still good; show the
    /// view's inline error state.
    Failed(Error),
}

/// Gate for protected views.
///
/// Only checks that a token is present. An expired or revoked token is
/// detected by the API layer and handled through [`recover`](Self::recover).
#[derive(Debug, Clone)]
pub struct RouteGuard {
    session: Arc<SessionStore>,
    entry_route: Route,
}

impl RouteGuard {
    #[must_use]
    pub fn new(session: Arc<SessionStore>, entry_route: impl Into<Route>) -> Self {
        Self {
            session,
            entry_route: entry_route.into(),
        }
    }

    #[must_use]
    pub fn check(&self) -> GuardDecision {
        match self.session.current() {
            Some(token) => GuardDecision::Allow(token),
            None => {
                tracing::debug!(to = %self.entry_route, "No session, redirecting");
                GuardDecision::Redirect(self.entry_route.clone())
            }
        }
    }

    /// Run a protected view's data fetch behind the guard.
    ///
    /// `fetch` is never invoked without a session. A fetch failing with
    /// [`Error::Unauthenticated`] clears the session it was given and
    /// redirects; any other failure is handed back for inline display.
    pub async fn enter<T, F, Fut>(&self, fetch: F) -> ViewOutcome<T>
    where
        F: FnOnce(AccessToken) -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let token = match self.check() {
            GuardDecision::Allow(token) => token,
            GuardDecision::Redirect(route) => return ViewOutcome::Redirect(route),
        };

        match fetch(token.clone()).await {
            Ok(data) => ViewOutcome::Render(data),
            Err(e) => match self.recover(&e, &token) {
                Some(route) => ViewOutcome::Redirect(route),
                None => {
                    tracing::warn!(error = %e, "Protected view failed to load");
                    ViewOutcome::Failed(e)
                }
            },
        }
    }

    /// Recovery policy for an error raised inside a protected view.
    ///
    /// `rejected` is the token the failing request was sent with. Returns the
    /// route to redirect to when the error means the session is gone; `None`
    /// means keep the session and show the error inline. A session replaced
    /// by a newer sign-in while the request was in flight is kept.
    pub fn recover(&self, error: &Error, rejected: &AccessToken) -> Option<Route> {
        if !error.is_unauthenticated() {
            return None;
        }
        if self.session.clear_if(rejected) {
            tracing::info!("Session rejected by backend, signing out");
        } else if self.session.is_authenticated() {
            tracing::debug!("Rejected token already replaced, keeping session");
            return None;
        }
        Some(self.entry_route.clone())
    }

    /// Drop the session and return the entry point.
    pub fn sign_out(&self) -> Route {
        self.session.clear();
        tracing::info!("Signed out");
        self.entry_route.clone()
    }
}
