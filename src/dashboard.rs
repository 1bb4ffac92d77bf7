use std::sync::Arc;

use crate::callback::AuthCallbackHandler;
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::error::Error;
use crate::guard::RouteGuard;
use crate::repos::RepositoryService;
use crate::session::SessionStore;

/// Wires the session store, API client, guard and repository service
/// around one shared session.
///
/// ```rust,ignore
/// use canary_session::{CallbackParams, ClientConfig, DashboardClient};
///
/// let dashboard = DashboardClient::new(ClientConfig::from_env()?)?;
/// let outcome = dashboard
///     .callback_handler()
///     .handle(CallbackParams::from_url(&redirect_url))
///     .await;
/// ```
#[derive(Debug, Clone)]
pub struct DashboardClient {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
    guard: RouteGuard,
    repositories: RepositoryService,
}

impl DashboardClient {
    /// Open the file-backed session from `config` and build every component on it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let session = SessionStore::open(&config);
        Self::with_session(config, session)
    }

    /// Build on a caller-provided session store (e.g. in-memory for tests).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the HTTP client cannot be built.
    pub fn with_session(config: ClientConfig, session: SessionStore) -> Result<Self, Error> {
        let entry_route = config.entry_route().clone();
        let client = Arc::new(ApiClient::new(config)?);
        let session = Arc::new(session);
        Ok(Self {
            guard: RouteGuard::new(session.clone(), entry_route),
            repositories: RepositoryService::new(client.clone(), session.clone()),
            client,
            session,
        })
    }

    /// A fresh handler for one callback view.
    #[must_use]
    pub fn callback_handler(&self) -> AuthCallbackHandler {
        AuthCallbackHandler::new(self.client.clone(), self.session.clone())
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn guard(&self) -> &RouteGuard {
        &self.guard
    }

    #[must_use]
    pub fn repositories(&self) -> &RepositoryService {
        &self.repositories
    }
}
