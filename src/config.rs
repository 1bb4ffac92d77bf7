use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::types::Route;

const DEFAULT_API_URL: &str = "http://localhost:8000";
const DEFAULT_STORAGE_KEY: &str = "canary_token";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Dashboard client configuration.
///
/// The backend base URL is the only required setting. Everything else has a
/// default matching the Compliance Canary backend and can be overridden with
/// the `with_*` methods.
///
/// ```rust,ignore
/// use canary_session::ClientConfig;
///
/// let config = ClientConfig::new("https://api.canary.dev".parse()?)
///     .with_request_timeout(std::time::Duration::from_secs(10))
///     .with_dashboard_route("/dash");
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ClientConfig {
    pub(crate) base_url: Url,
    pub(crate) storage_path: PathBuf,
    pub(crate) storage_key: String,
    pub(crate) request_timeout: Duration,
    pub(crate) unauthenticated_statuses: Vec<u16>,
    pub(crate) entry_route: Route,
    pub(crate) dashboard_route: Route,
    pub(crate) login_path: String,
    pub(crate) exchange_path: String,
    pub(crate) repositories_path: String,
    pub(crate) activate_path: String,
    pub(crate) reports_path: String,
    pub(crate) report_download_path: String,
}

impl ClientConfig {
    /// Create a configuration for the backend at `base_url`.
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            storage_path: default_storage_path(),
            storage_key: DEFAULT_STORAGE_KEY.into(),
            request_timeout: DEFAULT_TIMEOUT,
            unauthenticated_statuses: vec![401, 403],
            entry_route: Route::new("/"),
            dashboard_route: Route::new("/dashboard"),
            login_path: "/auth/github".into(),
            exchange_path: "/auth/callback".into(),
            repositories_path: "/api/user/repositories".into(),
            activate_path: "/repos".into(),
            reports_path: "/reports".into(),
            report_download_path: "/reports/download".into(),
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Optional env vars
    /// - `CANARY_API_URL`: backend base URL (default `http://localhost:8000`)
    /// - `CANARY_STORAGE_PATH`: session storage file
    /// - `CANARY_REQUEST_TIMEOUT_SECS`: per-request timeout in seconds
    /// - `CANARY_UNAUTHENTICATED_STATUSES`: comma-separated HTTP statuses that
    ///   mean "token rejected" (default `401,403`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but cannot be parsed.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let base_url = var("CANARY_API_URL").unwrap_or_else(|| DEFAULT_API_URL.into());
        let base_url: Url = base_url
            .parse()
            .map_err(|e| Error::Config(format!("CANARY_API_URL: {e}")))?;

        let mut config = Self::new(base_url);

        if let Some(path) = var("CANARY_STORAGE_PATH") {
            config = config.with_storage_path(path);
        }
        if let Some(secs) = var("CANARY_REQUEST_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("CANARY_REQUEST_TIMEOUT_SECS: {e}")))?;
            config = config.with_request_timeout(Duration::from_secs(secs));
        }
        if let Some(statuses) = var("CANARY_UNAUTHENTICATED_STATUSES") {
            config = config.with_unauthenticated_statuses(parse_statuses(&statuses)?);
        }

        Ok(config)
    }

    /// Override the session storage file.
    #[must_use]
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Override the storage key the token is kept under (default `canary_token`).
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Override which HTTP statuses mean the backend rejected the token.
    #[must_use]
    pub fn with_unauthenticated_statuses(mut self, statuses: Vec<u16>) -> Self {
        self.unauthenticated_statuses = statuses;
        self
    }

    #[must_use]
    pub fn with_entry_route(mut self, route: impl Into<Route>) -> Self {
        self.entry_route = route.into();
        self
    }

    #[must_use]
    pub fn with_dashboard_route(mut self, route: impl Into<Route>) -> Self {
        self.dashboard_route = route.into();
        self
    }

    /// Override the repository listing path (e.g. the legacy `/repos`).
    #[must_use]
    pub fn with_repositories_path(mut self, path: impl Into<String>) -> Self {
        self.repositories_path = path.into();
        self
    }

    #[must_use]
    pub fn with_reports_path(mut self, path: impl Into<String>) -> Self {
        self.reports_path = path.into();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn storage_path(&self) -> &std::path::Path {
        &self.storage_path
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn unauthenticated_statuses(&self) -> &[u16] {
        &self.unauthenticated_statuses
    }

    /// Public entry point unauthenticated users are sent to.
    #[must_use]
    pub fn entry_route(&self) -> &Route {
        &self.entry_route
    }

    /// Protected landing view after a successful sign-in.
    #[must_use]
    pub fn dashboard_route(&self) -> &Route {
        &self.dashboard_route
    }

    /// Append a backend path to the base URL, keeping any path prefix the
    /// base already carries (`https://host/api/v1` + `/auth/callback`).
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(path.split('/').filter(|s| !s.is_empty()));
        Ok(url)
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("compliance-canary")
        .join("storage.json")
}

fn parse_statuses(raw: &str) -> Result<Vec<u16>, Error> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>()
                .ok()
                .filter(|code| (100..=599).contains(code))
                .ok_or_else(|| {
                    Error::Config(format!("CANARY_UNAUTHENTICATED_STATUSES: invalid status {s}"))
                })
        })
        .collect()
}
