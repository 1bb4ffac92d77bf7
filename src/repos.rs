use std::sync::Arc;

use url::Url;

use crate::client::ApiClient;
use crate::error::Error;
use crate::session::SessionStore;
use crate::types::{
    AccessToken, NewRepository, RepoId, Repository, RepositoryActivationState, ScanReport,
};

/// Authenticated access to the user's repositories and scan reports.
///
/// The token is read from the [`SessionStore`] on every call. With no
/// session the call fails with [`Error::Unauthenticated`] before any request
/// is sent.
#[derive(Debug, Clone)]
pub struct RepositoryService {
    client: Arc<ApiClient>,
    session: Arc<SessionStore>,
}

/// A repository with its derived card state.
#[derive(Debug, Clone)]
pub struct RepositoryCard {
    pub repository: Repository,
    pub state: RepositoryActivationState,
}

impl RepositoryService {
    #[must_use]
    pub fn new(client: Arc<ApiClient>, session: Arc<SessionStore>) -> Self {
        Self { client, session }
    }

    /// List the signed-in user's repositories.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] without a session or when the
    /// backend rejects the token, [`Error::Api`] for other failures.
    pub async fn list_repositories(&self) -> Result<Vec<Repository>, Error> {
        let token = self.token()?;
        let url = self.client.url(&self.client.config().repositories_path)?;
        self.client
            .get_json("list repositories", url, &token)
            .await
    }

    /// List scan reports for one repository.
    ///
    /// # Errors
    ///
    /// Same as [`list_repositories`](Self::list_repositories).
    pub async fn list_reports(&self, repo_id: RepoId) -> Result<Vec<ScanReport>, Error> {
        let token = self.token()?;
        let mut url = self.client.url(&self.client.config().reports_path)?;
        url.query_pairs_mut()
            .append_pair("repo_id", &repo_id.to_string());
        self.client.get_json("list reports", url, &token).await
    }

    /// Enroll a repository for scanning.
    ///
    /// # Errors
    ///
    /// Same as [`list_repositories`](Self::list_repositories).
    pub async fn activate_repository(
        &self,
        repository: &NewRepository,
    ) -> Result<Repository, Error> {
        let token = self.token()?;
        let url = self.client.url(&self.client.config().activate_path)?;
        let created: Repository = self
            .client
            .post_json("activate repository", url, repository, &token)
            .await?;
        tracing::info!(repo_id = %created.id, name = %created.name, "Repository activated");
        Ok(created)
    }

    /// Repositories paired with the card state derived from their embedded reports.
    ///
    /// # Errors
    ///
    /// Same as [`list_repositories`](Self::list_repositories).
    pub async fn repository_cards(&self) -> Result<Vec<RepositoryCard>, Error> {
        let repositories = self.list_repositories().await?;
        Ok(repositories
            .into_iter()
            .map(|repository| {
                let state = RepositoryActivationState::derive(&repository, &repository.reports);
                RepositoryCard { repository, state }
            })
            .collect())
    }

    #[must_use]
    pub fn activation_state(
        &self,
        repository: &Repository,
        reports: &[ScanReport],
    ) -> RepositoryActivationState {
        RepositoryActivationState::derive(repository, reports)
    }

    /// Download link for a report's PDF, or `None` if no artifact exists yet.
    #[must_use]
    pub fn report_download_url(&self, report: &ScanReport) -> Option<Url> {
        if !report.has_artifact() {
            return None;
        }
        let mut url = self
            .client
            .url(&self.client.config().report_download_path)
            .ok()?;
        url.path_segments_mut().ok()?.push(&report.id.0);
        Some(url)
    }

    fn token(&self) -> Result<AccessToken, Error> {
        self.session.current().ok_or_else(|| {
            tracing::debug!("Authenticated call attempted without a session");
            Error::Unauthenticated { status: None }
        })
    }
}
