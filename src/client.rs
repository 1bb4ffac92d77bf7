use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::config::ClientConfig;
use crate::error::Error;
use crate::types::AccessToken;

const UNKNOWN_ERROR: &str = "An unknown network error occurred.";

/// HTTP client for the Compliance Canary backend.
///
/// Anonymous calls (the code exchange) never carry credentials; every other
/// call takes the bearer token explicitly. Failures always come back as a
/// crate [`Error`], never as a raw transport error.
#[derive(Debug, Clone)]
pub struct ApiClient {
    config: ClientConfig,
    http: reqwest::Client,
}

/// Body of a successful code exchange.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[non_exhaustive]
pub struct ExchangeResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
}

impl ApiClient {
    /// Create a client with the configured request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the underlying HTTP client cannot be built.
    pub fn new(config: ClientConfig) -> Result<Self, Error> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    ///
    /// The configured request timeout is still applied to every request.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Backend endpoint that starts the GitHub OAuth flow.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the configured path cannot be joined to the base URL.
    pub fn login_url(&self) -> Result<Url, Error> {
        self.config.endpoint(&self.config.login_path)
    }

    /// Resolve a backend path against the configured base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the path cannot be joined to the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        self.config.endpoint(path)
    }

    /// Exchange a GitHub authorization code for a backend access token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ExchangeFailed`] on network failure or a non-2xx
    /// answer, and [`Error::MalformedExchangeResponse`] if a 2xx answer
    /// carries no usable token.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessToken, Error> {
        let mut url = self.config.endpoint(&self.config.exchange_path)?;
        url.query_pairs_mut().append_pair("code", code);

        let response = self
            .http
            .get(url)
            .timeout(self.config.request_timeout())
            .send()
            .await
            .map_err(|e| Error::ExchangeFailed {
                status: e.status().map(|s| s.as_u16()),
                detail: describe_transport_error(e),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::ExchangeFailed {
                status: Some(status.as_u16()),
                detail: error_detail(status, &body),
            });
        }

        let body: ExchangeResponse = response.json().await.map_err(|e| {
            tracing::warn!(error = %e, "Code exchange returned an unreadable body");
            Error::MalformedExchangeResponse
        })?;

        body.access_token
            .and_then(|raw| AccessToken::new(raw).ok())
            .ok_or(Error::MalformedExchangeResponse)
    }

    /// Authenticated `GET` returning JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if the backend rejects the token,
    /// or [`Error::Api`] for any other failure.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        token: &AccessToken,
    ) -> Result<T, Error> {
        let request = self.http.get(url).bearer_auth(token.as_str());
        self.send_json(operation, request).await
    }

    /// Authenticated `POST` of a JSON body returning JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Unauthenticated`] if the backend rejects the token,
    /// or [`Error::Api`] for any other failure.
    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
        body: &B,
        token: &AccessToken,
    ) -> Result<T, Error> {
        let request = self.http.post(url).bearer_auth(token.as_str()).json(body);
        self.send_json(operation, request).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, Error> {
        let request = request.timeout(self.config.request_timeout());
        let response = request.send().await.map_err(|e| Error::Api {
            operation,
            status: e.status().map(|s| s.as_u16()),
            detail: describe_transport_error(e),
        })?;

        let response = self.ensure_success(response, operation).await?;
        let status = response.status().as_u16();
        response.json::<T>().await.map_err(|e| Error::Api {
            operation,
            status: Some(status),
            detail: format!("unexpected response body: {e}"),
        })
    }

    /// Checks HTTP response status; returns the response on success or a
    /// normalized error otherwise.
    async fn ensure_success(
        &self,
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if self
            .config
            .unauthenticated_statuses()
            .contains(&status.as_u16())
        {
            tracing::warn!(operation, status = status.as_u16(), "Backend rejected access token");
            return Err(Error::Unauthenticated {
                status: Some(status.as_u16()),
            });
        }

        let body = response.text().await.unwrap_or_default();
        let detail = error_detail(status, &body);
        tracing::warn!(operation, status = status.as_u16(), detail = %detail, "Backend request failed");
        Err(Error::Api {
            operation,
            status: Some(status.as_u16()),
            detail,
        })
    }
}

/// Human-readable message for a failed response: the backend's `detail`
/// field when present, else the status reason phrase.
pub(crate) fn error_detail(status: reqwest::StatusCode, body: &str) -> String {
    detail_from_body(body)
        .or_else(|| status.canonical_reason().map(str::to_owned))
        .unwrap_or_else(|| UNKNOWN_ERROR.to_owned())
}

fn detail_from_body(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        serde_json::Value::String(detail) if !detail.is_empty() => Some(detail.clone()),
        // FastAPI validation errors: [{"loc": [...], "msg": "...", "type": "..."}]
        serde_json::Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        _ => None,
    }
}

fn describe_transport_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "request timed out".into()
    } else if e.is_connect() {
        "could not reach the server".into()
    } else {
        e.without_url().to_string()
    }
}
