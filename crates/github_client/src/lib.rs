//! Crate for interacting with the pull request endpoints of the GitHub REST API.
//!
//! This crate provides a client that authenticates with a bearer token and retries
//! transient failures according to a [`RetryPolicy`].

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, error, info, instrument, warn};

pub mod errors;
pub use errors::Error;

pub mod models;
pub use models::{
    Label, MergeMethod, MergeResult, PullRequest, PullRequestBranch, PullRequestState, User,
};

pub mod retry;
pub use retry::RetryPolicy;

use models::{AddLabelsPayload, CreatePullRequestPayload, MergePullRequestPayload};

// Reference the tests module in the separate file
#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// The public GitHub API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Base branch used when none is configured.
pub const DEFAULT_BASE_BRANCH: &str = "main";

const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Operations on the pull requests of a single repository.
///
/// The orchestration code depends on this trait rather than on [`GitHubClient`] so
/// the workflow can be exercised against a fake.
#[async_trait]
pub trait PullRequestClient: Send + Sync {
    /// Opens a pull request from `head` into the configured base branch.
    async fn create_pull_request(
        &self,
        head: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequest, Error>;

    /// Appends labels to a pull request.
    ///
    /// Returns the full label set of the pull request after the update.
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<Vec<Label>, Error>;

    /// Merges a pull request with the given method.
    ///
    /// The merge commit title is `Merge PR #<number> (automated)`.
    async fn merge_pull_request(
        &self,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult, Error>;

    /// Fetches a single pull request.
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest, Error>;

    /// Lists pull requests in the given state.
    async fn list_pull_requests(&self, state: PullRequestState) -> Result<Vec<PullRequest>, Error>;
}

/// A client for the GitHub REST API scoped to one repository.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    token: SecretString,
    default_branch: String,
    retry_policy: RetryPolicy,
}

impl GitHubClient {
    /// Creates a new client.
    ///
    /// # Arguments
    ///
    /// * `api_url` - Base URL of the API, e.g. `https://api.github.com`.
    /// * `owner` - Owner (user or organization) of the repository.
    /// * `repo` - Name of the repository.
    /// * `token` - Bearer token used for every request.
    /// * `retry_policy` - Retry behaviour for transient failures.
    ///
    /// # Errors
    ///
    /// Returns `Error::Configuration` if the owner or repository name is empty or the
    /// API URL is not a valid absolute URL.
    pub fn new(
        api_url: &str,
        owner: &str,
        repo: &str,
        token: SecretString,
        retry_policy: RetryPolicy,
    ) -> Result<Self, Error> {
        if owner.trim().is_empty() {
            return Err(Error::Configuration(
                "repository owner must not be empty".to_string(),
            ));
        }
        if repo.trim().is_empty() {
            return Err(Error::Configuration(
                "repository name must not be empty".to_string(),
            ));
        }

        let parsed = url::Url::parse(api_url).map_err(|e| {
            error!(api_url = api_url, "Invalid GitHub API URL: {}", e);
            Error::Configuration(format!("invalid API URL '{api_url}': {e}"))
        })?;
        if parsed.cannot_be_a_base() {
            return Err(Error::Configuration(format!(
                "API URL '{api_url}' cannot be used as a base URL"
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("auto-pr/", env!("CARGO_PKG_VERSION"))),
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {e}")))?;

        info!(
            api_url = api_url,
            owner = owner,
            repo = repo,
            max_retries = retry_policy.max_retries,
            "GitHub client initialized"
        );

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            owner: owner.to_string(),
            repo: repo.to_string(),
            token,
            default_branch: DEFAULT_BASE_BRANCH.to_string(),
            retry_policy,
        })
    }

    /// Sets the base branch new pull requests target.
    pub fn with_default_branch(mut self, branch: impl Into<String>) -> Self {
        self.default_branch = branch.into();
        self
    }

    /// The `owner/name` of the repository this client talks to.
    pub fn repository_full_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    /// The base branch new pull requests target.
    pub fn default_branch(&self) -> &str {
        &self.default_branch
    }

    fn repo_endpoint(&self, path: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.owner, self.repo, path
        )
    }

    /// Sends a request, retrying transient failures according to the retry policy.
    async fn send<B>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<Response, Error>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.repo_endpoint(path);
        let may_retry = self.retry_policy.allows_method(&method);
        let mut retry: u32 = 0;

        loop {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(self.token.expose_secret());
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, attempt = retry + 1, "Sending GitHub API request");

            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    if retry > 0 {
                        info!(
                            method = %method,
                            url = %url,
                            retries = retry,
                            "GitHub API request succeeded after retry"
                        );
                    }
                    return Ok(response);
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    if may_retry
                        && self.retry_policy.is_retryable_status(status)
                        && retry < self.retry_policy.max_retries
                    {
                        retry += 1;
                        let delay = self.retry_policy.delay_for(retry, retry_after(&response));
                        warn!(
                            method = %method,
                            url = %url,
                            status = status,
                            retry = retry,
                            delay_ms = delay.as_millis() as u64,
                            "Transient GitHub API failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(error_from_response(&method, path, response).await);
                }
                Err(e) => {
                    let transient = e.is_timeout() || e.is_connect();
                    if may_retry && transient && retry < self.retry_policy.max_retries {
                        retry += 1;
                        let delay = self.retry_policy.backoff_for(retry);
                        warn!(
                            method = %method,
                            url = %url,
                            retry = retry,
                            delay_ms = delay.as_millis() as u64,
                            "GitHub API request did not complete, retrying: {}",
                            e
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    error!(method = %method, url = %url, "GitHub API request failed: {}", e);
                    return Err(Error::ApiRequest {
                        status: e.status().map(|s| s.as_u16()),
                        message: format!("{method} {path} failed: {e}"),
                    });
                }
            }
        }
    }

    async fn send_json<B, T>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, Error>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let response = self.send(method.clone(), path, query, body).await?;
        let text = response.text().await.map_err(|e| Error::ApiRequest {
            status: None,
            message: format!("{method} {path} failed while reading the response: {e}"),
        })?;
        let value = serde_json::from_str(&text)?;
        Ok(value)
    }
}

#[async_trait]
impl PullRequestClient for GitHubClient {
    #[instrument(skip(self, body), fields(repo = %self.repository_full_name()))]
    async fn create_pull_request(
        &self,
        head: &str,
        title: &str,
        body: &str,
        draft: bool,
    ) -> Result<PullRequest, Error> {
        let payload = CreatePullRequestPayload {
            title,
            head,
            base: &self.default_branch,
            body,
            draft,
        };

        let pr: PullRequest = self
            .send_json(Method::POST, "pulls", &[], Some(&payload))
            .await?;

        info!(
            number = pr.number,
            url = pr.html_url.as_str(),
            base = self.default_branch.as_str(),
            "Created pull request"
        );
        Ok(pr)
    }

    #[instrument(skip(self), fields(repo = %self.repository_full_name()))]
    async fn add_labels(&self, number: u64, labels: &[String]) -> Result<Vec<Label>, Error> {
        let payload = AddLabelsPayload { labels };
        let applied: Vec<Label> = self
            .send_json(
                Method::POST,
                &format!("issues/{number}/labels"),
                &[],
                Some(&payload),
            )
            .await?;

        info!(number = number, labels = ?labels, "Added labels to pull request");
        Ok(applied)
    }

    #[instrument(skip(self), fields(repo = %self.repository_full_name()))]
    async fn merge_pull_request(
        &self,
        number: u64,
        method: MergeMethod,
    ) -> Result<MergeResult, Error> {
        let payload = MergePullRequestPayload {
            merge_method: method,
            commit_title: format!("Merge PR #{number} (automated)"),
        };

        let result: MergeResult = self
            .send_json(
                Method::PUT,
                &format!("pulls/{number}/merge"),
                &[],
                Some(&payload),
            )
            .await?;

        info!(
            number = number,
            merge_method = %method,
            merged = result.merged,
            sha = result.sha.as_deref().unwrap_or(""),
            "Merge request completed"
        );
        Ok(result)
    }

    #[instrument(skip(self), fields(repo = %self.repository_full_name()))]
    async fn get_pull_request(&self, number: u64) -> Result<PullRequest, Error> {
        self.send_json::<(), _>(Method::GET, &format!("pulls/{number}"), &[], None)
            .await
    }

    #[instrument(skip(self), fields(repo = %self.repository_full_name()))]
    async fn list_pull_requests(&self, state: PullRequestState) -> Result<Vec<PullRequest>, Error> {
        let prs: Vec<PullRequest> = self
            .send_json::<(), _>(Method::GET, "pulls", &[("state", state.as_str())], None)
            .await?;

        debug!(state = %state, count = prs.len(), "Listed pull requests");
        Ok(prs)
    }
}

/// Reads a `Retry-After` header expressed in seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

/// Builds an `ApiRequest` error, including GitHub's `message` field when the body has one.
async fn error_from_response(method: &Method, path: &str, response: Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let remote_message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| {
            value
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string)
        });

    let mut message = format!("{method} {path} failed with {status}");
    if let Some(remote) = remote_message {
        message.push_str(" - ");
        message.push_str(&remote);
    }

    error!(status = status.as_u16(), "{}", message);
    Error::ApiRequest {
        status: Some(status.as_u16()),
        message,
    }
}
