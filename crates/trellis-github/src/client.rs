//! REST implementation of [`RelationStore`] against the GitHub API.
//!
//! `GithubClient` wraps a `reqwest::Client` and translates every trait
//! method into the corresponding HTTP call. Created once and reused for
//! the process lifetime; the underlying client maintains the connection
//! pool. There is no retry or backoff: a failed call fails its invocation.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

use crate::error::{from_reqwest, Error, Result};
use crate::store::{Placement, RelationStore};
use crate::types::{IssueRef, IssueState, RepoRef};

/// Default base address of the GitHub REST API.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

/// REST API version pin sent with every request.
const API_VERSION: &str = "2022-11-28";

/// Page size used when walking paginated list endpoints.
const PER_PAGE: usize = 100;

/// Configuration for [`GithubClient`].
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// Bearer credential for the API.
    pub token: String,

    /// Base address of the API, e.g. for GitHub Enterprise deployments.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl GithubConfig {
    /// Build a config with the default public API address and a 30 second
    /// request timeout.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// A REST-based [`RelationStore`] over the GitHub API.
#[derive(Debug, Clone)]
pub struct GithubClient {
    http: Client,
    base_url: String,
}

impl GithubClient {
    /// Build a new client from configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Validation` if the token is not a valid header
    /// value, or `Error::Http` if the underlying client cannot be built.
    pub fn new(cfg: &GithubConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", cfg.token))
            .map_err(|_| Error::Validation("token contains invalid header characters".into()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(API_VERSION),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("trellis/", env!("CARGO_PKG_VERSION"))),
        );

        let http = Client::builder()
            .default_headers(headers)
            .timeout(cfg.timeout)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Build the full URL for an issue-scoped path suffix.
    fn issue_url(&self, repo: &RepoRef, number: u64, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/issues/{number}/{suffix}",
            self.base_url, repo.owner, repo.repo
        )
    }

    /// Send a request and map non-success statuses to classified errors.
    async fn execute(&self, what: &str, rb: RequestBuilder) -> Result<Response> {
        let resp = rb.send().await.map_err(from_reqwest)?;
        let status = resp.status();
        trace!(what, status = status.as_u16(), "GitHub API response");

        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        Err(Error::from_status(
            status.as_u16(),
            what,
            &extract_api_message(&body),
        ))
    }

    /// Read and decode a JSON response body.
    async fn decode<T: DeserializeOwned>(what: &str, resp: Response) -> Result<T> {
        let body = resp.text().await.map_err(from_reqwest)?;
        serde_json::from_str(&body).map_err(|e| Error::Decode(format!("{what}: {e}")))
    }

    /// Fetch every page of a list endpoint and return the complete set.
    ///
    /// The API caps pages at 100 items; callers of [`RelationStore`] are
    /// promised the full unpaginated result, so this walks `page` until a
    /// short page arrives.
    async fn fetch_all_pages(&self, what: &str, url: &str) -> Result<Vec<IssueRef>> {
        let mut out = Vec::new();
        let mut page: u32 = 1;

        loop {
            let rb = self.http.get(url).query(&[
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ]);
            let resp = self.execute(what, rb).await?;
            let batch: Vec<ApiIssue> = Self::decode(what, resp).await?;

            let short = batch.len() < PER_PAGE;
            out.extend(batch.into_iter().map(IssueRef::from));

            if short {
                break;
            }
            page += 1;
        }

        debug!(what, count = out.len(), pages = page, "fetched issue list");
        Ok(out)
    }
}

#[async_trait]
impl RelationStore for GithubClient {
    async fn blocked_by(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>> {
        let url = self.issue_url(repo, number, "dependencies/blocked_by");
        self.fetch_all_pages("list blocked-by dependencies", &url)
            .await
    }

    async fn blocking(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>> {
        let url = self.issue_url(repo, number, "dependencies/blocking");
        self.fetch_all_pages("list blocking dependencies", &url)
            .await
    }

    async fn add_blocked_by(&self, repo: &RepoRef, number: u64, blocking_id: u64) -> Result<()> {
        let url = self.issue_url(repo, number, "dependencies/blocked_by");
        self.execute(
            "add blocking dependency",
            self.http.post(&url).json(&json!({ "issue_id": blocking_id })),
        )
        .await?;
        debug!(%repo, number, blocking_id, "added blocking dependency");
        Ok(())
    }

    async fn remove_blocked_by(&self, repo: &RepoRef, number: u64, blocking_id: u64) -> Result<()> {
        let url = self.issue_url(
            repo,
            number,
            &format!("dependencies/blocked_by/{blocking_id}"),
        );
        self.execute("remove blocking dependency", self.http.delete(&url))
            .await?;
        debug!(%repo, number, blocking_id, "removed blocking dependency");
        Ok(())
    }

    async fn parent_of(&self, repo: &RepoRef, number: u64) -> Result<Option<IssueRef>> {
        let url = self.issue_url(repo, number, "parent");
        let resp = self.http.get(&url).send().await.map_err(from_reqwest)?;

        // The service signals "no parent" as not-found; that is data here,
        // not an error. Every other failure propagates classified.
        if resp.status() == StatusCode::NOT_FOUND {
            debug!(%repo, number, "issue has no parent");
            return Ok(None);
        }

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::from_status(
                status.as_u16(),
                "get parent issue",
                &extract_api_message(&body),
            ));
        }

        let issue: ApiIssue = Self::decode("get parent issue", resp).await?;
        Ok(Some(issue.into()))
    }

    async fn sub_issues(&self, repo: &RepoRef, number: u64) -> Result<Vec<IssueRef>> {
        let url = self.issue_url(repo, number, "sub_issues");
        self.fetch_all_pages("list sub-issues", &url).await
    }

    async fn add_sub_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        sub_issue_id: u64,
        replace_parent: bool,
    ) -> Result<()> {
        let url = self.issue_url(repo, number, "sub_issues");
        self.execute(
            "add sub-issue",
            self.http.post(&url).json(&json!({
                "sub_issue_id": sub_issue_id,
                "replace_parent": replace_parent,
            })),
        )
        .await?;
        debug!(%repo, number, sub_issue_id, replace_parent, "added sub-issue");
        Ok(())
    }

    async fn remove_sub_issue(&self, repo: &RepoRef, number: u64, sub_issue_id: u64) -> Result<()> {
        let url = self.issue_url(repo, number, "sub_issue");
        self.execute(
            "remove sub-issue",
            self.http
                .delete(&url)
                .json(&json!({ "sub_issue_id": sub_issue_id })),
        )
        .await?;
        debug!(%repo, number, sub_issue_id, "removed sub-issue");
        Ok(())
    }

    async fn reprioritize_sub_issue(
        &self,
        repo: &RepoRef,
        number: u64,
        sub_issue_id: u64,
        placement: Placement,
    ) -> Result<()> {
        let url = self.issue_url(repo, number, "sub_issues/priority");
        let body = match placement {
            Placement::After(anchor) => {
                json!({ "sub_issue_id": sub_issue_id, "after_id": anchor })
            }
            Placement::Before(anchor) => {
                json!({ "sub_issue_id": sub_issue_id, "before_id": anchor })
            }
        };
        self.execute("reprioritize sub-issue", self.http.patch(&url).json(&body))
            .await?;
        debug!(%repo, number, sub_issue_id, ?placement, "reprioritized sub-issue");
        Ok(())
    }
}

/// Wire shape of an issue as the API returns it.
#[derive(Debug, Deserialize)]
struct ApiIssue {
    id: u64,
    number: u64,
    title: String,
    state: IssueState,
    html_url: String,
    user: Option<ApiUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ApiUser {
    login: String,
}

impl From<ApiIssue> for IssueRef {
    fn from(issue: ApiIssue) -> Self {
        Self {
            id: issue.id,
            number: issue.number,
            title: issue.title,
            state: issue.state,
            html_url: issue.html_url,
            author: issue.user.map(|u| u.login),
            created_at: issue.created_at,
            updated_at: issue.updated_at,
        }
    }
}

/// Pull the `message` field out of an API error body, falling back to the
/// raw text when the body is not the usual JSON shape.
fn extract_api_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
