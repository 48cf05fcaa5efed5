//! GitHub REST client
//!
//! Implements [`Forge`] and [`MarkerSource`] over a single reqwest client
//! configured from [`ForgeConfig`].
//!
//! Caller-supplied values (owner, repo, revision) only ever become single,
//! escaped path segments under `{api_base}/repos/`, and pagination links are
//! only followed within the API origin, so the token never reaches another
//! endpoint.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK};
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::types::{CommitResource, ForgeTag, IssueComment, MarkerResponse, Page, PullRequest, RepoRef};
use super::{CommentEntries, Forge, MarkerSource};
use crate::config::ForgeConfig;
use crate::error::{DeployError, Result};
use crate::metrics::METRICS;

const GITHUB_ACCEPT: &str = "application/vnd.github+json";

/// Largest version-marker body read before giving up.
pub const MAX_MARKER_BYTES: usize = 16 * 1024;

/// GitHub client for tags, pulls, commits and comments
pub struct GitHubClient {
    config: ForgeConfig,
    api_base: Url,
    http_client: reqwest::Client,
}

impl GitHubClient {
    /// Create a new client. Fails if the API base is not a usable URL, the
    /// TLS backend cannot initialise, or the configured headers are invalid.
    pub fn new(config: ForgeConfig) -> Result<Self> {
        let api_base = Url::parse(&config.api_base_url).map_err(|e| {
            DeployError::Config(format!("invalid API base url {}: {e}", config.api_base_url))
        })?;
        if api_base.cannot_be_a_base() {
            return Err(DeployError::Config(format!(
                "API base url cannot carry a path: {}",
                config.api_base_url
            )));
        }

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(GITHUB_ACCEPT));

        let http_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| DeployError::Config(format!("failed to create HTTP client: {e}")))?;

        if config.auth_token.is_none() {
            tracing::warn!("GITHUB_AUTH_TOKEN is NOT available. Worry about rate limits.");
        }

        Ok(GitHubClient {
            config,
            api_base,
            http_client,
        })
    }

    pub fn config(&self) -> &ForgeConfig {
        &self.config
    }

    /// `{api_base}/repos/{owner}/{repo}/{tail..}` with every part one segment.
    fn repo_url(&self, repo: &RepoRef, tail: &[&str]) -> Result<Url> {
        let parts = [repo.owner.as_str(), repo.repo.as_str()];
        for part in parts.iter().chain(tail) {
            check_segment(part)?;
        }

        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| DeployError::Config("API base url cannot carry a path".to_string()))?
            .pop_if_empty()
            .push("repos")
            .extend(parts)
            .extend(tail);
        Ok(url)
    }

    /// Parse a pagination link, refusing anything outside the API origin.
    fn follow_url(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw).map_err(|e| DeployError::Decode {
            url: raw.to_string(),
            message: format!("unparseable pagination link: {e}"),
        })?;
        if url.origin() != self.api_base.origin() {
            return Err(DeployError::Decode {
                url: raw.to_string(),
                message: "pagination link points outside the API origin".to_string(),
            });
        }
        Ok(url)
    }

    /// GET `url` against the forge, decode JSON, and pull out `rel="next"`.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<(T, Option<String>)> {
        METRICS.inc_forge_calls();
        debug!(url = %url, "forge GET");

        let mut request = self.http_client.get(url.clone());
        if let Some(auth) = self.config.authorization_header() {
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| DeployError::from_reqwest(url.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeployError::UpstreamHttpError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_next_link);

        let body = response
            .json::<T>()
            .await
            .map_err(|e| DeployError::from_reqwest(url.as_str(), e))?;

        Ok((body, next))
    }
}

/// Reject values that would not stay a single literal path segment.
fn check_segment(value: &str) -> Result<()> {
    let is_unsafe = |c: char| {
        matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control()
    };
    if value.is_empty() || value == "." || value == ".." || value.contains(is_unsafe) {
        return Err(DeployError::InvalidPathSegment {
            value: value.to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl Forge for GitHubClient {
    async fn tags_page(&self, repo: &RepoRef, page_url: Option<&str>) -> Result<Page<ForgeTag>> {
        let url = match page_url {
            Some(raw) => self.follow_url(raw)?,
            None => {
                let mut url = self.repo_url(repo, &["tags"])?;
                url.query_pairs_mut()
                    .append_pair("sort", "created")
                    .append_pair("direction", "desc");
                url
            }
        };
        let (items, next) = self.get_json::<Vec<ForgeTag>>(url).await?;
        Ok(Page { items, next })
    }

    async fn closed_pull_requests(&self, repo: &RepoRef) -> Result<Vec<PullRequest>> {
        let mut url = self.repo_url(repo, &["pulls"])?;
        url.query_pairs_mut()
            .append_pair("sort", "created")
            .append_pair("state", "closed")
            .append_pair("direction", "desc");
        let (pulls, _) = self.get_json::<Vec<PullRequest>>(url).await?;
        Ok(pulls)
    }

    async fn commit(&self, repo: &RepoRef, revision: &str) -> Result<CommitResource> {
        let url = self.repo_url(repo, &["commits", revision])?;
        let (commit, _) = self.get_json::<CommitResource>(url).await?;
        Ok(commit)
    }

    async fn issue_comments(&self, repo: &RepoRef, number: u64) -> Result<CommentEntries> {
        let number = number.to_string();
        let url = self.repo_url(repo, &["issues", &number, "comments"])?;
        let source = url.to_string();
        let (raw, _) = self.get_json::<Vec<serde_json::Value>>(url).await?;
        Ok(raw
            .into_iter()
            .map(|entry| {
                serde_json::from_value::<IssueComment>(entry).map_err(|e| {
                    DeployError::MalformedCommentEntry {
                        url: source.clone(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect())
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &[(String, String)],
    ) -> Result<serde_json::Value> {
        let mut url = self.repo_url(repo, &["commits"])?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let (listing, _) = self.get_json::<serde_json::Value>(url).await?;
        Ok(listing)
    }
}

#[async_trait]
impl MarkerSource for GitHubClient {
    /// Version markers are third-party URLs: the forge token is never sent.
    ///
    /// Bodies are read up to [`MAX_MARKER_BYTES`]. A successful answer over
    /// the limit is an error; an error page over it is returned truncated.
    async fn fetch_marker(&self, url: &str) -> Result<MarkerResponse> {
        METRICS.inc_marker_fetches();
        debug!(url = %url, "marker GET");

        let mut response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| DeployError::from_reqwest(url, e))?;
        let status = response.status();

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| DeployError::from_reqwest(url, e))?
        {
            if body.len() + chunk.len() > MAX_MARKER_BYTES {
                if status.is_success() {
                    return Err(DeployError::Decode {
                        url: url.to_string(),
                        message: format!("version marker larger than {MAX_MARKER_BYTES} bytes"),
                    });
                }
                let room = MAX_MARKER_BYTES - body.len();
                body.extend_from_slice(&chunk[..room]);
                break;
            }
            body.extend_from_slice(&chunk);
        }

        Ok(MarkerResponse {
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}

/// Extract the `rel="next"` target from an RFC 8288 `Link` header.
///
/// `<https://api.github.com/repositories/1/tags?page=2>; rel="next", <...>; rel="last"`
pub fn parse_next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|link| {
        let mut parts = link.split(';');
        let target = parts.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;

        let is_next = parts.any(|param| {
            let Some((key, value)) = param.split_once('=') else {
                return false;
            };
            key.trim().eq_ignore_ascii_case("rel")
                && value
                    .trim()
                    .trim_matches('"')
                    .split_ascii_whitespace()
                    .any(|rel| rel.eq_ignore_ascii_case("next"))
        });

        is_next.then(|| target.to_string())
    })
}
