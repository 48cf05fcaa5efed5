//! In-memory fakes for the forge traits (testing only)
//!
//! Provides `FakeForge` and `FakeMarkerSource`, which serve canned responses
//! and count calls, without any network access.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{DeployError, Result};
use crate::forge::{
    CommentEntries, CommitResource, Forge, ForgeTag, IssueComment, MarkerResponse, MarkerSource,
    Page, PullRequest, RepoRef,
};
use crate::resolver::CACHE_BUST_PARAM;

const FAKE_TAGS_URL: &str = "fake://tags?page=";

// ---------------------------------------------------------------------------
// FakeForge
// ---------------------------------------------------------------------------

/// Canned forge. Unknown commits answer 404; unknown comment threads are empty.
#[derive(Debug, Default)]
pub struct FakeForge {
    tag_pages: Vec<Result<Vec<ForgeTag>>>,
    pulls: Option<Result<Vec<PullRequest>>>,
    commits: HashMap<String, Result<CommitResource>>,
    comments: HashMap<u64, Result<CommentEntries>>,
    commit_listing: Option<serde_json::Value>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl FakeForge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a page of tags; pages are linked with synthetic `next` URLs.
    pub fn with_tag_page(mut self, tags: Vec<ForgeTag>) -> Self {
        self.tag_pages.push(Ok(tags));
        self
    }

    /// Append a page that fails when requested.
    pub fn with_tag_page_error(mut self, err: DeployError) -> Self {
        self.tag_pages.push(Err(err));
        self
    }

    pub fn with_pulls(mut self, pulls: Vec<PullRequest>) -> Self {
        self.pulls = Some(Ok(pulls));
        self
    }

    pub fn with_pulls_error(mut self, err: DeployError) -> Self {
        self.pulls = Some(Err(err));
        self
    }

    pub fn with_commit(mut self, commit: CommitResource) -> Self {
        self.commits.insert(commit.sha.clone(), Ok(commit));
        self
    }

    pub fn with_commit_error(mut self, revision: &str, err: DeployError) -> Self {
        self.commits.insert(revision.to_string(), Err(err));
        self
    }

    pub fn with_comments(mut self, number: u64, comments: Vec<IssueComment>) -> Self {
        self.comments
            .insert(number, Ok(comments.into_iter().map(Ok).collect()));
        self
    }

    /// Comments where individual entries may be malformed.
    pub fn with_comment_entries(mut self, number: u64, entries: CommentEntries) -> Self {
        self.comments.insert(number, Ok(entries));
        self
    }

    pub fn with_comments_error(mut self, number: u64, err: DeployError) -> Self {
        self.comments.insert(number, Err(err));
        self
    }

    pub fn with_commit_listing(mut self, listing: serde_json::Value) -> Self {
        self.commit_listing = Some(listing);
        self
    }

    /// How many times `method` (a `Forge` method name) was called.
    pub fn calls(&self, method: &str) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.get(method).copied().unwrap_or(0)
    }

    /// Total calls across all methods.
    pub fn total_calls(&self) -> usize {
        let calls = self.calls.lock().unwrap();
        calls.values().sum()
    }

    fn record(&self, method: &'static str) {
        let mut calls = self.calls.lock().unwrap();
        *calls.entry(method).or_insert(0) += 1;
    }
}

#[async_trait]
impl Forge for FakeForge {
    async fn tags_page(&self, _repo: &RepoRef, page_url: Option<&str>) -> Result<Page<ForgeTag>> {
        self.record("tags_page");
        let index = match page_url {
            None => 0,
            Some(url) => url
                .strip_prefix(FAKE_TAGS_URL)
                .and_then(|n| n.parse::<usize>().ok())
                .ok_or_else(|| DeployError::UpstreamHttpError {
                    url: url.to_string(),
                    status: 404,
                })?,
        };

        let Some(page) = self.tag_pages.get(index) else {
            return Ok(Page::last(Vec::new()));
        };
        let items = page.clone()?;
        let next = (index + 1 < self.tag_pages.len()).then(|| format!("{FAKE_TAGS_URL}{}", index + 1));
        Ok(Page { items, next })
    }

    async fn closed_pull_requests(&self, _repo: &RepoRef) -> Result<Vec<PullRequest>> {
        self.record("closed_pull_requests");
        self.pulls.clone().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn commit(&self, repo: &RepoRef, revision: &str) -> Result<CommitResource> {
        self.record("commit");
        self.commits
            .get(revision)
            .cloned()
            .unwrap_or_else(|| {
                Err(DeployError::UpstreamHttpError {
                    url: format!("fake://repos/{repo}/commits/{revision}"),
                    status: 404,
                })
            })
    }

    async fn issue_comments(&self, _repo: &RepoRef, number: u64) -> Result<CommentEntries> {
        self.record("issue_comments");
        self.comments
            .get(&number)
            .cloned()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn list_commits(
        &self,
        repo: &RepoRef,
        _query: &[(String, String)],
    ) -> Result<serde_json::Value> {
        self.record("list_commits");
        self.commit_listing
            .clone()
            .ok_or_else(|| DeployError::UpstreamHttpError {
                url: format!("fake://repos/{repo}/commits"),
                status: 404,
            })
    }
}

// ---------------------------------------------------------------------------
// FakeMarkerSource
// ---------------------------------------------------------------------------

/// Version-marker endpoints keyed by URL, ignoring the cache-busting param.
/// Unknown URLs answer 404.
#[derive(Debug, Default)]
pub struct FakeMarkerSource {
    markers: HashMap<String, CannedMarker>,
    requested: Mutex<Vec<String>>,
}

#[derive(Debug, Clone)]
enum CannedMarker {
    Respond(MarkerResponse),
    Timeout,
}

impl FakeMarkerSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status 200 at `url`.
    pub fn with_marker(self, url: &str, body: &str) -> Self {
        self.with_status(url, 200, body)
    }

    pub fn with_status(mut self, url: &str, status: u16, body: &str) -> Self {
        self.markers.insert(
            url.to_string(),
            CannedMarker::Respond(MarkerResponse {
                status,
                body: body.to_string(),
            }),
        );
        self
    }

    /// Time out at `url`. The error carries the URL as requested, like a
    /// real HTTP client would report it.
    pub fn with_timeout(mut self, url: &str) -> Self {
        self.markers.insert(url.to_string(), CannedMarker::Timeout);
        self
    }

    /// Full URLs requested so far, cache-busting parameter included.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }
}

/// Drop a trailing cache-busting parameter added by the resolver.
fn strip_cache_buster(url: &str) -> &str {
    let marker = format!("{CACHE_BUST_PARAM}=");
    match url.rfind(&marker) {
        Some(idx) if idx > 0 => &url[..idx - 1],
        _ => url,
    }
}

#[async_trait]
impl MarkerSource for FakeMarkerSource {
    async fn fetch_marker(&self, url: &str) -> Result<MarkerResponse> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.markers.get(strip_cache_buster(url)) {
            Some(CannedMarker::Respond(response)) => Ok(response.clone()),
            Some(CannedMarker::Timeout) => Err(DeployError::UpstreamTimeout {
                url: url.to_string(),
            }),
            None => Ok(MarkerResponse {
                status: 404,
                body: "Not Found".to_string(),
            }),
        }
    }
}
