//! Forge access abstractions
//!
//! These traits define the two outbound I/O seams of the pipeline:
//! - `Forge`: the code-forge REST API (tags, pull requests, commits, comments)
//! - `MarkerSource`: arbitrary per-environment version-marker URLs
//!
//! Both are async and backend-agnostic. `GitHubClient` implements them over
//! reqwest; in-memory fakes live in [`crate::fakes`].

use async_trait::async_trait;

use crate::error::Result;

pub mod github;
pub mod policy;
pub mod types;

pub use github::{parse_next_link, GitHubClient};
pub use policy::CallPolicy;
pub use types::{
    CommitResource, ForgeTag, ForgeUser, IssueComment, MarkerResponse, Page, PullRequest, RepoRef,
    TagCommit,
};

/// Comments of one issue/PR; each entry decodes independently so a single
/// malformed comment does not poison the list.
pub type CommentEntries = Vec<Result<IssueComment>>;

/// Read access to a code-forge REST API.
///
/// Guarantees:
/// - Timeouts surface as `DeployError::UpstreamTimeout`.
/// - Non-2xx answers surface as `DeployError::UpstreamHttpError`.
/// - No call is retried.
#[async_trait]
pub trait Forge: Send + Sync {
    /// One page of tags, newest first. `page_url = None` requests the first
    /// page; otherwise it is a `next` URL returned by a previous page.
    async fn tags_page(&self, repo: &RepoRef, page_url: Option<&str>) -> Result<Page<ForgeTag>>;

    /// First page of closed pull requests, newest first.
    async fn closed_pull_requests(&self, repo: &RepoRef) -> Result<Vec<PullRequest>>;

    /// A single commit by revision.
    async fn commit(&self, repo: &RepoRef, revision: &str) -> Result<CommitResource>;

    /// Issue comments of pull request `number`.
    async fn issue_comments(&self, repo: &RepoRef, number: u64) -> Result<CommentEntries>;

    /// Raw commit listing, forwarding `query` untouched.
    async fn list_commits(
        &self,
        repo: &RepoRef,
        query: &[(String, String)],
    ) -> Result<serde_json::Value>;
}

/// Fetches version-marker endpoints.
///
/// Returns the status instead of failing on non-2xx; the caller decides what
/// counts as success. Timeouts are still errors.
#[async_trait]
pub trait MarkerSource: Send + Sync {
    async fn fetch_marker(&self, url: &str) -> Result<MarkerResponse>;
}
