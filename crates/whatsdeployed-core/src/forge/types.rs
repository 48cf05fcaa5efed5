//! Wire types for the slices of the GitHub REST API we read.

use serde::{Deserialize, Serialize};

/// `owner/repo` pair identifying a forge repository.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        RepoRef {
            owner: owner.into(),
            repo: repo.into(),
        }
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// A forge account as embedded in PRs, commits and comments.
///
/// Equality is over every field, mirroring how the forge's user objects are
/// compared when deciding whether a committer differs from an author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeUser {
    pub login: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html_url: Option<String>,
}

impl ForgeUser {
    pub fn new(login: impl Into<String>) -> Self {
        ForgeUser {
            login: login.into(),
            avatar_url: None,
            html_url: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagCommit {
    pub sha: String,
}

/// Entry of `GET /repos/{o}/{r}/tags`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgeTag {
    pub name: String,
    pub commit: TagCommit,
}

impl ForgeTag {
    pub fn new(name: impl Into<String>, sha: impl Into<String>) -> Self {
        ForgeTag {
            name: name.into(),
            commit: TagCommit { sha: sha.into() },
        }
    }
}

/// Entry of `GET /repos/{o}/{r}/pulls`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    pub html_url: String,
    #[serde(default)]
    pub merge_commit_sha: Option<String>,
    #[serde(default)]
    pub user: Option<ForgeUser>,
    #[serde(default)]
    pub committer: Option<ForgeUser>,
    #[serde(default)]
    pub assignees: Vec<ForgeUser>,
}

/// `GET /repos/{o}/{r}/commits/{ref}`, reduced to who made it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitResource {
    pub sha: String,
    #[serde(default)]
    pub author: Option<ForgeUser>,
    #[serde(default)]
    pub committer: Option<ForgeUser>,
}

/// Entry of `GET /repos/{o}/{r}/issues/{n}/comments`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueComment {
    pub user: ForgeUser,
}

/// One page of a paginated listing plus the `rel="next"` URL, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next: Option<String>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Self {
        Page { items, next: None }
    }
}

/// Raw answer of a version-marker endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkerResponse {
    pub status: u16,
    pub body: String,
}
