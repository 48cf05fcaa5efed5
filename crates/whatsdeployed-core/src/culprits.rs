//! Culprit attribution: who is behind each deployed revision.
//!
//! For every distinct revision, the merged pull request (if one of the most
//! recent closed PRs merged it) and the commit itself are inspected, and the
//! people found are merged into role-labelled participants.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::forge::{CallPolicy, CommitResource, Forge, PullRequest, RepoRef};
use crate::metrics::METRICS;
use crate::obs::{emit_attribution_failed, emit_revision_attributed, emit_revision_memoized};
use crate::participants::{Participant, Role, Sightings};

const PULLS_POLICY: CallPolicy = CallPolicy::Propagate;
const COMMIT_POLICY: CallPolicy = CallPolicy::Propagate;
const COMMENTS_POLICY: CallPolicy = CallPolicy::DegradeToEmpty;
const COMMENT_ENTRY_POLICY: CallPolicy = CallPolicy::SkipEntry;

/// An environment and the revision it runs (input to attribution).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedRevision {
    pub name: String,
    #[serde(alias = "sha")]
    pub revision: String,
}

impl DeployedRevision {
    pub fn new(name: impl Into<String>, revision: impl Into<String>) -> Self {
        DeployedRevision {
            name: name.into(),
            revision: revision.into(),
        }
    }
}

/// People and pull requests behind one revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CulpritGroup {
    #[serde(rename = "name")]
    pub environment_name: String,
    pub participants: Vec<Participant>,
    #[serde(rename = "links")]
    pub pull_request_links: Vec<String>,
}

/// Attribute each distinct revision, in input order.
///
/// A revision shared by several entries is looked up once and produces one
/// group, owned by the first entry that carried it. Any propagated forge
/// failure aborts the whole call; partial attribution is never returned.
pub async fn attribute(
    forge: &dyn Forge,
    repo: &RepoRef,
    deployments: &[DeployedRevision],
    merge_bot_login: &str,
) -> Result<Vec<CulpritGroup>> {
    let mut looked_up: HashSet<&str> = HashSet::new();
    let mut groups = Vec::new();

    for deployment in deployments {
        if looked_up.contains(deployment.revision.as_str()) {
            emit_revision_memoized(&deployment.name, &deployment.revision);
            continue;
        }

        let group = match attribute_revision(forge, repo, deployment, merge_bot_login).await {
            Ok(group) => group,
            Err(err) => {
                emit_attribution_failed(&repo.to_string(), &err);
                return Err(err);
            }
        };

        looked_up.insert(deployment.revision.as_str());
        groups.push(group);
    }

    Ok(groups)
}

async fn attribute_revision(
    forge: &dyn Forge,
    repo: &RepoRef,
    deployment: &DeployedRevision,
    merge_bot_login: &str,
) -> Result<CulpritGroup> {
    let revision = deployment.revision.as_str();
    let mut sightings = Sightings::new();
    let mut links = Vec::new();

    let pulls = PULLS_POLICY
        .apply("closed_pull_requests", forge.closed_pull_requests(repo).await)?
        .unwrap_or_default();

    // Single page only: a bounded look-back, not an exhaustive search.
    let merged_by = pulls
        .iter()
        .find(|pr| pr.merge_commit_sha.as_deref() == Some(revision));
    if let Some(pr) = merged_by {
        links.push(pr.html_url.clone());
        record_pull_request(forge, repo, pr, &mut sightings).await?;
    }

    let commit = COMMIT_POLICY.apply("commit", forge.commit(repo, revision).await)?;
    if let Some(commit) = commit {
        record_commit(&commit, merge_bot_login, &mut sightings);
    }

    let participants = sightings.merge();
    METRICS.inc_revisions_attributed();
    emit_revision_attributed(&deployment.name, revision, participants.len(), links.len());

    Ok(CulpritGroup {
        environment_name: deployment.name.clone(),
        participants,
        pull_request_links: links,
    })
}

/// Author, distinct committer, assignees, then every commenter.
async fn record_pull_request(
    forge: &dyn Forge,
    repo: &RepoRef,
    pr: &PullRequest,
    sightings: &mut Sightings,
) -> Result<()> {
    let author = pr.user.as_ref();
    if let Some(author) = author {
        sightings.push(Role::Author, author.clone());
    }
    if let Some(committer) = &pr.committer {
        if Some(committer) != author {
            sightings.push(Role::Committer, committer.clone());
        }
    }
    for assignee in &pr.assignees {
        sightings.push(Role::Assignee, assignee.clone());
    }

    let entries = COMMENTS_POLICY
        .apply("issue_comments", forge.issue_comments(repo, pr.number).await)?
        .unwrap_or_default();
    for entry in entries {
        if let Some(comment) = COMMENT_ENTRY_POLICY.apply("issue_comment", entry)? {
            sightings.push(Role::Commenter, comment.user);
        }
    }

    Ok(())
}

/// Commit author and committer.
///
/// A committer equal to the merge bot means the PR was merged with the web
/// button: the author is credited as committer too and the bot never shows.
fn record_commit(commit: &CommitResource, merge_bot_login: &str, sightings: &mut Sightings) {
    let author = commit.author.as_ref();
    if let Some(author) = author {
        sightings.push_unless_present(Role::Author, author.clone());
    }

    let Some(committer) = &commit.committer else {
        return;
    };
    if committer.login == merge_bot_login {
        if let Some(author) = author {
            sightings.push(Role::Committer, author.clone());
        }
    } else if Some(committer) != author {
        sightings.push(Role::Committer, committer.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::ForgeUser;

    fn commit(author: Option<&str>, committer: Option<&str>) -> CommitResource {
        CommitResource {
            sha: "abc1234".to_string(),
            author: author.map(ForgeUser::new),
            committer: committer.map(ForgeUser::new),
        }
    }

    fn labels(sightings: Sightings) -> Vec<(String, String)> {
        sightings
            .merge()
            .into_iter()
            .map(|p| (p.login().to_string(), p.label()))
            .collect()
    }

    #[test]
    fn web_flow_committer_relabels_author() {
        let mut s = Sightings::new();
        record_commit(&commit(Some("alice"), Some("web-flow")), "web-flow", &mut s);
        assert_eq!(
            labels(s),
            vec![("alice".to_string(), "Author & Committer".to_string())]
        );
    }

    #[test]
    fn distinct_committer_is_added() {
        let mut s = Sightings::new();
        record_commit(&commit(Some("alice"), Some("bob")), "web-flow", &mut s);
        assert_eq!(
            labels(s),
            vec![
                ("alice".to_string(), "Author".to_string()),
                ("bob".to_string(), "Committer".to_string()),
            ]
        );
    }

    #[test]
    fn same_committer_as_author_adds_nothing() {
        let mut s = Sightings::new();
        record_commit(&commit(Some("alice"), Some("alice")), "web-flow", &mut s);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn commit_without_linked_author_keeps_committer() {
        let mut s = Sightings::new();
        record_commit(&commit(None, Some("bob")), "web-flow", &mut s);
        assert_eq!(labels(s), vec![("bob".to_string(), "Committer".to_string())]);

        let mut s = Sightings::new();
        record_commit(&commit(None, Some("web-flow")), "web-flow", &mut s);
        assert!(s.is_empty());
    }

    #[test]
    fn deployed_revision_accepts_sha_alias() {
        let d: DeployedRevision =
            serde_json::from_str(r#"{"name": "prod", "sha": "abc1234"}"#).unwrap();
        assert_eq!(d.revision, "abc1234");
    }
}
