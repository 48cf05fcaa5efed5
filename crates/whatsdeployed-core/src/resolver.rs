//! Deployment resolution: environment version markers → revisions.
//!
//! Fail-fast: the first environment that cannot be fetched or parsed aborts
//! the whole resolution. A comparison with one environment missing is
//! meaningless, so no partial list is ever returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::forge::{Forge, MarkerSource, RepoRef};
use crate::obs::{
    emit_environment_resolved, emit_resolve_failed, emit_resolve_finished, emit_resolve_started,
};
use crate::revision::extract_revision;
use crate::tags::{index_tags, TagIndex};

/// Query parameter appended to every version-marker fetch.
pub const CACHE_BUST_PARAM: &str = "cachescramble";

/// A named environment and the URL of its version marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSpec {
    pub name: String,
    /// Empty means "not deployed here", the entry is skipped.
    #[serde(default)]
    pub url: String,
}

impl EnvironmentSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        EnvironmentSpec {
            name: name.into(),
            url: url.into(),
        }
    }
}

/// Revision an environment was found to be running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedDeployment {
    pub name: String,
    pub revision: String,
    #[serde(rename = "url")]
    pub source_url: String,
}

/// Output of [`resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub deployments: Vec<ResolvedDeployment>,
    pub tags: TagIndex,
}

/// Append the cache-busting parameter (`?` or `&` as needed).
///
/// Version markers sit behind CDNs that cache aggressively; a stale copy
/// would report the wrong revision.
pub fn cache_busted_url(url: &str, now: DateTime<Utc>) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!(
        "{url}{separator}{CACHE_BUST_PARAM}={}.{:06}",
        now.timestamp(),
        now.timestamp_subsec_micros()
    )
}

/// Resolve every environment, then index the repository's tags.
///
/// Tag indexing only runs once all environments resolved and can never fail
/// the call.
pub async fn resolve(
    forge: &dyn Forge,
    markers: &dyn MarkerSource,
    repo: &RepoRef,
    environments: &[EnvironmentSpec],
) -> Result<Resolution> {
    let repo_name = repo.to_string();
    emit_resolve_started(&repo_name, environments.len());

    let deployments = match resolve_deployments(markers, environments).await {
        Ok(deployments) => deployments,
        Err(err) => {
            emit_resolve_failed(&repo_name, &err);
            return Err(err);
        }
    };

    let tags = index_tags(forge, repo).await;

    emit_resolve_finished(&repo_name, deployments.len(), tags.len());
    Ok(Resolution { deployments, tags })
}

/// Resolve environments in input order, skipping those without a URL.
pub async fn resolve_deployments(
    markers: &dyn MarkerSource,
    environments: &[EnvironmentSpec],
) -> Result<Vec<ResolvedDeployment>> {
    let mut deployments = Vec::with_capacity(environments.len());

    for env in environments {
        let url = env.url.trim();
        if url.is_empty() {
            continue;
        }

        // Errors name the configured URL, not the cache-busted one.
        let response = markers
            .fetch_marker(&cache_busted_url(url, Utc::now()))
            .await
            .map_err(|err| err.for_url(url))?;
        if response.status != 200 {
            return Err(DeployError::UpstreamHttpError {
                url: url.to_string(),
                status: response.status,
            });
        }

        let revision = extract_revision(&response.body, url)?;
        emit_environment_resolved(&env.name, &revision);

        deployments.push(ResolvedDeployment {
            name: env.name.clone(),
            revision,
            source_url: url.to_string(),
        });
    }

    Ok(deployments)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64, micros: u32) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, micros * 1_000).unwrap()
    }

    #[test]
    fn cache_buster_uses_question_mark_without_query() {
        assert_eq!(
            cache_busted_url("https://stage.example.com/__version__", at(1_700_000_000, 250)),
            "https://stage.example.com/__version__?cachescramble=1700000000.000250"
        );
    }

    #[test]
    fn cache_buster_uses_ampersand_with_query() {
        assert_eq!(
            cache_busted_url("https://example.com/rev?env=prod", at(12, 0)),
            "https://example.com/rev?env=prod&cachescramble=12.000000"
        );
    }

    #[test]
    fn cache_buster_changes_over_time() {
        let url = "https://example.com/rev";
        assert_ne!(
            cache_busted_url(url, at(100, 1)),
            cache_busted_url(url, at(100, 2))
        );
    }

    #[test]
    fn resolved_deployment_serializes_source_as_url() {
        let d = ResolvedDeployment {
            name: "prod".to_string(),
            revision: "abc1234".to_string(),
            source_url: "https://prod.example.com/v".to_string(),
        };
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["url"], "https://prod.example.com/v");
        assert_eq!(json["revision"], "abc1234");
    }

    #[test]
    fn environment_spec_url_defaults_to_empty() {
        let env: EnvironmentSpec = serde_json::from_str(r#"{"name": "dev"}"#).unwrap();
        assert_eq!(env.url, "");
    }
}
