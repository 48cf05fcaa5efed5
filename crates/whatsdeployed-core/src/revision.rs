//! Version-marker parsing.
//!
//! A version marker is whatever an environment serves to say what it runs:
//! either a bare revision id (`git rev-parse HEAD > version.txt`) or a
//! Dockerflow-style JSON envelope (`{"commit": "...", "version": "..."}`).

use crate::error::{DeployError, Result};

/// Shortest accepted bare revision (abbreviated git sha).
pub const MIN_REVISION_LEN: usize = 7;
/// Longest accepted bare revision (full sha-1).
pub const MAX_REVISION_LEN: usize = 40;

/// Derive a revision identifier from version-marker content.
///
/// JSON objects with a `commit` field win regardless of the field's length.
/// Anything else is accepted verbatim when its trimmed length is within
/// [`MIN_REVISION_LEN`]..=[`MAX_REVISION_LEN`]. Hex-ness is not checked.
pub fn extract_revision(content: &str, source_url: &str) -> Result<String> {
    let content = content.trim();

    if content.starts_with('{') && content.ends_with('}') {
        if let Some(commit) = commit_field(content) {
            return Ok(commit);
        }
    }

    let len = content.chars().count();
    if (MIN_REVISION_LEN..=MAX_REVISION_LEN).contains(&len) {
        return Ok(content.to_string());
    }

    Err(DeployError::UnrecognizedRevisionFormat {
        content: content.to_string(),
        url: source_url.to_string(),
    })
}

fn commit_field(content: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(content).ok()?;
    match value.as_object()?.get("commit")? {
        serde_json::Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}
