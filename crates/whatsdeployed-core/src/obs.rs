//! Structured observability hooks for resolution and attribution requests.
//!
//! This module provides:
//! - Request-scoped tracing spans via `RequestSpan`
//! - Emission functions for the pipeline's lifecycle events
//!
//! Events are emitted at `info!` level (failures at `warn!`), so the usual
//! `RUST_LOG` filtering applies.

use tracing::{info, warn};

/// Request-scoped tracing span tagged with a fresh request id.
///
/// Pipeline futures are instrumented with it rather than entering it, so the
/// span follows the future across `.await` points and worker threads.
///
/// # Example
///
/// ```ignore
/// let request = RequestSpan::new("shas", &repo);
/// resolve(&forge, &markers, &repo, &envs).instrument(request.span()).await
/// ```
pub struct RequestSpan {
    request_id: String,
    span: tracing::Span,
}

impl RequestSpan {
    pub fn new(operation: &str, repo: &dyn std::fmt::Display) -> Self {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!(
            "whatsdeployed.request",
            request_id = %request_id,
            operation = %operation,
            repo = %repo,
        );
        Self { request_id, span }
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn span(&self) -> tracing::Span {
        self.span.clone()
    }
}

/// Emit event: resolution started for `environments` entries.
pub fn emit_resolve_started(repo: &str, environments: usize) {
    info!(event = "resolve.started", repo = %repo, environments = environments);
}

/// Emit event: one environment resolved to a revision.
pub fn emit_environment_resolved(name: &str, revision: &str) {
    info!(event = "resolve.environment", name = %name, revision = %revision);
}

/// Emit event: resolution finished.
pub fn emit_resolve_finished(repo: &str, deployments: usize, tags: usize) {
    info!(
        event = "resolve.finished",
        repo = %repo,
        deployments = deployments,
        tags = tags,
    );
}

/// Emit event: resolution aborted (warning level).
pub fn emit_resolve_failed(repo: &str, error: &dyn std::fmt::Display) {
    warn!(event = "resolve.failed", repo = %repo, error = %error);
}

/// Emit event: tag index built.
pub fn emit_tags_indexed(repo: &str, pages: usize, tags: usize, complete: bool) {
    info!(
        event = "tags.indexed",
        repo = %repo,
        pages = pages,
        tags = tags,
        complete = complete,
    );
}

/// Emit event: a revision was skipped because an earlier entry looked it up.
pub fn emit_revision_memoized(name: &str, revision: &str) {
    info!(event = "culprits.memoized", name = %name, revision = %revision);
}

/// Emit event: one revision attributed.
pub fn emit_revision_attributed(name: &str, revision: &str, participants: usize, links: usize) {
    info!(
        event = "culprits.attributed",
        name = %name,
        revision = %revision,
        participants = participants,
        links = links,
    );
}

/// Emit event: attribution aborted (warning level).
pub fn emit_attribution_failed(repo: &str, error: &dyn std::fmt::Display) {
    warn!(event = "culprits.failed", repo = %repo, error = %error);
}
