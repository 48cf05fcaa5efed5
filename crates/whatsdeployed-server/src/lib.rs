//! whatsdeployed HTTP service
//!
//! Thin axum layer over `whatsdeployed-core`: decode the request, run one
//! pipeline call inside a request span, encode the result. Pipeline failures
//! are answered as `200 {"error": message}`, which is what the front-end
//! expects; only malformed requests get 4xx statuses.

use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::Instrument;

use whatsdeployed_core::metrics::METRICS;
use whatsdeployed_core::obs::RequestSpan;
use whatsdeployed_core::shortlink::codes_from_paths;
use whatsdeployed_core::{
    attribute, parse_setup_url, resolve, CulpritGroup, DeployError, DeployedRevision,
    EnvironmentSpec, Forge, MarkerSource, RepoRef, ShortlinkStore, VERSION,
};

/// Shared handles for every request.
#[derive(Clone)]
pub struct AppState {
    pub forge: Arc<dyn Forge>,
    pub markers: Arc<dyn MarkerSource>,
    pub shortlinks: Arc<dyn ShortlinkStore>,
    pub merge_bot_login: String,
}

/// Build the service router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/shas", post(shas))
        .route("/culprits", post(culprits))
        .route("/shortenit", post(shortenit))
        .route("/shortened", get(shortened))
        .route("/githubapi/:thing", get(github_api))
        .route("/health", get(health))
        .route("/:link", get(shortlink_redirect))
        .with_state(Arc::new(state))
}

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ShasRequest {
    pub owner: String,
    pub repo: String,
    pub deployments: Vec<EnvironmentSpec>,
}

#[derive(Debug, Deserialize)]
pub struct CulpritsRequest {
    pub owner: String,
    pub repo: String,
    pub deployments: Vec<DeployedRevision>,
}

#[derive(Debug, Serialize)]
struct CulpritsResponse {
    culprits: Vec<CulpritGroup>,
}

#[derive(Debug, Deserialize)]
pub struct ShortenForm {
    pub url: String,
}

#[derive(Debug, Deserialize)]
pub struct ShortenedQuery {
    pub urls: Option<String>,
}

#[derive(Debug, Serialize)]
struct ShortenedEnvironment {
    owner: String,
    repo: String,
    revisions: Vec<(String, String)>,
    url: String,
}

fn error_body(message: impl std::fmt::Display) -> Json<serde_json::Value> {
    Json(json!({ "error": message.to_string() }))
}

fn status_error(status: StatusCode, message: impl std::fmt::Display) -> Response {
    (status, error_body(message)).into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// `POST /shas`: resolve every environment's revision plus the tag index.
pub async fn shas(State(state): State<Arc<AppState>>, Json(body): Json<ShasRequest>) -> Response {
    let repo = RepoRef::new(body.owner, body.repo);
    let request = RequestSpan::new("shas", &repo);

    let result = resolve(
        state.forge.as_ref(),
        state.markers.as_ref(),
        &repo,
        &body.deployments,
    )
    .instrument(request.span())
    .await;
    METRICS.flush();

    match result {
        Ok(resolution) => Json(resolution).into_response(),
        Err(err) => error_body(err).into_response(),
    }
}

/// `POST /culprits`: attribute the people behind each deployed revision.
pub async fn culprits(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CulpritsRequest>,
) -> Response {
    let repo = RepoRef::new(body.owner, body.repo);
    let request = RequestSpan::new("culprits", &repo);

    let result = attribute(
        state.forge.as_ref(),
        &repo,
        &body.deployments,
        &state.merge_bot_login,
    )
    .instrument(request.span())
    .await;
    METRICS.flush();

    match result {
        Ok(culprits) => Json(CulpritsResponse { culprits }).into_response(),
        Err(err) => error_body(err).into_response(),
    }
}

/// `POST /shortenit`: store the setup in `url` and answer its `/s-<code>` path.
pub async fn shortenit(
    State(state): State<Arc<AppState>>,
    Form(form): Form<ShortenForm>,
) -> Response {
    let setup = match parse_setup_url(&form.url) {
        Ok(setup) => setup,
        Err(err) => return status_error(StatusCode::BAD_REQUEST, err),
    };

    match state.shortlinks.create_or_get(&setup).await {
        Ok(code) => Json(json!({ "url": format!("/s-{code}") })).into_response(),
        Err(err) => {
            tracing::error!(event = "shortlink.create_failed", error = %err);
            status_error(StatusCode::INTERNAL_SERVER_ERROR, err)
        }
    }
}

/// `GET /shortened?urls=/s-a,/s-b`: expand known shortlinks.
pub async fn shortened(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ShortenedQuery>,
) -> Response {
    let Some(urls) = query.urls.filter(|u| !u.is_empty()) else {
        return status_error(StatusCode::BAD_REQUEST, "No 'urls'");
    };

    let links = match state.shortlinks.resolve_many(&codes_from_paths(&urls)).await {
        Ok(links) => links,
        Err(err) => return status_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    };

    let environments: Vec<ShortenedEnvironment> = links
        .into_iter()
        .map(|link| {
            let url = link.setup.to_query_url();
            ShortenedEnvironment {
                owner: link.setup.owner,
                repo: link.setup.repo,
                revisions: link.setup.revisions,
                url,
            }
        })
        .collect();

    Json(json!({ "environments": environments })).into_response()
}

/// `GET /s-<code>`: redirect to the stored setup.
pub async fn shortlink_redirect(
    State(state): State<Arc<AppState>>,
    Path(link): Path<String>,
) -> Response {
    let Some(code) = link.strip_prefix("s-").filter(|c| !c.is_empty()) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    match state.shortlinks.resolve(code).await {
        Ok(Some(shortlink)) => (
            StatusCode::FOUND,
            [(header::LOCATION, shortlink.setup.to_query_url())],
        )
            .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => status_error(StatusCode::INTERNAL_SERVER_ERROR, err),
    }
}

/// `GET /githubapi/commits?owner=..&repo=..`: authenticated pass-through so
/// browsers can list commits without their own token.
pub async fn github_api(
    State(state): State<Arc<AppState>>,
    Path(thing): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    if thing != "commits" {
        return StatusCode::NOT_FOUND.into_response();
    }

    let mut owner = None;
    let mut repo = None;
    let mut forwarded = Vec::with_capacity(params.len());
    for (key, value) in params {
        match key.as_str() {
            "owner" => owner = Some(value),
            "repo" => repo = Some(value),
            _ => forwarded.push((key, value)),
        }
    }
    let Some(owner) = owner.filter(|o| !o.is_empty()) else {
        return status_error(StatusCode::BAD_REQUEST, "No 'owner'");
    };
    let Some(repo) = repo.filter(|r| !r.is_empty()) else {
        return status_error(StatusCode::BAD_REQUEST, "No 'repo'");
    };

    let repo = RepoRef::new(owner, repo);
    let request = RequestSpan::new("githubapi.commits", &repo);
    let result = state
        .forge
        .list_commits(&repo, &forwarded)
        .instrument(request.span())
        .await;

    match result {
        Ok(listing) => Json(listing).into_response(),
        Err(err) => status_error(upstream_status(&err), err),
    }
}

/// `GET /health`
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": VERSION }))
}

/// Status to mirror for a failed pass-through call.
fn upstream_status(err: &DeployError) -> StatusCode {
    match err {
        DeployError::UpstreamHttpError { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        DeployError::UpstreamTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        DeployError::InvalidPathSegment { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::BAD_GATEWAY,
    }
}
