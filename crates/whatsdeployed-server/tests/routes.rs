use std::sync::Arc;

use axum::extract::{Form, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::Json;
use serde_json::{json, Value};
use tracing_test::traced_test;

use whatsdeployed_core::fakes::{FakeForge, FakeMarkerSource};
use whatsdeployed_core::forge::{CommitResource, ForgeTag, ForgeUser};
use whatsdeployed_core::{
    DeployError, DeployedRevision, EnvironmentSpec, MemoryShortlinkStore, ShortlinkStore,
};
use whatsdeployed_server::{
    culprits, github_api, health, router, shas, shortened, shortenit, shortlink_redirect,
    AppState, CulpritsRequest, ShasRequest, ShortenForm, ShortenedQuery,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DEV: &str = "https://dev.example.com/__version__";
const REV: &str = "1111111aaaaaaa";

fn state_with(forge: FakeForge, markers: FakeMarkerSource) -> Arc<AppState> {
    Arc::new(AppState {
        forge: Arc::new(forge),
        markers: Arc::new(markers),
        shortlinks: Arc::new(MemoryShortlinkStore::new()),
        merge_bot_login: "web-flow".to_string(),
    })
}

fn empty_state() -> Arc<AppState> {
    state_with(FakeForge::new(), FakeMarkerSource::new())
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

// ---------------------------------------------------------------------------
// /shas and /culprits
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shas_returns_deployments_and_tags() {
    let state = state_with(
        FakeForge::new().with_tag_page(vec![ForgeTag::new("v1.0", REV)]),
        FakeMarkerSource::new().with_marker(DEV, REV),
    );
    let body = ShasRequest {
        owner: "mozilla".to_string(),
        repo: "bedrock".to_string(),
        deployments: vec![EnvironmentSpec::new("dev", DEV)],
    };

    let response = shas(State(state), Json(body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({
            "deployments": [{"name": "dev", "revision": REV, "url": DEV}],
            "tags": {REV: "v1.0"},
        })
    );
}

#[traced_test]
#[tokio::test]
async fn shas_pipeline_error_is_200_with_message() {
    let state = state_with(
        FakeForge::new(),
        FakeMarkerSource::new().with_status(DEV, 500, "boom"),
    );
    let body = ShasRequest {
        owner: "mozilla".to_string(),
        repo: "bedrock".to_string(),
        deployments: vec![EnvironmentSpec::new("dev", DEV)],
    };

    let response = shas(State(state), Json(body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"error": format!("500 trying to load {DEV}")})
    );
}

#[tokio::test]
async fn culprits_returns_groups() {
    let forge = FakeForge::new().with_commit(CommitResource {
        sha: REV.to_string(),
        author: Some(ForgeUser::new("alice")),
        committer: Some(ForgeUser::new("web-flow")),
    });
    let state = state_with(forge, FakeMarkerSource::new());
    let body = CulpritsRequest {
        owner: "mozilla".to_string(),
        repo: "bedrock".to_string(),
        deployments: vec![DeployedRevision::new("prod", REV)],
    };

    let response = culprits(State(state), Json(body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["culprits"][0]["name"], "prod");
    assert_eq!(
        json["culprits"][0]["participants"][0]["label"],
        "Author & Committer"
    );
}

#[traced_test]
#[tokio::test]
async fn culprits_forge_failure_is_200_with_message() {
    let state = state_with(
        FakeForge::new().with_pulls_error(DeployError::UpstreamTimeout {
            url: "https://api.github.com/repos/mozilla/bedrock/pulls".to_string(),
        }),
        FakeMarkerSource::new(),
    );
    let body = CulpritsRequest {
        owner: "mozilla".to_string(),
        repo: "bedrock".to_string(),
        deployments: vec![DeployedRevision::new("prod", REV)],
    };

    let response = culprits(State(state), Json(body)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["error"]
        .as_str()
        .expect("error string")
        .starts_with("Timeout error trying to load"));
}

// ---------------------------------------------------------------------------
// Shortlinks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shorten_then_expand_then_redirect() {
    let state = empty_state();
    let setup_url = "https://whatsdeployed.io/?owner=mozilla&repo=bedrock&name[]=dev&url[]=https%3A%2F%2Fdev.example.com";

    let response = shortenit(
        State(state.clone()),
        Form(ShortenForm {
            url: setup_url.to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let path = body_json(response).await["url"]
        .as_str()
        .expect("url")
        .to_string();
    assert!(path.starts_with("/s-"));

    let response = shortened(
        State(state.clone()),
        Query(ShortenedQuery {
            urls: Some(path.clone()),
        }),
    )
    .await;
    let json = body_json(response).await;
    assert_eq!(json["environments"][0]["owner"], "mozilla");
    assert_eq!(
        json["environments"][0]["revisions"],
        json!([["dev", "https://dev.example.com"]])
    );

    let link = path.trim_start_matches('/').to_string();
    let response = shortlink_redirect(State(state), Path(link)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    let location = response.headers()[header::LOCATION].to_str().expect("ascii");
    assert!(location.starts_with("/?repo=bedrock&owner=mozilla"));
}

#[tokio::test]
async fn shortening_twice_gives_same_path() {
    let state = empty_state();
    let form = || {
        Form(ShortenForm {
            url: "/?owner=o&repo=r&name[]=dev&url[]=x".to_string(),
        })
    };

    let a = body_json(shortenit(State(state.clone()), form()).await).await;
    let b = body_json(shortenit(State(state.clone()), form()).await).await;

    assert_eq!(a, b);
}

#[tokio::test]
async fn shortenit_rejects_unparseable_setup() {
    let response = shortenit(
        State(empty_state()),
        Form(ShortenForm {
            url: "/?repo=r".to_string(),
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn shortened_requires_urls() {
    let response = shortened(State(empty_state()), Query(ShortenedQuery { urls: None })).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn unknown_shortlink_is_404() {
    let state = empty_state();
    let response = shortlink_redirect(State(state.clone()), Path("s-zzz".to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = shortlink_redirect(State(state), Path("favicon.ico".to_string())).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn redirect_to_preexisting_shortlink() {
    let state = empty_state();
    let setup = whatsdeployed_core::parse_setup_url("/?owner=o&repo=r&name[]=dev&url[]=x")
        .expect("setup");
    let code = state.shortlinks.create_or_get(&setup).await.expect("create");

    let response = shortlink_redirect(State(state), Path(format!("s-{code}"))).await;
    assert_eq!(response.status(), StatusCode::FOUND);
}

// ---------------------------------------------------------------------------
// GitHub pass-through and health
// ---------------------------------------------------------------------------

fn params(pairs: &[(&str, &str)]) -> Query<Vec<(String, String)>> {
    Query(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

#[tokio::test]
async fn github_commits_passthrough() {
    let listing = json!([{"sha": REV}]);
    let state = state_with(
        FakeForge::new().with_commit_listing(listing.clone()),
        FakeMarkerSource::new(),
    );

    let response = github_api(
        State(state),
        Path("commits".to_string()),
        params(&[("owner", "mozilla"), ("repo", "bedrock"), ("per_page", "5")]),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, listing);
}

#[tokio::test]
async fn github_commits_requires_owner_and_repo() {
    let response = github_api(
        State(empty_state()),
        Path("commits".to_string()),
        params(&[("repo", "bedrock")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = github_api(
        State(empty_state()),
        Path("commits".to_string()),
        params(&[("owner", "mozilla")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn github_passthrough_mirrors_forge_status() {
    // No listing configured: the fake answers 404.
    let response = github_api(
        State(empty_state()),
        Path("commits".to_string()),
        params(&[("owner", "mozilla"), ("repo", "bedrock")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn github_passthrough_only_serves_commits() {
    let response = github_api(
        State(empty_state()),
        Path("pulls".to_string()),
        params(&[("owner", "mozilla"), ("repo", "bedrock")]),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_reports_version() {
    let Json(body) = health().await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], whatsdeployed_core::VERSION);
}

#[test]
fn router_builds() {
    let state = AppState {
        forge: Arc::new(FakeForge::new()),
        markers: Arc::new(FakeMarkerSource::new()),
        shortlinks: Arc::new(MemoryShortlinkStore::new()),
        merge_bot_login: "web-flow".to_string(),
    };
    let _app = router(state);
}
