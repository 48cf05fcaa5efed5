//! Shortlinks for saved environment setups.
//!
//! A setup is `owner`, `repo` and an ordered list of `(name, marker url)`
//! pairs, normally carried in the front-end's query string
//! (`/?owner=o&repo=r&name[]=stage&url[]=...`). A shortlink maps a short
//! code to one setup. Persistence is an external concern: the
//! [`ShortlinkStore`] trait is the contract and [`MemoryShortlinkStore`] is
//! the in-process implementation.

use std::sync::Mutex;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use reqwest::Url;
use serde::{Deserialize, Serialize};

/// Length of freshly minted codes.
pub const SHORTLINK_CODE_LEN: usize = 3;

/// Path prefix under which shortlinks are served.
pub const SHORTLINK_PREFIX: &str = "/s-";

const MAX_MINT_ATTEMPTS: usize = 10_000;

#[derive(Debug, thiserror::Error)]
pub enum ShortlinkError {
    #[error("invalid setup url: {0}")]
    InvalidSetupUrl(String),

    #[error("no free shortlink code after {0} attempts")]
    CodeSpaceExhausted(usize),

    #[error("shortlink storage failed: {0}")]
    Storage(String),
}

pub type ShortlinkResult<T> = std::result::Result<T, ShortlinkError>;

/// Owner, repo and the ordered `(name, url)` environment pairs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Setup {
    pub owner: String,
    pub repo: String,
    pub revisions: Vec<(String, String)>,
}

impl Setup {
    /// Front-end URL (`/?repo=..&owner=..&name[]=..&url[]=..`) for this setup.
    pub fn to_query_url(&self) -> String {
        let Ok(mut url) = Url::parse("http://localhost/") else {
            return "/".to_string();
        };
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("repo", &self.repo);
            query.append_pair("owner", &self.owner);
            for (name, _) in &self.revisions {
                query.append_pair("name[]", name);
            }
            for (_, marker) in &self.revisions {
                query.append_pair("url[]", marker);
            }
        }
        format!("/?{}", url.query().unwrap_or_default())
    }
}

/// A stored setup and its code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shortlink {
    pub code: String,
    #[serde(flatten)]
    pub setup: Setup,
}

impl Shortlink {
    /// `/s-<code>`
    pub fn path(&self) -> String {
        format!("{SHORTLINK_PREFIX}{}", self.code)
    }

    pub fn to_query_url(&self) -> String {
        self.setup.to_query_url()
    }
}

/// Read a setup back out of a front-end URL (absolute or path-only).
///
/// `name[]` and `url[]` are paired by position and must have equal counts.
pub fn parse_setup_url(raw: &str) -> ShortlinkResult<Setup> {
    let without_fragment = raw.split('#').next().unwrap_or_default();
    let query = without_fragment
        .split_once('?')
        .map(|(_, q)| q)
        .unwrap_or_default();
    let url = Url::parse(&format!("http://localhost/?{query}"))
        .map_err(|e| ShortlinkError::InvalidSetupUrl(e.to_string()))?;

    let mut owner = None;
    let mut repo = None;
    let mut names = Vec::new();
    let mut urls = Vec::new();
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "owner" if owner.is_none() => owner = Some(value.into_owned()),
            "repo" if repo.is_none() => repo = Some(value.into_owned()),
            "name[]" => names.push(value.into_owned()),
            "url[]" => urls.push(value.into_owned()),
            _ => {}
        }
    }

    let owner = owner.ok_or_else(|| ShortlinkError::InvalidSetupUrl("missing owner".into()))?;
    let repo = repo.ok_or_else(|| ShortlinkError::InvalidSetupUrl("missing repo".into()))?;
    if names.len() != urls.len() {
        return Err(ShortlinkError::InvalidSetupUrl(format!(
            "{} names but {} urls",
            names.len(),
            urls.len()
        )));
    }

    Ok(Setup {
        owner,
        repo,
        revisions: names.into_iter().zip(urls).collect(),
    })
}

/// Extract codes from `/s-<code>` paths, ignoring anything else.
pub fn codes_from_paths(paths: &str) -> Vec<String> {
    paths
        .split(',')
        .filter_map(|p| p.trim().strip_prefix(SHORTLINK_PREFIX))
        .filter(|code| !code.is_empty())
        .map(str::to_string)
        .collect()
}

/// Shortlink persistence contract.
///
/// Guarantees:
/// - `create_or_get` returns the existing code for an identical setup.
/// - Codes are unique across setups.
#[async_trait]
pub trait ShortlinkStore: Send + Sync {
    /// Return the code for `setup`, minting one if it is new.
    async fn create_or_get(&self, setup: &Setup) -> ShortlinkResult<String>;

    /// Look up a code. `Ok(None)` if unknown.
    async fn resolve(&self, code: &str) -> ShortlinkResult<Option<Shortlink>>;

    /// Look up several codes, in request order, omitting unknown ones.
    async fn resolve_many(&self, codes: &[String]) -> ShortlinkResult<Vec<Shortlink>>;
}

/// In-memory store backed by a `Vec<Shortlink>`.
#[derive(Debug, Default)]
pub struct MemoryShortlinkStore {
    links: Mutex<Vec<Shortlink>>,
}

impl MemoryShortlinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.links.lock().map(|links| links.len()).unwrap_or(0)
    }

    fn links(&self) -> ShortlinkResult<std::sync::MutexGuard<'_, Vec<Shortlink>>> {
        self.links
            .lock()
            .map_err(|e| ShortlinkError::Storage(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn random_code(len: usize) -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}

fn mint_code(existing: &[Shortlink]) -> ShortlinkResult<String> {
    for _ in 0..MAX_MINT_ATTEMPTS {
        let code = random_code(SHORTLINK_CODE_LEN);
        if !existing.iter().any(|l| l.code == code) {
            return Ok(code);
        }
    }
    Err(ShortlinkError::CodeSpaceExhausted(MAX_MINT_ATTEMPTS))
}

#[async_trait]
impl ShortlinkStore for MemoryShortlinkStore {
    async fn create_or_get(&self, setup: &Setup) -> ShortlinkResult<String> {
        let mut links = self.links()?;
        if let Some(existing) = links.iter().find(|l| &l.setup == setup) {
            return Ok(existing.code.clone());
        }

        let code = mint_code(&links)?;
        tracing::info!(event = "shortlink.created", code = %code, owner = %setup.owner, repo = %setup.repo);
        links.push(Shortlink {
            code: code.clone(),
            setup: setup.clone(),
        });
        Ok(code)
    }

    async fn resolve(&self, code: &str) -> ShortlinkResult<Option<Shortlink>> {
        let links = self.links()?;
        Ok(links.iter().find(|l| l.code == code).cloned())
    }

    async fn resolve_many(&self, codes: &[String]) -> ShortlinkResult<Vec<Shortlink>> {
        let links = self.links()?;
        Ok(codes
            .iter()
            .filter_map(|code| links.iter().find(|l| &l.code == code).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Setup {
        Setup {
            owner: "mozilla".to_string(),
            repo: "bedrock".to_string(),
            revisions: vec![
                ("stage".to_string(), "https://stage.example.com/rev".to_string()),
                ("prod".to_string(), "https://prod.example.com/rev?x=1".to_string()),
            ],
        }
    }

    #[test]
    fn query_url_round_trips_through_parser() {
        let url = setup().to_query_url();
        assert!(url.starts_with("/?repo=bedrock&owner=mozilla&name%5B%5D=stage"));
        assert_eq!(parse_setup_url(&url).unwrap(), setup());
    }

    #[test]
    fn parse_accepts_absolute_urls_and_fragments() {
        let raw = "https://whatsdeployed.io/?owner=o&repo=r&name[]=dev&url[]=https%3A%2F%2Fdev.example.com#top";
        let parsed = parse_setup_url(raw).unwrap();
        assert_eq!(parsed.owner, "o");
        assert_eq!(
            parsed.revisions,
            vec![("dev".to_string(), "https://dev.example.com".to_string())]
        );
    }

    #[test]
    fn parse_rejects_missing_owner_and_mismatched_pairs() {
        assert!(matches!(
            parse_setup_url("/?repo=r"),
            Err(ShortlinkError::InvalidSetupUrl(_))
        ));
        assert!(matches!(
            parse_setup_url("/?owner=o&repo=r&name[]=a&name[]=b&url[]=x"),
            Err(ShortlinkError::InvalidSetupUrl(_))
        ));
    }

    #[test]
    fn codes_from_paths_skips_foreign_entries() {
        assert_eq!(
            codes_from_paths("/s-abc, /s-XyZ,/other,/s-"),
            vec!["abc".to_string(), "XyZ".to_string()]
        );
    }

    #[test]
    fn random_codes_are_alphanumeric() {
        let code = random_code(SHORTLINK_CODE_LEN);
        assert_eq!(code.len(), 3);
        assert!(code.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[tokio::test]
    async fn create_or_get_is_idempotent_per_setup() {
        let store = MemoryShortlinkStore::new();
        let a = store.create_or_get(&setup()).await.unwrap();
        let b = store.create_or_get(&setup()).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(store.len(), 1);

        let mut other = setup();
        other.revisions.reverse();
        let c = store.create_or_get(&other).await.unwrap();
        assert_ne!(a, c);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn resolve_and_resolve_many() {
        let store = MemoryShortlinkStore::new();
        let code = store.create_or_get(&setup()).await.unwrap();

        let link = store.resolve(&code).await.unwrap().unwrap();
        assert_eq!(link.setup, setup());
        assert_eq!(link.path(), format!("/s-{code}"));

        assert!(store.resolve("nope").await.unwrap().is_none());

        let many = store
            .resolve_many(&["nope".to_string(), code.clone()])
            .await
            .unwrap();
        assert_eq!(many.len(), 1);
        assert_eq!(many[0].code, code);
    }
}
