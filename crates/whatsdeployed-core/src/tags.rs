//! Tag index: revision → tag name.

use std::collections::BTreeMap;

use crate::forge::{CallPolicy, Forge, RepoRef};
use crate::metrics::METRICS;
use crate::obs::emit_tags_indexed;

/// Revision (commit sha) → tag name. Sorted so serialized output is stable.
pub type TagIndex = BTreeMap<String, String>;

/// Most pages walked per index; a `next` link cycle stops here.
pub const MAX_TAG_PAGES: usize = 50;

/// A failed page ends pagination but keeps everything gathered before it.
const TAG_PAGE_POLICY: CallPolicy = CallPolicy::DegradeToEmpty;

/// Walk the forge's tag listing (newest first) following `rel="next"` links.
///
/// Best effort: never fails. A timeout or error on any page stops the walk
/// and returns what earlier pages produced, which is an empty map when the
/// first page already fails. At most [`MAX_TAG_PAGES`] pages are fetched.
/// Duplicate revisions keep the last tag seen.
pub async fn index_tags(forge: &dyn Forge, repo: &RepoRef) -> TagIndex {
    let mut tags = TagIndex::new();
    let mut page_url: Option<String> = None;
    let mut pages = 0usize;
    let mut complete = false;

    loop {
        let result = forge.tags_page(repo, page_url.as_deref()).await;
        let page = match TAG_PAGE_POLICY.apply("tags_page", result) {
            Ok(Some(page)) => page,
            // DegradeToEmpty never propagates; both arms end the walk.
            Ok(None) | Err(_) => break,
        };
        pages += 1;
        METRICS.inc_tag_pages();

        for tag in page.items {
            tags.insert(tag.commit.sha, tag.name);
        }

        match page.next {
            Some(_) if pages == MAX_TAG_PAGES => break,
            Some(next) => page_url = Some(next),
            None => {
                complete = true;
                break;
            }
        }
    }

    emit_tags_indexed(&repo.to_string(), pages, tags.len(), complete);
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeployError;
    use crate::fakes::FakeForge;
    use crate::forge::ForgeTag;

    fn repo() -> RepoRef {
        RepoRef::new("mozilla", "bedrock")
    }

    #[tokio::test]
    async fn follows_next_links_until_exhausted() {
        let forge = FakeForge::new()
            .with_tag_page(vec![ForgeTag::new("v3", "ccc"), ForgeTag::new("v2", "bbb")])
            .with_tag_page(vec![ForgeTag::new("v1", "aaa")]);

        let tags = index_tags(&forge, &repo()).await;

        assert_eq!(tags.len(), 3);
        assert_eq!(tags["aaa"], "v1");
        assert_eq!(tags["ccc"], "v3");
        assert_eq!(forge.calls("tags_page"), 2);
    }

    #[tokio::test]
    async fn timeout_on_later_page_keeps_earlier_pages() {
        let forge = FakeForge::new()
            .with_tag_page(vec![ForgeTag::new("v2", "bbb")])
            .with_tag_page_error(DeployError::UpstreamTimeout {
                url: "https://api.github.com/page2".to_string(),
            });

        let tags = index_tags(&forge, &repo()).await;

        assert_eq!(tags.len(), 1);
        assert_eq!(tags["bbb"], "v2");
    }

    #[tokio::test]
    async fn failure_on_first_page_yields_empty_index() {
        let forge = FakeForge::new().with_tag_page_error(DeployError::UpstreamHttpError {
            url: "https://api.github.com/repos/mozilla/bedrock/tags".to_string(),
            status: 404,
        });

        let tags = index_tags(&forge, &repo()).await;
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn stops_after_max_pages() {
        let mut forge = FakeForge::new();
        for n in 0..MAX_TAG_PAGES + 5 {
            forge = forge.with_tag_page(vec![ForgeTag::new(format!("v{n}"), format!("sha{n}"))]);
        }

        let tags = index_tags(&forge, &repo()).await;

        assert_eq!(forge.calls("tags_page"), MAX_TAG_PAGES);
        assert_eq!(tags.len(), MAX_TAG_PAGES);
        assert!(!tags.contains_key(&format!("sha{MAX_TAG_PAGES}")));
    }

    #[tokio::test]
    async fn duplicate_revision_keeps_last_tag() {
        let forge = FakeForge::new()
            .with_tag_page(vec![ForgeTag::new("v2-rc", "abc")])
            .with_tag_page(vec![ForgeTag::new("v2", "abc")]);

        let tags = index_tags(&forge, &repo()).await;
        assert_eq!(tags["abc"], "v2");
    }
}
