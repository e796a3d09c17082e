//! Pagination walker for item searches and collection item listings.
//!
//! Servers may keep sending a `next` link after the last real page, so the
//! walker trusts the running `returned` total against `matched` over the
//! link whenever the server reports `matched`.

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{ItemPage, Link, StacItem};
use crate::transport::SearchTransport;

/// One page request.
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    Get(String),
    Post { url: String, body: Value },
}

impl PageRequest {
    pub fn url(&self) -> &str {
        match self {
            Self::Get(url) => url,
            Self::Post { url, .. } => url,
        }
    }

    /// Request for the page behind `link`.
    pub fn follow(&self, link: &Link) -> Self {
        if !link.is_post() {
            return Self::Get(link.href.clone());
        }

        let body = match (&link.body, self) {
            (Some(next), Self::Post { body: previous, .. }) if link.merge => {
                merge_json(previous.clone(), next)
            }
            (Some(next), _) => next.clone(),
            (None, Self::Post { body, .. }) => body.clone(),
            (None, Self::Get(_)) => Value::Object(Default::default()),
        };
        Self::Post {
            url: link.href.clone(),
            body,
        }
    }
}

/// Shallow-merge the keys of `patch` into `base`.
fn merge_json(mut base: Value, patch: &Value) -> Value {
    match (base.as_object_mut(), patch.as_object()) {
        (Some(target), Some(source)) => {
            for (k, v) in source {
                target.insert(k.clone(), v.clone());
            }
            base
        }
        _ => patch.clone(),
    }
}

/// Why a walk ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkEnd {
    /// The last page had no `next` link.
    NoNextLink,
    /// The running `returned` total reached `matched`.
    MatchedReached,
    /// A page came back empty.
    EmptyPage,
    /// The server answered with a non-success status.
    HttpStatus(u16),
    /// The page cap was hit.
    MaxPages,
}

/// Items and bookkeeping from one walk.
#[derive(Debug, Clone)]
pub struct WalkOutcome {
    pub items: Vec<StacItem>,
    /// Pages requested, including one that failed with a status.
    pub pages: usize,
    pub returned: u64,
    pub matched: Option<u64>,
    pub end: WalkEnd,
    pub warnings: Vec<String>,
}

/// Follows `next` links from `first` until one of the stop conditions holds.
pub async fn walk(
    transport: &dyn SearchTransport,
    first: PageRequest,
    max_pages: usize,
) -> Result<WalkOutcome> {
    let mut request = first;
    let mut items = Vec::new();
    let mut pages = 0usize;
    let mut returned = 0u64;
    let mut matched = None;
    let mut warnings = Vec::new();

    let end = loop {
        if pages >= max_pages {
            let message = format!(
                "Stopped after {} pages at {} with more results pending",
                pages,
                request.url()
            );
            warn!("{}", message);
            warnings.push(message);
            break WalkEnd::MaxPages;
        }

        let response = match &request {
            PageRequest::Get(url) => transport.get(url).await?,
            PageRequest::Post { url, body } => transport.post(url, body).await?,
        };
        pages += 1;

        if !response.is_success() {
            let message = format!(
                "Catalog returned status {} for {}; keeping {} items from earlier pages",
                response.status,
                request.url(),
                items.len()
            );
            warn!(status = response.status, url = %request.url(), "{}", message);
            warnings.push(message);
            break WalkEnd::HttpStatus(response.status);
        }

        let page: ItemPage = serde_json::from_str(&response.body)?;
        if page.features.is_empty() {
            break WalkEnd::EmptyPage;
        }

        returned += page.returned();
        if page.matched().is_some() {
            matched = page.matched();
        }
        debug!(
            page = pages,
            features = page.features.len(),
            returned = returned,
            matched = ?matched,
            "Fetched page"
        );

        let next = page.next_link().map(|link| request.follow(link));
        items.extend(page.features);

        if matched.map_or(false, |m| returned >= m) {
            break WalkEnd::MatchedReached;
        }

        match next {
            Some(next) => request = next,
            None => break WalkEnd::NoNextLink,
        }
    };

    info!(
        pages = pages,
        items = items.len(),
        matched = ?matched,
        end = ?end,
        "Pagination finished"
    );

    Ok(WalkOutcome {
        items,
        pages,
        returned,
        matched,
        end,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn link(value: Value) -> Link {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_follow_get_link() {
        let first = PageRequest::Post {
            url: "https://x/search".into(),
            body: json!({"limit": 10}),
        };
        let next = first.follow(&link(json!({"rel": "next", "href": "https://x/search?page=2"})));
        assert_eq!(next, PageRequest::Get("https://x/search?page=2".into()));
    }

    #[test]
    fn test_follow_post_link_replaces_body() {
        let first = PageRequest::Post {
            url: "https://x/search".into(),
            body: json!({"limit": 10, "collections": ["a"]}),
        };
        let next = first.follow(&link(json!({
            "rel": "next", "href": "https://x/search", "method": "POST", "body": {"token": "t2"}
        })));
        assert_eq!(
            next,
            PageRequest::Post {
                url: "https://x/search".into(),
                body: json!({"token": "t2"})
            }
        );
    }

    #[test]
    fn test_follow_post_link_merges_body() {
        let first = PageRequest::Post {
            url: "https://x/search".into(),
            body: json!({"limit": 10, "token": "t1"}),
        };
        let next = first.follow(&link(json!({
            "rel": "next", "href": "https://x/search", "method": "POST",
            "body": {"token": "t2"}, "merge": true
        })));
        assert_eq!(
            next,
            PageRequest::Post {
                url: "https://x/search".into(),
                body: json!({"limit": 10, "token": "t2"})
            }
        );
    }
}
