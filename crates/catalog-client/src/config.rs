//! Configuration for the catalog client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ordering::SourceOrdering;

/// Configuration for one catalog endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Root URL of the catalog API, without a trailing slash.
    pub root_url: String,

    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,

    /// Items requested per page.
    pub page_limit: usize,

    /// Hard cap on pages fetched by one walk.
    pub max_pages: usize,

    /// Asset role that marks the raster to extract.
    pub asset_role: String,

    /// Only accept this asset key, when set.
    pub asset_key: Option<String>,

    /// Priority order applied to resolved sources.
    pub ordering: SourceOrdering,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            root_url: "http://localhost:8080".to_string(),
            request_timeout_secs: 60,
            page_limit: 100,
            max_pages: 1000,
            asset_role: "data".to_string(),
            asset_key: None,
            ordering: SourceOrdering::NewestFirst,
        }
    }
}

impl CatalogConfig {
    /// Configuration for `root_url` with every other field at its default.
    pub fn for_root(root_url: impl Into<String>) -> Self {
        Self {
            root_url: root_url.into().trim_end_matches('/').to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("CATALOG_ROOT_URL") {
            config.root_url = val.trim_end_matches('/').to_string();
        }

        if let Ok(val) = std::env::var("CATALOG_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("CATALOG_PAGE_LIMIT") {
            if let Ok(limit) = val.parse() {
                config.page_limit = limit;
            }
        }

        if let Ok(val) = std::env::var("CATALOG_MAX_PAGES") {
            if let Ok(pages) = val.parse() {
                config.max_pages = pages;
            }
        }

        if let Ok(val) = std::env::var("CATALOG_ASSET_ROLE") {
            config.asset_role = val;
        }

        if let Ok(val) = std::env::var("CATALOG_ASSET_KEY") {
            if !val.is_empty() {
                config.asset_key = Some(val);
            }
        }

        if let Ok(val) = std::env::var("CATALOG_ORDERING") {
            config.ordering = SourceOrdering::from_str(&val);
        }

        config
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.root_url.starts_with("http://") || self.root_url.starts_with("https://")) {
            return Err(format!("root_url must be an http(s) URL, got '{}'", self.root_url));
        }

        if self.request_timeout_secs == 0 {
            return Err("request_timeout_secs must be > 0".to_string());
        }

        if self.page_limit == 0 {
            return Err("page_limit must be > 0".to_string());
        }

        if self.max_pages == 0 {
            return Err("max_pages must be > 0".to_string());
        }

        if self.asset_role.is_empty() {
            return Err("asset_role must not be empty".to_string());
        }

        Ok(())
    }
}
