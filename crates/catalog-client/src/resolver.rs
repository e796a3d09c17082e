//! Resolve catalog items into ordered mosaic sources.

use std::sync::Arc;

use chip_common::{parse_instant, Crs, SourceDescriptor};
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::config::CatalogConfig;
use crate::error::{CatalogError, Result};
use crate::filter::{DatetimeFilter, ResolutionFilter};
use crate::models::{Collection, CollectionList, SearchRequest, StacAsset, StacItem};
use crate::transport::{HttpTransport, SearchTransport};
use crate::walker::{walk, PageRequest, WalkEnd};

/// An item search.
#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    /// GeoJSON geometry of the area of interest.
    pub intersects: Option<Value>,
    pub collections: Vec<String>,
    /// Raw datetime filter, e.g. `2020-01-01/..`.
    pub datetime: Option<String>,
    /// Raw resolution filter, e.g. `1:2`.
    pub resolution: Option<String>,
}

/// Sources found for a query, in priority order.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub sources: Vec<SourceDescriptor>,
    /// Items dropped because they lacked a URL, resolution or CRS.
    pub skipped: usize,
    /// Items dropped by the resolution or datetime filter.
    pub filtered: usize,
    pub pages: usize,
    pub end: WalkEnd,
    /// Recovered problems: ignored filters, aborted pagination.
    pub warnings: Vec<String>,
}

/// Walks a STAC API and turns items into [`SourceDescriptor`]s.
pub struct AssetResolver {
    config: CatalogConfig,
    transport: Arc<dyn SearchTransport>,
}

impl AssetResolver {
    pub fn new(config: CatalogConfig, transport: Arc<dyn SearchTransport>) -> Self {
        Self { config, transport }
    }

    /// Resolver over HTTP with the configured timeout.
    pub fn from_config(config: CatalogConfig) -> Result<Self> {
        config.validate().map_err(CatalogError::Config)?;
        let transport = HttpTransport::new(&config)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.root_url.trim_end_matches('/'), path)
    }

    /// `GET {root}/collections`.
    #[instrument(skip(self), fields(root = %self.config.root_url))]
    pub async fn list_collections(&self) -> Result<Vec<Collection>> {
        let url = self.url("collections");
        let response = self.transport.get(&url).await?;
        if !response.is_success() {
            return Err(CatalogError::Http(format!(
                "{} returned status {}",
                url, response.status
            )));
        }

        let list: CollectionList = serde_json::from_str(&response.body)?;
        debug!(count = list.collections.len(), "Listed collections");
        Ok(list.collections)
    }

    /// Every item of one collection, following pagination.
    #[instrument(skip(self), fields(root = %self.config.root_url))]
    pub async fn collection_items(&self, collection_id: &str) -> Result<Vec<StacItem>> {
        let url = format!(
            "{}?limit={}",
            self.url(&format!("collections/{}/items", collection_id)),
            self.config.page_limit
        );
        let outcome = walk(self.transport.as_ref(), PageRequest::Get(url), self.config.max_pages).await?;
        Ok(outcome.items)
    }

    /// Search, extract, filter and order sources.
    ///
    /// Invalid filter strings are ignored with a warning. Transport and
    /// decode failures are errors; a non-success status ends pagination
    /// with the items gathered so far.
    #[instrument(skip(self, query), fields(root = %self.config.root_url, collections = ?query.collections))]
    pub async fn search(&self, query: &SearchQuery) -> Result<Resolution> {
        let mut warnings = Vec::new();

        let resolution_filter = query
            .resolution
            .as_deref()
            .and_then(|s| recover(ResolutionFilter::parse(s), &mut warnings));
        let datetime_filter = query
            .datetime
            .as_deref()
            .and_then(|s| recover(DatetimeFilter::parse(s), &mut warnings));

        let request = SearchRequest {
            intersects: query.intersects.clone(),
            collections: query.collections.clone(),
            datetime: datetime_filter.as_ref().map(DatetimeFilter::to_query),
            limit: self.config.page_limit,
        };
        let first = PageRequest::Post {
            url: self.url("search"),
            body: request.to_value(),
        };

        let outcome = walk(self.transport.as_ref(), first, self.config.max_pages).await?;
        warnings.extend(outcome.warnings);

        let mut sources = Vec::with_capacity(outcome.items.len());
        let mut skipped = 0;
        let mut filtered = 0;
        for item in &outcome.items {
            let Some(source) = self.extract(item) else {
                skipped += 1;
                continue;
            };

            let keep = resolution_filter.map_or(true, |f| f.matches(source.resolution))
                && datetime_filter.map_or(true, |f| f.matches(source.datetime.as_ref()));
            if keep {
                sources.push(source);
            } else {
                filtered += 1;
            }
        }

        self.config.ordering.apply(&mut sources);

        info!(
            items = outcome.items.len(),
            sources = sources.len(),
            skipped = skipped,
            filtered = filtered,
            ordering = %self.config.ordering,
            "Resolved sources"
        );

        Ok(Resolution {
            sources,
            skipped,
            filtered,
            pages: outcome.pages,
            end: outcome.end,
            warnings,
        })
    }

    /// Source descriptor for `item` under this resolver's asset selection.
    pub fn extract(&self, item: &StacItem) -> Option<SourceDescriptor> {
        extract_source(item, &self.config.asset_role, self.config.asset_key.as_deref())
    }
}

/// Keep the parsed filter, or record why it is being ignored.
fn recover<T>(parsed: Result<T>, warnings: &mut Vec<String>) -> Option<T> {
    match parsed {
        Ok(filter) => Some(filter),
        Err(e) => {
            let message = format!("Ignoring filter: {}", e);
            warn!("{}", message);
            warnings.push(message);
            None
        }
    }
}

/// Build a descriptor from the first asset with `role` (and key `asset_key`
/// when given).
///
/// Resolution comes from `proj:transform[0]`, falling back to `gsd`; the
/// CRS from `proj:epsg`; the datetime from `datetime`, falling back to
/// `start_datetime`. Items without a URL, resolution or CRS yield `None`.
pub fn extract_source(item: &StacItem, role: &str, asset_key: Option<&str>) -> Option<SourceDescriptor> {
    let Some((key, asset)) = select_asset(item, role, asset_key) else {
        debug!(id = %item.id, role = role, "Item has no matching asset");
        return None;
    };

    let props = &item.properties;
    let resolution = asset
        .proj_transform
        .as_ref()
        .or(props.proj_transform.as_ref())
        .and_then(|t| t.first())
        .map(|r| r.abs())
        .or(props.gsd)
        .filter(|r| *r > 0.0);
    let Some(resolution) = resolution else {
        debug!(id = %item.id, "Item has no resolution");
        return None;
    };

    let Some(epsg) = asset.proj_epsg.or(props.proj_epsg) else {
        debug!(id = %item.id, "Item has no proj:epsg");
        return None;
    };

    let datetime = props
        .datetime
        .as_deref()
        .or(props.start_datetime.as_deref())
        .and_then(|s| parse_instant(s).ok());

    let mut source = SourceDescriptor::new(&item.id, &asset.href, Crs::from_epsg(epsg), resolution)
        .with_asset_key(key);
    if let Some(collection) = &item.collection {
        source = source.with_collection(collection);
    }
    if let Some(dt) = datetime {
        source = source.with_datetime(dt);
    }
    Some(source)
}

fn select_asset<'a>(
    item: &'a StacItem,
    role: &str,
    asset_key: Option<&str>,
) -> Option<(&'a str, &'a StacAsset)> {
    item.assets
        .iter()
        .filter(|(key, asset)| asset.has_role(role) && asset_key.map_or(true, |k| k == key.as_str()))
        .filter(|(_, asset)| !asset.href.is_empty())
        .map(|(key, asset)| (key.as_str(), asset))
        .next()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(value: Value) -> StacItem {
        serde_json::from_value(value).unwrap()
    }

    fn naip() -> StacItem {
        item(json!({
            "id": "tile-1",
            "collection": "naip",
            "properties": {
                "datetime": null,
                "start_datetime": "2021-05-01T00:00:00Z",
                "proj:epsg": 26915,
                "proj:transform": [0.6, 0.0, 500000.0, 0.0, -0.6, 4500000.0],
                "gsd": 1.0
            },
            "assets": {
                "image": {"href": "https://x/tile-1.tif", "roles": ["data"]},
                "thumbnail": {"href": "https://x/tile-1.png", "roles": ["thumbnail"]}
            }
        }))
    }

    #[test]
    fn test_extract_prefers_transform() {
        let source = extract_source(&naip(), "data", None).unwrap();
        assert_eq!(source.url, "https://x/tile-1.tif");
        assert_eq!(source.resolution, 0.6);
        assert_eq!(source.crs, Crs::from_epsg(26915));
        assert_eq!(source.collection, "naip");
        assert_eq!(source.asset_key, "image");
        assert_eq!(
            source.datetime.map(|d| chip_common::canonical_timestamp(&d)),
            Some("2021-05-01T00:00:00Z".to_string())
        );
    }

    #[test]
    fn test_extract_falls_back_to_gsd() {
        let item = item(json!({
            "id": "a",
            "properties": {"datetime": "2020-01-01T00:00:00Z", "proj:epsg": 32615, "gsd": 10.0},
            "assets": {"B04": {"href": "s3://b/a.tif", "roles": ["data"]}}
        }));
        assert_eq!(extract_source(&item, "data", None).unwrap().resolution, 10.0);
    }

    #[test]
    fn test_extract_asset_level_projection() {
        let item = item(json!({
            "id": "a",
            "properties": {"proj:epsg": 32615, "gsd": 10.0},
            "assets": {"B01": {
                "href": "s3://b/a.tif", "roles": ["data"],
                "proj:epsg": 32616, "proj:transform": [60.0, 0.0, 0.0, 0.0, -60.0, 0.0]
            }}
        }));
        let source = extract_source(&item, "data", None).unwrap();
        assert_eq!(source.resolution, 60.0);
        assert_eq!(source.crs.epsg, 32616);
    }

    #[test]
    fn test_extract_by_key() {
        let item = item(json!({
            "id": "a",
            "properties": {"proj:epsg": 32615, "gsd": 10.0},
            "assets": {
                "B02": {"href": "s3://b/b02.tif", "roles": ["data"]},
                "B03": {"href": "s3://b/b03.tif", "roles": ["data"]}
            }
        }));
        assert_eq!(extract_source(&item, "data", None).unwrap().url, "s3://b/b02.tif");
        assert_eq!(extract_source(&item, "data", Some("B03")).unwrap().url, "s3://b/b03.tif");
        assert!(extract_source(&item, "data", Some("B08")).is_none());
    }

    #[test]
    fn test_extract_skips_incomplete_items() {
        let no_crs = item(json!({
            "id": "a",
            "properties": {"gsd": 10.0},
            "assets": {"d": {"href": "s3://b/a.tif", "roles": ["data"]}}
        }));
        let no_resolution = item(json!({
            "id": "b",
            "properties": {"proj:epsg": 32615},
            "assets": {"d": {"href": "s3://b/b.tif", "roles": ["data"]}}
        }));
        let no_data_asset = item(json!({
            "id": "c",
            "properties": {"proj:epsg": 32615, "gsd": 1.0},
            "assets": {"t": {"href": "s3://b/c.png", "roles": ["thumbnail"]}}
        }));
        assert!(extract_source(&no_crs, "data", None).is_none());
        assert!(extract_source(&no_resolution, "data", None).is_none());
        assert!(extract_source(&no_data_asset, "data", None).is_none());
    }

    #[test]
    fn test_recover_records_warning() {
        let mut warnings = Vec::new();
        assert!(recover(ResolutionFilter::parse("x:y"), &mut warnings).is_none());
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("x:y"));
        assert!(recover(ResolutionFilter::parse("1:2"), &mut warnings).is_some());
        assert_eq!(warnings.len(), 1);
    }
}
