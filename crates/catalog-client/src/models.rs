//! STAC API request and response models.
//!
//! Only the fields the resolver reads are modelled; everything else in a
//! response is ignored.

use std::collections::BTreeMap;

use chip_common::BoundingBox;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of a `POST {root}/search` request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchRequest {
    /// GeoJSON geometry the items must intersect.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intersects: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub collections: Vec<String>,

    /// Canonical datetime or interval, e.g. `2020-01-01T00:00:00Z/..`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    pub limit: usize,
}

impl SearchRequest {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// GeoJSON polygon ring around `bbox`, counter-clockwise from the south-west
/// corner.
pub fn polygon_from_bbox(bbox: &BoundingBox) -> Value {
    serde_json::json!({
        "type": "Polygon",
        "coordinates": [[
            [bbox.west, bbox.south],
            [bbox.east, bbox.south],
            [bbox.east, bbox.north],
            [bbox.west, bbox.north],
            [bbox.west, bbox.south],
        ]]
    })
}

/// One page of an item search or collection item listing.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ItemPage {
    #[serde(default)]
    pub features: Vec<StacItem>,

    /// Legacy context extension counts.
    #[serde(default)]
    pub context: Option<SearchContext>,

    #[serde(default, rename = "numberReturned")]
    pub number_returned: Option<u64>,

    #[serde(default, rename = "numberMatched")]
    pub number_matched: Option<u64>,

    #[serde(default)]
    pub links: Vec<Link>,
}

impl ItemPage {
    /// Items returned by this page.
    pub fn returned(&self) -> u64 {
        self.context
            .as_ref()
            .and_then(|c| c.returned)
            .or(self.number_returned)
            .unwrap_or(self.features.len() as u64)
    }

    /// Total items matching the query, when the server reports it.
    pub fn matched(&self) -> Option<u64> {
        self.context
            .as_ref()
            .and_then(|c| c.matched)
            .or(self.number_matched)
    }

    pub fn next_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel == "next")
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SearchContext {
    #[serde(default)]
    pub returned: Option<u64>,
    #[serde(default)]
    pub matched: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

/// A hypermedia link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub rel: String,
    pub href: String,

    /// HTTP method for following the link; `GET` when absent.
    #[serde(default)]
    pub method: Option<String>,

    /// Request body for `POST` links.
    #[serde(default)]
    pub body: Option<Value>,

    /// Merge `body` into the previous request body instead of replacing it.
    #[serde(default)]
    pub merge: bool,
}

impl Link {
    pub fn is_post(&self) -> bool {
        self.method
            .as_deref()
            .map(|m| m.eq_ignore_ascii_case("POST"))
            .unwrap_or(false)
    }
}

/// A STAC item.
#[derive(Debug, Clone, Deserialize)]
pub struct StacItem {
    pub id: String,

    #[serde(default)]
    pub collection: Option<String>,

    #[serde(default)]
    pub properties: ItemProperties,

    /// Assets keyed by name, iterated in key order.
    #[serde(default)]
    pub assets: BTreeMap<String, StacAsset>,
}

/// Item properties read during extraction.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ItemProperties {
    #[serde(default)]
    pub datetime: Option<String>,

    #[serde(default)]
    pub start_datetime: Option<String>,

    #[serde(default, rename = "proj:epsg")]
    pub proj_epsg: Option<u32>,

    /// Six- or nine-element affine transform; element 0 is the pixel width.
    #[serde(default, rename = "proj:transform")]
    pub proj_transform: Option<Vec<f64>>,

    /// Ground sample distance.
    #[serde(default)]
    pub gsd: Option<f64>,
}

/// One asset of an item.
///
/// Projection fields on an asset take precedence over the item's.
#[derive(Debug, Clone, Deserialize)]
pub struct StacAsset {
    pub href: String,

    #[serde(default)]
    pub roles: Vec<String>,

    #[serde(default, rename = "type")]
    pub media_type: Option<String>,

    #[serde(default, rename = "proj:epsg")]
    pub proj_epsg: Option<u32>,

    #[serde(default, rename = "proj:transform")]
    pub proj_transform: Option<Vec<f64>>,
}

impl StacAsset {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

/// A collection summary from `GET {root}/collections`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CollectionList {
    #[serde(default)]
    pub collections: Vec<Collection>,

    #[serde(default)]
    pub links: Vec<Link>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chip_common::Crs;
    use serde_json::json;

    #[test]
    fn test_counts_prefer_context() {
        let page: ItemPage = serde_json::from_value(json!({
            "features": [],
            "context": {"returned": 10, "matched": 25},
            "numberReturned": 3,
            "numberMatched": 4
        }))
        .unwrap();
        assert_eq!(page.returned(), 10);
        assert_eq!(page.matched(), Some(25));
    }

    #[test]
    fn test_counts_fall_back() {
        let page: ItemPage = serde_json::from_value(json!({
            "features": [{"id": "a"}, {"id": "b"}],
            "numberMatched": 7
        }))
        .unwrap();
        assert_eq!(page.returned(), 2);
        assert_eq!(page.matched(), Some(7));

        let bare: ItemPage = serde_json::from_value(json!({"features": []})).unwrap();
        assert_eq!(bare.matched(), None);
    }

    #[test]
    fn test_item_parsing() {
        let item: StacItem = serde_json::from_value(json!({
            "id": "tile-1",
            "collection": "naip",
            "properties": {
                "datetime": "2021-05-01T00:00:00Z",
                "proj:epsg": 26915,
                "proj:transform": [0.6, 0.0, 500000.0, 0.0, -0.6, 4500000.0]
            },
            "assets": {
                "image": {"href": "https://x/tile-1.tif", "roles": ["data"], "type": "image/tiff"},
                "thumbnail": {"href": "https://x/tile-1.png", "roles": ["thumbnail"]}
            }
        }))
        .unwrap();
        assert_eq!(item.properties.proj_epsg, Some(26915));
        assert!(item.assets["image"].has_role("data"));
        assert_eq!(item.assets.keys().next().map(String::as_str), Some("image"));
    }

    #[test]
    fn test_search_request_omits_empty() {
        let body = SearchRequest {
            limit: 50,
            ..SearchRequest::default()
        }
        .to_value();
        assert_eq!(body, json!({"limit": 50}));
    }

    #[test]
    fn test_polygon_from_bbox() {
        let bbox = BoundingBox::new(-93.0, 44.0, -92.0, 45.0, Crs::wgs84());
        let polygon = polygon_from_bbox(&bbox);
        assert_eq!(polygon["type"], "Polygon");
        assert_eq!(polygon["coordinates"][0][2], json!([-92.0, 45.0]));
    }

    #[test]
    fn test_link_method() {
        let link: Link = serde_json::from_value(json!({
            "rel": "next", "href": "https://x/search", "method": "post", "body": {"token": "abc"}
        }))
        .unwrap();
        assert!(link.is_post());
        assert!(!link.merge);
    }
}
