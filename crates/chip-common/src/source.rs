//! Candidate source raster descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crs::Crs;

/// One candidate raster contribution discovered through the catalog.
///
/// Descriptors are immutable once built and are consumed in the priority
/// order the caller arranges them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Catalog item identifier.
    pub id: String,
    /// URL or path of the raster asset.
    pub url: String,
    /// Native CRS of the asset.
    pub crs: Crs,
    /// Native ground resolution in CRS units.
    pub resolution: f64,
    /// Acquisition time, when the catalog reports one.
    pub datetime: Option<DateTime<Utc>>,
    /// Collection the item belongs to.
    pub collection: String,
    /// Key of the asset within the item.
    pub asset_key: String,
}

impl SourceDescriptor {
    pub fn new(id: impl Into<String>, url: impl Into<String>, crs: Crs, resolution: f64) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
            crs,
            resolution,
            datetime: None,
            collection: String::new(),
            asset_key: String::new(),
        }
    }

    pub fn with_datetime(mut self, datetime: DateTime<Utc>) -> Self {
        self.datetime = Some(datetime);
        self
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_asset_key(mut self, asset_key: impl Into<String>) -> Self {
        self.asset_key = asset_key.into();
        self
    }
}
