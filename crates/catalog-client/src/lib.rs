//! STAC catalog client.
//!
//! Walks a paginated STAC API search, extracts one raster asset per item
//! and returns [`SourceDescriptor`](chip_common::SourceDescriptor)s in the
//! priority order the mosaic compositor consumes.
//!
//! # Example
//!
//! ```ignore
//! use catalog_client::{AssetResolver, CatalogConfig, SearchQuery};
//!
//! let resolver = AssetResolver::from_config(CatalogConfig::from_env())?;
//! let resolution = resolver
//!     .search(&SearchQuery {
//!         collections: vec!["naip".into()],
//!         datetime: Some("2020-01-01/..".into()),
//!         resolution: Some(":1".into()),
//!         ..SearchQuery::default()
//!     })
//!     .await?;
//! for source in &resolution.sources {
//!     println!("{} {}", source.id, source.url);
//! }
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod ordering;
pub mod resolver;
pub mod transport;
pub mod walker;

pub use config::CatalogConfig;
pub use error::{CatalogError, Result};
pub use filter::{DatetimeFilter, ResolutionFilter};
pub use models::{polygon_from_bbox, Collection, ItemPage, Link, SearchRequest, StacAsset, StacItem};
pub use ordering::SourceOrdering;
pub use resolver::{extract_source, AssetResolver, Resolution, SearchQuery};
pub use transport::{HttpTransport, SearchTransport, TransportResponse};
pub use walker::{walk, PageRequest, WalkEnd, WalkOutcome};
