//! Common test fixtures for mosaic tests.
//!
//! Bounding boxes and descriptors are in projected (metre) coordinates
//! unless noted otherwise.

use chip_common::{BoundingBox, Crs, SourceDescriptor};
use chrono::{TimeZone, Utc};

/// UTM zone 15N on NAD83, the default projected CRS in tests.
pub fn utm15n() -> Crs {
    Crs::from_epsg(26915)
}

/// UTM zone 15N on WGS84.
pub fn utm15n_wgs84() -> Crs {
    Crs::from_epsg(32615)
}

/// Common bounding box definitions for testing, as (west, south, east, north).
pub mod bbox {
    /// 3 km square with its north-west corner at (500000, 4500000).
    pub const SQUARE_3KM: (f64, f64, f64, f64) = (500_000.0, 4_497_000.0, 503_000.0, 4_500_000.0);

    /// The north-west 500 m of [`SQUARE_3KM`].
    pub const CORNER_500M: (f64, f64, f64, f64) = (500_000.0, 4_499_500.0, 500_500.0, 4_500_000.0);

    /// A box whose edges fall between 1 m pixel boundaries.
    pub const FRACTIONAL: (f64, f64, f64, f64) = (500_000.4, 4_499_000.3, 500_010.6, 4_499_010.7);

    /// Far away from every other fixture.
    pub const DISJOINT: (f64, f64, f64, f64) = (900_000.0, 1_000_000.0, 901_000.0, 1_001_000.0);
}

/// Build a [`BoundingBox`] from one of the [`bbox`] tuples.
pub fn bbox_of(extent: (f64, f64, f64, f64), crs: Crs) -> BoundingBox {
    BoundingBox::new(extent.0, extent.1, extent.2, extent.3, crs)
}

/// A descriptor for `mem://{id}` in UTM 15N.
pub fn source(id: &str, resolution: f64) -> SourceDescriptor {
    SourceDescriptor::new(id, memory_url(id), utm15n(), resolution)
}

/// A descriptor like [`source`] acquired on 2024-06-`day`.
pub fn dated_source(id: &str, resolution: f64, day: u32) -> SourceDescriptor {
    let datetime = Utc
        .with_ymd_and_hms(2024, 6, day, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now);
    source(id, resolution).with_datetime(datetime)
}

/// URL under which in-memory test rasters are registered.
pub fn memory_url(id: &str) -> String {
    format!("mem://{}", id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_boxes_are_valid() {
        for extent in [bbox::SQUARE_3KM, bbox::CORNER_500M, bbox::FRACTIONAL, bbox::DISJOINT] {
            assert!(bbox_of(extent, utm15n()).validate().is_ok());
        }
    }

    #[test]
    fn test_corner_inside_square() {
        let square = bbox_of(bbox::SQUARE_3KM, utm15n());
        let corner = bbox_of(bbox::CORNER_500M, utm15n());
        assert!(square.contains(&corner));
        assert!(!square.intersects(&bbox_of(bbox::DISJOINT, utm15n())));
    }

    #[test]
    fn test_source_descriptor() {
        let s = dated_source("a", 1.0, 3);
        assert_eq!(s.url, "mem://a");
        assert_eq!(s.crs, utm15n());
        assert!(s.datetime.is_some());
    }
}
