//! Coordinate Reference System identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ChipError, ChipResult};

/// EPSG codes of common geographic (degree-based) 2D CRSs.
const GEOGRAPHIC_EPSG: &[u32] = &[
    4019, // GRS 1980 (unknown datum)
    4148, // Hartebeesthoek94
    4167, // NZGD2000
    4230, // ED50
    4258, // ETRS89
    4267, // NAD27
    4269, // NAD83
    4283, // GDA94
    4326, // WGS 84
    4612, // JGD2000
    4617, // NAD83(CSRS)
    4674, // SIRGAS 2000
    4742, // GDM2000
    4759, // NAD83(NSRS2007)
    4937, // ETRS89 3D
    4979, // WGS 84 3D
    6318, // NAD83(2011)
    7844, // GDA2020
];

/// Whether a CRS measures ground distance in linear units or in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrsKind {
    /// Projected CRS with linear units (meters, feet).
    Projected,
    /// Geographic CRS with angular units (degrees).
    Geographic,
}

/// A CRS identified by its EPSG code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Crs {
    pub epsg: u32,
    pub kind: CrsKind,
}

impl Crs {
    /// Build a CRS from an EPSG code, classifying well-known geographic codes.
    pub fn from_epsg(epsg: u32) -> Self {
        let kind = if GEOGRAPHIC_EPSG.contains(&epsg) {
            CrsKind::Geographic
        } else {
            CrsKind::Projected
        };
        Self { epsg, kind }
    }

    /// Build a CRS with an explicit kind, for codes outside the built-in table.
    pub fn with_kind(epsg: u32, kind: CrsKind) -> Self {
        Self { epsg, kind }
    }

    /// WGS 84 geographic.
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Parse a CRS identifier.
    ///
    /// Accepts formats like:
    /// - "EPSG:26915"
    /// - "epsg:4326"
    /// - "CRS:84" (WGS 84 with lon/lat axis order)
    /// - "32615" (bare code)
    pub fn parse(s: &str) -> ChipResult<Self> {
        let normalized = s.trim().to_uppercase();

        if normalized == "CRS:84" {
            return Ok(Self::wgs84());
        }

        let code = normalized.strip_prefix("EPSG:").unwrap_or(&normalized);
        code.parse::<u32>()
            .ok()
            .filter(|c| *c > 0)
            .map(Self::from_epsg)
            .ok_or_else(|| ChipError::InvalidCrs(s.to_string()))
    }

    /// Check if this is a geographic (lat/lon) CRS.
    pub fn is_geographic(&self) -> bool {
        self.kind == CrsKind::Geographic
    }

    /// Check if this is a projected (planar) CRS.
    pub fn is_projected(&self) -> bool {
        self.kind == CrsKind::Projected
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg)
    }
}
