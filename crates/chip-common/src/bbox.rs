//! Bounding box types and operations.

use serde::{Deserialize, Serialize};

use crate::crs::Crs;
use crate::error::{ChipError, ChipResult};

/// A ground-space rectangle tagged with the CRS its coordinates are in.
///
/// For geographic CRSs coordinates are in degrees, for projected CRSs in the
/// CRS's linear unit. A bounding box is never mutated; reprojection produces
/// a new value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
    pub crs: Crs,
}

impl BoundingBox {
    /// Create a new bounding box from corner coordinates.
    pub fn new(west: f64, south: f64, east: f64, north: f64, crs: Crs) -> Self {
        Self {
            west,
            south,
            east,
            north,
            crs,
        }
    }

    /// Parse a "west,south,east,north" string.
    pub fn from_csv(s: &str, crs: Crs) -> ChipResult<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(ChipError::InvalidBbox(format!(
                "{}. Expected 'west,south,east,north'",
                s
            )));
        }

        let mut values = [0.0f64; 4];
        for (value, part) in values.iter_mut().zip(&parts) {
            *value = part
                .parse()
                .map_err(|_| ChipError::InvalidBbox(format!("invalid number '{}'", part)))?;
        }

        let bbox = Self::new(values[0], values[1], values[2], values[3], crs);
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check that west < east and south < north.
    pub fn validate(&self) -> ChipResult<()> {
        if !(self.west < self.east) || !(self.south < self.north) {
            return Err(ChipError::InvalidBbox(format!(
                "degenerate extent {},{},{},{}",
                self.west, self.south, self.east, self.north
            )));
        }
        Ok(())
    }

    /// Width of the bounding box in coordinate units.
    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    /// Height of the bounding box in coordinate units.
    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    /// Check if this bbox intersects another (same CRS assumed).
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.west < other.east
            && self.east > other.west
            && self.south < other.north
            && self.north > other.south
    }

    /// Compute the intersection of two bounding boxes.
    pub fn intersection(&self, other: &BoundingBox) -> Option<BoundingBox> {
        if !self.intersects(other) {
            return None;
        }

        Some(BoundingBox {
            west: self.west.max(other.west),
            south: self.south.max(other.south),
            east: self.east.min(other.east),
            north: self.north.min(other.north),
            crs: self.crs,
        })
    }

    /// Check whether `other` lies entirely inside this bbox.
    pub fn contains(&self, other: &BoundingBox) -> bool {
        other.west >= self.west
            && other.east <= self.east
            && other.south >= self.south
            && other.north <= self.north
    }

    /// Check if a point is contained within this bbox.
    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.west && x <= self.east && y >= self.south && y <= self.north
    }

    /// Return the same extent relabelled with another CRS.
    pub fn with_crs(&self, crs: Crs) -> Self {
        Self { crs, ..*self }
    }
}
