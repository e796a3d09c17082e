//! Core types for raster extraction and compositing.

use serde::{Deserialize, Serialize};

/// Pixel data type of a raster band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    #[default]
    Float32,
    Float64,
}

impl DataType {
    /// Storage size of one pixel in bits.
    pub fn bits_per_pixel(&self) -> u64 {
        match self {
            Self::UInt8 => 8,
            Self::Int16 | Self::UInt16 => 16,
            Self::Int32 | Self::UInt32 | Self::Float32 => 32,
            Self::Float64 => 64,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float32 | Self::Float64)
    }

    /// Parse from string (case-insensitive), accepting GDAL and numpy names.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "uint8" | "byte" | "u8" => Some(Self::UInt8),
            "int16" | "i16" => Some(Self::Int16),
            "uint16" | "u16" => Some(Self::UInt16),
            "int32" | "i32" => Some(Self::Int32),
            "uint32" | "u32" => Some(Self::UInt32),
            "float32" | "f32" => Some(Self::Float32),
            "float64" | "f64" => Some(Self::Float64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UInt8 => "uint8",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resampling algorithm requested from the warp primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Nearest neighbor - fast, preserves exact values
    #[default]
    Nearest,
    /// Bilinear interpolation - smooth results
    Bilinear,
    /// Bicubic interpolation - smoothest
    Cubic,
}

impl Resampling {
    /// Parse from string (case-insensitive).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "bilinear" | "linear" => Self::Bilinear,
            "cubic" | "bicubic" => Self::Cubic,
            _ => Self::Nearest,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Bilinear => "bilinear",
            Self::Cubic => "cubic",
        }
    }
}

/// Whether `value` is the no-data sentinel.
///
/// NaN is always treated as missing; a NaN sentinel matches any NaN.
#[inline]
pub fn is_nodata(value: f64, nodata: Option<f64>) -> bool {
    match nodata {
        Some(nd) if nd.is_nan() => value.is_nan(),
        Some(nd) => value == nd || value.is_nan(),
        None => value.is_nan(),
    }
}

/// A single-band block of pixel values (row-major, top-to-bottom).
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBlock {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
    /// No-data sentinel of the raster the block was read from.
    pub nodata: Option<f64>,
}

impl RasterBlock {
    pub fn new(width: usize, height: usize, data: Vec<f64>, nodata: Option<f64>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self {
            width,
            height,
            data,
            nodata,
        }
    }

    /// A block with every cell set to `value`.
    pub fn filled(width: usize, height: usize, value: f64, nodata: Option<f64>) -> Self {
        Self::new(width, height, vec![value; width * height], nodata)
    }

    pub fn get(&self, col: usize, row: usize) -> f64 {
        self.data[row * self.width + col]
    }

    pub fn is_nodata_at(&self, index: usize) -> bool {
        is_nodata(self.data[index], self.nodata)
    }

    /// Number of cells holding valid data.
    pub fn count_valid(&self) -> usize {
        self.data
            .iter()
            .filter(|v| !is_nodata(**v, self.nodata))
            .count()
    }

    pub fn is_all_nodata(&self) -> bool {
        self.data.iter().all(|v| is_nodata(*v, self.nodata))
    }

    pub fn has_nodata(&self) -> bool {
        self.data.iter().any(|v| is_nodata(*v, self.nodata))
    }

    /// Replace this block's no-data cells with `target`, relabelling the
    /// block's sentinel to `target`.
    pub fn remap_nodata(mut self, target: f64) -> Self {
        let source = self.nodata;
        for v in self.data.iter_mut() {
            if is_nodata(*v, source) {
                *v = target;
            }
        }
        self.nodata = Some(target);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_per_pixel() {
        assert_eq!(DataType::UInt8.bits_per_pixel(), 8);
        assert_eq!(DataType::Int16.bits_per_pixel(), 16);
        assert_eq!(DataType::Float32.bits_per_pixel(), 32);
        assert_eq!(DataType::Float64.bits_per_pixel(), 64);
    }

    #[test]
    fn test_data_type_from_str() {
        assert_eq!(DataType::from_str("Byte"), Some(DataType::UInt8));
        assert_eq!(DataType::from_str("float32"), Some(DataType::Float32));
        assert_eq!(DataType::from_str("complex64"), None);
    }

    #[test]
    fn test_resampling_from_str() {
        assert_eq!(Resampling::from_str("BILINEAR"), Resampling::Bilinear);
        assert_eq!(Resampling::from_str("bicubic"), Resampling::Cubic);
        assert_eq!(Resampling::from_str("whatever"), Resampling::Nearest);
    }

    #[test]
    fn test_is_nodata() {
        assert!(is_nodata(-9999.0, Some(-9999.0)));
        assert!(!is_nodata(0.0, Some(-9999.0)));
        assert!(is_nodata(f64::NAN, Some(f64::NAN)));
        assert!(is_nodata(f64::NAN, None));
        assert!(!is_nodata(0.0, None));
    }

    #[test]
    fn test_remap_nodata() {
        let block = RasterBlock::new(2, 1, vec![0.0, 5.0], Some(0.0)).remap_nodata(-1.0);
        assert_eq!(block.data, vec![-1.0, 5.0]);
        assert_eq!(block.nodata, Some(-1.0));
        assert_eq!(block.count_valid(), 1);
    }
}
