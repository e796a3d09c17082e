//! Configuration for the mosaic engine.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::compositor::ReadStrategy;
use crate::overview::OverviewResampling;
use crate::types::{DataType, Resampling};

/// Classic TIFF addresses 4 GiB; keep ~1 GiB back for headers and tile indexes.
pub const DEFAULT_BIG_FORMAT_THRESHOLD_BYTES: u64 = 3 * 1024 * 1024 * 1024;

/// Configuration for one mosaic engine instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Square block (tile) dimension of the output raster.
    pub block_size: usize,

    /// No-data value written to the output.
    pub nodata: f64,

    /// Pixel type of the output raster.
    pub dtype: DataType,

    /// Estimated size at which the output switches to the big format.
    pub big_format_threshold_bytes: u64,

    /// How each source is read into the output grid.
    pub read_strategy: ReadStrategy,

    /// Skip sources whose destination window is already fully covered.
    pub short_circuit: bool,

    /// Resampling used when a source's resolution or CRS differs from the output.
    pub resampling: Resampling,

    /// Overview pyramid settings.
    pub overviews: OverviewConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            block_size: 512,
            nodata: -9999.0,
            dtype: DataType::Float32,
            big_format_threshold_bytes: DEFAULT_BIG_FORMAT_THRESHOLD_BYTES,
            read_strategy: ReadStrategy::Windowed,
            short_circuit: true,
            resampling: Resampling::Nearest,
            overviews: OverviewConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MOSAIC_BLOCK_SIZE") {
            if let Ok(size) = val.parse() {
                config.block_size = size;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_NODATA") {
            if let Ok(nodata) = val.parse() {
                config.nodata = nodata;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_DTYPE") {
            if let Some(dtype) = DataType::from_str(&val) {
                config.dtype = dtype;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_BIG_FORMAT_THRESHOLD_BYTES") {
            if let Ok(bytes) = val.parse() {
                config.big_format_threshold_bytes = bytes;
            }
        }

        if let Ok(val) = std::env::var("MOSAIC_READ_STRATEGY") {
            config.read_strategy = ReadStrategy::from_str(&val);
        }

        if let Ok(val) = std::env::var("MOSAIC_SHORT_CIRCUIT") {
            config.short_circuit = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("MOSAIC_RESAMPLING") {
            config.resampling = Resampling::from_str(&val);
        }

        config.overviews = OverviewConfig::from_env();
        config
    }

    /// Load configuration from a YAML file. Missing keys take defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read engine config {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&text)
            .with_context(|| format!("Failed to parse engine config {}", path.display()))?;
        config
            .validate()
            .map_err(|e| anyhow::anyhow!("Invalid engine config {}: {}", path.display(), e))?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.block_size == 0 {
            return Err("block_size must be > 0".to_string());
        }

        if self.block_size % 16 != 0 {
            return Err("block_size must be a multiple of 16".to_string());
        }

        if self.big_format_threshold_bytes == 0 {
            return Err("big_format_threshold_bytes must be > 0".to_string());
        }

        Ok(())
    }
}

/// Configuration for overview (pyramid) generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewConfig {
    /// Whether to build overviews before finalizing.
    pub enabled: bool,

    /// Method used to reduce each level.
    pub resampling: OverviewResampling,
}

impl Default for OverviewConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            resampling: OverviewResampling::Nearest,
        }
    }
}

impl OverviewConfig {
    /// Load overview configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("MOSAIC_OVERVIEWS") {
            config.enabled = parse_bool(&val);
        }

        if let Ok(val) = std::env::var("MOSAIC_OVERVIEW_RESAMPLING") {
            config.resampling = match val.to_lowercase().as_str() {
                "mean" | "average" => OverviewResampling::Mean,
                "max" => OverviewResampling::Max,
                _ => OverviewResampling::Nearest,
            };
        }

        config
    }
}

fn parse_bool(val: &str) -> bool {
    val.to_lowercase() == "true" || val == "1"
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.block_size, 512);
        assert_eq!(config.nodata, -9999.0);
        assert_eq!(config.dtype, DataType::Float32);
        assert_eq!(config.big_format_threshold_bytes, 3 * 1024 * 1024 * 1024);
        assert_eq!(config.read_strategy, ReadStrategy::Windowed);
        assert!(config.short_circuit);
        assert!(!config.overviews.enabled);
    }

    #[test]
    fn test_config_validation() {
        let mut config = EngineConfig::default();
        assert!(config.validate().is_ok());

        config.block_size = 0;
        assert!(config.validate().is_err());

        config.block_size = 100;
        assert!(config.validate().is_err());

        config = EngineConfig::default();
        config.big_format_threshold_bytes = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "block_size: 256").unwrap();
        writeln!(file, "read_strategy: whole").unwrap();
        writeln!(file, "overviews:").unwrap();
        writeln!(file, "  enabled: true").unwrap();

        let config = EngineConfig::from_yaml_file(file.path()).unwrap();
        assert_eq!(config.block_size, 256);
        assert_eq!(config.read_strategy, ReadStrategy::Whole);
        assert!(config.overviews.enabled);
        assert!(config.short_circuit);
    }

    #[test]
    fn test_from_yaml_file_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "block_size: 100").unwrap();
        assert!(EngineConfig::from_yaml_file(file.path()).is_err());
    }
}
