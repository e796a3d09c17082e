//! Path utilities for test output.

use std::path::PathBuf;

/// Returns the workspace root directory.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = env!("CARGO_MANIFEST_DIR");
    PathBuf::from(manifest_dir)
        .parent() // crates/
        .and_then(|p| p.parent()) // workspace root
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from(manifest_dir))
}

/// Creates a temporary directory for test output.
///
/// The directory is automatically cleaned up when the returned `TempDir` is dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("mosaic_test_")
        .tempdir()
        .expect("Failed to create temporary test directory")
}

/// Path of a GeoTIFF named `name` inside `dir`.
pub fn output_tif(dir: &tempfile::TempDir, name: &str) -> PathBuf {
    dir.path().join(format!("{}.tif", name))
}
