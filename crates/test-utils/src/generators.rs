//! Pixel generators for synthetic source rasters.
//!
//! All grids are row-major `Vec<f64>`, row 0 at the top.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0);
/// assert_eq!(grid[10], 1.0);
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f64);
        }
    }
    data
}

/// Creates a grid with every cell set to `value`.
pub fn create_constant_grid(width: usize, height: usize, value: f64) -> Vec<f64> {
    vec![value; width * height]
}

/// Creates a constant grid whose left `nodata_cols` columns are `nodata`.
pub fn create_partial_grid(
    width: usize,
    height: usize,
    value: f64,
    nodata: f64,
    nodata_cols: usize,
) -> Vec<f64> {
    let mut data = Vec::with_capacity(width * height);
    for _ in 0..height {
        for col in 0..width {
            data.push(if col < nodata_cols { nodata } else { value });
        }
    }
    data
}

/// Creates a grid with NaN at specific (col, row) positions.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    value: f64,
    nan_positions: &[(usize, usize)],
) -> Vec<f64> {
    let mut data = create_constant_grid(width, height, value);
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f64::NAN;
        }
    }
    data
}
