//! Interpolation kernels for sampling a source block.
//!
//! Coordinates are in cell-index space: `(0.0, 0.0)` is the center of the
//! top-left cell. Samples outside the block, or touching a no-data cell,
//! come back as `None`.

use crate::types::{is_nodata, RasterBlock, Resampling};

/// Sample `block` at `(x, y)` with the requested method.
pub fn sample(block: &RasterBlock, x: f64, y: f64, method: Resampling) -> Option<f64> {
    match method {
        Resampling::Nearest => nearest_sample(block, x, y),
        Resampling::Bilinear => bilinear_sample(block, x, y),
        Resampling::Cubic => cubic_sample(block, x, y),
    }
}

fn cell(block: &RasterBlock, col: i64, row: i64) -> Option<f64> {
    if col < 0 || row < 0 || col as usize >= block.width || row as usize >= block.height {
        return None;
    }
    let v = block.get(col as usize, row as usize);
    if is_nodata(v, block.nodata) {
        None
    } else {
        Some(v)
    }
}

/// Nearest neighbor.
pub fn nearest_sample(block: &RasterBlock, x: f64, y: f64) -> Option<f64> {
    cell(block, x.round() as i64, y.round() as i64)
}

/// Bilinear over the four surrounding cells.
///
/// Falls back to nearest when any corner is missing, so edges and no-data
/// boundaries do not bleed.
pub fn bilinear_sample(block: &RasterBlock, x: f64, y: f64) -> Option<f64> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let xf = x - x0 as f64;
    let yf = y - y0 as f64;

    let corners = (
        cell(block, x0, y0),
        cell(block, x0 + 1, y0),
        cell(block, x0, y0 + 1),
        cell(block, x0 + 1, y0 + 1),
    );

    match corners {
        (Some(v00), Some(v10), Some(v01), Some(v11)) => {
            let top = v00 * (1.0 - xf) + v10 * xf;
            let bottom = v01 * (1.0 - xf) + v11 * xf;
            Some(top * (1.0 - yf) + bottom * yf)
        }
        _ => nearest_sample(block, x, y),
    }
}

/// Bicubic (Catmull-Rom) over the surrounding 4x4 cells.
pub fn cubic_sample(block: &RasterBlock, x: f64, y: f64) -> Option<f64> {
    let xi = x.floor() as i64;
    let yi = y.floor() as i64;
    let xf = x - xi as f64;
    let yf = y - yi as f64;

    let mut values = [[0.0f64; 4]; 4];
    for (j, row) in values.iter_mut().enumerate() {
        for (i, v) in row.iter_mut().enumerate() {
            match cell(block, xi + i as i64 - 1, yi + j as i64 - 1) {
                Some(value) => *v = value,
                None => return bilinear_sample(block, x, y),
            }
        }
    }

    let mut row_values = [0.0f64; 4];
    for (j, r) in values.iter().enumerate() {
        row_values[j] = cubic_1d(r[0], r[1], r[2], r[3], xf);
    }

    Some(cubic_1d(
        row_values[0],
        row_values[1],
        row_values[2],
        row_values[3],
        yf,
    ))
}

fn cubic_1d(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    let a = -0.5 * p0 + 1.5 * p1 - 1.5 * p2 + 0.5 * p3;
    let b = p0 - 2.5 * p1 + 2.0 * p2 - 0.5 * p3;
    let c = -0.5 * p0 + 0.5 * p2;
    let d = p1;

    a * t3 + b * t2 + c * t + d
}
