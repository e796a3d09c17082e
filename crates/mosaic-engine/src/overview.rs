//! Overview (pyramid) level computation and decimation.

use serde::{Deserialize, Serialize};

use crate::types::{is_nodata, RasterBlock};

/// Method used to reduce a 2x2 cell group into one overview cell.
///
/// - **Nearest**: top-left valid value, preserves exact values (categorical data)
/// - **Mean**: average of valid cells (continuous surfaces such as elevation)
/// - **Max**: maximum of valid cells (peaks)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverviewResampling {
    #[default]
    Nearest,
    Mean,
    Max,
}

/// Decimation factors for a raster whose largest side is `max_dim`.
///
/// Returns `[2, 4, ..., 2^n]` where `n` is the smallest integer with
/// `max_dim / 2^n < block_size`. Empty when the raster already fits in one
/// block.
pub fn overview_levels(max_dim: usize, block_size: usize) -> Vec<usize> {
    let block_size = block_size.max(1);
    if max_dim < block_size {
        return Vec::new();
    }

    let mut levels = Vec::new();
    let mut factor = 1usize;
    while max_dim / factor >= block_size {
        factor *= 2;
        levels.push(factor);
    }
    levels
}

/// Reduce `block` by a factor of 2 in each direction.
///
/// Odd trailing rows/columns are folded into the last output cell, so the
/// result is `ceil(width / 2)` x `ceil(height / 2)`. No-data cells never
/// contribute; an all-no-data group stays no-data.
pub fn decimate_2x(block: &RasterBlock, nodata: f64, method: OverviewResampling) -> RasterBlock {
    let new_width = block.width.div_ceil(2);
    let new_height = block.height.div_ceil(2);
    let mut output = vec![nodata; new_width * new_height];

    for out_y in 0..new_height {
        for out_x in 0..new_width {
            let mut group = [None; 4];
            for (k, (dx, dy)) in [(0, 0), (1, 0), (0, 1), (1, 1)].into_iter().enumerate() {
                let x = out_x * 2 + dx;
                let y = out_y * 2 + dy;
                if x < block.width && y < block.height {
                    let v = block.get(x, y);
                    if !is_nodata(v, block.nodata) {
                        group[k] = Some(v);
                    }
                }
            }

            let value = match method {
                OverviewResampling::Nearest => group.iter().flatten().next().copied(),
                OverviewResampling::Mean => mean_of_group(&group),
                OverviewResampling::Max => group.iter().flatten().copied().reduce(f64::max),
            };

            if let Some(v) = value {
                output[out_y * new_width + out_x] = v;
            }
        }
    }

    RasterBlock::new(new_width, new_height, output, Some(nodata))
}

#[inline]
fn mean_of_group(group: &[Option<f64>; 4]) -> Option<f64> {
    let mut sum = 0.0;
    let mut count = 0;
    for v in group.iter().flatten() {
        sum += v;
        count += 1;
    }
    (count > 0).then(|| sum / count as f64)
}

/// Build each requested level by repeated 2x decimation of `base`.
///
/// `levels` must be increasing powers of two, as produced by
/// [`overview_levels`].
pub fn build_pyramid(
    base: &RasterBlock,
    levels: &[usize],
    nodata: f64,
    method: OverviewResampling,
) -> Vec<(usize, RasterBlock)> {
    let mut pyramid = Vec::with_capacity(levels.len());
    let mut current = base.clone();
    let mut factor = 1usize;

    for &level in levels {
        while factor < level {
            current = decimate_2x(&current, nodata, method);
            factor *= 2;
        }
        pyramid.push((level, current.clone()));
    }

    pyramid
}
