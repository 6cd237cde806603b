//! Focal (moving window) statistics
//!
//! Computes statistics within a moving window centered on each cell.
//! Supports: Mean, Min, Max, Range, Count.

use crate::maybe_rayon::*;
use ccm_core::raster::{Neighborhood, Raster};
use ccm_core::{Error, Result};

/// Available focal statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocalStatistic {
    /// Arithmetic mean
    Mean,
    /// Minimum value
    Min,
    /// Maximum value
    Max,
    /// Range (max - min)
    Range,
    /// Count of valid (non-NODATA) values
    Count,
}

/// Parameters for focal statistics
#[derive(Debug, Clone)]
pub struct FocalParams {
    /// Window shape and radius
    pub window: Neighborhood,
    /// Statistic to compute
    pub statistic: FocalStatistic,
}

impl Default for FocalParams {
    fn default() -> Self {
        Self {
            window: Neighborhood::Square(1),
            statistic: FocalStatistic::Mean,
        }
    }
}

/// Compute focal statistics on a raster
///
/// NODATA cells and cells outside the raster are ignored within the window.
/// A cell whose window holds no valid value is NaN.
pub fn focal_statistics(raster: &Raster<f64>, params: FocalParams) -> Result<Raster<f64>> {
    if params.window.radius() == 0 {
        return Err(Error::Algorithm("Focal radius must be > 0".into()));
    }

    let (rows, cols) = raster.shape();
    let offsets = params.window.offsets();

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            let mut values: Vec<f64> = Vec::with_capacity(offsets.len());

            for (col, out) in row_data.iter_mut().enumerate() {
                values.clear();

                for &(dr, dc) in &offsets {
                    let nr = row as isize + dr;
                    let nc = col as isize + dc;

                    if nr >= 0 && nc >= 0 && (nr as usize) < rows && (nc as usize) < cols {
                        let v = unsafe { raster.get_unchecked(nr as usize, nc as usize) };
                        if !raster.is_nodata(v) {
                            values.push(v);
                        }
                    }
                }

                if values.is_empty() {
                    continue;
                }

                *out = compute_statistic(&values, params.statistic);
            }

            row_data
        })
        .collect();

    raster.derive(output_data, Some(f64::NAN))
}

fn compute_statistic(values: &[f64], stat: FocalStatistic) -> f64 {
    let min = || values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = || values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    match stat {
        FocalStatistic::Mean => values.iter().sum::<f64>() / values.len() as f64,
        FocalStatistic::Min => min(),
        FocalStatistic::Max => max(),
        FocalStatistic::Range => max() - min(),
        FocalStatistic::Count => values.len() as f64,
    }
}
