//! Slope calculation from DEMs
//!
//! Calculates the rate of change of elevation using the Horn (1981) method,
//! which uses a 3x3 neighborhood to compute partial derivatives.

use super::window3;
use crate::maybe_rayon::*;
use ccm_core::raster::Raster;
use ccm_core::{Error, Result};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlopeUnits {
    /// Percent rise (100 * dz/dx), the unit movement tables use
    #[default]
    Percent,
    /// Degrees (0-90)
    Degrees,
}

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Output units
    pub units: SlopeUnits,
    /// Z-factor for unit conversion (default 1.0)
    pub z_factor: f64,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Percent,
            z_factor: 1.0,
        }
    }
}

/// Calculate slope from a DEM
///
/// Uses Horn's (1981) method with a 3x3 neighborhood:
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cellsize)
/// dz/dy = ((g + 2h + i) - (a + 2b + c)) / (8 * cellsize)
///
/// Neighbours off the raster or NODATA take the centre value; only NODATA
/// cells are NaN in the output.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    if params.z_factor <= 0.0 || !params.z_factor.is_finite() {
        return Err(Error::InvalidParameter {
            name: "z_factor",
            value: params.z_factor.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let eight_cell_size = 8.0 * dem.cell_size() * params.z_factor;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let Some([a, b, c, d, _, f, g, h, i]) = window3(dem, row, col) else {
                    continue;
                };

                let dz_dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_cell_size;
                let dz_dy = ((g + 2.0 * h + i) - (a + 2.0 * b + c)) / eight_cell_size;
                let rise = (dz_dx * dz_dx + dz_dy * dz_dy).sqrt();

                *out = match params.units {
                    SlopeUnits::Percent => rise * 100.0,
                    SlopeUnits::Degrees => rise.atan().to_degrees(),
                };
            }

            row_data
        })
        .collect();

    dem.derive(output_data, Some(f64::NAN))
}
