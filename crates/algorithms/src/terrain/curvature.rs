//! Surface curvature from DEMs
//!
//! General (mean) curvature from second-order partial derivatives estimated
//! on a 3x3 neighborhood (Zevenbergen & Thorne 1987):
//!
//! ```text
//! z1 z2 z3
//! z4 z5 z6
//! z7 z8 z9
//! ```
//!
//!   r = d²z/dx² = (z4 - 2*z5 + z6) / cs²
//!   t = d²z/dy² = (z2 - 2*z5 + z8) / cs²
//!
//!   General = -(r + t) / 2
//!
//! Positive values are convex, negative values concave.

use super::window3;
use crate::maybe_rayon::*;
use ccm_core::raster::Raster;
use ccm_core::{Error, Result};

/// Parameters for curvature calculation
#[derive(Debug, Clone)]
pub struct CurvatureParams {
    /// Z-factor for unit conversion (default 1.0)
    pub z_factor: f64,
}

impl Default for CurvatureParams {
    fn default() -> Self {
        Self { z_factor: 1.0 }
    }
}

/// Calculate general curvature from a DEM, in 1/map-unit.
/// Missing neighbours take the centre value; NODATA cells stay NaN.
pub fn curvature(dem: &Raster<f64>, params: CurvatureParams) -> Result<Raster<f64>> {
    if params.z_factor <= 0.0 || !params.z_factor.is_finite() {
        return Err(Error::InvalidParameter {
            name: "z_factor",
            value: params.z_factor.to_string(),
            reason: "must be a positive finite number".into(),
        });
    }

    let (rows, cols) = dem.shape();
    let cs = dem.cell_size() * params.z_factor;
    let cs2 = cs * cs;

    let output_data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let Some([_, z2, _, z4, z5, z6, _, z8, _]) = window3(dem, row, col) else {
                    continue;
                };

                let r = (z4 - 2.0 * z5 + z6) / cs2;
                let t = (z2 - 2.0 * z5 + z8) / cs2;
                *out = -(r + t) / 2.0;
            }

            row_data
        })
        .collect();

    dem.derive(output_data, Some(f64::NAN))
}
