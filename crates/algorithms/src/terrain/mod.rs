//! Terrain analysis algorithms
//!
//! Derivatives of a Digital Elevation Model used by the mobility factors:
//! - Slope: rate of change of elevation (Horn 1981)
//! - Curvature: general surface curvature (Zevenbergen & Thorne 1987)

mod curvature;
mod slope;

pub use curvature::{curvature, CurvatureParams};
pub use slope::{slope, SlopeParams, SlopeUnits};

use ccm_core::raster::Raster;

/// 3x3 window around (row, col) in row-major order:
///
/// ```text
/// z1 z2 z3
/// z4 z5 z6
/// z7 z8 z9
/// ```
///
/// Neighbours off the raster or NODATA take the centre value, so border
/// cells still get a derivative. `None` only when the centre is NODATA.
#[inline]
pub(crate) fn window3(dem: &Raster<f64>, row: usize, col: usize) -> Option<[f64; 9]> {
    let (rows, cols) = dem.shape();
    let center = unsafe { dem.get_unchecked(row, col) };
    if dem.is_nodata(center) {
        return None;
    }

    let mut w = [center; 9];
    for (i, slot) in w.iter_mut().enumerate() {
        let (Some(r), Some(c)) = ((row + i / 3).checked_sub(1), (col + i % 3).checked_sub(1)) else {
            continue;
        };
        if r >= rows || c >= cols {
            continue;
        }
        let v = unsafe { dem.get_unchecked(r, c) };
        if !dem.is_nodata(v) {
            *slot = v;
        }
    }
    Some(w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window3_interior() {
        let dem = Raster::from_vec((0..16).map(f64::from).collect(), 4, 4).unwrap();
        let w = window3(&dem, 1, 1).unwrap();
        assert_eq!(w, [0.0, 1.0, 2.0, 4.0, 5.0, 6.0, 8.0, 9.0, 10.0]);
    }

    #[test]
    fn test_window3_border_takes_centre() {
        let dem = Raster::from_vec((0..16).map(f64::from).collect(), 4, 4).unwrap();
        assert_eq!(window3(&dem, 0, 0).unwrap(), [0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 4.0, 5.0]);
        assert_eq!(window3(&dem, 3, 3).unwrap(), [10.0, 11.0, 15.0, 14.0, 15.0, 15.0, 15.0, 15.0, 15.0]);
    }

    #[test]
    fn test_window3_nodata() {
        let mut dem = Raster::from_vec((0..16).map(f64::from).collect(), 4, 4).unwrap();
        dem.set(2, 2, f64::NAN).unwrap();
        assert_eq!(window3(&dem, 1, 1).unwrap()[8], 5.0);
        assert!(window3(&dem, 2, 2).is_none());
    }
}
