//! Run-wide, read-only state
//!
//! The elevation grid is the template for every raster of a run; the AOI
//! gives the clip envelope for vector layers and the cell mask applied to
//! every factor.

use crate::algebra;
use crate::vector::{polygon_mask, ClipRect};
use ccm_core::raster::Raster;
use ccm_core::{Error, FeatureCollection, Result, CRS};
use geo::{BoundingRect, MultiPolygon};
use tracing::debug;

/// Validated inputs shared by every stage of a run
#[derive(Debug, Clone)]
pub struct RunContext {
    elevation: Raster<f64>,
    aoi: MultiPolygon<f64>,
    aoi_rect: ClipRect,
    mask: Raster<u8>,
    aoi_cells: usize,
}

impl RunContext {
    /// Validate the elevation raster and AOI, and build the AOI cell mask.
    ///
    /// The elevation raster must be non-empty and north-up; the AOI must
    /// contain at least one elevation cell centre.
    pub fn new(elevation: Raster<f64>, aoi: MultiPolygon<f64>) -> Result<Self> {
        if elevation.is_empty() {
            return Err(Error::config("elevation raster is empty"));
        }
        if !elevation.transform().is_north_up() {
            return Err(Error::config(format!(
                "elevation raster must be north-up without rotation, got {:?}",
                elevation.transform().to_gdal()
            )));
        }

        let aoi_rect: ClipRect = aoi
            .bounding_rect()
            .ok_or_else(|| Error::config("area of interest has no polygon"))?
            .into();

        let extent = ClipRect::from_bounds(elevation.bounds());
        if !aoi_rect.intersects(&extent) {
            return Err(Error::config(format!(
                "area of interest {:?} lies outside the elevation extent {:?}",
                aoi_rect, extent
            )));
        }

        let mask = polygon_mask(&aoi, &elevation)?;
        let aoi_cells = mask.data().iter().filter(|&&v| v != 0).count();
        if aoi_cells == 0 {
            return Err(Error::config("area of interest covers no elevation cell centre"));
        }
        debug!(aoi_cells, total = elevation.len(), "built AOI mask");

        Ok(Self {
            elevation,
            aoi,
            aoi_rect,
            mask,
            aoi_cells,
        })
    }

    /// Build a context from an AOI layer, checking its CRS against the elevation
    pub fn from_features(elevation: Raster<f64>, aoi: &FeatureCollection) -> Result<Self> {
        check_crs("area of interest", elevation.crs(), aoi.crs.as_ref())?;
        Self::new(elevation, aoi.to_multi_polygon())
    }

    pub fn elevation(&self) -> &Raster<f64> {
        &self.elevation
    }

    pub fn aoi(&self) -> &MultiPolygon<f64> {
        &self.aoi
    }

    /// Bounding rectangle of the AOI, the clip extent for vector layers
    pub fn aoi_rect(&self) -> ClipRect {
        self.aoi_rect
    }

    /// 1 for cells whose centre lies inside the AOI
    pub fn mask(&self) -> &Raster<u8> {
        &self.mask
    }

    /// Number of cells inside the AOI
    pub fn aoi_cells(&self) -> usize {
        self.aoi_cells
    }

    /// Set every cell outside the AOI to NODATA
    pub fn apply_mask(&self, raster: &Raster<f64>) -> Result<Raster<f64>> {
        algebra::select(&self.mask, raster, f64::NAN)
    }

    /// Check a layer's declared CRS against the elevation raster
    pub fn check_crs(&self, layer: &str, crs: Option<&CRS>) -> Result<()> {
        check_crs(layer, self.elevation.crs(), crs)
    }
}

/// Undeclared CRSs are assumed to match
fn check_crs(layer: &str, grid: Option<&CRS>, other: Option<&CRS>) -> Result<()> {
    match (grid, other) {
        (Some(a), Some(b)) if !a.is_equivalent(b) => Err(Error::CrsMismatch(
            format!("elevation {}", a),
            format!("{} {}", layer, b),
        )),
        _ => Ok(()),
    }
}
