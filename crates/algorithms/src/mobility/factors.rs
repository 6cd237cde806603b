//! Factor derivation
//!
//! Every factor is a raster on the elevation grid with values in roughly
//! [lower, 1.0], where 1.0 means no mobility penalty.
//!
//! - F1 (terrain speed): slope-driven speed degradation
//! - F2 (surface variability): normalised focal range of curvature
//! - F3/F4/F5 (vegetation, soils, roughness): table-driven coefficients
//!   burnt from polygon layers

use super::context::RunContext;
use super::params::{FootMarchParameters, VehicleParameters};
use crate::algebra;
use crate::terrain::{slope, SlopeParams};
use crate::vector::{clip_features, rasterize_polygons};
use ccm_core::raster::Raster;
use ccm_core::{AttributeTable, Error, FeatureCollection, Result};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Body weight assumed for a dismounted soldier (lb)
pub const DEFAULT_BODY_WEIGHT_LB: f64 = 185.0;

/// Radius, in cells, of the circular window for the curvature range
pub const CURVATURE_WINDOW_RADIUS: usize = 3;

/// The five mobility factors, in composition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FactorKind {
    /// F1
    Speed,
    /// F2
    SurfaceVariability,
    /// F3
    Vegetation,
    /// F4
    Soils,
    /// F5
    Roughness,
}

impl FactorKind {
    /// Short label, also used for scratch raster names
    pub fn label(&self) -> &'static str {
        match self {
            FactorKind::Speed => "f1",
            FactorKind::SurfaceVariability => "f2",
            FactorKind::Vegetation => "f3",
            FactorKind::Soils => "f4",
            FactorKind::Roughness => "f5",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FactorKind::Speed => "terrain speed",
            FactorKind::SurfaceVariability => "surface variability",
            FactorKind::Vegetation => "vegetation",
            FactorKind::Soils => "soils",
            FactorKind::Roughness => "surface roughness",
        }
    }

    /// Code field joining a layer to its lookup table
    pub fn join_key(&self) -> Option<&'static str> {
        match self {
            FactorKind::Vegetation => Some("f_code"),
            FactorKind::Soils => Some("soilcode"),
            FactorKind::Roughness => Some("roughnesscode"),
            FactorKind::Speed | FactorKind::SurfaceVariability => None,
        }
    }
}

impl fmt::Display for FactorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label().to_uppercase(), self.description())
    }
}

/// A derived, normalised factor raster
#[derive(Debug, Clone)]
pub struct Factor {
    pub kind: FactorKind,
    pub raster: Raster<f64>,
}

impl Factor {
    pub fn new(kind: FactorKind, raster: Raster<f64>) -> Self {
        Self { kind, raster }
    }
}

/// Which vegetation coefficient column to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VegetationMode {
    Min,
    #[default]
    Max,
}

impl VegetationMode {
    pub fn field(&self) -> &'static str {
        match self {
            VegetationMode::Min => "f3min",
            VegetationMode::Max => "f3max",
        }
    }
}

impl FromStr for VegetationMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "min" => Ok(VegetationMode::Min),
            "max" => Ok(VegetationMode::Max),
            other => Err(Error::config(format!(
                "unknown vegetation mode '{}', expected 'min' or 'max'",
                other
            ))),
        }
    }
}

/// Which soil coefficient column to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SoilMoisture {
    Wet,
    #[default]
    Dry,
}

impl SoilMoisture {
    pub fn field(&self) -> &'static str {
        match self {
            SoilMoisture::Wet => "f4wet",
            SoilMoisture::Dry => "f4dry",
        }
    }
}

impl FromStr for SoilMoisture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "wet" => Ok(SoilMoisture::Wet),
            "dry" => Ok(SoilMoisture::Dry),
            other => Err(Error::config(format!(
                "unknown soil moisture '{}', expected 'wet' or 'dry'",
                other
            ))),
        }
    }
}

/// A polygon layer and the lookup table joined onto it
#[derive(Debug, Clone)]
pub struct LayerSource {
    pub features: FeatureCollection,
    pub table: AttributeTable,
}

impl LayerSource {
    pub fn new(features: FeatureCollection, table: AttributeTable) -> Self {
        Self { features, table }
    }
}

// Slope

/// Percent-rise slope of the elevation raster
pub fn percent_slope(elevation: &Raster<f64>) -> Result<Raster<f64>> {
    slope(elevation, SlopeParams::default())
}

/// Cap slope at `max_slope`: `select(slope >= max, max, slope)`
pub fn clamp_slope(slope: &Raster<f64>, max_slope: f64) -> Result<Raster<f64>> {
    let steep = algebra::greater_equal(slope, max_slope)?;
    algebra::select(&steep, max_slope, slope)
}

fn require_positive(name: &'static str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::config(format!("{} must be positive, got {}", name, value)))
    }
}

// F1

/// Dismounted F1: `(max_slope - slope) / (speed / (weight / 2000))`.
///
/// Weight is in pounds, converted to short tons.
pub fn foot_march_speed_factor(
    clamped_slope: &Raster<f64>,
    params: &FootMarchParameters,
    body_weight_lb: f64,
) -> Result<Raster<f64>> {
    require_positive("body weight", body_weight_lb)?;
    require_positive("foot-march speed", params.max_speed_mph)?;

    let speed_over_weight = params.max_speed_mph / (body_weight_lb / 2000.0);
    debug!(speed_over_weight, "foot-march speed over weight");

    let headroom = algebra::subtract(params.max_slope_percent, clamped_slope)?;
    algebra::divide(&headroom, speed_over_weight)
}

/// Mounted F1: `(on_road_slope - slope) / (max_speed / max_weight)`
pub fn convoy_speed_factor(clamped_slope: &Raster<f64>, params: &VehicleParameters) -> Result<Raster<f64>> {
    require_positive("convoy weight", params.max_weight)?;
    require_positive("convoy speed", params.max_speed_kph)?;

    let speed_over_weight = params.max_speed_kph / params.max_weight;
    debug!(speed_over_weight, "convoy speed over weight");

    let headroom = algebra::subtract(params.on_road_slope_percent, clamped_slope)?;
    algebra::divide(&headroom, speed_over_weight)
}

// F2

/// F2 from a focal curvature range raster: `(M - R) / M`, with `M` the
/// global maximum of `R`.
///
/// When `M <= 0` (uniform curvature) or no cell is valid, every valid cell
/// gets 1.0.
pub fn normalize_range(range: &Raster<f64>) -> Result<Raster<f64>> {
    match range.statistics().max {
        Some(max) if max > 0.0 => {
            debug!(max, "curvature range maximum");
            let headroom = algebra::subtract(max, range)?;
            algebra::divide(&headroom, max)
        }
        max => {
            warn!(?max, "curvature range has no positive maximum, surface variability set to 1.0");
            algebra::map(range, |_| 1.0)
        }
    }
}

// F3, F4, F5

/// Replace NODATA cells with 1.0 (no effect)
pub fn fill_nodata(raw: &Raster<f64>) -> Result<Raster<f64>> {
    algebra::select(&algebra::is_null(raw)?, 1.0, raw)
}

/// Clip `source` to the AOI envelope, join its table on `kind`'s code field
/// and burn the `field` coefficient onto the elevation grid.
///
/// Cells outside the layer, or under features without a coefficient, are
/// NODATA.
pub fn rasterize_coefficient(
    ctx: &RunContext,
    kind: FactorKind,
    source: &LayerSource,
    field: &str,
) -> Result<Raster<f64>> {
    let key = kind
        .join_key()
        .ok_or_else(|| Error::Algorithm(format!("{} is not a layer factor", kind)))?;
    ctx.check_crs(kind.description(), source.features.crs.as_ref())?;

    let mut clipped = clip_features(&source.features, ctx.aoi_rect())?;
    let joined = source.table.join_into(&mut clipped, key, &[field])?;

    let missing = clipped.iter().filter(|f| f.get_property(field).is_none()).count();
    if missing > 0 {
        info!(
            factor = %kind,
            missing,
            unmatched = joined.unmatched,
            "features without a coefficient contribute no penalty"
        );
    }

    rasterize_polygons(&clipped, field, ctx.elevation())
}
