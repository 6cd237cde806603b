//! # CCM Algorithms
//!
//! Raster and vector algorithms behind cross-country mobility analysis.
//!
//! ## Available Algorithm Categories
//!
//! - **algebra**: cell-wise arithmetic, comparison and conditional operations
//! - **terrain**: slope, curvature
//! - **statistics**: focal (moving window) statistics
//! - **vector**: polygon clipping, rasterization
//! - **mobility**: factor derivation, composition and the end-to-end run

pub(crate) mod maybe_rayon;

pub mod algebra;
pub mod mobility;
pub mod statistics;
pub mod terrain;
pub mod vector;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::algebra::{add, divide, greater_equal, is_null, multiply, select, subtract};
    pub use crate::mobility::{
        combine, run, FactorKind, LayerSource, MatchPolicy, MobilityOutcome, MobilityRequest,
        Mover, RunContext, ScratchTracker, SoilMoisture, VegetationMode, Visibility,
    };
    pub use crate::statistics::{focal_statistics, FocalParams, FocalStatistic};
    pub use crate::terrain::{curvature, slope, CurvatureParams, SlopeParams, SlopeUnits};
    pub use crate::vector::{clip_features, polygon_mask, rasterize_polygons, ClipRect};
    pub use ccm_core::prelude::*;
}
