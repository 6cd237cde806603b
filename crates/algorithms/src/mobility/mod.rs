//! Cross-country mobility
//!
//! Derives up to five normalised factor rasters from elevation and optional
//! vegetation, soils and roughness layers, then multiplies them into one
//! CCM surface where 1.0 means unimpeded movement.
//!
//! ```text
//! parameters ─► F1 (slope / speed) ─┐
//! elevation  ─► F2 (curvature)     ─┤
//! vegetation ─► F3 (optional)      ─┼─► combine ─► CCM
//! soils      ─► F4 (optional)      ─┤
//! roughness  ─► F5 (optional)      ─┘
//! ```

mod compositor;
mod context;
mod factors;
mod params;
mod pipeline;
mod scratch;

pub use compositor::{combine, FACTOR_COUNT};
pub use context::RunContext;
pub use factors::{
    clamp_slope, convoy_speed_factor, fill_nodata, foot_march_speed_factor, normalize_range,
    percent_slope, rasterize_coefficient, Factor, FactorKind, LayerSource, SoilMoisture,
    VegetationMode, CURVATURE_WINDOW_RADIUS, DEFAULT_BODY_WEIGHT_LB,
};
pub use params::{
    parse_vehicle_types, resolve_foot_march, resolve_vehicle_convoy, FootMarchParameters,
    MatchPolicy, VehicleParameters, Visibility,
};
pub use pipeline::{run, MobilityOutcome, MobilityRequest, Mover, ResolvedParameters};
pub use scratch::ScratchTracker;
