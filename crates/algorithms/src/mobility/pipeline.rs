//! End-to-end mobility run
//!
//! Resolves parameters, derives F1 to F5 in order, and composes them. Every
//! intermediate goes through the scratch tracker; nothing is written to the
//! output location here, the caller does that once `run` has succeeded.

use super::compositor::combine;
use super::context::RunContext;
use super::factors::{
    clamp_slope, convoy_speed_factor, fill_nodata, foot_march_speed_factor, normalize_range,
    percent_slope, rasterize_coefficient, Factor, FactorKind, LayerSource, SoilMoisture,
    VegetationMode, CURVATURE_WINDOW_RADIUS, DEFAULT_BODY_WEIGHT_LB,
};
use super::params::{
    resolve_foot_march, resolve_vehicle_convoy, FootMarchParameters, MatchPolicy, VehicleParameters,
    Visibility,
};
use super::scratch::ScratchTracker;
use crate::statistics::{focal_statistics, FocalParams, FocalStatistic};
use crate::terrain::{curvature, CurvatureParams};
use ccm_core::raster::{Neighborhood, Raster};
use ccm_core::{AttributeTable, Result};
use tracing::{debug, info};

/// Who is moving
#[derive(Debug, Clone, PartialEq)]
pub enum Mover {
    /// Soldier on foot
    Dismounted {
        visibility: Visibility,
        body_weight_lb: f64,
    },
    /// Vehicle convoy, by vehicle type name
    Mounted { vehicle_types: Vec<String> },
}

impl Mover {
    pub fn body_weight_lb(&self) -> Option<f64> {
        match self {
            Mover::Dismounted { body_weight_lb, .. } => Some(*body_weight_lb),
            Mover::Mounted { .. } => None,
        }
    }
}

/// Everything a run needs besides the elevation grid and AOI
#[derive(Debug, Clone)]
pub struct MobilityRequest {
    pub mover: Mover,
    /// Foot-march or vehicle table, depending on the mover
    pub parameters: AttributeTable,
    pub match_policy: MatchPolicy,
    pub vegetation: Option<LayerSource>,
    pub vegetation_mode: VegetationMode,
    pub soils: Option<LayerSource>,
    pub soil_moisture: SoilMoisture,
    pub roughness: Option<LayerSource>,
}

impl MobilityRequest {
    /// Foot march at the default body weight, no optional layers
    pub fn dismounted(visibility: Visibility, parameters: AttributeTable) -> Self {
        Self::new(
            Mover::Dismounted {
                visibility,
                body_weight_lb: DEFAULT_BODY_WEIGHT_LB,
            },
            parameters,
        )
    }

    /// Convoy of `vehicle_types`, no optional layers
    pub fn mounted(vehicle_types: Vec<String>, parameters: AttributeTable) -> Self {
        Self::new(Mover::Mounted { vehicle_types }, parameters)
    }

    fn new(mover: Mover, parameters: AttributeTable) -> Self {
        Self {
            mover,
            parameters,
            match_policy: MatchPolicy::default(),
            vegetation: None,
            vegetation_mode: VegetationMode::default(),
            soils: None,
            soil_moisture: SoilMoisture::default(),
            roughness: None,
        }
    }

    pub fn with_body_weight(mut self, weight_lb: f64) -> Self {
        if let Mover::Dismounted { body_weight_lb, .. } = &mut self.mover {
            *body_weight_lb = weight_lb;
        }
        self
    }

    pub fn with_match_policy(mut self, policy: MatchPolicy) -> Self {
        self.match_policy = policy;
        self
    }

    pub fn with_vegetation(mut self, source: LayerSource, mode: VegetationMode) -> Self {
        self.vegetation = Some(source);
        self.vegetation_mode = mode;
        self
    }

    pub fn with_soils(mut self, source: LayerSource, moisture: SoilMoisture) -> Self {
        self.soils = Some(source);
        self.soil_moisture = moisture;
        self
    }

    pub fn with_roughness(mut self, source: LayerSource) -> Self {
        self.roughness = Some(source);
        self
    }
}

/// Parameters resolved for a run
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ResolvedParameters {
    FootMarch(FootMarchParameters),
    Convoy(VehicleParameters),
}

impl ResolvedParameters {
    /// Slope beyond which no further speed loss is modelled
    pub fn slope_cap(&self) -> f64 {
        match self {
            ResolvedParameters::FootMarch(p) => p.max_slope_percent,
            ResolvedParameters::Convoy(p) => p.on_road_slope_percent,
        }
    }
}

/// Result of a successful run
#[derive(Debug, Clone)]
pub struct MobilityOutcome {
    /// Product of all factors, NODATA outside the AOI
    pub ccm: Raster<f64>,
    pub parameters: ResolvedParameters,
    /// Factors used, in composition order
    pub factors: Vec<FactorKind>,
}

/// Run the mobility model.
pub fn run(ctx: &RunContext, request: &MobilityRequest, scratch: &mut ScratchTracker) -> Result<MobilityOutcome> {
    info!(mover = ?request.mover, aoi_cells = ctx.aoi_cells(), "starting mobility run");

    let parameters = match &request.mover {
        Mover::Dismounted { visibility, .. } => ResolvedParameters::FootMarch(resolve_foot_march(
            &request.parameters,
            *visibility,
            request.match_policy,
        )?),
        Mover::Mounted { vehicle_types } => {
            ResolvedParameters::Convoy(resolve_vehicle_convoy(&request.parameters, vehicle_types)?)
        }
    };
    info!(?parameters, "resolved movement parameters");

    let mut factors: Vec<Factor> = Vec::with_capacity(5);

    // F1
    let slope = percent_slope(ctx.elevation())?;
    scratch.register("slope", &slope)?;
    let clamped = clamp_slope(&slope, parameters.slope_cap())?;
    scratch.register("reclass_slope", &clamped)?;

    let f1 = match &parameters {
        ResolvedParameters::FootMarch(p) => foot_march_speed_factor(
            &clamped,
            p,
            request.mover.body_weight_lb().unwrap_or(DEFAULT_BODY_WEIGHT_LB),
        )?,
        ResolvedParameters::Convoy(p) => convoy_speed_factor(&clamped, p)?,
    };
    push_factor(ctx, scratch, &mut factors, FactorKind::Speed, &f1)?;

    // F2
    // Cells outside the AOI must not reach the focal windows
    let curv = ctx.apply_mask(&curvature(ctx.elevation(), CurvatureParams::default())?)?;
    scratch.register("curvature", &curv)?;
    let range = focal_statistics(
        &curv,
        FocalParams {
            window: Neighborhood::Circle(CURVATURE_WINDOW_RADIUS),
            statistic: FocalStatistic::Range,
        },
    )?;
    let range = ctx.apply_mask(&range)?;
    scratch.register("focal_range", &range)?;
    let f2 = normalize_range(&range)?;
    push_factor(ctx, scratch, &mut factors, FactorKind::SurfaceVariability, &f2)?;

    // F3, F4, F5
    let layers = [
        (FactorKind::Vegetation, request.vegetation.as_ref(), request.vegetation_mode.field()),
        (FactorKind::Soils, request.soils.as_ref(), request.soil_moisture.field()),
        (FactorKind::Roughness, request.roughness.as_ref(), "f5"),
    ];
    for (kind, source, field) in layers {
        let Some(source) = source else {
            debug!(factor = %kind, "no layer supplied, skipping");
            continue;
        };
        let raw = rasterize_coefficient(ctx, kind, source, field)?;
        scratch.register(&format!("{}_raw", kind.label()), &raw)?;
        push_factor(ctx, scratch, &mut factors, kind, &fill_nodata(&raw)?)?;
    }

    let ccm = combine(&factors)?;
    let kinds: Vec<FactorKind> = factors.iter().map(|f| f.kind).collect();
    let stats = ccm.statistics();
    info!(
        factors = kinds.len(),
        min = ?stats.min,
        max = ?stats.max,
        mean = ?stats.mean,
        "mobility surface composed"
    );

    Ok(MobilityOutcome {
        ccm,
        parameters,
        factors: kinds,
    })
}

/// Mask a factor to the AOI, register it and add it to the list
fn push_factor(
    ctx: &RunContext,
    scratch: &mut ScratchTracker,
    factors: &mut Vec<Factor>,
    kind: FactorKind,
    raster: &Raster<f64>,
) -> Result<()> {
    let masked = ctx.apply_mask(raster)?;
    scratch.register(kind.label(), &masked)?;
    debug!(factor = %kind, "derived factor");
    factors.push(Factor::new(kind, masked));
    Ok(())
}
