//! End-to-end mobility scenarios on synthetic terrain.
//!
//! Planar ramps have zero curvature except on the first and last column,
//! where the missing neighbours repeat the centre. Away from those columns
//! F2 is 1.0 and the CCM surface equals F1 times any optional factors,
//! which makes the expected values easy to state exactly.

use approx::assert_relative_eq;
use ccm_algorithms::mobility::{
    combine, fill_nodata, normalize_range, run, Factor, FactorKind, LayerSource, MatchPolicy,
    MobilityRequest, ResolvedParameters, RunContext, ScratchTracker, SoilMoisture, VegetationMode,
    Visibility,
};
use ccm_algorithms::statistics::{focal_statistics, FocalParams, FocalStatistic};
use ccm_algorithms::terrain::{curvature, CurvatureParams};
use ccm_core::raster::{Neighborhood, Raster};
use ccm_core::vector::parse_geojson;
use ccm_core::{AttributeTable, Error, GeoTransform, CRS};
use geo::{LineString, MultiPolygon, Polygon};

const SIZE: usize = 20;
const CELL: f64 = 10.0;
const X0: f64 = 500_000.0;
const Y0: f64 = 4_000_000.0;

/// Plane rising eastwards at `percent` slope
fn ramp(percent: f64) -> Raster<f64> {
    let mut dem = Raster::new(SIZE, SIZE);
    dem.set_transform(GeoTransform::new(X0, Y0 + SIZE as f64 * CELL, CELL, -CELL));
    dem.set_crs(Some(CRS::from_epsg(32612)));
    for row in 0..SIZE {
        for col in 0..SIZE {
            dem.set(row, col, col as f64 * CELL * percent / 100.0).unwrap();
        }
    }
    dem
}

/// Gaussian hill, for non-trivial curvature
fn hill() -> Raster<f64> {
    let mut dem = ramp(0.0);
    for row in 0..SIZE {
        for col in 0..SIZE {
            let dx = col as f64 - 8.0;
            let dy = row as f64 - 11.0;
            dem.set(row, col, 50.0 * (-(dx * dx + dy * dy) / 18.0).exp()).unwrap();
        }
    }
    dem
}

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    Polygon::new(
        LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1), (x0, y0)]),
        vec![],
    )
}

fn whole_extent() -> MultiPolygon<f64> {
    let side = SIZE as f64 * CELL;
    MultiPolygon::new(vec![rect(X0, Y0, X0 + side, Y0 + side)])
}

fn foot_march_table() -> AttributeTable {
    AttributeTable::parse_json(
        "FootMarch",
        r#"[
            {"visibility": "Day", "maxmph": 5.0, "onslope": 15.0},
            {"visibility": "Night", "maxmph": 2.5, "onslope": 10.0}
        ]"#,
    )
    .unwrap()
}

fn vehicle_table() -> AttributeTable {
    AttributeTable::parse_json(
        "Vehicles",
        r#"[
            {"name": "M1A1", "weight": 60, "maxkph": 60, "onslope": 20, "offslope": 10},
            {"name": "HMMWV", "weight": 5, "maxkph": 100, "onslope": 40, "offslope": 30}
        ]"#,
    )
    .unwrap()
}

/// One rectangular polygon coded `key = code` (a JSON literal), with its table
fn polygon_layer(key: &str, code: &str, bounds: (f64, f64, f64, f64), table: &str) -> LayerSource {
    let (x0, y0, x1, y1) = bounds;
    let text = format!(
        r#"{{"type": "FeatureCollection", "features": [{{
            "type": "Feature",
            "properties": {{"{key}": {code}}},
            "geometry": {{"type": "Polygon", "coordinates": [[[{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]]]}}
        }}]}}"#
    );
    LayerSource::new(parse_geojson(&text).unwrap(), AttributeTable::parse_json(key, table).unwrap())
}

/// Forest polygon from the western edge to `x_max`
fn vegetation_source(x_max: f64) -> LayerSource {
    polygon_layer(
        "f_code",
        r#""EC015""#,
        (X0, Y0, x_max, Y0 + SIZE as f64 * CELL),
        r#"[{"f_code": "EC015", "f3max": 0.4, "f3min": 0.8}]"#,
    )
}

fn run_dismounted(dem: Raster<f64>, request: MobilityRequest) -> ccm_core::Result<ccm_algorithms::mobility::MobilityOutcome> {
    let ctx = RunContext::new(dem, whole_extent())?;
    let mut scratch = ScratchTracker::in_memory();
    run(&ctx, &request, &mut scratch)
}

#[test]
fn dismounted_day_slope_scenario() {
    // (slope, interior F1, top-row F1). The top row repeats its centre for the
    // missing neighbours, which reads three quarters of the ramp.
    let cases = [(5.0, 0.185, 0.208125), (12.0, 0.0555, 0.111), (20.0, 0.0, 0.0)];

    for (percent, expected, top_row) in cases {
        let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table());
        let outcome = run_dismounted(ramp(percent), request).unwrap();

        assert_eq!(outcome.factors, vec![FactorKind::Speed, FactorKind::SurfaceVariability]);
        assert_relative_eq!(outcome.ccm.get(10, 10).unwrap(), expected, epsilon = 1e-9);
        assert_relative_eq!(outcome.ccm.get(3, 12).unwrap(), expected, epsilon = 1e-9);
        assert_relative_eq!(outcome.ccm.get(0, 10).unwrap(), top_row, epsilon = 1e-9);
    }
}

#[test]
fn night_uses_night_row() {
    let request = MobilityRequest::dismounted(Visibility::Night, foot_march_table()).with_body_weight(200.0);
    let outcome = run_dismounted(ramp(5.0), request).unwrap();

    assert!(matches!(
        outcome.parameters,
        ResolvedParameters::FootMarch(p) if p.max_slope_percent == 10.0 && p.max_speed_mph == 2.5
    ));
    // (10 - 5) / (2.5 / (200 / 2000))
    assert_relative_eq!(outcome.ccm.get(10, 10).unwrap(), 0.2, epsilon = 1e-9);
}

#[test]
fn ambiguous_foot_march_rows() {
    let table = AttributeTable::parse_json(
        "FootMarch",
        r#"[
            {"visibility": "Day", "maxmph": 5, "onslope": 15},
            {"visibility": "Day", "maxmph": 5, "onslope": 25}
        ]"#,
    )
    .unwrap();

    let strict = MobilityRequest::dismounted(Visibility::Day, table.clone());
    assert!(matches!(
        run_dismounted(ramp(5.0), strict),
        Err(Error::AmbiguousParameter { matches: 2, .. })
    ));

    let legacy = MobilityRequest::dismounted(Visibility::Day, table).with_match_policy(MatchPolicy::LastWins);
    let outcome = run_dismounted(ramp(5.0), legacy).unwrap();
    assert_eq!(outcome.parameters.slope_cap(), 25.0);
}

#[test]
fn mounted_convoy_takes_minimum_slopes() {
    let vehicles = vec!["M1A1".to_string(), "HMMWV".to_string()];
    let request = MobilityRequest::mounted(vehicles, vehicle_table());
    let outcome = run_dismounted(ramp(5.0), request).unwrap();

    match outcome.parameters {
        ResolvedParameters::Convoy(p) => {
            assert_eq!(p.on_road_slope_percent, 20.0);
            assert_eq!(p.off_road_slope_percent, 10.0);
            assert_eq!(p.max_weight, 60.0);
            assert_eq!(p.min_weight, 5.0);
            assert_eq!(p.max_speed_kph, 60.0);
        }
        other => panic!("expected convoy parameters, got {:?}", other),
    }
    // (20 - 5) / (60 / 60)
    assert_relative_eq!(outcome.ccm.get(10, 10).unwrap(), 15.0, epsilon = 1e-9);
}

#[test]
fn optional_layer_outside_coverage_is_no_effect() {
    let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table())
        .with_vegetation(vegetation_source(X0 + 100.0), VegetationMode::Max);
    let outcome = run_dismounted(ramp(5.0), request).unwrap();

    assert_eq!(
        outcome.factors,
        vec![FactorKind::Speed, FactorKind::SurfaceVariability, FactorKind::Vegetation]
    );
    // West: F1 * 0.4; east, outside the forest: F1 * 1.0
    assert_relative_eq!(outcome.ccm.get(10, 5).unwrap(), 0.185 * 0.4, epsilon = 1e-9);
    assert_relative_eq!(outcome.ccm.get(10, 15).unwrap(), 0.185, epsilon = 1e-9);
}

#[test]
fn vegetation_min_mode_uses_f3min() {
    let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table())
        .with_vegetation(vegetation_source(X0 + 100.0), VegetationMode::Min);
    let outcome = run_dismounted(ramp(5.0), request).unwrap();
    assert_relative_eq!(outcome.ccm.get(10, 5).unwrap(), 0.185 * 0.8, epsilon = 1e-9);
}

#[test]
fn cells_outside_aoi_are_nodata() {
    let aoi = MultiPolygon::new(vec![rect(X0, Y0, X0 + 100.0, Y0 + 100.0)]);
    let ctx = RunContext::new(ramp(5.0), aoi).unwrap();
    let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table());
    let outcome = run(&ctx, &request, &mut ScratchTracker::in_memory()).unwrap();

    assert_eq!(outcome.ccm.shape(), (SIZE, SIZE));
    assert!(outcome.ccm.get(5, 5).unwrap().is_nan(), "north-west quadrant is outside");
    assert_relative_eq!(outcome.ccm.get(15, 5).unwrap(), 0.185, epsilon = 1e-9);
}

#[test]
fn scratch_released_on_success_and_error() {
    let dir = tempfile::tempdir().unwrap();
    let tif_count = || {
        std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().path().extension().map_or(false, |x| x == "tif"))
            .count()
    };

    {
        let ctx = RunContext::new(ramp(5.0), whole_extent()).unwrap();
        let mut scratch = ScratchTracker::on_disk(dir.path()).unwrap();
        let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table());
        run(&ctx, &request, &mut scratch).unwrap();
        assert!(scratch.names().contains(&"f2"));
        assert!(tif_count() > 0);
    }
    assert_eq!(tif_count(), 0);

    {
        // A forest far outside the AOI: the clip stage fails after F1 and F2
        let far_away = {
            let mut source = vegetation_source(X0 + 100.0);
            source.features = parse_geojson(
                r#"{"type": "Feature", "properties": {"f_code": "EC015"},
                    "geometry": {"type": "Polygon", "coordinates": [[[0,0],[1,0],[1,1],[0,0]]]}}"#,
            )
            .unwrap();
            source
        };
        let ctx = RunContext::new(ramp(5.0), whole_extent()).unwrap();
        let mut scratch = ScratchTracker::on_disk(dir.path()).unwrap();
        let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table())
            .with_vegetation(far_away, VegetationMode::Max);

        let err = run(&ctx, &request, &mut scratch).unwrap_err();
        assert!(matches!(err, Error::ExternalOperation { operation: "clip", .. }));
        assert!(tif_count() >= 6);
    }
    assert_eq!(tif_count(), 0);
}

#[test]
fn layer_crs_must_match_elevation() {
    let mut source = vegetation_source(X0 + 100.0);
    source.features.crs = Some(CRS::wgs84());
    let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table())
        .with_vegetation(source, VegetationMode::Max);
    assert!(matches!(run_dismounted(ramp(5.0), request), Err(Error::CrsMismatch(..))));
}

#[test]
fn surface_variability_is_normalised() {
    let ctx = RunContext::new(hill(), whole_extent()).unwrap();
    let curv = curvature(ctx.elevation(), CurvatureParams::default()).unwrap();
    let range = focal_statistics(
        &curv,
        FocalParams {
            window: Neighborhood::Circle(3),
            statistic: FocalStatistic::Range,
        },
    )
    .unwrap();
    let range = ctx.apply_mask(&range).unwrap();
    let f2 = normalize_range(&range).unwrap();

    let max = range.statistics().max.unwrap();
    assert!(max > 0.0);
    for (r, f) in range.data().iter().zip(f2.data().iter()) {
        if r.is_nan() {
            assert!(f.is_nan());
            continue;
        }
        assert!((0.0..=1.0).contains(f), "F2 value {} out of range", f);
        if *r == max {
            assert_eq!(*f, 0.0);
        }
    }
}

#[test]
fn all_five_factors_compose_per_zone() {
    let side = SIZE as f64 * CELL;
    let mid = 100.0;
    // Soils under the southern half, roughness in the north-east quadrant
    let soils = polygon_layer(
        "soilcode",
        "3",
        (X0, Y0, X0 + side, Y0 + mid),
        r#"[{"soilcode": 3, "f4wet": 0.5, "f4dry": 0.9}, {"soilcode": 4, "f4wet": 0.1, "f4dry": 0.1}]"#,
    );
    let roughness = polygon_layer(
        "roughnesscode",
        r#""R2""#,
        (X0 + mid, Y0 + mid, X0 + side, Y0 + side),
        r#"[{"roughnesscode": "R2", "f5": 0.7}]"#,
    );

    for (moisture, soil) in [(SoilMoisture::Wet, 0.5), (SoilMoisture::Dry, 0.9)] {
        let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table())
            .with_vegetation(vegetation_source(X0 + mid), VegetationMode::Max)
            .with_soils(soils.clone(), moisture)
            .with_roughness(roughness.clone());
        let outcome = run_dismounted(ramp(5.0), request).unwrap();

        assert_eq!(outcome.factors.len(), 5);
        assert_eq!(
            outcome.factors,
            vec![
                FactorKind::Speed,
                FactorKind::SurfaceVariability,
                FactorKind::Vegetation,
                FactorKind::Soils,
                FactorKind::Roughness,
            ]
        );

        let f1 = 0.185;
        // North-west: vegetation only
        assert_relative_eq!(outcome.ccm.get(5, 6).unwrap(), f1 * 0.4, epsilon = 1e-9);
        // South-west: vegetation and soils
        assert_relative_eq!(outcome.ccm.get(14, 6).unwrap(), f1 * 0.4 * soil, epsilon = 1e-9);
        // South-east: soils only
        assert_relative_eq!(outcome.ccm.get(14, 13).unwrap(), f1 * soil, epsilon = 1e-9);
        // North-east: roughness only
        assert_relative_eq!(outcome.ccm.get(5, 13).unwrap(), f1 * 0.7, epsilon = 1e-9);
    }
}

/// Gentle hill in the west; `spike` adds a sharp bump from column 12 eastwards
fn west_hill(spike: bool) -> Raster<f64> {
    let mut dem = ramp(2.0);
    for row in 0..SIZE {
        for col in 0..SIZE {
            let dy = row as f64 - 10.0;
            let dx = col as f64 - 5.0;
            let mut z = dem.get(row, col).unwrap() + 3.0 * (-(dx * dx + dy * dy) / 8.0).exp();
            if spike && col >= 12 {
                let dx = col as f64 - 15.0;
                z += 30.0 * (-(dx * dx + dy * dy) / 2.0).exp();
            }
            dem.set(row, col, z).unwrap();
        }
    }
    dem
}

#[test]
fn surface_variability_ignores_terrain_outside_aoi() {
    // AOI = western half (columns 0..9). Curvature of AOI cells reads at most
    // column 10, so the spike changes curvature only outside the AOI.
    let west = || MultiPolygon::new(vec![rect(X0, Y0, X0 + 100.0, Y0 + SIZE as f64 * CELL)]);
    let surface = |spike: bool| {
        let ctx = RunContext::new(west_hill(spike), west()).unwrap();
        let request = MobilityRequest::dismounted(Visibility::Day, foot_march_table());
        run(&ctx, &request, &mut ScratchTracker::in_memory()).unwrap().ccm
    };
    let smooth = surface(false);
    let spiked = surface(true);

    let mut valid = 0;
    for row in 0..SIZE {
        for col in 0..SIZE {
            let (a, b) = (smooth.get(row, col).unwrap(), spiked.get(row, col).unwrap());
            if col >= 10 {
                assert!(a.is_nan() && b.is_nan(), "({}, {}) is outside the AOI", row, col);
                continue;
            }
            assert_relative_eq!(a, b, epsilon = 1e-12);
            if a > 0.0 {
                valid += 1;
            }
        }
    }
    assert!(valid > 0);

    // The hill gives F2 some spread inside the AOI
    let stats = smooth.statistics();
    assert!(stats.max.unwrap() > stats.min.unwrap());
}

#[test]
fn nodata_fill_is_idempotent() {
    let mut raw = Raster::filled(4, 4, 0.3);
    raw.set(1, 2, f64::NAN).unwrap();
    raw.set(3, 0, f64::NAN).unwrap();

    let once = fill_nodata(&raw).unwrap();
    let twice = fill_nodata(&once).unwrap();
    assert_eq!(once.data(), twice.data());
    assert_eq!(once.get(1, 2).unwrap(), 1.0);
}

#[test]
fn composition_is_order_independent() {
    let kinds = [
        FactorKind::Speed,
        FactorKind::SurfaceVariability,
        FactorKind::Vegetation,
        FactorKind::Soils,
        FactorKind::Roughness,
    ];
    let factors: Vec<Factor> = kinds
        .iter()
        .enumerate()
        .map(|(i, &kind)| {
            let values = (0..9).map(|c| 0.1 + 0.09 * ((i * 9 + c) % 10) as f64).collect();
            Factor::new(kind, Raster::from_vec(values, 3, 3).unwrap())
        })
        .collect();

    for n in 2..=5 {
        let forward = combine(&factors[..n]).unwrap();
        let mut reversed = factors[..n].to_vec();
        reversed.reverse();
        let backward = combine(&reversed).unwrap();
        let mut rotated = factors[..n].to_vec();
        rotated.rotate_left(1);
        let shifted = combine(&rotated).unwrap();

        for ((a, b), c) in forward.data().iter().zip(backward.data().iter()).zip(shifted.data().iter()) {
            assert_relative_eq!(*a, *b, max_relative = 1e-12);
            assert_relative_eq!(*a, *c, max_relative = 1e-12);
        }
    }

    for n in [0usize, 1] {
        assert!(matches!(
            combine(&factors[..n]),
            Err(Error::InvalidFactorCount { count, .. }) if count == n
        ));
    }
    let mut six = factors.clone();
    six.push(factors[0].clone());
    assert!(matches!(combine(&six), Err(Error::InvalidFactorCount { count: 6, .. })));
}
