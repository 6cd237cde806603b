//! CCM CLI - cross-country mobility surfaces from elevation and terrain layers

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ccm_algorithms::mobility::{
    parse_vehicle_types, run, LayerSource, MatchPolicy, MobilityOutcome, MobilityRequest,
    ResolvedParameters, RunContext, ScratchTracker, SoilMoisture, VegetationMode, Visibility,
    DEFAULT_BODY_WEIGHT_LB,
};
use ccm_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use ccm_core::vector::read_geojson;
use ccm_core::{AttributeTable, Raster};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "ccm")]
#[command(author, version, about = "Cross-country mobility analysis", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Mobility surface for a dismounted foot march
    Dismounted {
        #[command(flatten)]
        common: CommonArgs,
        /// Visibility: day or night
        #[arg(long, default_value = "day")]
        visibility: Visibility,
        /// Body weight in pounds, including load
        #[arg(long, default_value_t = DEFAULT_BODY_WEIGHT_LB)]
        body_weight: f64,
        /// Take the last matching foot-march row when several match
        #[arg(long)]
        legacy_last_match: bool,
    },
    /// Mobility surface for a vehicle convoy
    Mounted {
        #[command(flatten)]
        common: CommonArgs,
        /// Vehicle types, ';'-separated, e.g. "'M1A1';'HMMWV'"
        #[arg(long)]
        vehicles: String,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Elevation GeoTIFF; defines the output grid
    #[arg(long)]
    elevation: PathBuf,
    /// Area of interest (GeoJSON polygon layer)
    #[arg(long)]
    aoi: PathBuf,
    /// Movement parameter table (JSON)
    #[arg(long)]
    parameters: PathBuf,
    /// Output GeoTIFF
    #[arg(short, long)]
    output: PathBuf,

    /// Vegetation polygons (GeoJSON, joined on f_code)
    #[arg(long)]
    vegetation: Option<PathBuf>,
    /// Vegetation lookup table (JSON)
    #[arg(long)]
    vegetation_table: Option<PathBuf>,
    /// Vegetation coefficient: min or max
    #[arg(long, default_value = "max")]
    vegetation_mode: VegetationMode,

    /// Soil polygons (GeoJSON, joined on soilcode)
    #[arg(long)]
    soils: Option<PathBuf>,
    /// Soils lookup table (JSON)
    #[arg(long)]
    soils_table: Option<PathBuf>,
    /// Soil condition: wet or dry
    #[arg(long, default_value = "dry")]
    soil_moisture: SoilMoisture,

    /// Surface roughness polygons (GeoJSON, joined on roughnesscode)
    #[arg(long)]
    roughness: Option<PathBuf>,
    /// Roughness lookup table (JSON)
    #[arg(long)]
    roughness_table: Option<PathBuf>,

    /// Write intermediates here as GeoTIFF
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
    /// Keep intermediates after the run
    #[arg(long, requires = "scratch_dir")]
    keep_scratch: bool,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        return Err(ccm_core::Error::config(format!("{} '{}' does not exist", what, path.display())).into());
    }
    Ok(())
}

fn read_dem(path: &Path) -> Result<Raster<f64>> {
    require_file(path, "elevation raster")?;
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path).context("Failed to read raster")?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn read_table(path: &Path, what: &str) -> Result<AttributeTable> {
    require_file(path, what)?;
    AttributeTable::read_json(path).with_context(|| format!("Failed to read {} '{}'", what, path.display()))
}

/// A layer and its table are both required, or neither
fn read_layer(name: &str, layer: Option<&PathBuf>, table: Option<&PathBuf>) -> Result<Option<LayerSource>> {
    match (layer, table) {
        (None, None) => Ok(None),
        (Some(layer), Some(table)) => {
            require_file(layer, name)?;
            let features = read_geojson(layer)
                .with_context(|| format!("Failed to read {} layer '{}'", name, layer.display()))?;
            let table = read_table(table, &format!("{} table", name))?;
            info!("{}: {} features, {} table rows", name, features.len(), table.len());
            Ok(Some(LayerSource::new(features, table)))
        }
        (Some(_), None) => Err(ccm_core::Error::config(format!("--{0} needs --{0}-table", name)).into()),
        (None, Some(_)) => Err(ccm_core::Error::config(format!("--{0}-table needs --{0}", name)).into()),
    }
}

/// Encode into a temporary file next to `path`, then rename it into place.
/// A failed write leaves any previous output untouched.
fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".ccm-")
        .suffix(".tif")
        .tempfile_in(dir)
        .with_context(|| format!("Failed to create output in '{}'", dir.display()))?;
    write_geotiff(raster, staged.path(), Some(GeoTiffOptions::default())).context("Failed to write output")?;
    staged
        .persist(path)
        .with_context(|| format!("Failed to move output to '{}'", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn print_summary(outcome: &MobilityOutcome, path: &Path, elapsed: std::time::Duration) {
    println!("CCM surface saved to: {}", path.display());
    match &outcome.parameters {
        ResolvedParameters::FootMarch(p) => println!(
            "  Foot march: {} mph, max slope {}%",
            p.max_speed_mph, p.max_slope_percent
        ),
        ResolvedParameters::Convoy(p) => println!(
            "  Convoy: {} km/h, weight {}-{}, on-road slope {}%, off-road slope {}%",
            p.max_speed_kph, p.min_weight, p.max_weight, p.on_road_slope_percent, p.off_road_slope_percent
        ),
    }
    let factors: Vec<String> = outcome.factors.iter().map(|f| f.to_string()).collect();
    println!("  Factors: {}", factors.join(", "));

    let stats = outcome.ccm.statistics();
    if let (Some(min), Some(max), Some(mean)) = (stats.min, stats.max, stats.mean) {
        println!("  Range: {:.4} - {:.4} (mean {:.4})", min, max, mean);
    }
    println!("  Valid cells: {}", stats.valid_count);
    println!("  Processing time: {:.2?}", elapsed);
}

/// Load inputs, run the model and write the output only once the run succeeded
fn mobility(common: CommonArgs, build: impl FnOnce(AttributeTable) -> MobilityRequest) -> Result<()> {
    let elevation = read_dem(&common.elevation)?;

    require_file(&common.aoi, "area of interest")?;
    let aoi = read_geojson(&common.aoi).context("Failed to read area of interest")?;
    let ctx = RunContext::from_features(elevation, &aoi).context("Invalid run inputs")?;

    let parameters = read_table(&common.parameters, "parameter table")?;
    let mut request = build(parameters);

    if let Some(source) = read_layer("vegetation", common.vegetation.as_ref(), common.vegetation_table.as_ref())? {
        request = request.with_vegetation(source, common.vegetation_mode);
    }
    if let Some(source) = read_layer("soils", common.soils.as_ref(), common.soils_table.as_ref())? {
        request = request.with_soils(source, common.soil_moisture);
    }
    if let Some(source) = read_layer("roughness", common.roughness.as_ref(), common.roughness_table.as_ref())? {
        request = request.with_roughness(source);
    }

    let mut scratch = match &common.scratch_dir {
        Some(dir) => ScratchTracker::on_disk(dir)
            .with_context(|| format!("Failed to create scratch directory '{}'", dir.display()))?
            .keep(common.keep_scratch),
        None => ScratchTracker::in_memory(),
    };

    let start = Instant::now();
    let pb = spinner("Computing mobility surface...");
    let outcome = run(&ctx, &request, &mut scratch);
    pb.finish_and_clear();
    let outcome = outcome.context("Mobility run failed")?;
    let elapsed = start.elapsed();

    write_result(&outcome.ccm, &common.output)?;
    print_summary(&outcome, &common.output, elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let raster = read_dem(&input)?;
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                100.0 * stats.valid_count as f64 / raster.len() as f64
            );
        }

        // ── Mobility ─────────────────────────────────────────────────
        Commands::Dismounted {
            common,
            visibility,
            body_weight,
            legacy_last_match,
        } => {
            let policy = if legacy_last_match {
                MatchPolicy::LastWins
            } else {
                MatchPolicy::Strict
            };
            mobility(common, |table| {
                MobilityRequest::dismounted(visibility, table)
                    .with_body_weight(body_weight)
                    .with_match_policy(policy)
            })?;
        }

        Commands::Mounted { common, vehicles } => {
            let vehicle_types = parse_vehicle_types(&vehicles);
            if vehicle_types.is_empty() {
                return Err(ccm_core::Error::config(format!("no vehicle type in '{}'", vehicles)).into());
            }
            info!("Convoy: {}", vehicle_types.join(", "));
            mobility(common, |table| MobilityRequest::mounted(vehicle_types, table))?;
        }
    }

    Ok(())
}
