//! SiteSim CLI - Monte Carlo site sampling over rasters

mod config;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use config::FileConfig;
use sitesim_algorithms::montecarlo::{
    monte_carlo_sampling_with_progress, MonteCarloParams, MonteCarloRun, MonteCarloSummary,
};
use sitesim_core::io::read_geotiff;
use sitesim_core::{Project, Raster, RasterLayer};

/// Layer name looked up when none is given and several rasters are loaded
const DEFAULT_LAYER: &str = "Raster_layer";

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "sitesim")]
#[command(author, version, about = "Monte Carlo site sampling over rasters", long_about = None)]
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
        /// Band to summarize (1-based)
        #[arg(short, long, default_value = "1")]
        band: usize,
    },
    /// Estimate raster mean and max under random siting
    Simulate(SimulateArgs),
}

#[derive(clap::Args, Debug, Default)]
struct SimulateArgs {
    /// Raster files; each becomes a layer named after its file stem
    #[arg(required = true)]
    rasters: Vec<PathBuf>,
    /// Name of the raster layer to sample
    #[arg(short, long)]
    layer: Option<String>,
    /// Number of simulations
    #[arg(short = 'n', long)]
    simulations: Option<usize>,
    /// Random sites per simulation
    #[arg(short, long)]
    points: Option<usize>,
    /// Site buffer radius in raster CRS units
    #[arg(short, long)]
    distance: Option<f64>,
    /// Segments approximating each buffer circle
    #[arg(long)]
    segments: Option<usize>,
    /// Raster band to sample (1-based)
    #[arg(short, long)]
    band: Option<usize>,
    /// Seed for reproducible runs
    #[arg(long)]
    seed: Option<u64>,
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Write one CSV row per site and simulation
    #[arg(long)]
    sites_csv: Option<PathBuf>,
    /// Write the summary as JSON
    #[arg(long)]
    summary_json: Option<PathBuf>,
}

/// Simulation settings after merging flags, config file and defaults
#[derive(Debug, Clone)]
struct Settings {
    layer: Option<String>,
    params: MonteCarloParams,
    sites_csv: Option<PathBuf>,
    summary_json: Option<PathBuf>,
}

impl Settings {
    fn resolve(args: &SimulateArgs, file: &FileConfig) -> Self {
        let defaults = MonteCarloParams::default();
        let sim = &file.simulation;

        Self {
            layer: args.layer.clone().or_else(|| sim.layer.clone()),
            params: MonteCarloParams {
                simulations: args.simulations.or(sim.simulations).unwrap_or(defaults.simulations),
                points_per_simulation: args.points.or(sim.points).unwrap_or(defaults.points_per_simulation),
                buffer_distance: args.distance.or(sim.buffer_distance).unwrap_or(defaults.buffer_distance),
                segments: args.segments.or(sim.segments).unwrap_or(defaults.segments),
                band: args.band.or(sim.band).unwrap_or(defaults.band),
                seed: args.seed.or(sim.seed),
            },
            sites_csv: args.sites_csv.clone().or_else(|| file.output.sites_csv.clone()),
            summary_json: args.summary_json.clone().or_else(|| file.output.summary_json.clone()),
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn parse_level(level: &str) -> Result<Level> {
    level
        .parse::<Level>()
        .map_err(|_| anyhow::anyhow!("Unknown log level: {}. Use trace, debug, info, warn or error.", level))
}

fn setup_logging(level: Level) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} simulations ({eta})")
            .unwrap()
            .progress_chars("=> "),
    );
    pb
}

fn read_raster(path: &Path, band: usize) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> = read_geotiff(path, Some(band))
        .with_context(|| format!("Failed to read raster {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {}", raster.cols(), raster.rows());
    Ok(raster)
}

fn load_project(paths: &[PathBuf], band: usize) -> Result<Project> {
    let pb = spinner("Loading layers...");
    let mut project = Project::new();
    for path in paths {
        let layer = RasterLayer::load(path, None, band)
            .with_context(|| format!("Failed to load raster {}", path.display()))?;
        project.add_layer(layer);
    }
    pb.finish_and_clear();
    Ok(project)
}

fn layer_name(requested: Option<&str>, project: &Project) -> String {
    match requested {
        Some(name) => name.to_string(),
        None => match project.layer_names().as_slice() {
            [only] => only.to_string(),
            _ => DEFAULT_LAYER.to_string(),
        },
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "None".to_string(), |v| format!("{v:?}"))
}

fn print_results(summary: &MonteCarloSummary) {
    println!("=== Results ===");
    println!(
        "Global average MEAN across {} simulations: {}",
        summary.mean_contributors,
        fmt_opt(summary.global_mean_avg)
    );
    println!(
        "Global average MAX across {} simulations: {}",
        summary.max_contributors,
        fmt_opt(summary.global_max_avg)
    );
    println!(
        "Average MEAN per site (all sims combined): {}",
        fmt_opt(summary.site_mean_avg)
    );
    println!(
        "Average MAX per site (all sims combined): {}",
        fmt_opt(summary.site_max_avg)
    );
}

fn write_sites_csv(run: &MonteCarloRun, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    for site in run.outcomes.iter().flat_map(|o| &o.sites) {
        writer.serialize(site).context("Failed to write site record")?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct SummaryReport<'a> {
    layer: &'a str,
    seed: u64,
    params: &'a MonteCarloParams,
    summary: &'a MonteCarloSummary,
}

fn write_summary_json(report: &SummaryReport<'_>, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = std::io::BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report).context("Failed to write summary JSON")?;
    writer.flush()?;
    Ok(())
}

fn simulate(settings: &Settings, rasters: &[PathBuf]) -> Result<()> {
    let project = load_project(rasters, settings.params.band)?;
    let name = layer_name(settings.layer.as_deref(), &project);
    let layer = project
        .raster_layer_by_name(&name)
        .with_context(|| format!("Loaded layers: {}", project.layer_names().join(", ")))?;

    if layer.raster.crs().is_none() {
        warn!("Layer '{}' has no CRS; buffer distance is in raw map units", name);
    }

    let start = Instant::now();
    let pb = progress_bar(settings.params.simulations);
    let run = monte_carlo_sampling_with_progress(&layer.raster, &settings.params, |_| pb.inc(1))
        .context("Monte Carlo sampling failed")?;
    pb.finish_and_clear();
    let elapsed = start.elapsed();

    print_results(&run.summary);
    println!("  Seed: {}", run.seed);
    println!("  Processing time: {:.2?}", elapsed);

    if let Some(path) = &settings.sites_csv {
        write_sites_csv(&run, path)?;
        println!("Sites saved to: {}", path.display());
    }
    if let Some(path) = &settings.summary_json {
        let report = SummaryReport {
            layer: &name,
            seed: run.seed,
            params: &settings.params,
            summary: &run.summary,
        };
        write_summary_json(&report, path)?;
        println!("Summary saved to: {}", path.display());
    }
    Ok(())
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();

    let file_config = match &cli.command {
        Commands::Simulate(args) => match &args.config {
            Some(path) => FileConfig::from_file(path)?,
            None => FileConfig::default(),
        },
        Commands::Info { .. } => FileConfig::default(),
    };

    let level = match (&file_config.logging.level, cli.verbose) {
        (_, true) => Level::DEBUG,
        (Some(level), false) => parse_level(level)?,
        (None, false) => Level::INFO,
    };
    setup_logging(level);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input, band } => {
            let raster = read_raster(&input, band)?;
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
            println!("\nStatistics (band {}):", band);
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
                100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
            );
        }

        // ── Simulate ─────────────────────────────────────────────────
        Commands::Simulate(args) => {
            let settings = Settings::resolve(&args, &file_config);
            simulate(&settings, &args.rasters)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::SimulationSection;

    #[test]
    fn flags_override_config_and_defaults() {
        let file = FileConfig {
            simulation: SimulationSection {
                simulations: Some(10),
                points: Some(50),
                seed: Some(1),
                ..Default::default()
            },
            ..Default::default()
        };
        let args = SimulateArgs {
            points: Some(5),
            ..Default::default()
        };

        let settings = Settings::resolve(&args, &file);
        assert_eq!(settings.params.simulations, 10);
        assert_eq!(settings.params.points_per_simulation, 5);
        assert_eq!(settings.params.seed, Some(1));
        assert_eq!(settings.params.buffer_distance, 0.009);
        assert_eq!(settings.params.band, 1);
        assert!(settings.layer.is_none());
    }

    #[test]
    fn single_raster_is_used_without_layer_name() {
        let mut project = Project::new();
        project.add_layer(RasterLayer::new("dem", Raster::filled(2, 2, 1.0)));
        assert_eq!(layer_name(None, &project), "dem");

        project.add_layer(RasterLayer::new("ndvi", Raster::filled(2, 2, 1.0)));
        assert_eq!(layer_name(None, &project), DEFAULT_LAYER);
        assert_eq!(layer_name(Some("ndvi"), &project), "ndvi");
    }

    #[test]
    fn missing_values_print_as_none() {
        assert_eq!(fmt_opt(None), "None");
        assert_eq!(fmt_opt(Some(2.5)), "2.5");
        assert_eq!(fmt_opt(Some(3.0)), "3.0");
    }

    #[test]
    fn log_levels() {
        assert_eq!(parse_level("debug").unwrap(), Level::DEBUG);
        assert!(parse_level("loud").is_err());
    }

    #[test]
    fn cli_parses_simulate() {
        let cli = Cli::try_parse_from([
            "sitesim", "simulate", "a.tif", "-n", "5", "--distance", "0.01", "--seed", "3",
        ])
        .unwrap();
        match cli.command {
            Commands::Simulate(args) => {
                assert_eq!(args.rasters, vec![PathBuf::from("a.tif")]);
                assert_eq!(args.simulations, Some(5));
                assert_eq!(args.distance, Some(0.01));
                assert_eq!(args.seed, Some(3));
            }
            Commands::Info { .. } => panic!("expected simulate"),
        }
    }
}
