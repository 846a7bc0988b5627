//! Runs the `sitesim` binary against a generated GeoTIFF.

use sitesim_core::io::{write_geotiff, GeoTiffOptions};
use sitesim_core::{GeoTransform, Raster, CRS};
use std::path::Path;
use std::process::Command;

fn write_constant(path: &Path, value: f64) {
    let mut raster: Raster<f64> = Raster::filled(40, 40, value);
    raster.set_transform(GeoTransform::new(10.0, 50.0, 0.001, -0.001));
    raster.set_crs(Some(CRS::wgs84()));
    write_geotiff(&raster, path, Some(GeoTiffOptions::default())).unwrap();
}

#[test]
fn simulate_prints_results_and_writes_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let raster = dir.path().join("Raster_layer.tif");
    let sites = dir.path().join("sites.csv");
    let summary = dir.path().join("summary.json");
    let config = dir.path().join("run.toml");
    write_constant(&raster, 3.0);
    std::fs::write(&config, "[simulation]\nsimulations = 3\npoints = 4\nbuffer_distance = 0.002\nseed = 5\n").unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_sitesim"))
        .arg("simulate")
        .arg(&raster)
        .arg("--config")
        .arg(&config)
        .arg("--sites-csv")
        .arg(&sites)
        .arg("--summary-json")
        .arg(&summary)
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("=== Results ==="));
    assert!(stdout.contains("Global average MEAN across 3 simulations: 3.0\n"));
    assert!(stdout.contains("Average MAX per site (all sims combined): 3.0\n"));

    let csv = std::fs::read_to_string(&sites).unwrap();
    let mut lines = csv.lines();
    assert_eq!(lines.next(), Some("simulation,site,x,y,mean,max"));
    assert_eq!(lines.count(), 12);

    let json: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&summary).unwrap()).unwrap();
    assert_eq!(json["seed"], 5);
    assert_eq!(json["layer"], "Raster_layer");
    assert_eq!(json["summary"]["site_mean_count"], 12);
}

#[test]
fn unknown_layer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let raster = dir.path().join("dem.tif");
    write_constant(&raster, 1.0);

    let output = Command::new(env!("CARGO_BIN_EXE_sitesim"))
        .args(["simulate", "--layer", "missing", "-n", "1"])
        .arg(&raster)
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Layer not found: missing"));
}
