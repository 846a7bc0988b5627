//! End-to-end Monte Carlo runs on GeoTIFFs loaded through a project.

use sitesim_algorithms::montecarlo::{monte_carlo_sampling, run_simulation, MonteCarloParams};
use sitesim_core::io::{write_geotiff, GeoTiffOptions};
use sitesim_core::{GeoTransform, Project, Raster, RasterLayer, CRS};
use std::path::Path;

/// 100x100 degree-ish grid at 0.001 resolution; value = col, left half no-data when `masked`
fn write_fixture(path: &Path, masked: bool) {
    let mut raster: Raster<f64> = Raster::new(100, 100);
    for row in 0..100 {
        for col in 0..100 {
            let value = if masked && col < 50 { -9999.0 } else { col as f64 };
            raster.set(row, col, value).unwrap();
        }
    }
    raster.set_transform(GeoTransform::new(-70.0, -33.0, 0.001, -0.001));
    raster.set_crs(Some(CRS::wgs84()));
    raster.set_nodata(Some(-9999.0));
    write_geotiff(&raster, path, Some(GeoTiffOptions { write_nodata: true })).unwrap();
}

fn load(path: &Path) -> Project {
    let mut project = Project::new();
    project.add_layer(RasterLayer::load(path, Some("Raster_layer"), 1).unwrap());
    project
}

fn params(seed: u64) -> MonteCarloParams {
    MonteCarloParams {
        simulations: 12,
        points_per_simulation: 40,
        buffer_distance: 0.004,
        seed: Some(seed),
        ..Default::default()
    }
}

#[test]
fn seeded_runs_are_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("values.tif");
    write_fixture(&path, false);
    let project = load(&path);
    let layer = project.raster_layer_by_name("Raster_layer").unwrap();

    let a = monte_carlo_sampling(&layer.raster, &params(2024)).unwrap();
    let b = monte_carlo_sampling(&layer.raster, &params(2024)).unwrap();
    assert_eq!(a.summary, b.summary);
    assert_eq!(a.outcomes[5].sites, b.outcomes[5].sites);

    // a single simulation rerun on its own matches the batch
    let single = run_simulation(&layer.raster, &params(2024), 2024, 5).unwrap();
    assert_eq!(single.sites, a.outcomes[5].sites);

    let c = monte_carlo_sampling(&layer.raster, &params(7)).unwrap();
    assert_ne!(a.summary.site_mean_avg, c.summary.site_mean_avg);
}

#[test]
fn averages_are_bounded_by_raster_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("values.tif");
    write_fixture(&path, false);
    let project = load(&path);
    let raster = &project.raster_layer_by_name("Raster_layer").unwrap().raster;

    let run = monte_carlo_sampling(raster, &params(11)).unwrap();
    let s = &run.summary;

    assert_eq!(s.simulations, 12);
    assert_eq!(s.mean_contributors, 12);
    assert_eq!(s.site_mean_count, 12 * 40);

    let mean = s.site_mean_avg.unwrap();
    let max = s.site_max_avg.unwrap();
    assert!((0.0..=99.0).contains(&mean));
    assert!(max >= mean);
    // uniform siting over a 0..99 ramp lands near the middle
    assert!((mean - 49.5).abs() < 10.0, "site mean avg {mean}");

    for outcome in &run.outcomes {
        for site in &outcome.sites {
            assert!(site.x >= -70.0 && site.x < -69.9);
            assert!(site.y >= -33.1 && site.y < -33.0);
            assert!(site.max.unwrap() >= site.mean.unwrap());
        }
    }
}

#[test]
fn masked_half_yields_null_sites() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("masked.tif");
    write_fixture(&path, true);
    let project = load(&path);
    let raster = &project.raster_layer_by_name("Raster_layer").unwrap().raster;

    let run = monte_carlo_sampling(raster, &params(3)).unwrap();
    let s = &run.summary;

    assert!(s.site_mean_count < 12 * 40, "some sites fall entirely in no-data");
    assert!(s.site_mean_count > 0);
    assert!(s.site_mean_avg.unwrap() >= 46.0, "only valid cells (col >= 50) contribute");

    let null_sites = run
        .outcomes
        .iter()
        .flat_map(|o| &o.sites)
        .filter(|site| site.mean.is_none())
        .count();
    assert_eq!(null_sites, 12 * 40 - s.site_mean_count);
    assert!(run
        .outcomes
        .iter()
        .flat_map(|o| &o.sites)
        .filter(|site| site.mean.is_none())
        .all(|site| site.x < -69.95));
}
