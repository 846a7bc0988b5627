//! GeoTIFF write/read through the filesystem and the project registry.

use approx::assert_relative_eq;
use sitesim_core::io::{read_geotiff, read_geotiff_from_buffer, write_geotiff, write_geotiff_to_buffer, GeoTiffOptions};
use sitesim_core::{Error, GeoTransform, Project, Raster, RasterLayer, CRS};

fn sample_raster() -> Raster<f64> {
    let mut raster: Raster<f64> = Raster::new(6, 8);
    for row in 0..6 {
        for col in 0..8 {
            raster.set(row, col, (row * 8 + col) as f64).unwrap();
        }
    }
    raster.set(0, 0, -9999.0).unwrap();
    raster.set_nodata(Some(-9999.0));
    raster.set_transform(GeoTransform::new(-70.5, -33.2, 0.01, -0.01));
    raster.set_crs(Some(CRS::wgs84()));
    raster
}

#[test]
fn file_roundtrip_keeps_georeferencing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("values.tif");

    let original = sample_raster();
    write_geotiff(&original, &path, Some(GeoTiffOptions { write_nodata: true })).unwrap();

    let read: Raster<f64> = read_geotiff(&path, None).unwrap();
    assert_eq!(read.shape(), (6, 8));
    assert_eq!(read.nodata(), Some(-9999.0));
    assert_eq!(read.crs().and_then(CRS::epsg), Some(4326));
    assert_eq!(read.value_at(0, 0), None);
    assert_eq!(read.value_at(5, 7), Some(47.0));

    let (min_x, min_y, max_x, max_y) = read.bounds();
    assert_relative_eq!(min_x, -70.5, epsilon = 1e-9);
    assert_relative_eq!(max_x, -70.42, epsilon = 1e-9);
    assert_relative_eq!(min_y, -33.26, epsilon = 1e-9);
    assert_relative_eq!(max_y, -33.2, epsilon = 1e-9);
}

#[test]
fn nodata_tag_is_optional() {
    let buf = write_geotiff_to_buffer(&sample_raster(), None).unwrap();
    let read: Raster<f64> = read_geotiff_from_buffer(&buf, Some(1)).unwrap();
    assert_eq!(read.nodata(), None);
    assert_eq!(read.value_at(0, 0), Some(-9999.0));
}

#[test]
fn single_band_image_rejects_band_two() {
    let buf = write_geotiff_to_buffer(&sample_raster(), None).unwrap();
    let err = read_geotiff_from_buffer::<f64>(&buf, Some(2)).unwrap_err();
    assert!(matches!(err, Error::BandOutOfRange { band: 2, bands: 1 }));
}

#[test]
fn project_loads_layer_named_after_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Raster_layer.tif");
    write_geotiff(&sample_raster(), &path, Some(GeoTiffOptions { write_nodata: true })).unwrap();

    let mut project = Project::new();
    project.add_layer(RasterLayer::load(&path, None, 1).unwrap());

    let layer = project.raster_layer_by_name("Raster_layer").unwrap();
    assert_eq!(layer.source.as_deref(), Some(path.as_path()));
    assert_eq!(layer.raster.statistics().valid_count, 47);
}
