//! Uniform random point sampling over an extent

use geo::Point;
use rand::Rng;
use sitesim_core::vector::{Feature, GeometryKind, VectorLayer};
use sitesim_core::{Error, Extent, Result, CRS};

/// Draw `count` points uniformly over `extent`.
///
/// X and Y are sampled independently from `[min, max)`.
pub fn random_points<R: Rng + ?Sized>(extent: &Extent, count: usize, rng: &mut R) -> Result<Vec<Point<f64>>> {
    if extent.is_empty() {
        return Err(Error::EmptyExtent {
            min_x: extent.min_x,
            min_y: extent.min_y,
            max_x: extent.max_x,
            max_y: extent.max_y,
        });
    }

    Ok((0..count)
        .map(|_| {
            let x = rng.gen_range(extent.min_x..extent.max_x);
            let y = rng.gen_range(extent.min_y..extent.max_y);
            Point::new(x, y)
        })
        .collect())
}

/// Build an in-memory point layer of `count` random points over `extent`.
pub fn random_point_layer<R: Rng + ?Sized>(
    name: impl Into<String>,
    extent: &Extent,
    crs: Option<CRS>,
    count: usize,
    rng: &mut R,
) -> Result<VectorLayer> {
    let mut layer = VectorLayer::new(name, GeometryKind::Point, crs);
    for point in random_points(extent, count, rng)? {
        layer.add_feature(Feature::new(point));
    }
    Ok(layer)
}
