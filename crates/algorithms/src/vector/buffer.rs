//! Buffer operations
//!
//! Points are buffered into regular polygons approximating a circle.

use geo::{Geometry, LineString, Point, Polygon};
use sitesim_core::vector::{Feature, GeometryKind, VectorLayer};
use sitesim_core::{Error, Result};
use std::f64::consts::PI;
use tracing::warn;

/// Parameters for buffer operations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer radius in CRS units
    pub distance: f64,
    /// Number of segments approximating the full circle
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 20,
        }
    }
}

impl BufferParams {
    fn validate(&self) -> Result<()> {
        if !self.distance.is_finite() || self.distance < 0.0 {
            return Err(Error::InvalidParameter {
                name: "distance",
                value: self.distance.to_string(),
                reason: "must be a finite, non-negative number".into(),
            });
        }
        Ok(())
    }
}

/// Create a circular buffer around a point.
///
/// The ring has `max(segments, 4)` vertices plus the closing one.
pub fn buffer_points(point: &Point<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(4);
    let r = params.distance.abs();
    let (cx, cy) = (point.x(), point.y());

    let mut coords: Vec<(f64, f64)> = (0..n)
        .map(|i| {
            let angle = 2.0 * PI * i as f64 / n as f64;
            (cx + r * angle.cos(), cy + r * angle.sin())
        })
        .collect();
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}

/// Buffer each `(x, y)` coordinate into its own polygon.
pub fn buffer_geometry(points: &[(f64, f64)], params: &BufferParams) -> Vec<Polygon<f64>> {
    points
        .iter()
        .map(|&(x, y)| buffer_points(&Point::new(x, y), params))
        .collect()
}

/// Buffer every point feature of `layer` into a new polygon layer.
///
/// Output features keep the input feature ids and attributes. Features
/// without point geometry are carried over with no geometry.
pub fn buffer_layer(layer: &VectorLayer, params: &BufferParams, name: impl Into<String>) -> Result<VectorLayer> {
    params.validate()?;

    let mut output = VectorLayer::new(name, GeometryKind::Polygon, layer.crs().cloned());
    let mut skipped = 0usize;

    for feature in layer.features().iter() {
        let geometry = match &feature.geometry {
            Some(Geometry::Point(point)) => Some(Geometry::Polygon(buffer_points(point, params))),
            Some(Geometry::MultiPoint(points)) => Some(Geometry::MultiPolygon(
                points.iter().map(|p| buffer_points(p, params)).collect(),
            )),
            _ => {
                skipped += 1;
                None
            }
        };

        output.add_feature(Feature {
            geometry,
            properties: feature.properties.clone(),
            id: feature.id,
        });
    }

    if skipped > 0 {
        warn!(
            "{} feature(s) of '{}' have no point geometry and were not buffered",
            skipped,
            layer.name()
        );
    }

    Ok(output)
}
